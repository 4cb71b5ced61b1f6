//! Task-list line recognition and canonical rendering (§4.B, §4.F, §6).
//!
//! This module only understands a single line in isolation: scanning a
//! whole document body into a `path → line → Task` map, and the
//! done-with-recurrence rewrite rule, belong to the Task projection in
//! `kiln-projections`, which has the document's path and fingerprint to
//! complete a task's identity.

use chrono::NaiveDate;

use crate::error::{ParseError, Result};
use crate::recurrence::{RecurrenceRule, WeekendPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Todo,
    Doing,
    Blocked,
    Done,
    Abandoned,
}

impl TaskStatus {
    fn from_status_char(c: char) -> Option<Self> {
        match c {
            ' ' => Some(TaskStatus::Todo),
            'x' | 'X' => Some(TaskStatus::Done),
            '/' => Some(TaskStatus::Doing),
            'b' | 'B' => Some(TaskStatus::Blocked),
            'a' | 'A' => Some(TaskStatus::Abandoned),
            _ => None,
        }
    }

    fn to_status_char(self) -> char {
        match self {
            TaskStatus::Todo => ' ',
            TaskStatus::Doing => '/',
            TaskStatus::Blocked => 'b',
            TaskStatus::Done => 'x',
            TaskStatus::Abandoned => 'a',
        }
    }
}

/// A task recognized on a single line of a document's body. Does not carry
/// path, fingerprint or the "uncommitted repeat" flag — those belong to the
/// fully-identified `Task` the projection layer builds around this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    /// 1-based line number within the body the line was scanned from.
    pub line: usize,
    pub name: String,
    pub status: TaskStatus,
    pub due: Option<NaiveDate>,
    pub scheduled: Option<NaiveDate>,
    pub completed: Option<NaiveDate>,
    pub priority: Option<u32>,
    pub recurrence: Option<(RecurrenceRule, String)>,
}

const FIELD_KEYS: &[&str] = &["due", "d", "scheduled", "s", "completed", "priority", "p", "every", "e"];

/// Recognizes a single task-list line. Returns `Ok(None)` if the line does
/// not match the task-line grammar at all (so callers can skip non-task
/// lines silently); returns `Err` only once the `- [c]` prefix has matched
/// but the remainder is malformed (e.g. an unparseable date).
pub fn parse_task_line(line: &str, line_number: usize, weekend: WeekendPolicy) -> Result<Option<ParsedTask>> {
    let trimmed_start = line.trim_start();
    let Some(after_dash) = trimmed_start.strip_prefix('-') else {
        return Ok(None);
    };
    let after_dash = after_dash.trim_start();
    if after_dash.len() == trimmed_start.len() {
        // no whitespace consumed between '-' and what follows
        return Ok(None);
    }
    let Some(after_bracket_open) = after_dash.strip_prefix('[') else {
        return Ok(None);
    };
    let mut chars = after_bracket_open.chars();
    let Some(status_char) = chars.next() else {
        return Ok(None);
    };
    let Some(status) = TaskStatus::from_status_char(status_char) else {
        return Ok(None);
    };
    let rest = chars.as_str();
    let Some(after_bracket_close) = rest.strip_prefix(']') else {
        return Ok(None);
    };
    let Some(free_text) = after_bracket_close.strip_prefix(' ') else {
        return Ok(None);
    };

    let (name, fields) = split_name_and_fields(free_text)?;
    if name.trim().is_empty() {
        return Err(ParseError::Task(format!("task line {line_number} has no name")));
    }

    let mut task = ParsedTask {
        line: line_number,
        name: name.trim().to_string(),
        status,
        due: None,
        scheduled: None,
        completed: None,
        priority: None,
        recurrence: None,
    };

    for (key, value) in fields {
        match key {
            "due" | "d" => task.due = Some(parse_date(&value, line_number)?),
            "scheduled" | "s" => task.scheduled = Some(parse_date(&value, line_number)?),
            "completed" => task.completed = Some(parse_date(&value, line_number)?),
            "priority" | "p" => {
                task.priority = Some(value.parse::<u32>().map_err(|_| {
                    ParseError::Task(format!("task line {line_number} has non-integer priority {value:?}"))
                })?)
            }
            "every" | "e" => {
                let rule = RecurrenceRule::parse(&value, weekend)
                    .map_err(|e| ParseError::Task(format!("task line {line_number}: {e}")))?;
                task.recurrence = Some((rule, value));
            }
            _ => unreachable!("split_name_and_fields only emits recognized keys"),
        }
    }

    Ok(Some(task))
}

fn parse_date(value: &str, line_number: usize) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ParseError::Task(format!("task line {line_number} has invalid date {value:?}")))
}

/// Splits the free text following `- [c] ` into the task name and its
/// recognized `key:value` fields. The name is the longest leading substring
/// that contains no recognized ` <field-key>:` token.
fn split_name_and_fields(free_text: &str) -> Result<(String, Vec<(&'static str, String)>)> {
    let mut name_end = free_text.len();
    let mut field_starts = Vec::new();

    let mut search_from = 0usize;
    while let Some(rel_colon) = free_text[search_from..].find(':') {
        let colon = search_from + rel_colon;
        let key_start = free_text[..colon]
            .rfind(|c: char| c.is_whitespace())
            .map(|i| i + 1)
            .unwrap_or(0);
        let candidate_key = &free_text[key_start..colon];
        if let Some(canonical) = FIELD_KEYS.iter().find(|k| **k == candidate_key) {
            let token_start = if key_start > 0 { key_start - 1 } else { key_start };
            field_starts.push((token_start, canonical_key(canonical)));
            if token_start < name_end {
                name_end = token_start;
            }
        }
        search_from = colon + 1;
    }

    field_starts.sort_by_key(|(start, _)| *start);

    let mut fields = Vec::new();
    for (i, (start, key)) in field_starts.iter().enumerate() {
        let value_start = free_text[*start..].find(':').map(|p| start + p + 1).unwrap();
        let value_end = field_starts
            .get(i + 1)
            .map(|(next_start, _)| *next_start)
            .unwrap_or(free_text.len());
        let value = free_text[value_start..value_end].trim().to_string();
        fields.push((*key, value));
    }

    let name = free_text[..name_end].to_string();
    Ok((name, fields))
}

fn canonical_key(key: &str) -> &'static str {
    match key {
        "due" | "d" => "due",
        "scheduled" | "s" => "scheduled",
        "completed" => "completed",
        "priority" | "p" => "priority",
        "every" | "e" => "every",
        _ => unreachable!(),
    }
}

/// Renders a task back into its canonical line form (§4.F): fields are
/// always emitted in a fixed order, only when present, regardless of the
/// order they were parsed in.
pub fn render_task(task: &ParsedTask) -> String {
    let mut out = format!("- [{}] {}", task.status.to_status_char(), task.name);
    if let Some(due) = task.due {
        out.push_str(&format!(" due:{}", due.format("%Y-%m-%d")));
    }
    if let Some(scheduled) = task.scheduled {
        out.push_str(&format!(" scheduled:{}", scheduled.format("%Y-%m-%d")));
    }
    if let Some(priority) = task.priority {
        out.push_str(&format!(" priority:{priority}"));
    }
    if let Some((_, original_text)) = &task.recurrence {
        out.push_str(&format!(" every:{original_text}"));
    }
    if let Some(completed) = task.completed {
        out.push_str(&format!(" completed:{}", completed.format("%Y-%m-%d")));
    }
    out
}

/// Scans every line of a document body for task lines, skipping lines that
/// don't match the grammar at all. A malformed task-like line aborts the
/// whole scan, since the spec treats per-file parse errors as all-or-
/// nothing for a given read (the projection layer logs and skips the file).
pub fn scan_tasks(body: &str, weekend: WeekendPolicy) -> Result<Vec<ParsedTask>> {
    let mut tasks = Vec::new();
    for (offset, line) in body.split('\n').enumerate() {
        match parse_task_line(line, offset + 1, weekend) {
            Ok(Some(task)) => tasks.push(task),
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(line = offset + 1, error = %err, "aborting task scan on malformed line");
                return Err(err);
            }
        }
    }
    tracing::trace!(count = tasks.len(), "scanned task lines");
    Ok(tasks)
}
