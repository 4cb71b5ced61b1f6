//! The Task projection (§4.F): `path → (line → Task)`, with filters,
//! sorters, and the done-with-recurrence rewrite.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDate};
use kiln_core::{Document, Event, EventBus, Operation, RelPath, Subscription};
use kiln_parser::{RecurrenceRule, TaskStatus as ParsedStatus, WeekendPolicy};
use kiln_watch::ReaderClient;
use kiln_writer::{LineMutation, LineWriter};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A fully-identified task: the parser's per-line recognition plus the
/// document identity (path, fingerprint) the projection layer supplies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub path: RelPath,
    pub fingerprint: String,
    pub line: usize,
    /// The raw-file line number of the enclosing document's first body
    /// line (see [`kiln_core::Document::content_start`]); 0 if that
    /// document has no front-matter block. `line` above is always
    /// body-relative per §3 — this is carried solely so the mutation
    /// helpers, which address raw file lines, can be given the right one.
    content_start: usize,
    pub name: String,
    pub status: ParsedStatus,
    pub due: Option<NaiveDate>,
    pub scheduled: Option<NaiveDate>,
    pub completed: Option<NaiveDate>,
    pub priority: Option<u32>,
    pub recurrence: Option<(RecurrenceRule, String)>,
    /// Set transiently when a status transition to `done` carries a
    /// recurrence rule; consumed by the next `update()` call, which
    /// rewrites the mutation into the two-step repeat-and-commit batch
    /// (§4.F) instead of a plain line replace.
    pub uncommitted_repeat: bool,
}

impl Task {
    fn from_parsed(path: RelPath, fingerprint: String, content_start: usize, parsed: &kiln_parser::ParsedTask) -> Self {
        Self {
            path,
            fingerprint,
            line: parsed.line,
            content_start,
            name: parsed.name.clone(),
            status: parsed.status,
            due: parsed.due,
            scheduled: parsed.scheduled,
            completed: parsed.completed,
            priority: parsed.priority,
            recurrence: parsed.recurrence.clone(),
            uncommitted_repeat: false,
        }
    }

    /// Translates this task's body-relative `line` into the raw file line
    /// number the Line Writer's mutation helpers expect (§3: task lines are
    /// numbered excluding any front-matter block, but the writer addresses
    /// the file as a whole).
    fn raw_line(&self) -> usize {
        if self.content_start == 0 { self.line } else { self.line + self.content_start - 1 }
    }

    fn to_parsed(&self) -> kiln_parser::ParsedTask {
        kiln_parser::ParsedTask {
            line: self.line,
            name: self.name.clone(),
            status: self.status,
            due: self.due,
            scheduled: self.scheduled,
            completed: self.completed,
            priority: self.priority,
            recurrence: self.recurrence.clone(),
        }
    }
}

/// Filters composable with `And`/`Or`/`Not`, applied left-to-right along
/// with sorters via [`list`](TaskProjection::list).
pub enum TaskFilter {
    Status(Vec<ParsedStatus>),
    Priority(Vec<u32>),
    DueRange { after: Option<NaiveDate>, before: Option<NaiveDate> },
    ScheduledRange { after: Option<NaiveDate>, before: Option<NaiveDate> },
    CompletedRange { after: Option<NaiveDate>, before: Option<NaiveDate> },
    And(Box<TaskFilter>, Box<TaskFilter>),
    Or(Box<TaskFilter>, Box<TaskFilter>),
    Not(Box<TaskFilter>),
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::Status(statuses) => statuses.contains(&task.status),
            TaskFilter::Priority(priorities) => task.priority.is_some_and(|p| priorities.contains(&p)),
            TaskFilter::DueRange { after, before } => in_range(task.due, *after, *before),
            TaskFilter::ScheduledRange { after, before } => in_range(task.scheduled, *after, *before),
            TaskFilter::CompletedRange { after, before } => in_range(task.completed, *after, *before),
            TaskFilter::And(a, b) => a.matches(task) && b.matches(task),
            TaskFilter::Or(a, b) => a.matches(task) || b.matches(task),
            TaskFilter::Not(inner) => !inner.matches(task),
        }
    }
}

fn in_range(value: Option<NaiveDate>, after: Option<NaiveDate>, before: Option<NaiveDate>) -> bool {
    let Some(value) = value else { return false };
    after.is_none_or(|a| value >= a) && before.is_none_or(|b| value <= b)
}

/// A caller-supplied five-way status ordering (e.g. *agenda* or *kanban*),
/// used by [`TaskSorter::Status`].
pub type StatusOrder = [ParsedStatus; 5];

pub const AGENDA_ORDER: StatusOrder =
    [ParsedStatus::Doing, ParsedStatus::Todo, ParsedStatus::Blocked, ParsedStatus::Done, ParsedStatus::Abandoned];
pub const KANBAN_ORDER: StatusOrder =
    [ParsedStatus::Todo, ParsedStatus::Blocked, ParsedStatus::Doing, ParsedStatus::Done, ParsedStatus::Abandoned];

pub enum TaskSorter {
    Priority,
    Status(StatusOrder),
}

fn status_rank(order: &StatusOrder, status: ParsedStatus) -> usize {
    order.iter().position(|s| *s == status).unwrap_or(order.len())
}

fn apply_sorters(tasks: &mut [Task], sorters: &[TaskSorter]) {
    tasks.sort_by(|a, b| {
        for sorter in sorters {
            let ordering = match sorter {
                TaskSorter::Priority => match (a.priority, b.priority) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                },
                TaskSorter::Status(order) => status_rank(order, a.status).cmp(&status_rank(order, b.status)),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.name.cmp(&b.name)
    });
}

/// Which subset of tasks a [`list`](TaskProjection::list) call
/// materializes before filters/sorters are applied.
pub enum TaskFetcher {
    All,
    ForPath(RelPath),
}

pub struct TaskProjection {
    cache: Arc<RwLock<HashMap<RelPath, HashMap<usize, Task>>>>,
    bus: Arc<EventBus<Task>>,
    writer: Arc<LineWriter>,
    weekend: WeekendPolicy,
    cancel: CancellationToken,
}

impl TaskProjection {
    pub async fn new(reader: &ReaderClient, writer: Arc<LineWriter>, weekend: WeekendPolicy) -> Self {
        let cache: Arc<RwLock<HashMap<RelPath, HashMap<usize, Task>>>> = Arc::new(RwLock::new(HashMap::new()));
        let bus = Arc::new(EventBus::new());
        let cancel = CancellationToken::new();

        let subscription = reader.subscribe(kiln_watch::SubscribeOptions { replay: true }).await;
        tokio::spawn(run_task_loop(subscription, cache.clone(), bus.clone(), cancel.clone(), weekend));

        Self { cache, bus, writer, weekend, cancel }
    }

    pub async fn subscribe(&self) -> Subscription<Task> {
        self.bus.subscribe().await
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.bus.unsubscribe(id).await;
    }

    pub async fn summary(&self) -> usize {
        self.cache.read().await.values().map(|m| m.len()).sum()
    }

    /// The weekend-day policy this projection was constructed with (see
    /// [`WeekendPolicy`]), exposed so callers rendering a recurrence
    /// expression for display can stay consistent with how it was parsed.
    pub fn weekend_policy(&self) -> WeekendPolicy {
        self.weekend
    }

    pub async fn list(&self, fetcher: TaskFetcher, filters: &[TaskFilter], sorters: &[TaskSorter]) -> Vec<Task> {
        let cache = self.cache.read().await;
        let mut tasks: Vec<Task> = match fetcher {
            TaskFetcher::All => cache.values().flat_map(|m| m.values().cloned()).collect(),
            TaskFetcher::ForPath(path) => cache.get(&path).map(|m| m.values().cloned().collect()).unwrap_or_default(),
        };
        drop(cache);
        tasks.retain(|task| filters.iter().all(|f| f.matches(task)));
        apply_sorters(&mut tasks, sorters);
        tasks
    }

    /// Appends a new task line (§4.F create). Returns the rendered line's
    /// new document fingerprint.
    pub async fn create(
        &self,
        path: &RelPath,
        expected_fingerprint: &str,
        name: &str,
        status: ParsedStatus,
    ) -> Result<String> {
        let parsed = kiln_parser::ParsedTask {
            line: 0,
            name: name.to_string(),
            status,
            due: None,
            scheduled: None,
            completed: None,
            priority: None,
            recurrence: None,
        };
        let rendered = kiln_parser::render_task(&parsed);
        let fingerprint = self
            .writer
            .update_content(path, Some(expected_fingerprint), &[LineMutation::add_at_end(rendered)])
            .await?;
        Ok(fingerprint)
    }

    pub async fn delete(&self, task: &Task) -> Result<String> {
        let fingerprint = self
            .writer
            .update_content(&task.path, Some(&task.fingerprint), &[LineMutation::Remove { line: task.raw_line() }])
            .await?;
        Ok(fingerprint)
    }

    /// Updates a task in place, unless it carries the `uncommitted_repeat`
    /// flag (set when a `done` transition observed a recurrence rule), in
    /// which case the single update is rewritten into the two-mutation
    /// repeat-and-commit batch described in §4.F.
    pub async fn update(&self, task: &Task) -> Result<String> {
        if task.uncommitted_repeat {
            return self.commit_repeat(task).await;
        }
        let rendered = kiln_parser::render_task(&task.to_parsed());
        let fingerprint = self
            .writer
            .update_content(&task.path, Some(&task.fingerprint), &[LineMutation::Update { line: task.raw_line(), text: rendered }])
            .await?;
        Ok(fingerprint)
    }

    async fn commit_repeat(&self, task: &Task) -> Result<String> {
        let completed = task.completed.unwrap_or_else(|| chrono::Local::now().date_naive());
        let anchor = task.due.or(task.scheduled).unwrap_or(completed);
        let (rule, _) = task.recurrence.as_ref().expect("uncommitted_repeat implies a recurrence rule");

        let floor = completed + ChronoDuration::days(1);
        let next_date = rule.next_occurrence_at_or_after(anchor, floor);

        let mut next = task.to_parsed();
        next.status = ParsedStatus::Todo;
        next.completed = None;
        if task.due.is_some() {
            next.due = Some(next_date);
        }
        if task.scheduled.is_some() {
            next.scheduled = Some(next_date);
        }

        let mut committed = task.to_parsed();
        committed.status = ParsedStatus::Done;
        committed.completed = Some(completed);

        let raw_line = task.raw_line();
        let mutations = [
            LineMutation::Update { line: raw_line, text: kiln_parser::render_task(&next) },
            LineMutation::Add { line: raw_line + 1, text: kiln_parser::render_task(&committed) },
        ];
        let fingerprint = self.writer.update_content(&task.path, Some(&task.fingerprint), &mutations).await?;
        Ok(fingerprint)
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn run_task_loop(
    mut subscription: Subscription<Document>,
    cache: Arc<RwLock<HashMap<RelPath, HashMap<usize, Task>>>>,
    bus: Arc<EventBus<Task>>,
    cancel: CancellationToken,
    weekend: WeekendPolicy,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = subscription.receiver.recv() => {
                let Some(event) = event else { break };
                match event.operation {
                    Operation::Load | Operation::Change => {
                        let (Some(key), Some(doc)) = (event.key, event.payload) else { continue };
                        rebuild_path(&key, &doc, &cache, &bus, event.operation, weekend).await;
                    }
                    Operation::Delete => {
                        if let Some(key) = event.key {
                            if let Some(removed) = cache.write().await.remove(&key) {
                                for task in removed.into_values() {
                                    let _ = bus.publish(Event::delete(task.path.clone())).await;
                                }
                            }
                        }
                    }
                    Operation::SubscriberLoadComplete => {
                        let _ = bus.publish(Event::subscriber_load_complete()).await;
                    }
                }
            }
        }
    }
}

async fn rebuild_path(
    key: &RelPath,
    doc: &Document,
    cache: &Arc<RwLock<HashMap<RelPath, HashMap<usize, Task>>>>,
    bus: &Arc<EventBus<Task>>,
    operation: Operation,
    weekend: WeekendPolicy,
) {
    let previous = cache.read().await.get(key).cloned().unwrap_or_default();

    let parsed_tasks = match kiln_parser::scan_tasks(doc.content(), weekend) {
        Ok(tasks) => tasks,
        Err(err) => {
            tracing::warn!(path = %key, error = %err, "failed to scan tasks, leaving previous snapshot in place");
            return;
        }
    };

    let mut rebuilt = HashMap::new();
    for parsed in &parsed_tasks {
        let mut task = Task::from_parsed(key.clone(), doc.fingerprint().to_string(), doc.content_start(), parsed);
        if let Some(prior) = previous.get(&parsed.line) {
            if prior.status != ParsedStatus::Done && task.status == ParsedStatus::Done && task.recurrence.is_some() {
                task.uncommitted_repeat = true;
            }
        }
        rebuilt.insert(parsed.line, task);
    }

    cache.write().await.insert(key.clone(), rebuilt.clone());

    for task in rebuilt.into_values() {
        let out = if operation == Operation::Load { Event::load(key.clone(), task) } else { Event::change(key.clone(), task) };
        let _ = bus.publish(out).await;
    }
}
