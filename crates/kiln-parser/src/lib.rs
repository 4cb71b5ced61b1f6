//! Front-matter and task-list parsing for the kiln note engine.

pub mod error;
pub mod frontmatter;
pub mod recurrence;
pub mod task;

pub use error::{ParseError, Result};
pub use frontmatter::{parse_document, render_frontmatter, ParsedDocument};
pub use recurrence::{RecurrenceRule, WeekendPolicy};
pub use task::{parse_task_line, render_task, scan_tasks, ParsedTask, TaskStatus};
