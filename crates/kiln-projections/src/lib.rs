//! Domain projections over the kiln note engine's Reader Client (§4.F–4.I):
//! Task, Project, Source and Daily. Each subscribes to the Reader Client's
//! document stream, rebuilds its own `path → entity` map on every
//! load/change/delete, and republishes a typed event stream of its own.

pub mod daily;
pub mod error;
pub mod project;
pub mod source;
pub mod task;

mod projection;

pub use daily::{Daily, DailyProjection, ENSURE_POLL_INTERVAL};
pub use error::{ProjectionError, Result};
pub use project::{Project, ProjectProjection, ProjectStatus};
pub use source::{Source, SourceFormat, SourceProjection};
pub use task::{
    Task, TaskFetcher, TaskFilter, TaskProjection, TaskSorter, AGENDA_ORDER, KANBAN_ORDER,
};
