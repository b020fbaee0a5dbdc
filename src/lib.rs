pub mod action;
pub mod error;
pub mod scheduler;
pub mod slot;
pub mod worker_pool;

pub use action::{Action, ActionKind, Pass};
pub use error::SchedulerError;
pub use scheduler::Scheduler;
pub use slot::Slot;
pub use worker_pool::WorkerPool;
