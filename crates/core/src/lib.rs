// crates/core/src/lib.rs
//! Asynchronous clip-job engine.
//!
//! Request path: [`admission::AdmissionController`] gates callers,
//! [`launcher::JobLauncher`] validates and persists a job and hands it to the
//! [`supervisor::JobSupervisor`], which runs one [`executor::TaskExecutor`]
//! per job under a concurrency ceiling. [`notifier::StatusNotifier`] serves
//! the read path. [`sweeper::CleanupSweeper`] keeps the admission registry
//! from growing without bound.

pub mod admission;
pub mod config;
pub mod executor;
pub mod launcher;
pub mod metrics;
pub mod notifier;
pub mod store;
pub mod supervisor;
pub mod sweeper;
pub mod validate;
pub mod worker;
pub mod ytdlp;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use admission::AdmissionController;
pub use config::{Config, LauncherConfig, NotifierConfig, RateLimitConfig, WorkerConfig};
pub use executor::{JobOutcome, TaskExecutor};
pub use launcher::{JobLauncher, JobSubmission, SubmitError};
pub use notifier::{NotifierError, StatusEvent, StatusNotifier};
pub use store::{InMemoryStatusStore, StatusStore, StoreError};
pub use supervisor::{JobSupervisor, SpawnError};
pub use sweeper::CleanupSweeper;
pub use validate::ValidationError;
pub use worker::{Worker, WorkerError, WorkerOutput, WorkerRequest};
pub use ytdlp::YtDlpWorker;
