// crates/types/src/lib.rs
//! Shared job and wire types for the clipper service.
//!
//! Everything here is plain data: the job lifecycle enums, the record the
//! status store owns, the snapshot clients read, and the stable numeric
//! error codes the HTTP layer returns.

pub mod error_code;
pub mod job;

pub use error_code::ErrorCode;
pub use job::{
    ClipRange, JobId, JobKind, JobParams, JobRecord, JobStatus, JobUpdate, StatusSnapshot,
    UnknownVariant,
};
