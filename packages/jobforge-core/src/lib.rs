//! Data model, store contract, and error taxonomy for the job finder worker.
//!
//! This crate owns the six logical record kinds (`Task`, `Company`, `JobSource`,
//! `JobListing`, `JobMatch`, and the `config` blobs), the [`store::TaskStore`]
//! trait that gives processors atomic read/update and conditional-spawn access
//! to them, and the error taxonomy processors and the dispatcher reason about.
//!
//! Nothing in here talks to a network or a database directly; `jobforge-worker`
//! provides the Postgres-backed implementation of [`store::TaskStore`].

pub mod company;
pub mod config;
pub mod error;
pub mod job_match;
pub mod listing;
pub mod normalize;
pub mod source;
pub mod spawn;
pub mod store;
pub mod task;

pub use company::{AnalysisStatus, Company, CompanySizeCategory};
pub use error::{Categorizable, ErrorCategory, WorkerError};
pub use job_match::{JobMatch, Priority};
pub use listing::{ExtractionResult, JobListing, ListingStatus, ScoringResult};
pub use source::{DiscoveryConfidence, JobSource, SourceConfig, SourceStatus, SourceType};
pub use store::TaskStore;
pub use task::{
    AncestryChain, Attempt, PipelineState, Task, TaskKind, TaskPayload, TaskStatus,
};
