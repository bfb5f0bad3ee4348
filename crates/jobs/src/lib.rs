//! Asynchronous certificate generation jobs.
//!
//! [`JobRegistry`] is the single shared table of in-flight and finished
//! jobs. [`runner`] drives one job in the background, and [`janitor`]
//! expires jobs that were never downloaded.

pub mod janitor;
pub mod registry;
pub mod runner;

pub use registry::{JobOutcome, JobRegistry, JobResources, JobSnapshot, JobStatus, JobTtl};
