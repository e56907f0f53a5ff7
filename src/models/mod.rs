pub mod dead_letter;
pub mod job;

pub use dead_letter::DeadLetterJob;
pub use job::{CreateJobRequest, Job, JobStatus};
