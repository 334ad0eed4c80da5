pub mod job;
pub mod pool;
pub mod queue;

pub use job::{JobStatus, ScanJob, ScanOutcome};
pub use pool::WorkerPool;
pub use queue::ScanQueue;
