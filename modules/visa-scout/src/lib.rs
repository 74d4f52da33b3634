pub mod artifacts;
pub mod pipeline;
pub mod pool;
pub mod postings;
pub mod resolver;
pub mod resumes;
pub mod scoring;
pub mod scraper;
pub mod search;
pub mod seen_store;
pub mod sponsors;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use pipeline::{Pipeline, RunLimits, RunOutcome, RunStats};
