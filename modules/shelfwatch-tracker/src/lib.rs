pub mod analyzer;
pub mod assembler;
pub mod clock;
pub mod collector;
pub mod pricing;
pub mod quality;
pub mod run;
pub mod stats;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use run::{RunOutput, Tracker};
pub use stats::TrackerStats;
