mod capture;
mod stats;
#[cfg(test)]
mod tests;

pub use capture::CapturePipeline;
pub use stats::{PipelineStats, PipelineStatsSnapshot};
