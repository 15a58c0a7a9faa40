pub mod analyst;
pub mod cache;
pub mod model;
pub mod pipeline;
pub mod planner;
pub mod report;
pub mod scoring;
pub mod sections;
pub mod storage;
pub mod summary;
pub mod video;

pub use analyst::OpenAiAnalyst;
pub use cache::FileStore;
pub use pipeline::{Pipeline, RunMode};
pub use planner::ContentPlanner;
pub use scoring::MetricSpec;
pub use summary::write_performance_summary;
pub use video::channel_id;
