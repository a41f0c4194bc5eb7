pub mod acquire;
pub mod load;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod storage;
pub mod transform;
pub mod utils;

pub use pipeline::{EtlPipeline, RunOptions, run_etl_pipeline};
