//! Query pipeline stages.
//!
//! - **decode**: sniff and decode uploaded bytes under upload limits
//! - **search**: run a decoded image through embed, reduce and index lookup

pub mod decode;
pub mod search;

pub use decode::ImageDecoder;
pub use search::{search_with_timeout, PredictionPipeline};
