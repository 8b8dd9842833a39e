pub mod config;
pub mod metrics;
pub mod pipeline;

pub use config::*;
pub use metrics::*;
pub use pipeline::*;
