pub mod api;
pub mod config;
pub mod demo;
pub mod logging;
pub mod metrics;
pub mod node;

pub use config::NodeConfig;
pub use metrics::Metrics;
pub use node::{NodeStats, PodiumNode, TablePage};
