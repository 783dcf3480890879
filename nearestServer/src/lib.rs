// Main module declarations for the nearest-point server

// Core runtime: workers, cancellation and orchestration
pub mod core {
    pub mod cancellation;
    pub mod refresher;
    pub mod query_loop;
    pub mod server;
}

// Configuration modules
pub mod config {
    pub mod constants;
    pub mod server_config;
}

// Model definitions
pub mod data {
    pub mod poi;
}

// Geographic math
pub mod geo {
    pub mod geo_math;
}

// Concurrent point storage
pub mod store {
    pub mod point_store;
}

// Nearest-k search
pub mod query {
    pub mod nearest;
}

// Result delivery
pub mod output {
    pub mod sink;
}

// Utility functions
pub mod utils {
    pub mod logging;
}

// CLI interface
pub mod cli {
    pub mod cli;
}

pub mod error;

// Re-export commonly used types
pub use crate::config::server_config::ServerConfig;
pub use crate::data::poi::{GeoCoordinate, Point};
pub use crate::query::nearest::{NearestQuery, RankedPoint};
pub use crate::store::point_store::{PointSet, PointStore};
