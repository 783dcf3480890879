use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::server_config::ServerConfig;
use crate::error::ConfigError;
use crate::query::nearest::StrategyKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    Console,
    Log,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Nearest-point lookups over a continuously moving point set", long_about = None)]
pub struct Args {
    #[arg(short, long, help = "JSON config file; flags below override its values")]
    config: Option<PathBuf>,

    #[arg(long, allow_negative_numbers = true)]
    center_lat: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    center_lon: Option<f64>,

    #[arg(short, long, help = "Generation and query radius in meters")]
    radius: Option<f64>,

    #[arg(short = 'n', long)]
    points: Option<usize>,

    #[arg(long, help = "Milliseconds between point refreshes")]
    refresh_ms: Option<u64>,

    #[arg(long, help = "Milliseconds between queries")]
    query_ms: Option<u64>,

    #[arg(short, long, help = "Run time in milliseconds before shutdown")]
    duration_ms: Option<u64>,

    #[arg(long, default_value_t = false, help = "Run until interrupted instead of stopping at a deadline")]
    forever: bool,

    #[arg(short, long)]
    k: Option<usize>,

    #[arg(long, help = "Random seed for reproducible points and queries")]
    seed: Option<u64>,

    #[arg(long, value_enum, help = "Query strategy")]
    strategy: Option<StrategyKind>,

    #[arg(long, default_value_t = false, help = "Treat queries against an empty point set as errors")]
    strict_empty: bool,

    #[arg(long, value_enum, default_value_t = SinkKind::Console)]
    sink: SinkKind,

    #[arg(long, help = "Also append every result row to this CSV file")]
    csv: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    enable_timing: bool,

    #[arg(long, default_value_t = false)]
    debug_logging: bool,
}

// Add getter methods for all fields
impl Args {
    pub fn config(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub fn sink(&self) -> SinkKind {
        self.sink
    }

    pub fn csv(&self) -> Option<&PathBuf> {
        self.csv.as_ref()
    }

    pub fn enable_timing(&self) -> bool {
        self.enable_timing
    }

    pub fn debug_logging(&self) -> bool {
        self.debug_logging
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Config file (or defaults) with command-line overrides applied, validated.
    pub fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_json_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(lat) = self.center_lat {
            config.center_lat = lat;
        }
        if let Some(lon) = self.center_lon {
            config.center_lon = lon;
        }
        if let Some(radius) = self.radius {
            config.radius_m = radius;
        }
        if let Some(points) = self.points {
            config.point_count = points;
        }
        if let Some(ms) = self.refresh_ms {
            config.refresh_interval_ms = ms;
        }
        if let Some(ms) = self.query_ms {
            config.query_interval_ms = ms;
        }
        if let Some(ms) = self.duration_ms {
            config.run_duration_ms = Some(ms);
        }
        if self.forever {
            config.run_duration_ms = None;
        }
        if let Some(k) = self.k {
            config.k = k;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if self.strict_empty {
            config.empty_set_is_error = true;
        }

        config.validate()?;
        Ok(config)
    }
}
