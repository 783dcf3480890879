use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::config::constants::*;
use crate::data::poi::GeoCoordinate;
use crate::error::ConfigError;
use crate::query::nearest::StrategyKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_m: f64,                   // Generation and query radius around the center
    pub point_count: usize,
    pub refresh_interval_ms: u64,
    pub query_interval_ms: u64,
    pub run_duration_ms: Option<u64>,    // None runs until cancelled
    pub k: usize,
    pub seed: Option<u64>,
    pub empty_set_is_error: bool,
    pub strategy: StrategyKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            center_lat: DEFAULT_CENTER_LAT,
            center_lon: DEFAULT_CENTER_LON,
            radius_m: DEFAULT_RADIUS_M,
            point_count: DEFAULT_POINT_COUNT,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            query_interval_ms: DEFAULT_QUERY_INTERVAL_MS,
            run_duration_ms: Some(DEFAULT_RUN_DURATION_MS),
            k: DEFAULT_K,
            seed: None,
            empty_set_is_error: false,
            strategy: StrategyKind::Exhaustive,
        }
    }
}

impl ServerConfig {
    /// Loads a JSON config. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(ConfigError::InvalidRadius(self.radius_m));
        }
        if !self.center().is_valid() {
            return Err(ConfigError::InvalidCenter {
                lat: self.center_lat,
                lon: self.center_lon,
            });
        }
        if self.point_count == 0 {
            return Err(ConfigError::InvalidPointCount);
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("refresh"));
        }
        if self.query_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("query"));
        }
        if self.run_duration_ms == Some(0) {
            return Err(ConfigError::InvalidInterval("run duration"));
        }
        if self.k == 0 {
            return Err(ConfigError::InvalidK);
        }
        Ok(())
    }

    pub fn center(&self) -> GeoCoordinate {
        GeoCoordinate::new(self.center_lat, self.center_lon)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn query_interval(&self) -> Duration {
        Duration::from_millis(self.query_interval_ms)
    }

    pub fn run_duration(&self) -> Option<Duration> {
        self.run_duration_ms.map(Duration::from_millis)
    }

    /// Seed for one task's generator, offset so tasks never share a stream.
    pub fn task_seed(&self, offset: u64) -> Option<u64> {
        self.seed.map(|s| s.wrapping_add(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_values() {
        let c = ServerConfig::default();
        assert_eq!((c.center_lat, c.center_lon), (0.0, 0.0));
        assert_eq!(c.radius_m, 6_371_000.0);
        assert_eq!(c.point_count, 1000);
        assert_eq!(c.refresh_interval(), Duration::from_secs(3));
        assert_eq!(c.query_interval(), Duration::from_secs(5));
        assert_eq!(c.run_duration(), Some(Duration::from_secs(30)));
        assert_eq!(c.k, 5);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = |f: fn(&mut ServerConfig)| {
            let mut c = ServerConfig::default();
            f(&mut c);
            c.validate().unwrap_err()
        };

        assert!(matches!(bad(|c| c.radius_m = 0.0), ConfigError::InvalidRadius(_)));
        assert!(matches!(bad(|c| c.radius_m = f64::NAN), ConfigError::InvalidRadius(_)));
        assert!(matches!(bad(|c| c.center_lat = 95.0), ConfigError::InvalidCenter { .. }));
        assert!(matches!(bad(|c| c.point_count = 0), ConfigError::InvalidPointCount));
        assert!(matches!(bad(|c| c.refresh_interval_ms = 0), ConfigError::InvalidInterval("refresh")));
        assert!(matches!(bad(|c| c.query_interval_ms = 0), ConfigError::InvalidInterval("query")));
        assert!(matches!(bad(|c| c.run_duration_ms = Some(0)), ConfigError::InvalidInterval(_)));
        assert!(matches!(bad(|c| c.k = 0), ConfigError::InvalidK));
    }

    #[test]
    fn test_unbounded_run_is_valid() {
        let c = ServerConfig { run_duration_ms: None, ..ServerConfig::default() };
        assert!(c.validate().is_ok());
        assert_eq!(c.run_duration(), None);
    }

    #[test]
    fn test_task_seeds_differ() {
        let c = ServerConfig { seed: Some(10), ..ServerConfig::default() };
        assert_eq!(c.task_seed(POINT_SEED_OFFSET), Some(10));
        assert_eq!(c.task_seed(QUERY_SEED_OFFSET), Some(12));
        assert_eq!(ServerConfig::default().task_seed(1), None);
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"point_count": 250, "strategy": "parallel", "center_lat": 53.3}}"#).unwrap();

        let c = ServerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(c.point_count, 250);
        assert_eq!(c.strategy, StrategyKind::Parallel);
        assert_eq!(c.center_lat, 53.3);
        assert_eq!(c.k, DEFAULT_K);
    }

    #[test]
    fn test_load_errors() {
        let missing = ServerConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            ServerConfig::from_json_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
