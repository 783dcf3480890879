// Earth model
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const METERS_PER_DEGREE: f64 = 111_300.0;     // Flat approximation used for disk sampling

// Default generation area
pub const DEFAULT_CENTER_LAT: f64 = 0.0;
pub const DEFAULT_CENTER_LON: f64 = 0.0;
pub const DEFAULT_RADIUS_M: f64 = EARTH_RADIUS_M;

// Point set
pub const DEFAULT_POINT_COUNT: usize = 1000;
pub const POINT_ID_PREFIX: &str = "P";
pub const POINT_ID_WIDTH: usize = 4;

// Scheduling
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_QUERY_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_RUN_DURATION_MS: u64 = 30_000;

// Query
pub const DEFAULT_K: usize = 5;
pub const PARALLEL_SCAN_MIN_POINTS: usize = 4_096;  // Below this rayon falls back to a plain sort

// Seed offsets so each task draws from its own stream
pub const POINT_SEED_OFFSET: u64 = 0;
pub const REFRESH_SEED_OFFSET: u64 = 1;
pub const QUERY_SEED_OFFSET: u64 = 2;
