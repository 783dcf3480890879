//! k-nearest search over a store snapshot.
//!
//! The search is an exhaustive scan: at hundreds to low thousands of points a
//! full distance pass is cheaper than keeping a spatial index in step with a
//! store that is rewritten every few seconds. The scan sits behind
//! [`NearestStrategy`] so a grid or k-d tree can replace it for much larger
//! point counts without touching callers.

use clap::ValueEnum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::config::constants::PARALLEL_SCAN_MIN_POINTS;
use crate::data::poi::{GeoCoordinate, Point};
use crate::error::QueryError;
use crate::store::point_store::PointSet;
use crate::utils::logging::{self, OperationCategory, QueryOpType};

/// A point together with its distance from one particular query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPoint {
    pub point: Point,
    pub distance_m: f64,
}

impl RankedPoint {
    fn measure(point: &Point, query: &GeoCoordinate) -> Self {
        Self {
            distance_m: query.distance_to(&point.coordinate()),
            point: point.clone(),
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }
}

/// Ascending distance, ties broken by identifier.
fn by_distance_then_id(a: &RankedPoint, b: &RankedPoint) -> Ordering {
    a.distance_m
        .total_cmp(&b.distance_m)
        .then_with(|| a.point.id().cmp(b.point.id()))
}

pub trait NearestStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// The `min(k, |snapshot|)` closest points, nearest first.
    fn rank(&self, snapshot: &PointSet, query: GeoCoordinate, k: usize) -> Vec<RankedPoint>;
}

/// Measures every point, sorts, keeps the first `k`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveScan;

impl NearestStrategy for ExhaustiveScan {
    fn name(&self) -> &'static str {
        "exhaustive"
    }

    fn rank(&self, snapshot: &PointSet, query: GeoCoordinate, k: usize) -> Vec<RankedPoint> {
        if k == 0 {
            return Vec::new();
        }

        let mut ranked: Vec<RankedPoint> = {
            let _timing = logging::start_timing("ExhaustiveScan::measure",
                OperationCategory::Query { subcategory: QueryOpType::Scan });
            snapshot.iter().map(|p| RankedPoint::measure(p, &query)).collect()
        };

        let _timing = logging::start_timing("ExhaustiveScan::sort",
            OperationCategory::Query { subcategory: QueryOpType::Rank });
        ranked.sort_by(by_distance_then_id);
        ranked.truncate(k);
        ranked
    }
}

/// Same result as [`ExhaustiveScan`], with distances and the sort spread over
/// the rayon pool. Small snapshots are handed to the sequential scan.
#[derive(Debug, Clone, Copy)]
pub struct ParallelScan {
    min_points: usize,
}

impl ParallelScan {
    pub fn new(min_points: usize) -> Self {
        Self { min_points }
    }
}

impl Default for ParallelScan {
    fn default() -> Self {
        Self::new(PARALLEL_SCAN_MIN_POINTS)
    }
}

impl NearestStrategy for ParallelScan {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn rank(&self, snapshot: &PointSet, query: GeoCoordinate, k: usize) -> Vec<RankedPoint> {
        if snapshot.len() < self.min_points {
            return ExhaustiveScan.rank(snapshot, query, k);
        }
        if k == 0 {
            return Vec::new();
        }

        let points: Vec<&Point> = snapshot.iter().collect();
        let mut ranked: Vec<RankedPoint> = {
            let _timing = logging::start_timing("ParallelScan::measure",
                OperationCategory::Query { subcategory: QueryOpType::Scan });
            points
                .par_iter()
                .map(|p| RankedPoint::measure(p, &query))
                .collect()
        };

        let _timing = logging::start_timing("ParallelScan::sort",
            OperationCategory::Query { subcategory: QueryOpType::Rank });
        // Identifiers are unique, so the order is total and stability is moot
        ranked.par_sort_unstable_by(by_distance_then_id);
        ranked.truncate(k);
        ranked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Exhaustive,
    Parallel,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn NearestStrategy> {
        match self {
            StrategyKind::Exhaustive => Box::new(ExhaustiveScan),
            StrategyKind::Parallel => Box::new(ParallelScan::default()),
        }
    }
}

/// Nearest-k entry point: a strategy plus the empty-set policy.
#[derive(Debug)]
pub struct NearestQuery {
    strategy: Box<dyn NearestStrategy>,
    empty_set_is_error: bool,
}

impl Default for NearestQuery {
    fn default() -> Self {
        Self::new(Box::new(ExhaustiveScan))
    }
}

impl NearestQuery {
    pub fn new(strategy: Box<dyn NearestStrategy>) -> Self {
        Self {
            strategy,
            empty_set_is_error: false,
        }
    }

    /// When set, asking for `k >= 1` points from an empty snapshot fails with
    /// [`QueryError::EmptySet`] instead of returning an empty list.
    pub fn with_empty_set_error(mut self, enabled: bool) -> Self {
        self.empty_set_is_error = enabled;
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn find_nearest(
        &self,
        snapshot: &PointSet,
        lat: f64,
        lon: f64,
        k: usize,
    ) -> Result<Vec<RankedPoint>, QueryError> {
        self.find_nearest_to(snapshot, GeoCoordinate::new(lat, lon), k)
    }

    pub fn find_nearest_to(
        &self,
        snapshot: &PointSet,
        query: GeoCoordinate,
        k: usize,
    ) -> Result<Vec<RankedPoint>, QueryError> {
        if snapshot.is_empty() && k >= 1 && self.empty_set_is_error {
            return Err(QueryError::EmptySet);
        }
        Ok(self.strategy.rank(snapshot, query, k))
    }
}
