//! Concurrent point storage built on copy-on-write generations.
//!
//! The live point set is an `Arc<Generation>` behind a `RwLock`. Readers only
//! hold the read lock long enough to clone the `Arc`, so a snapshot never
//! waits for a refresh to finish generating coordinates. Writers build the
//! next generation off-lock (serialized among themselves by `writer`) and
//! publish it with one pointer swap, which means every snapshot holds the
//! points of exactly one generation.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::constants::{POINT_ID_PREFIX, POINT_ID_WIDTH};
use crate::data::poi::{GeoCoordinate, Point};
use crate::error::{GeneratorError, StoreError};
use crate::utils::logging::{self, OperationCategory, StoreOpType};

/// One immutable version of the point set.
#[derive(Debug, Default)]
pub struct Generation {
    number: u64,
    points: BTreeMap<Arc<str>, Point>,
}

/// An immutable point-in-time view of the store.
///
/// Cloning is cheap; later mutations of the store never change it.
#[derive(Debug, Clone)]
pub struct PointSet {
    generation: Arc<Generation>,
}

impl PointSet {
    pub fn empty() -> Self {
        Self {
            generation: Arc::new(Generation::default()),
        }
    }

    /// Builds a standalone snapshot, mostly useful for tests and ad-hoc queries.
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Self {
        let points = points
            .into_iter()
            .map(|p| (Arc::from(p.id()), p))
            .collect();
        Self {
            generation: Arc::new(Generation { number: 0, points }),
        }
    }

    /// Generation number this snapshot was taken from.
    pub fn generation(&self) -> u64 {
        self.generation.number
    }

    pub fn len(&self) -> usize {
        self.generation.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generation.points.is_empty()
    }

    /// Points in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Point> + '_ {
        self.generation.points.values()
    }

    pub fn get(&self, id: &str) -> Option<&Point> {
        self.generation.points.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.generation.points.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.generation.points.keys().map(|k| k.as_ref())
    }
}

impl PartialEq for PointSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.generation, &other.generation)
            || self.generation.points == other.generation.points
    }
}

/// Formats the `index`-th identifier: `P0001`, `P0002`, ...
pub fn point_id(index: usize) -> String {
    format!("{}{:0width$}", POINT_ID_PREFIX, index, width = POINT_ID_WIDTH)
}

#[derive(Debug, Default)]
pub struct PointStore {
    current: RwLock<Arc<Generation>>,
    writer: Mutex<()>,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole store with `count` fresh points named `P0001..`.
    ///
    /// Calling this on a populated store replaces everything that was there.
    /// If the generator fails the store is left as it was.
    pub fn init<F>(&self, count: usize, mut generator: F) -> Result<u64, StoreError>
    where
        F: FnMut() -> Result<GeoCoordinate, GeneratorError>,
    {
        let _timing = logging::start_timing("PointStore::init",
            OperationCategory::Store { subcategory: StoreOpType::Init });
        let _writer = self.writer.lock();

        let mut points = BTreeMap::new();
        for index in 1..=count {
            let id: Arc<str> = Arc::from(point_id(index));
            let point = Point::new(Arc::clone(&id), generator()?);
            points.insert(id, point);
        }

        let number = self.publish(points);
        debug!(count, generation = number, "point store initialized");
        Ok(number)
    }

    /// Returns the current generation. Never blocks on a writer that is
    /// still generating coordinates.
    pub fn snapshot(&self) -> PointSet {
        let _timing = logging::start_timing("PointStore::snapshot",
            OperationCategory::Store { subcategory: StoreOpType::Snapshot });
        PointSet {
            generation: Arc::clone(&*self.current.read()),
        }
    }

    /// Gives every existing point new coordinates from `generator`, keeping
    /// identifiers and count. All-or-nothing: on a generator error nothing is
    /// published and the error is returned.
    pub fn replace_all<F>(&self, mut generator: F) -> Result<u64, StoreError>
    where
        F: FnMut() -> Result<GeoCoordinate, GeneratorError>,
    {
        let _timing = logging::start_timing("PointStore::replace_all",
            OperationCategory::Store { subcategory: StoreOpType::ReplaceAll });
        let _writer = self.writer.lock();
        let base = self.current_generation();

        let mut points = BTreeMap::new();
        for (id, point) in base.points.iter() {
            points.insert(Arc::clone(id), point.moved_to(generator()?));
        }

        let number = self.publish(points);
        debug!(count = base.points.len(), generation = number, "points refreshed");
        Ok(number)
    }

    /// Inserts or moves a single point. Returns the previous record, if any.
    pub fn upsert(&self, id: &str, coordinate: GeoCoordinate) -> Result<Option<Point>, StoreError> {
        if id.is_empty() {
            return Err(StoreError::EmptyId);
        }
        if !coordinate.is_valid() {
            return Err(StoreError::InvalidCoordinate {
                lat: coordinate.lat,
                lon: coordinate.lon,
            });
        }

        let _timing = logging::start_timing("PointStore::upsert",
            OperationCategory::Store { subcategory: StoreOpType::Mutation });
        let _writer = self.writer.lock();
        let mut points = self.current_generation().points.clone();

        let point = match points.get(id) {
            Some(existing) => existing.moved_to(coordinate),
            None => Point::new(id, coordinate),
        };
        let previous = points.insert(Arc::from(id), point);

        self.publish(points);
        Ok(previous)
    }

    /// Removes a single point, returning it if it was present.
    pub fn delete(&self, id: &str) -> Option<Point> {
        let _timing = logging::start_timing("PointStore::delete",
            OperationCategory::Store { subcategory: StoreOpType::Mutation });
        let _writer = self.writer.lock();
        let current = self.current_generation();
        if !current.points.contains_key(id) {
            return None;
        }

        let mut points = current.points.clone();
        let removed = points.remove(id);
        self.publish(points);
        removed
    }

    /// Removes every point. Returns how many were dropped.
    pub fn flush(&self) -> usize {
        let _timing = logging::start_timing("PointStore::flush",
            OperationCategory::Store { subcategory: StoreOpType::Flush });
        let _writer = self.writer.lock();
        let dropped = self.current_generation().points.len();
        let number = self.publish(BTreeMap::new());
        debug!(dropped, generation = number, "point store flushed");
        dropped
    }

    pub fn len(&self) -> usize {
        self.current.read().points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of the generation currently visible to readers.
    pub fn generation(&self) -> u64 {
        self.current.read().number
    }

    fn current_generation(&self) -> Arc<Generation> {
        Arc::clone(&*self.current.read())
    }

    // Callers must hold `writer`.
    fn publish(&self, points: BTreeMap<Arc<str>, Point>) -> u64 {
        let mut current = self.current.write();
        let number = current.number + 1;
        *current = Arc::new(Generation { number, points });
        number
    }
}
