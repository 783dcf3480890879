use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::cancellation::RunContext;
use crate::geo::geo_math::DiskSampler;
use crate::store::point_store::PointStore;
use crate::utils::logging::{self, OperationCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub ticks: usize,
    pub refreshed: usize,
    pub failed: usize,
    pub last_generation: Option<u64>,
}

/// Periodically gives every stored point new coordinates.
///
/// Each tick calls `PointStore::replace_all` and then sleeps for the
/// interval, so ticks never overlap. A failed tick is logged and the next
/// one runs on schedule.
pub struct Refresher {
    store: Arc<PointStore>,
    sampler: DiskSampler,
    interval: Duration,
    state: Arc<Mutex<RefresherState>>,
}

impl Refresher {
    pub fn new(store: Arc<PointStore>, sampler: DiskSampler, interval: Duration) -> Self {
        Self {
            store,
            sampler,
            interval,
            state: Arc::new(Mutex::new(RefresherState::Idle)),
        }
    }

    pub fn state(&self) -> RefresherState {
        *self.state.lock()
    }

    /// Handle for observing the state after the refresher moved to a thread.
    pub fn state_handle(&self) -> Arc<Mutex<RefresherState>> {
        Arc::clone(&self.state)
    }

    /// Runs one refresh pass.
    pub fn tick(&mut self, summary: &mut RefreshSummary) {
        let _timing = logging::start_timing("Refresher::tick", OperationCategory::Refresh);
        summary.ticks += 1;

        let sampler = &mut self.sampler;
        match self.store.replace_all(|| sampler.sample()) {
            Ok(generation) => {
                summary.refreshed += 1;
                summary.last_generation = Some(generation);
                debug!(generation, points = self.store.len(), "refresh tick");
            }
            Err(e) => {
                summary.failed += 1;
                warn!(error = %e, "refresh tick failed, keeping previous points");
            }
        }
    }

    /// Ticks until the context says stop. Blocks the calling thread.
    pub fn run(&mut self, ctx: &RunContext) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        *self.state.lock() = RefresherState::Running;
        info!(interval_ms = self.interval.as_millis() as u64, "refresher started");

        while !ctx.should_stop() {
            self.tick(&mut summary);
            if !ctx.sleep(self.interval) {
                break;
            }
        }

        *self.state.lock() = RefresherState::Stopped;
        info!(
            ticks = summary.ticks,
            failed = summary.failed,
            "refresher stopped"
        );
        summary
    }

    pub fn spawn(mut self, ctx: RunContext) -> std::io::Result<JoinHandle<RefreshSummary>> {
        thread::Builder::new()
            .name("point-refresher".to_string())
            .spawn(move || self.run(&ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cancellation::CancelToken;
    use crate::data::poi::GeoCoordinate;
    use std::time::Instant;

    fn populated_store(count: usize) -> Arc<PointStore> {
        let store = Arc::new(PointStore::new());
        let mut gen = DiskSampler::new(GeoCoordinate::new(0.0, 0.0), 1_000_000.0, Some(1));
        store.init(count, || gen.sample()).unwrap();
        store
    }

    #[test]
    fn test_tick_moves_points_and_keeps_ids() {
        let store = populated_store(50);
        let before = store.snapshot();
        let sampler = DiskSampler::new(GeoCoordinate::new(0.0, 0.0), 1_000_000.0, Some(2));
        let mut refresher = Refresher::new(Arc::clone(&store), sampler, Duration::from_secs(1));

        let mut summary = RefreshSummary::default();
        refresher.tick(&mut summary);

        let after = store.snapshot();
        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.last_generation, Some(after.generation()));
        assert_eq!(before.ids().collect::<Vec<_>>(), after.ids().collect::<Vec<_>>());
        assert_ne!(before, after);
        assert_eq!(refresher.state(), RefresherState::Idle);
    }

    #[test]
    fn test_failed_tick_is_counted_and_store_kept() {
        let store = populated_store(10);
        let before = store.snapshot();
        let bad = DiskSampler::new(GeoCoordinate::new(0.0, 0.0), -1.0, Some(3));
        let mut refresher = Refresher::new(Arc::clone(&store), bad, Duration::from_secs(1));

        let mut summary = RefreshSummary::default();
        refresher.tick(&mut summary);
        refresher.tick(&mut summary);

        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_run_stops_at_deadline() {
        let store = populated_store(20);
        let sampler = DiskSampler::new(GeoCoordinate::new(0.0, 0.0), 1_000_000.0, Some(4));
        let mut refresher = Refresher::new(Arc::clone(&store), sampler, Duration::from_millis(10));
        let ctx = RunContext::default().with_timeout(Duration::from_millis(100));

        let summary = refresher.run(&ctx);

        assert!(summary.ticks >= 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(refresher.state(), RefresherState::Stopped);
        assert_eq!(store.len(), 20);
    }

    #[test]
    fn test_spawned_refresher_stops_on_cancel() {
        let store = populated_store(20);
        let sampler = DiskSampler::new(GeoCoordinate::new(0.0, 0.0), 1_000_000.0, Some(5));
        let refresher = Refresher::new(Arc::clone(&store), sampler, Duration::from_secs(60));
        let state = refresher.state_handle();
        let token = CancelToken::new();
        let initial = store.generation();

        let handle = refresher.spawn(RunContext::new(token.clone())).unwrap();
        let started = Instant::now();
        while store.generation() == initial && started.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*state.lock(), RefresherState::Running);
        token.cancel();

        let summary = handle.join().unwrap();
        assert_eq!(*state.lock(), RefresherState::Stopped);
        assert!(summary.ticks >= 1);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_cancelled_before_start_does_no_work() {
        let store = populated_store(5);
        let generation = store.generation();
        let sampler = DiskSampler::new(GeoCoordinate::new(0.0, 0.0), 1_000_000.0, Some(6));
        let mut refresher = Refresher::new(Arc::clone(&store), sampler, Duration::from_millis(1));
        let ctx = RunContext::default();
        ctx.token().cancel();

        let summary = refresher.run(&ctx);
        assert_eq!(summary.ticks, 0);
        assert_eq!(store.generation(), generation);
        assert_eq!(refresher.state(), RefresherState::Stopped);
    }

    #[test]
    fn test_run_keeps_ticking_when_every_refresh_fails() {
        let store = populated_store(10);
        let before = store.snapshot();
        let bad = DiskSampler::new(GeoCoordinate::new(0.0, 0.0), -1.0, Some(7));
        let mut refresher = Refresher::new(Arc::clone(&store), bad, Duration::from_millis(5));
        let ctx = RunContext::default().with_timeout(Duration::from_millis(150));

        let summary = refresher.run(&ctx);

        assert!(summary.ticks > 1);
        assert_eq!(summary.failed, summary.ticks);
        assert_eq!(summary.refreshed, 0);
        assert_eq!(summary.last_generation, None);
        assert_eq!(store.snapshot(), before);
        assert_eq!(refresher.state(), RefresherState::Stopped);
    }
}
