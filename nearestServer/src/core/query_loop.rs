use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::cancellation::RunContext;
use crate::geo::geo_math::DiskSampler;
use crate::output::sink::{QueryReport, ResultSink};
use crate::query::nearest::NearestQuery;
use crate::store::point_store::PointStore;
use crate::utils::logging::{self, OperationCategory};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryLoopSummary {
    pub ticks: usize,
    pub delivered: usize,
    pub skipped: usize,
}

/// Result of one query tick.
#[derive(Debug)]
pub enum TickOutcome {
    Delivered(usize),
    Skipped(anyhow::Error),
}

/// Periodically asks for the nearest points to a random location.
///
/// Each tick samples a query location, takes one store snapshot, ranks it and
/// hands the report to the sink, then sleeps for the interval. A slow tick
/// pushes the following ones back rather than overlapping them.
pub struct QueryLoop {
    store: Arc<PointStore>,
    query: NearestQuery,
    sampler: DiskSampler,
    sink: Box<dyn ResultSink>,
    k: usize,
    interval: Duration,
}

impl QueryLoop {
    pub fn new(
        store: Arc<PointStore>,
        query: NearestQuery,
        sampler: DiskSampler,
        sink: Box<dyn ResultSink>,
        k: usize,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            query,
            sampler,
            sink,
            k,
            interval,
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        let location = match self.sampler.sample() {
            Ok(location) => location,
            Err(e) => return TickOutcome::Skipped(e.into()),
        };

        let snapshot = self.store.snapshot();
        let ranked = match self.query.find_nearest_to(&snapshot, location, self.k) {
            Ok(ranked) => ranked,
            Err(e) => return TickOutcome::Skipped(e.into()),
        };

        let report = QueryReport::from_ranked(location, snapshot.generation(), &ranked);
        let _timing = logging::start_timing("QueryLoop::deliver", OperationCategory::Output);
        match self.sink.deliver(&report) {
            Ok(()) => TickOutcome::Delivered(report.rows.len()),
            Err(e) => TickOutcome::Skipped(e.context("delivering query result")),
        }
    }

    /// Ticks until the context says stop. Blocks the calling thread.
    pub fn run(&mut self, ctx: &RunContext) -> QueryLoopSummary {
        let mut summary = QueryLoopSummary::default();
        info!(
            k = self.k,
            interval_ms = self.interval.as_millis() as u64,
            strategy = self.query.strategy_name(),
            "query loop started"
        );

        while !ctx.should_stop() {
            summary.ticks += 1;
            match self.tick() {
                TickOutcome::Delivered(rows) => {
                    summary.delivered += 1;
                    debug!(rows, "query tick delivered");
                }
                TickOutcome::Skipped(e) => {
                    summary.skipped += 1;
                    warn!(error = %format!("{:#}", e), "query tick skipped");
                }
            }
            if !ctx.sleep(self.interval) {
                break;
            }
        }

        info!(
            ticks = summary.ticks,
            skipped = summary.skipped,
            "query loop stopped"
        );
        summary
    }

    pub fn spawn(mut self, ctx: RunContext) -> std::io::Result<JoinHandle<QueryLoopSummary>> {
        thread::Builder::new()
            .name("nearest-query".to_string())
            .spawn(move || self.run(&ctx))
    }
}
