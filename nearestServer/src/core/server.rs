//! Wires the store and both workers together and owns their lifecycle:
//! init, run until the deadline or cancellation, then stop, flush and report.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

use crate::config::constants::{POINT_SEED_OFFSET, QUERY_SEED_OFFSET, REFRESH_SEED_OFFSET};
use crate::config::server_config::ServerConfig;
use crate::core::cancellation::{CancelToken, RunContext};
use crate::core::query_loop::{QueryLoop, QueryLoopSummary};
use crate::core::refresher::{RefreshSummary, Refresher};
use crate::geo::geo_math::DiskSampler;
use crate::output::sink::ResultSink;
use crate::query::nearest::NearestQuery;
use crate::store::point_store::PointStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSummary {
    pub initial_points: usize,
    pub refresh: RefreshSummary,
    pub queries: QueryLoopSummary,
    pub flushed: usize,
}

pub struct Server {
    store: Arc<PointStore>,
    token: CancelToken,
    initial_points: usize,
    refresher: JoinHandle<RefreshSummary>,
    query_loop: JoinHandle<QueryLoopSummary>,
}

impl Server {
    /// Validates the config, fills the store and starts both workers.
    pub fn start(config: &ServerConfig, sink: Box<dyn ResultSink>, token: CancelToken) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(PointStore::new());
        let center = config.center();
        let mut initial = DiskSampler::new(center, config.radius_m, config.task_seed(POINT_SEED_OFFSET));
        store
            .init(config.point_count, || initial.sample())
            .context("generating initial points")?;
        let initial_points = store.len();
        info!(points = initial_points, lat = center.lat, lon = center.lon, radius_m = config.radius_m, "points initialized");

        let mut ctx = RunContext::new(token.clone());
        if let Some(duration) = config.run_duration() {
            ctx = ctx.with_timeout(duration);
        }

        let refresher = Refresher::new(
            Arc::clone(&store),
            DiskSampler::new(center, config.radius_m, config.task_seed(REFRESH_SEED_OFFSET)),
            config.refresh_interval(),
        )
        .spawn(ctx.clone())
        .context("spawning refresher thread")?;

        let query = NearestQuery::new(config.strategy.build())
            .with_empty_set_error(config.empty_set_is_error);
        let query_loop = QueryLoop::new(
            Arc::clone(&store),
            query,
            DiskSampler::new(center, config.radius_m, config.task_seed(QUERY_SEED_OFFSET)),
            sink,
            config.k,
            config.query_interval(),
        )
        .spawn(ctx.without_deadline());

        let query_loop = match query_loop {
            Ok(handle) => handle,
            Err(e) => {
                token.cancel();
                let _ = refresher.join();
                return Err(e).context("spawning query thread");
            }
        };

        Ok(Self {
            store,
            token,
            initial_points,
            refresher,
            query_loop,
        })
    }

    /// The live store, for callers that want to query alongside the loop.
    pub fn store(&self) -> Arc<PointStore> {
        Arc::clone(&self.store)
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Waits for the refresher to reach its deadline (or be cancelled), then
    /// stops the query loop, flushes the store and reports.
    pub fn wait(self) -> Result<ServerSummary> {
        let refresh = self.refresher.join();
        self.token.cancel();
        let queries = self.query_loop.join();

        let flushed = self.store.flush();
        info!(flushed, "Server Shut Down");

        Ok(ServerSummary {
            initial_points: self.initial_points,
            refresh: refresh.map_err(|_| anyhow!("refresher thread panicked"))?,
            queries: queries.map_err(|_| anyhow!("query thread panicked"))?,
            flushed,
        })
    }

    /// Cancels both workers right away and waits for them.
    pub fn shutdown(self) -> Result<ServerSummary> {
        self.token.cancel();
        self.wait()
    }
}

/// Runs a whole server lifetime on the calling thread.
pub fn run_server(config: &ServerConfig, sink: Box<dyn ResultSink>, token: CancelToken) -> Result<ServerSummary> {
    Server::start(config, sink, token)?.wait()
}
