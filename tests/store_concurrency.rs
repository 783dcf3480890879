use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nearpoint::config::server_config::ServerConfig;
use nearpoint::core::cancellation::CancelToken;
use nearpoint::core::server::Server;
use nearpoint::output::sink::MemorySink;
use nearpoint::{GeoCoordinate, NearestQuery, PointStore};

const POINTS: usize = 500;

/// Every refresh pass puts all points on one latitude, unique to that pass.
/// A snapshot that mixed two passes would show two latitudes.
#[test]
fn test_snapshots_never_mix_generations() {
    let store = Arc::new(PointStore::new());
    store.init(POINTS, || Ok(GeoCoordinate::new(0.0, 0.0))).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for pass in 1..=200u32 {
                let lat = (pass % 170) as f64 - 85.0;
                let mut lon = -180.0;
                store
                    .replace_all(|| {
                        lon += 0.5;
                        Ok(GeoCoordinate::new(lat, lon))
                    })
                    .unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut checked = 0usize;
                while !done.load(Ordering::SeqCst) || checked == 0 {
                    let snapshot = store.snapshot();
                    assert_eq!(snapshot.len(), POINTS);
                    let first_lat = snapshot.iter().next().map(|p| p.lat()).unwrap();
                    assert!(snapshot.iter().all(|p| p.lat() == first_lat),
                            "snapshot of generation {} mixes passes", snapshot.generation());
                    checked += 1;
                }
                checked
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(store.generation(), 201);
}

#[test]
fn test_upserts_survive_concurrent_refreshes() {
    let store = Arc::new(PointStore::new());
    store.init(100, || Ok(GeoCoordinate::new(1.0, 1.0))).unwrap();

    let refresher = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for _ in 0..100 {
                store.replace_all(|| Ok(GeoCoordinate::new(2.0, 2.0))).unwrap();
            }
        })
    };
    let upserter = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..100 {
                store.upsert(&format!("X{:03}", i), GeoCoordinate::new(3.0, 3.0)).unwrap();
            }
        })
    };

    refresher.join().unwrap();
    upserter.join().unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 200);
    assert!((0..100).all(|i| snapshot.contains(&format!("X{:03}", i))));
}

#[test]
fn test_snapshot_held_across_flush() {
    let store = PointStore::new();
    store.init(3, || Ok(GeoCoordinate::new(0.0, 0.0))).unwrap();
    let held = store.snapshot();
    store.flush();

    let nearest = NearestQuery::default().find_nearest(&held, 0.0, 0.0, 5).unwrap();
    assert_eq!(nearest.len(), 3);
    assert!(store.snapshot().is_empty());
}

/// Extra callers query the live store while the server's own loop runs.
#[test]
fn test_outside_callers_query_alongside_server() {
    let config = ServerConfig {
        point_count: 300,
        refresh_interval_ms: 5,
        query_interval_ms: 10,
        run_duration_ms: None,
        seed: Some(2024),
        ..ServerConfig::default()
    };
    let sink = MemorySink::new();
    let server = Server::start(&config, Box::new(sink.clone()), CancelToken::new()).unwrap();

    let callers: Vec<_> = (0..3)
        .map(|i| {
            let store = server.store();
            thread::spawn(move || {
                let query = NearestQuery::default();
                for _ in 0..50 {
                    let snapshot = store.snapshot();
                    let result = query.find_nearest(&snapshot, i as f64, -(i as f64), 5).unwrap();
                    assert_eq!(result.len(), 5);
                    assert!(result.iter().all(|r| snapshot.get(r.point.id()) == Some(&r.point)));
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();

    for caller in callers {
        caller.join().unwrap();
    }

    let summary = server.shutdown().unwrap();
    assert_eq!(summary.initial_points, 300);
    assert_eq!(summary.flushed, 300);
    assert_eq!(summary.queries.skipped, 0);
    assert_eq!(summary.queries.delivered, sink.len());
}
