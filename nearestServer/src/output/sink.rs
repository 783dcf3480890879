//! Delivery of query results to whatever consumes them.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::data::poi::GeoCoordinate;
use crate::query::nearest::RankedPoint;

/// One ranked entry as a consumer sees it: `(rank, id, km, lat, lon)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub rank: usize,
    pub id: String,
    pub distance_km: f64,
    pub lat: f64,
    pub lon: f64,
}

/// The outcome of one query tick.
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub query: GeoCoordinate,
    pub generation: u64,
    pub timestamp: DateTime<Local>,
    pub rows: Vec<ReportRow>,
}

impl QueryReport {
    pub fn from_ranked(query: GeoCoordinate, generation: u64, ranked: &[RankedPoint]) -> Self {
        let rows = ranked
            .iter()
            .enumerate()
            .map(|(i, r)| ReportRow {
                rank: i + 1,
                id: r.point.id().to_string(),
                distance_km: r.distance_km(),
                lat: r.point.lat(),
                lon: r.point.lon(),
            })
            .collect();

        Self {
            query,
            generation,
            timestamp: Local::now(),
            rows,
        }
    }
}

pub trait ResultSink: Send {
    fn deliver(&mut self, report: &QueryReport) -> Result<()>;
}

/// Human-readable block per query, written to stdout by default.
pub struct ConsoleSink<W: Write + Send = io::Stdout> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ResultSink for ConsoleSink<W> {
    fn deliver(&mut self, report: &QueryReport) -> Result<()> {
        let out = &mut self.out;
        writeln!(out, "\n====================================")?;
        writeln!(out, "Your Latitude  : {}", report.query.lat)?;
        writeln!(out, "Your Longitude : {}", report.query.lon)?;
        for row in &report.rows {
            writeln!(out, "-----------------{}------------------", row.rank)?;
            writeln!(out, "Name Point     : {}", row.id)?;
            writeln!(out, "Distance       : {:.4} Kilometers", row.distance_km)?;
            writeln!(out, "Latitude       : {}", row.lat)?;
            writeln!(out, "Longitude      : {}", row.lon)?;
        }
        writeln!(out, "====================================")?;
        out.flush()?;
        Ok(())
    }
}

/// One `info` event per ranked row.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn deliver(&mut self, report: &QueryReport) -> Result<()> {
        info!(
            lat = report.query.lat,
            lon = report.query.lon,
            generation = report.generation,
            results = report.rows.len(),
            "nearest query"
        );
        for row in &report.rows {
            info!(
                rank = row.rank,
                id = %row.id,
                distance_km = format_args!("{:.4}", row.distance_km),
                lat = row.lat,
                lon = row.lon,
                "nearest point"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    timestamp: String,
    generation: u64,
    query_lat: f64,
    query_lon: f64,
    rank: usize,
    id: &'a str,
    distance_km: f64,
    lat: f64,
    lon: f64,
}

/// Appends every ranked row as a CSV record.
pub struct CsvSink<W: Write + Send> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating CSV output {}", path.display()))?;
        Ok(Self { writer })
    }
}

impl<W: Write + Send> CsvSink<W> {
    pub fn from_writer(out: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flushing CSV output: {}", e.error()))
    }
}

impl<W: Write + Send> ResultSink for CsvSink<W> {
    fn deliver(&mut self, report: &QueryReport) -> Result<()> {
        let timestamp = report.timestamp.to_rfc3339();
        for row in &report.rows {
            self.writer.serialize(CsvRecord {
                timestamp: timestamp.clone(),
                generation: report.generation,
                query_lat: report.query.lat,
                query_lon: report.query.lon,
                rank: row.rank,
                id: &row.id,
                distance_km: row.distance_km,
                lat: row.lat,
                lon: row.lon,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps reports in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<QueryReport>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<QueryReport> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for MemorySink {
    fn deliver(&mut self, report: &QueryReport) -> Result<()> {
        self.reports.lock().push(report.clone());
        Ok(())
    }
}

/// Fans one report out to several sinks. Every sink is tried; the first
/// failure is returned.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn ResultSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ResultSink for MultiSink {
    fn deliver(&mut self, report: &QueryReport) -> Result<()> {
        let mut first_error = None;
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.deliver(report) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
