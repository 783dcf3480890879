use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use nearpoint::cli::cli::{Args, SinkKind};
use nearpoint::core::cancellation::{cancel_on_interrupt, CancelToken};
use nearpoint::core::server::run_server;
use nearpoint::output::sink::{ConsoleSink, CsvSink, MultiSink, ResultSink, TracingSink};
use nearpoint::utils::logging;

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init_logging(args.enable_timing(), args.debug_logging()) {
        eprintln!("Failed to set up logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    // Configuration errors are the only fatal ones
    let config = match args.server_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(2);
        }
    };

    let sink = match build_sink(&args) {
        Ok(sink) => sink,
        Err(e) => {
            error!(error = %format!("{:#}", e), "could not open output");
            return ExitCode::FAILURE;
        }
    };

    let token = CancelToken::new();
    if let Err(e) = cancel_on_interrupt(&token) {
        error!(error = %e, "failed to set signal handler");
        return ExitCode::FAILURE;
    }

    println!("Nearest point server: {} points around ({}, {}), radius {} m",
             config.point_count, config.center_lat, config.center_lon, config.radius_m);
    println!("Refresh every {} ms, query every {} ms, k = {}, run time: {}",
             config.refresh_interval_ms, config.query_interval_ms, config.k,
             config.run_duration_ms.map(|ms| format!("{} ms", ms)).unwrap_or_else(|| "until interrupted".to_string()));

    let result = run_server(&config, sink, token);
    logging::print_timing_report();

    match result {
        Ok(summary) => {
            println!("Server Shut Down");
            println!("Refresh ticks: {} ({} failed), queries delivered: {} ({} skipped), points flushed: {}",
                     summary.refresh.ticks, summary.refresh.failed,
                     summary.queries.delivered, summary.queries.skipped, summary.flushed);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "server failed");
            ExitCode::FAILURE
        }
    }
}

fn build_sink(args: &Args) -> anyhow::Result<Box<dyn ResultSink>> {
    let primary: Box<dyn ResultSink> = match args.sink() {
        SinkKind::Console => Box::new(ConsoleSink::stdout()),
        SinkKind::Log => Box::new(TracingSink),
    };

    let Some(path) = args.csv() else {
        return Ok(primary);
    };

    let mut multi = MultiSink::new();
    multi.push(primary);
    multi.push(Box::new(CsvSink::create(path)?));
    Ok(Box::new(multi))
}
