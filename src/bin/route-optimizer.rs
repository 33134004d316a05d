use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use route_optimizer::api::{self, OptimizeRequest};
use route_optimizer::error::BackendError;
use route_optimizer::optimizer::DynRouteOptimizer;
use route_optimizer::{ClusterCount, Objective, OptimizeError, OptimizerConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Plan delivery routes for a list of addresses.
///
/// Input is either a JSON optimize request or plain text with one address
/// per line. Backends are chosen through ROUTE_OPTIMIZER_* variables.
#[derive(Parser, Debug)]
#[command(name = "route-optimizer", version)]
struct Cli {
    /// Request file; reads stdin when omitted or "-"
    input: Option<PathBuf>,

    /// shortest_distance, fastest_time or eco
    #[arg(long, value_parser = parse_objective)]
    objective: Option<Objective>,

    /// Number of clusters, or "auto"
    #[arg(long, value_parser = parse_cluster_count)]
    clusters: Option<ClusterCount>,

    /// Per-route duration budget in hours
    #[arg(long)]
    max_hours: Option<f64>,

    /// Pretty-print the response
    #[arg(long)]
    pretty: bool,
}

fn parse_objective(value: &str) -> Result<Objective, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|e| e.to_string())
}

fn parse_cluster_count(value: &str) -> Result<ClusterCount, String> {
    let json = match value.parse::<usize>() {
        Ok(count) => serde_json::Value::from(count),
        Err(_) => serde_json::Value::String(value.to_string()),
    };
    serde_json::from_value(json).map_err(|e| e.to_string())
}

fn read_input(path: Option<&PathBuf>) -> std::io::Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path),
        _ => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn parse_request(input: &str) -> Result<OptimizeRequest, serde_json::Error> {
    if input.trim_start().starts_with('{') {
        return serde_json::from_str(input);
    }
    Ok(OptimizeRequest::new(
        input.lines().map(str::trim).filter(|line| !line.is_empty()),
    ))
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let input = match read_input(cli.input.as_ref()) {
        Ok(input) => input,
        Err(e) => {
            error!(error = %e, "failed to read input");
            return ExitCode::FAILURE;
        }
    };
    let mut request = match parse_request(&input) {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "malformed request");
            return ExitCode::from(2);
        }
    };
    if let Some(objective) = cli.objective {
        request.optimization_type = objective;
    }
    if let Some(clusters) = cli.clusters {
        request.cluster_count = clusters;
    }
    if cli.max_hours.is_some() {
        request.max_route_time_hours = cli.max_hours;
    }

    let optimizer = match OptimizerConfig::from_env()
        .map_err(BackendError::from)
        .and_then(DynRouteOptimizer::from_config)
    {
        Ok(optimizer) => optimizer,
        Err(e) => {
            error!(error = %e, "failed to configure optimizer");
            return ExitCode::FAILURE;
        }
    };

    let response = match api::handle(&optimizer, request) {
        Ok(response) => response,
        Err(e @ OptimizeError::Validation(_)) => {
            error!(error = %e, "invalid request");
            return ExitCode::from(2);
        }
        Err(e) => {
            error!(error = %e, "optimization failed");
            return ExitCode::FAILURE;
        }
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    };
    match rendered {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!(error = %e, "failed to encode response");
            return ExitCode::FAILURE;
        }
    }

    if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
