//! SRQL CLI: run queries against a running API server, or compile them
//! locally with `--explain` to inspect the generated plan.

use clap::Parser;
use dotenv::dotenv;
use srql_common::models::{ErrorEnvelope, QueryRequest};
use srql_error::SrqlError;
use srql_query::{Binder, Planner, PlannerOptions};
use std::process::ExitCode;
use std::sync::Arc;

mod exit_codes;
mod output;

#[derive(Parser)]
#[command(name = "srql-exec")]
#[command(about = "Execute SRQL queries", long_about = None)]
struct Cli {
    /// The query to run
    query: String,

    /// Compile and print the execution plan without running anything
    #[arg(long)]
    explain: bool,

    /// Per-query timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Base URL of the SRQL API server
    #[arg(long, env = "SRQL_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Print rows as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    if cli.explain {
        return explain(&cli.query);
    }
    execute_remote(&cli).await
}

/// Compile against the built-in catalog and print the plan.
fn explain(query: &str) -> ExitCode {
    match compile(query) {
        Ok(rendered) => {
            print!("{rendered}");
            ExitCode::from(exit_codes::SUCCESS)
        }
        Err(err) => {
            output::print_error(
                query,
                &err.code.as_str(),
                &err.message,
                err.position(),
                err.hint.as_deref(),
            );
            ExitCode::from(exit_codes::for_category(err.category()))
        }
    }
}

fn compile(query: &str) -> Result<String, SrqlError> {
    let fingerprint = srql_lang::normalize(query)?;
    let parsed = srql_lang::parse(query)?;
    let snapshot = Arc::new(srql_catalog::builtin_snapshot());
    let bound = Binder::new(snapshot).bind(&parsed)?;
    let plan = Planner::new(PlannerOptions::default()).plan(&bound, fingerprint)?;
    Ok(srql_runtime::explain_plan(&plan))
}

async fn execute_remote(cli: &Cli) -> ExitCode {
    let mut request = QueryRequest::new(&cli.query);
    request.timeout_seconds = cli.timeout;

    let url = format!("{}/api/query", cli.api_url.trim_end_matches('/'));
    let response = match reqwest::Client::new().post(&url).json(&request).send().await {
        Ok(response) => response,
        Err(err) => {
            eprintln!("error: failed to reach {url}: {err}");
            return ExitCode::from(exit_codes::EXECUTION_ERROR);
        }
    };

    if response.status().is_success() {
        let rows: Vec<serde_json::Value> = match response.json().await {
            Ok(rows) => rows,
            Err(err) => {
                eprintln!("error: malformed response from server: {err}");
                return ExitCode::from(exit_codes::EXECUTION_ERROR);
            }
        };
        if cli.json {
            match serde_json::to_string_pretty(&rows) {
                Ok(json) => println!("{json}"),
                Err(err) => {
                    eprintln!("error: {err}");
                    return ExitCode::from(exit_codes::EXECUTION_ERROR);
                }
            }
        } else {
            print!("{}", output::render_table(&rows));
        }
        return ExitCode::from(exit_codes::SUCCESS);
    }

    match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => {
            let body = envelope.error;
            output::print_error(
                &cli.query,
                &body.code,
                &body.message,
                body.position,
                body.hint.as_deref(),
            );
            let code = match body.kind.as_str() {
                "parse" | "semantic" | "planning" => exit_codes::QUERY_ERROR,
                "timeout" => exit_codes::TIMEOUT,
                _ => exit_codes::EXECUTION_ERROR,
            };
            ExitCode::from(code)
        }
        Err(err) => {
            eprintln!("error: malformed error response from server: {err}");
            ExitCode::from(exit_codes::EXECUTION_ERROR)
        }
    }
}
