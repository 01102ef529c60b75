//! Fetch command - request a resource through the interception layer
//!
//! The body goes to stdout (or `--output`); status lines go to stderr so the
//! body can be piped.

use super::resumed_worker;
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{ShelfError, ShelfResult};
use crate::fetch::{resolve_url, Fetcher, HttpFetcher, Request, Response};
use crate::router::{Interception, Outcome};
use console::style;
use std::io::Write;
use tokio::fs;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> ShelfResult<()> {
    let (worker, _, _) = resumed_worker(config, |r| r.state).await?;
    let url = resolve_url(worker.origin(), &args.target)?;
    let request = Request::new(&args.method, url);

    let (response, label) = match worker.intercept(&request).await? {
        Interception::Handled(served) => {
            // The process exits after this command; let the cache write land
            if let Some(population) = served.population {
                population
                    .await
                    .map_err(|e| ShelfError::Internal(format!("cache write task: {}", e)))?;
            }
            let label = match served.outcome {
                Outcome::Cache => style(served.outcome.to_string()).green(),
                Outcome::NetworkCached => style(served.outcome.to_string()).blue(),
                Outcome::NetworkUncached => style(served.outcome.to_string()).yellow(),
            };
            (
                served.response,
                format!("{} [{}]", label, served.resolution.partition),
            )
        }
        Interception::PassThrough => {
            let response = HttpFetcher::from_config(config)?.fetch(&request).await?;
            (response, style("passed through (not intercepted)").dim().to_string())
        }
    };

    eprintln!(
        "{} {} {}",
        style(response.status).bold(),
        request.url(),
        label
    );
    write_response(&args, response).await
}

async fn write_response(args: &FetchArgs, response: Response) -> ShelfResult<()> {
    if args.include {
        let mut head = format!("HTTP {} ({})\n", response.status, response.kind);
        for (name, value) in &response.headers {
            head.push_str(&format!("{}: {}\n", name, value));
        }
        println!("{}", head);
    }

    let body = response.into_body();
    match &args.output {
        Some(path) => fs::write(path, &body)
            .await
            .map_err(|e| ShelfError::io(format!("writing {}", path.display()), e)),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&body)
                .and_then(|_| stdout.flush())
                .map_err(|e| ShelfError::io("writing response body", e))
        }
    }
}
