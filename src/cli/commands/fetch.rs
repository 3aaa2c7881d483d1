//! Fetch command - run one request through the offline worker
//!
//! The response body goes to stdout; route and source go to stderr so the
//! body can be piped.

use super::host::WorkerHost;
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{PostroomError, PostroomResult};
use crate::offline::{FetchOutcome, Method, Network, Request, RequestMode, Route, WorkerState};
use console::style;
use std::io::Write;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> PostroomResult<()> {
    let method: Method = args.method.parse()?;
    let mut request = Request::new(method, &args.url)?;
    if args.navigate {
        request.mode = RequestMode::Navigate;
    }

    let host = WorkerHost::open(config).await?;
    let route = if host.worker.state() == WorkerState::Activated {
        host.worker.controller().route(&request)
    } else {
        Route::Passthrough
    };
    eprintln!("{} {} {}", style("route:").dim(), route, request.url);

    let response = match host.worker.fetch(&request).await? {
        FetchOutcome::Respond(response) => response,
        FetchOutcome::Passthrough => host.network.fetch(&request).await?,
    };

    eprintln!(
        "{} {} ({})",
        style("status:").dim(),
        response.status,
        response.source
    );

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&response.body)
        .and_then(|_| stdout.flush())
        .map_err(|e| PostroomError::io("writing response body", e))?;

    Ok(())
}
