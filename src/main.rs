mod auth;
mod backup;
mod db;
mod error;
mod history;
mod ipc;
mod lifecycle;
mod model;
mod policy;
mod presenter;
mod reconcile;
mod roster;
mod store;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "rollcalld")]
#[command(about = "Classroom attendance sidecar speaking JSON lines over stdio")]
struct Args {
    /// Workspace directory to open at startup
    #[arg(long, env = "ROLLCALL_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Log filter directives, written to stderr
    #[arg(long, env = "ROLLCALL_LOG", default_value = "rollcalld=info")]
    log_filter: String,
}

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        )
        .init();
}

fn write_line(stdout: &mut impl Write, value: &serde_json::Value) {
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
}

fn main() {
    let args = Args::parse();
    init_tracing(&args.log_filter);

    let mut state = ipc::AppState::default();
    if let Some(path) = args.workspace.as_deref() {
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            tracing::warn!(workspace = %path.display(), error = %e, "startup workspace not opened");
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rollcalld ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to answer to.
                tracing::debug!(error = %e, "unparseable request line");
                write_line(
                    &mut stdout,
                    &serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() },
                    }),
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let method = req.method.clone();
        let resp = ipc::handle_request(&mut state, req);
        if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
            tracing::debug!(method = %method, error = %resp["error"], "request failed");
        }
        write_line(&mut stdout, &resp);
        for event in ipc::drain_events(&mut state) {
            write_line(&mut stdout, &event);
        }
        let _ = stdout.flush();
    }
}
