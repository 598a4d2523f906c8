use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::core::select_workspace;
use crate::ipc::helpers::{current_user, require_store};
use crate::ipc::types::{AppState, Request};
use crate::policy;
use serde_json::json;
use std::path::PathBuf;

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(out_path) = req.params.get("outPath").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    match backup::export_workspace_bundle(&workspace, &PathBuf::from(out_path)) {
        Ok(summary) => {
            tracing::info!(out_path, entries = summary.entry_count, "workspace exported");
            ok(
                &req.id,
                json!({
                    "ok": true,
                    "path": out_path,
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count,
                    "dbSha256": summary.db_sha256,
                }),
            )
        }
        Err(e) => err(&req.id, "io_failed", format!("{e:#}"), None),
    }
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(in_path) = req.params.get("inPath").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };
    let signed_in = require_store(state)
        .and_then(current_user)
        .and_then(|user| Ok(policy::require_signed_in(user.as_ref())?.uid.clone()));
    let uid = match signed_in {
        Ok(uid) => uid,
        Err(e) => return e.response(&req.id),
    };

    // The open connection must be closed before the database file is replaced.
    state.store = None;
    state.draft = None;
    state.watches.clear();
    let imported = backup::import_workspace_bundle(&PathBuf::from(in_path), &workspace);
    let reopened = select_workspace(state, &workspace);

    match (imported, reopened) {
        (Ok(summary), Ok(())) => {
            tracing::info!(in_path, uid = %uid, format = %summary.bundle_format_detected, "workspace imported");
            ok(
                &req.id,
                json!({
                    "ok": true,
                    "workspacePath": workspace.to_string_lossy(),
                    "bundleFormatDetected": summary.bundle_format_detected,
                }),
            )
        }
        (Err(e), reopened) => {
            tracing::warn!(in_path, error = %format!("{e:#}"), "workspace import rejected");
            if let Err(reopen) = reopened {
                tracing::error!(error = %format!("{reopen:#}"), "workspace reopen failed");
            }
            err(&req.id, "io_failed", format!("{e:#}"), None)
        }
        (Ok(_), Err(e)) => {
            tracing::warn!(error = %format!("{e:#}"), "imported database unusable; restoring previous");
            let restored = backup::restore_previous(&workspace)
                .and_then(|_| select_workspace(state, &workspace));
            if let Err(restore) = restored {
                tracing::error!(error = %format!("{restore:#}"), "previous database not restored");
            }
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspace" => Some(handle_export(state, req)),
        "backup.importWorkspace" => Some(handle_import(state, req)),
        _ => None,
    }
}
