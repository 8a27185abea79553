use crate::backup;
use crate::db;
use crate::ipc::helpers::{db, opt_str, req_str, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn workspace(state: &AppState) -> Result<PathBuf, HandlerErr> {
    state
        .workspace
        .clone()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn export_to(workspace: &Path, out_path: &Path) -> HandlerResult {
    let summary = backup::export_workspace_bundle(workspace, out_path)
        .map_err(|e| HandlerErr::new("io_failed", format!("{e:#}")))?;
    info!(path = %out_path.display(), sha256 = %summary.db_sha256, "workspace exported");
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "dbSha256": summary.db_sha256,
        "exportedAt": summary.exported_at,
    }))
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> HandlerResult {
    let ws = workspace(state)?;
    let out_path = PathBuf::from(req_str(&req.params, "outPath")?);
    export_to(&ws, &out_path)
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> HandlerResult {
    let ws = workspace(state)?;
    let in_path = PathBuf::from(req_str(&req.params, "inPath")?);

    // Release the file before replacing it.
    state.db = None;
    let imported = backup::import_workspace_bundle(&in_path, &ws);
    let reopened = db::open_db(&ws);
    match reopened {
        Ok(conn) => state.db = Some(conn),
        Err(e) => {
            warn!(path = %ws.display(), error = %e, "failed to reopen workspace after import");
            return Err(HandlerErr::new("db_open_failed", format!("{e:#}")));
        }
    }
    let summary = imported.map_err(|e| HandlerErr::new("io_failed", format!("{e:#}")))?;
    info!(path = %in_path.display(), "workspace imported");
    Ok(json!({
        "bundleFormat": summary.bundle_format,
        "dbSha256": summary.db_sha256,
    }))
}

/// Factory reset: optional bundle first, then every table emptied.
fn handle_workspace_reset(state: &mut AppState, req: &Request) -> HandlerResult {
    let ws = workspace(state)?;
    let backup = match opt_str(&req.params, "backupPath")? {
        Some(p) => Some(export_to(&ws, Path::new(p))?),
        None => None,
    };
    let conn = db(state)?;
    db::clear_all(conn)?;
    info!(path = %ws.display(), "workspace reset");
    Ok(json!({ "reset": true, "backup": backup }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "backup.export" => handle_backup_export(state, req),
        "backup.import" => handle_backup_import(state, req),
        "workspace.reset" => handle_workspace_reset(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
