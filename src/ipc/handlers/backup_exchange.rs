use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn param_path(params: &serde_json::Value, key: &str) -> Option<PathBuf> {
    params.get(key).and_then(|v| v.as_str()).map(PathBuf::from)
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace = param_path(&req.params, "workspacePath")
        .or_else(|| state.workspace.clone());
    let Some(workspace) = workspace else {
        return err(&req.id, "bad_params", "missing workspacePath", None);
    };
    let Some(out_path) = param_path(&req.params, "outPath") else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    match backup::export_workspace_bundle(&workspace, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "dbSha256": summary.db_sha256,
                "outPath": out_path.to_string_lossy()
            }),
        ),
        Err(e) => err(&req.id, "backup_export_failed", format!("{e:?}"), None),
    }
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(in_path) = param_path(&req.params, "inPath") else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };
    let workspace = param_path(&req.params, "workspacePath")
        .or_else(|| state.workspace.clone());
    let Some(workspace) = workspace else {
        return err(&req.id, "bad_params", "missing workspacePath", None);
    };

    let summary = match backup::import_workspace_bundle(&in_path, &workspace) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "backup_import_failed", format!("{e:?}"), None),
    };

    // The restored database replaces the open connection when the import
    // targets the active workspace.
    if state.workspace.as_deref() == Some(workspace.as_path()) {
        match db::open_db(&workspace) {
            Ok(conn) => state.db = Some(conn),
            Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
        }
    }

    ok(
        &req.id,
        json!({ "bundleFormatDetected": summary.bundle_format_detected }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_export_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
