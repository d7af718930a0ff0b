use crate::calc::parse_calc_config_patch;
use crate::db;
use crate::ipc::helpers::{param_str, require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
    }))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(param_str(req, "path")?);
    let conn = state.open(&path).map_err(HandlerErr::db("db_open_failed"))?;
    let config = db::load_calc_config(conn).map_err(HandlerErr::db("db_open_failed"))?;
    tracing::info!(workspace = %path.display(), "workspace opened");

    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "config": config,
    }))
}

fn handle_config_get(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let config = db::load_calc_config(conn).map_err(HandlerErr::db("db_query_failed"))?;
    Ok(json!({ "config": config }))
}

fn handle_config_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let current = db::load_calc_config(conn).map_err(HandlerErr::db("db_query_failed"))?;
    let next = parse_calc_config_patch(&current, &req.params)?;
    db::save_calc_config(conn, &next).map_err(HandlerErr::db("db_update_failed"))?;
    tracing::info!(?next, "calc config updated");
    Ok(json!({ "config": next }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        "calc.config.get" => handle_config_get(state, req),
        "calc.config.update" => handle_config_update(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
