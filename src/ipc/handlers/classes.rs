use crate::calc::class_grade;
use crate::db;
use crate::ipc::helpers::{load_snapshot, param_id, require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::legacy::{merge_patch, parse_class_record};
use serde_json::json;

fn handle_classes_list(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(json!({ "classes": [] }));
    };
    let snap = load_snapshot(conn)?;

    // Include assignment counts and the displayed grade so cards need no second call.
    let classes: Vec<serde_json::Value> = snap
        .classes
        .iter()
        .map(|c| {
            let assignment_count = snap
                .assignments
                .iter()
                .filter(|a| a.class_id == c.id)
                .count();
            json!({
                "class": c,
                "assignmentCount": assignment_count,
                "grade": class_grade(c, &snap.assignments),
            })
        })
        .collect();
    Ok(json!({ "classes": classes }))
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = param_id(req, "classId")?;
    let class = db::get_class(conn, class_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "class not found"))?;
    Ok(json!({ "class": class }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let config = db::load_calc_config(conn).map_err(HandlerErr::db("db_query_failed"))?;
    let mut rec = parse_class_record(&req.params, config.default_credits)?;
    // Ids are assigned by the store on create.
    rec.id = None;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let class_id = db::upsert_class(&tx, &rec).map_err(HandlerErr::db("db_insert_failed"))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    let class = db::get_class(conn, class_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "class vanished after insert"))?;
    Ok(json!({ "classId": class_id, "class": class }))
}

fn handle_classes_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = param_id(req, "classId")?;
    let Some(patch) = req.params.get("patch") else {
        return Err(HandlerErr::new("bad_params", "missing patch"));
    };
    let existing = db::get_class(conn, class_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "class not found"))?;
    let config = db::load_calc_config(conn).map_err(HandlerErr::db("db_query_failed"))?;

    let base = serde_json::to_value(&existing)
        .map_err(|e| HandlerErr::new("server_error", e.to_string()))?;
    let base = base.as_object().cloned().unwrap_or_default();
    let merged = merge_patch(&base, patch)?;
    let mut rec = parse_class_record(&serde_json::Value::Object(merged), config.default_credits)?;
    rec.id = Some(class_id);

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    db::upsert_class(&tx, &rec).map_err(HandlerErr::db("db_update_failed"))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    let class = db::get_class(conn, class_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "class not found"))?;
    Ok(json!({ "class": class }))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = param_id(req, "classId")?;
    let removed = db::delete_class(conn, class_id).map_err(|e| {
        HandlerErr::new("db_delete_failed", format!("{e:#}"))
            .with_details(json!({ "classId": class_id }))
    })?;
    if !removed {
        return Err(HandlerErr::new("not_found", "class not found"));
    }
    tracing::info!(class_id, "class deleted");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => handle_classes_list(state, req),
        "classes.get" => handle_classes_get(state, req),
        "classes.create" => handle_classes_create(state, req),
        "classes.update" => handle_classes_update(state, req),
        "classes.delete" => handle_classes_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
