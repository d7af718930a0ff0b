use crate::calc::{assignment_status, due_date_issues};
use crate::db;
use crate::ipc::helpers::{
    load_snapshot, param_bool, param_id, param_now, require_db, respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::legacy::{merge_patch, parse_assignment_record, AssignmentRecord};
use crate::model::Timestamp;
use crate::summary::{parse_assignment_query, select_assignments};
use rusqlite::Connection;
use serde_json::json;

fn handle_assignments_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let query = parse_assignment_query(req.params.get("filters"))?;
    let now = param_now(req)?;
    let snap = load_snapshot(conn)?;

    let rows: Vec<serde_json::Value> = select_assignments(&snap.assignments, &snap.classes, &query, now)
        .into_iter()
        .map(|a| {
            json!({
                "assignment": a,
                "status": assignment_status(a, now, snap.config.due_soon_days),
            })
        })
        .collect();
    Ok(json!({
        "filters": query,
        "assignments": rows,
        "dataIssues": due_date_issues(&snap.assignments),
    }))
}

fn handle_assignments_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let assignment_id = param_id(req, "assignmentId")?;
    let assignment = db::get_assignment(conn, assignment_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "assignment not found"))?;
    Ok(json!({ "assignment": assignment }))
}

/// Form input must reference a real class and carry a readable due date.
fn validate_for_write(conn: &Connection, rec: &AssignmentRecord) -> Result<(), HandlerErr> {
    if rec.due_date.is_malformed() {
        return Err(HandlerErr::new("bad_params", "dueDate must be a timestamp")
            .with_details(json!({ "field": "dueDate", "value": rec.due_date.raw() })));
    }
    let exists = db::class_exists(conn, rec.class_id).map_err(HandlerErr::db("db_query_failed"))?;
    if !exists {
        return Err(HandlerErr::new("not_found", "class not found")
            .with_details(json!({ "classId": rec.class_id })));
    }
    Ok(())
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let mut rec = parse_assignment_record(&req.params)?;
    rec.id = None;
    validate_for_write(conn, &rec)?;

    let assignment_id =
        db::upsert_assignment(conn, &rec).map_err(HandlerErr::db("db_insert_failed"))?;
    let assignment = db::get_assignment(conn, assignment_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "assignment vanished after insert"))?;
    Ok(json!({ "assignmentId": assignment_id, "assignment": assignment }))
}

fn handle_assignments_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let assignment_id = param_id(req, "assignmentId")?;
    let Some(patch) = req.params.get("patch") else {
        return Err(HandlerErr::new("bad_params", "missing patch"));
    };
    let existing = db::get_assignment(conn, assignment_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "assignment not found"))?;

    let base = serde_json::to_value(&existing)
        .map_err(|e| HandlerErr::new("server_error", e.to_string()))?;
    let base = base.as_object().cloned().unwrap_or_default();
    let merged = merge_patch(&base, patch)?;
    let mut rec = parse_assignment_record(&serde_json::Value::Object(merged))?;
    rec.id = Some(assignment_id);
    validate_for_write(conn, &rec)?;

    db::upsert_assignment(conn, &rec).map_err(HandlerErr::db("db_update_failed"))?;
    let assignment = db::get_assignment(conn, assignment_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "assignment not found"))?;
    Ok(json!({ "assignment": assignment }))
}

fn handle_assignments_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let assignment_id = param_id(req, "assignmentId")?;
    let removed =
        db::delete_assignment(conn, assignment_id).map_err(HandlerErr::db("db_delete_failed"))?;
    if !removed {
        return Err(HandlerErr::new("not_found", "assignment not found"));
    }
    Ok(json!({ "ok": true }))
}

fn handle_assignments_set_completed(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let assignment_id = param_id(req, "assignmentId")?;
    let completed = param_bool(req, "completed")?;
    let stamp = Timestamp::from_local(param_now(req)?);

    let updated = db::set_assignment_completed(conn, assignment_id, completed, &stamp)
        .map_err(HandlerErr::db("db_update_failed"))?;
    if !updated {
        return Err(HandlerErr::new("not_found", "assignment not found"));
    }
    let assignment = db::get_assignment(conn, assignment_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "assignment not found"))?;
    Ok(json!({ "assignment": assignment }))
}

fn handle_assignments_set_grade(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let assignment_id = param_id(req, "assignmentId")?;
    let grade = match req.params.get("grade") {
        None => return Err(HandlerErr::new("bad_params", "missing grade (use null to clear)")),
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_f64() {
            Some(g) if (0.0..=100.0).contains(&g) => Some(g),
            _ => {
                return Err(HandlerErr::new("bad_params", "grade must be a number in 0..=100")
                    .with_details(json!({ "grade": v })))
            }
        },
    };

    let updated = db::set_assignment_grade(conn, assignment_id, grade)
        .map_err(HandlerErr::db("db_update_failed"))?;
    if !updated {
        return Err(HandlerErr::new("not_found", "assignment not found"));
    }
    let assignment = db::get_assignment(conn, assignment_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "assignment not found"))?;
    Ok(json!({ "assignment": assignment }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assignments.list" => handle_assignments_list(state, req),
        "assignments.get" => handle_assignments_get(state, req),
        "assignments.create" => handle_assignments_create(state, req),
        "assignments.update" => handle_assignments_update(state, req),
        "assignments.delete" => handle_assignments_delete(state, req),
        "assignments.setCompleted" => handle_assignments_set_completed(state, req),
        "assignments.setGrade" => handle_assignments_set_grade(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
