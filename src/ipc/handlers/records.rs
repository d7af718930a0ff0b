use crate::db;
use crate::ipc::helpers::{require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::legacy::{parse_assignment_record, parse_class_record, RecordError};
use crate::model::RecordKind;
use serde_json::json;

fn records_param<'a>(req: &'a Request, key: &str) -> Result<&'a [serde_json::Value], HandlerErr> {
    match req.params.get(key) {
        None => Ok(&[][..]),
        Some(v) if v.is_null() => Ok(&[][..]),
        Some(serde_json::Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(HandlerErr::new("bad_params", format!("{key} must be an array"))),
    }
}

fn issue(kind: RecordKind, index: usize, field: Option<&str>, message: impl Into<String>) -> serde_json::Value {
    json!({
        "kind": kind,
        "index": index,
        "field": field,
        "message": message.into(),
    })
}

fn record_issue(kind: RecordKind, index: usize, e: &RecordError) -> serde_json::Value {
    issue(kind, index, e.field(), e.to_string())
}

/// Bulk load of records exported by the hosted store, in either naming
/// scheme. Bad records are reported and skipped; the rest are kept.
fn handle_records_import(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_rows = records_param(req, "classes")?;
    let assignment_rows = records_param(req, "assignments")?;
    let config = db::load_calc_config(conn).map_err(HandlerErr::db("db_query_failed"))?;

    let mut issues: Vec<serde_json::Value> = Vec::new();

    // One batch: a store failure rolls back every record in the request.
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;

    let mut classes_imported = 0usize;
    for (index, raw) in class_rows.iter().enumerate() {
        let rec = match parse_class_record(raw, config.default_credits) {
            Ok(rec) => rec,
            Err(e) => {
                issues.push(record_issue(RecordKind::Class, index, &e));
                continue;
            }
        };
        db::upsert_class(&tx, &rec).map_err(HandlerErr::db("db_insert_failed"))?;
        classes_imported += 1;
    }

    let mut assignments_imported = 0usize;
    let mut malformed_due_dates = 0usize;
    for (index, raw) in assignment_rows.iter().enumerate() {
        let rec = match parse_assignment_record(raw) {
            Ok(rec) => rec,
            Err(e) => {
                issues.push(record_issue(RecordKind::Assignment, index, &e));
                continue;
            }
        };
        let class_known = db::class_exists(&tx, rec.class_id).map_err(HandlerErr::db("db_query_failed"))?;
        if !class_known {
            issues.push(issue(
                RecordKind::Assignment,
                index,
                Some("classId"),
                format!("class {} does not exist", rec.class_id),
            ));
            continue;
        }
        // Kept as stored so the record survives; metrics report it as a data issue.
        if rec.due_date.is_malformed() {
            tracing::warn!(index, due_date = rec.due_date.raw(), "importing assignment with unreadable due date");
            malformed_due_dates += 1;
            issues.push(issue(
                RecordKind::Assignment,
                index,
                Some("dueDate"),
                format!("unreadable due date {:?} kept as-is", rec.due_date.raw()),
            ));
        }
        db::upsert_assignment(&tx, &rec).map_err(HandlerErr::db("db_insert_failed"))?;
        assignments_imported += 1;
    }

    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    tracing::info!(
        classes_imported,
        assignments_imported,
        malformed_due_dates,
        issues = issues.len(),
        "records imported"
    );
    Ok(json!({
        "classesImported": classes_imported,
        "assignmentsImported": assignments_imported,
        "issues": issues,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "records.import" => handle_records_import(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
