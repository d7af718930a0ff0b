use crate::calc::{classify_assignments, due_date_issues, grade_distribution, overall_gpa};
use crate::ipc::helpers::{load_snapshot, param_now, require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::summary::{class_grade_rows, dashboard_summary, grades_summary};
use serde_json::json;

fn handle_due_status(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let now = param_now(req)?;
    let snap = load_snapshot(conn)?;
    let report = classify_assignments(&snap.assignments, now, snap.config.due_soon_days);
    Ok(json!({
        "statuses": report.statuses,
        "dataIssues": report.data_issues,
    }))
}

fn handle_class_grades(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let snap = load_snapshot(conn)?;
    Ok(json!({ "classes": class_grade_rows(&snap.classes, &snap.assignments) }))
}

fn handle_gpa(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let snap = load_snapshot(conn)?;
    // No graded class yet: gpa is null, not 0.0.
    let gpa = overall_gpa(&snap.classes, &snap.assignments);
    Ok(json!({
        "gpa": gpa.map(|g| g.value),
        "credits": gpa.map(|g| g.credits).unwrap_or(0),
        "classesCounted": gpa.map(|g| g.classes_counted).unwrap_or(0),
    }))
}

fn handle_grade_distribution(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let snap = load_snapshot(conn)?;
    Ok(json!({ "distribution": grade_distribution(&snap.assignments) }))
}

fn handle_grades_summary(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let snap = load_snapshot(conn)?;
    Ok(json!({ "summary": grades_summary(&snap.classes, &snap.assignments) }))
}

fn handle_dashboard(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let now = param_now(req)?;
    let snap = load_snapshot(conn)?;
    let summary = dashboard_summary(&snap.classes, &snap.assignments, now, &snap.config);
    Ok(json!({
        "summary": summary,
        "dataIssues": due_date_issues(&snap.assignments),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "calc.dueStatus" => handle_due_status(state, req),
        "calc.classGrades" => handle_class_grades(state, req),
        "calc.gpa" => handle_gpa(state, req),
        "calc.gradeDistribution" => handle_grade_distribution(state, req),
        "calc.gradesSummary" => handle_grades_summary(state, req),
        "calc.dashboard" => handle_dashboard(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
