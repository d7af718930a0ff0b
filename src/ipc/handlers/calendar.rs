use crate::calc::due_date_issues;
use crate::calendar::{day_agenda, month_view};
use crate::ipc::helpers::{load_snapshot, param_date, param_now, param_str, require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Timestamp;
use chrono::NaiveDate;
use serde_json::json;

fn handle_calendar_day(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let date = param_date(req, "date")?;
    let snap = load_snapshot(conn)?;
    Ok(json!({
        "day": day_agenda(date, &snap.classes, &snap.assignments),
        "dataIssues": due_date_issues(&snap.assignments),
    }))
}

/// `"YYYY-MM"`, or any date inside the month.
fn parse_month(raw: &str) -> Option<NaiveDate> {
    let padded = if raw.len() == 7 {
        format!("{raw}-01")
    } else {
        raw.to_string()
    };
    Timestamp::parse(&padded).date()
}

fn handle_calendar_month(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let now = param_now(req)?;
    let anchor = match req.params.get("month").filter(|v| !v.is_null()) {
        None => now.date(),
        Some(_) => {
            let raw = param_str(req, "month")?;
            parse_month(raw).ok_or_else(|| {
                HandlerErr::new("bad_params", "month must look like YYYY-MM")
                    .with_details(json!({ "month": raw }))
            })?
        }
    };
    let snap = load_snapshot(conn)?;
    let days = month_view(anchor, now, &snap.classes, &snap.assignments);
    Ok(json!({
        "month": anchor.format("%Y-%m").to_string(),
        "days": days,
        "dataIssues": due_date_issues(&snap.assignments),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "calendar.day" => handle_calendar_day(state, req),
        "calendar.month" => handle_calendar_month(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
