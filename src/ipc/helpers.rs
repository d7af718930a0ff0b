use crate::calc::{CalcConfig, CalcError};
use crate::db;
use crate::ipc::types::{AppState, Request};
use crate::legacy::RecordError;
use crate::model::{Assignment, Class, Timestamp};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({ "id": id, "ok": true, "result": result })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({ "code": code, "message": message.into() });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({ "id": id, "ok": false, "error": error })
}

/// Failure of a single handler, rendered as an error response by [`respond`].
pub struct HandlerErr {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// `map_err` adapter for store calls.
    pub fn db(code: &'static str) -> impl Fn(anyhow::Error) -> HandlerErr {
        move |e| HandlerErr::new(code, format!("{e:#}"))
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, &self.code, self.message, self.details)
    }
}

impl From<CalcError> for HandlerErr {
    fn from(e: CalcError) -> Self {
        Self {
            code: e.code,
            message: e.message,
            details: e.details,
        }
    }
}

impl From<RecordError> for HandlerErr {
    fn from(e: RecordError) -> Self {
        let details = e.field().map(|f| json!({ "field": f }));
        Self {
            code: "bad_params".to_string(),
            message: e.to_string(),
            details,
        }
    }
}

pub fn respond(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::warn!(method = %req.method, code = %e.code, message = %e.message, "request failed");
            e.response(&req.id)
        }
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn as_id(v: &serde_json::Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
}

pub fn param_id(req: &Request, key: &str) -> Result<i64, HandlerErr> {
    let Some(v) = req.params.get(key).filter(|v| !v.is_null()) else {
        return Err(HandlerErr::new("bad_params", format!("missing {key}")));
    };
    as_id(v).ok_or_else(|| HandlerErr::new("bad_params", format!("{key} must be an integer")))
}

pub fn param_bool(req: &Request, key: &str) -> Result<bool, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("{key} must be a boolean")))
}

pub fn param_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing params.{key}")))
}

/// `params.now` as a local timestamp, or the wall clock when absent.
pub fn param_now(req: &Request) -> Result<NaiveDateTime, HandlerErr> {
    match req.params.get("now").and_then(|v| v.as_str()) {
        None => Ok(chrono::Local::now().naive_local()),
        Some(s) => Timestamp::parse(s).value().ok_or_else(|| {
            HandlerErr::new("bad_params", "now must be a timestamp")
                .with_details(json!({ "now": s }))
        }),
    }
}

pub fn param_date(req: &Request, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = param_str(req, key)?;
    Timestamp::parse(raw).date().ok_or_else(|| {
        HandlerErr::new("bad_params", format!("{key} must be a date (YYYY-MM-DD)"))
            .with_details(json!({ "param": key, "value": raw }))
    })
}

/// Everything the metric handlers compute over, read in one pass.
pub struct Snapshot {
    pub classes: Vec<Class>,
    pub assignments: Vec<Assignment>,
    pub config: CalcConfig,
}

pub fn load_snapshot(conn: &Connection) -> Result<Snapshot, HandlerErr> {
    let query_failed = HandlerErr::db("db_query_failed");
    Ok(Snapshot {
        classes: db::list_classes(conn).map_err(&query_failed)?,
        assignments: db::list_assignments(conn).map_err(&query_failed)?,
        config: db::load_calc_config(conn).map_err(&query_failed)?,
    })
}
