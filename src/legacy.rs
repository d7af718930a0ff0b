//! Record normalization for the two field-naming schemes the hosted store has
//! used: the older camelCase names (`dueDate`, `classId`) and the later
//! suffixed columns (`due_date_c`, `class_id_c`). Everything past this module
//! sees only the logical camelCase names.

use crate::calc::MAX_CREDITS;
use crate::model::{ScheduleSlot, Timestamp};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("record must be a JSON object")]
    NotAnObject,
    #[error("missing required field {0}")]
    Missing(&'static str),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl RecordError {
    pub fn field(&self) -> Option<&'static str> {
        match self {
            RecordError::NotAnObject => None,
            RecordError::Missing(f) => Some(*f),
            RecordError::Invalid { field, .. } => Some(*field),
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        RecordError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

fn is_suffixed(key: &str) -> bool {
    key.len() > 2 && key.ends_with("_c")
}

/// Logical camelCase name for a stored field name.
pub fn logical_name(key: &str) -> String {
    match key {
        "Id" => return "id".to_string(),
        "Name" => return "name".to_string(),
        _ => {}
    }
    if !is_suffixed(key) {
        return key.to_string();
    }
    let stem = &key[..key.len() - 2];
    let mut out = String::with_capacity(stem.len());
    for (i, part) in stem.split('_').filter(|p| !p.is_empty()).enumerate() {
        if i == 0 {
            out.push_str(&part.to_ascii_lowercase());
            continue;
        }
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Renames every key to its logical name. A suffixed value wins over the
/// unsuffixed one unless it is null.
pub fn canonicalize(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (k, v) in raw.iter().filter(|(k, _)| !is_suffixed(k)) {
        out.insert(logical_name(k), v.clone());
    }
    for (k, v) in raw.iter().filter(|(k, _)| is_suffixed(k)) {
        let name = logical_name(k);
        if v.is_null() {
            out.entry(name).or_insert(Value::Null);
        } else {
            out.insert(name, v.clone());
        }
    }
    out
}

/// Shallow merge of a raw patch over an already-canonical record.
pub fn merge_patch(existing: &Map<String, Value>, patch: &Value) -> Result<Map<String, Value>, RecordError> {
    let Some(patch) = patch.as_object() else {
        return Err(RecordError::NotAnObject);
    };
    let mut merged = existing.clone();
    for (k, v) in canonicalize(patch) {
        merged.insert(k, v);
    }
    Ok(merged)
}

fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn opt_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    present(map, key).and_then(|v| match v {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn required_string(map: &Map<String, Value>, key: &'static str) -> Result<String, RecordError> {
    opt_string(map, key).ok_or(RecordError::Missing(key))
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        // Lookup fields come back as `{ "Id": 3, "Name": "..." }`.
        Value::Object(o) => o.get("Id").or_else(|| o.get("id")).and_then(as_int),
        _ => None,
    }
}

fn opt_int(map: &Map<String, Value>, key: &'static str) -> Result<Option<i64>, RecordError> {
    match present(map, key) {
        None => Ok(None),
        Some(v) => as_int(v)
            .map(Some)
            .ok_or_else(|| RecordError::invalid(key, "expected an integer")),
    }
}

fn opt_percent(map: &Map<String, Value>, key: &'static str) -> Result<Option<f64>, RecordError> {
    let Some(v) = present(map, key) else {
        return Ok(None);
    };
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if (0.0..=100.0).contains(&n) => Ok(Some(n)),
        Some(n) => Err(RecordError::invalid(key, format!("{n} is outside 0..=100"))),
        None => Err(RecordError::invalid(key, "expected a number")),
    }
}

fn flag(map: &Map<String, Value>, key: &'static str) -> Result<bool, RecordError> {
    match present(map, key) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Number(n)) => Ok(n.as_i64().unwrap_or(0) != 0),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(RecordError::invalid(key, "expected a boolean")),
        },
        Some(_) => Err(RecordError::invalid(key, "expected a boolean")),
    }
}

fn parse_schedule(map: &Map<String, Value>) -> Result<Vec<ScheduleSlot>, RecordError> {
    let decoded;
    let items = match present(map, "schedule") {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(Vec::new()),
        Some(Value::String(s)) => {
            decoded = serde_json::from_str::<Value>(s)
                .map_err(|e| RecordError::invalid("schedule", e.to_string()))?;
            match &decoded {
                Value::Array(items) => items,
                _ => return Err(RecordError::invalid("schedule", "expected a list of slots")),
            }
        }
        Some(_) => return Err(RecordError::invalid("schedule", "expected a list of slots")),
    };

    let mut slots = Vec::with_capacity(items.len());
    for item in items {
        let Some(obj) = item.as_object() else {
            return Err(RecordError::invalid("schedule", "slot must be an object"));
        };
        let slot = canonicalize(obj);
        // Blank rows left behind by the schedule editor.
        let Some(day_of_week) = opt_string(&slot, "dayOfWeek") else {
            continue;
        };
        slots.push(ScheduleSlot {
            day_of_week,
            start_time: opt_string(&slot, "startTime"),
            end_time: opt_string(&slot, "endTime"),
            location: opt_string(&slot, "location"),
        });
    }
    Ok(slots)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassRecord {
    pub id: Option<i64>,
    pub name: String,
    pub code: String,
    pub instructor: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub credits: i64,
    pub color: Option<String>,
    pub schedule: Vec<ScheduleSlot>,
    pub current_grade: Option<f64>,
}

pub fn parse_class_record(raw: &Value, default_credits: i64) -> Result<ClassRecord, RecordError> {
    let Some(obj) = raw.as_object() else {
        return Err(RecordError::NotAnObject);
    };
    let map = canonicalize(obj);

    let credits = match opt_int(&map, "credits")? {
        None => default_credits,
        Some(n) if n > MAX_CREDITS => {
            return Err(RecordError::invalid(
                "credits",
                format!("{n} is above the limit of {MAX_CREDITS}"),
            ))
        }
        Some(n) if n > 0 => n,
        Some(n) => return Err(RecordError::invalid("credits", format!("{n} is not positive"))),
    };

    Ok(ClassRecord {
        id: opt_int(&map, "id")?,
        name: required_string(&map, "name")?,
        code: required_string(&map, "code")?,
        instructor: opt_string(&map, "instructor"),
        department: opt_string(&map, "department"),
        location: opt_string(&map, "location"),
        credits,
        color: opt_string(&map, "color"),
        schedule: parse_schedule(&map)?,
        current_grade: opt_percent(&map, "currentGrade")?,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRecord {
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub class_id: i64,
    pub due_date: Timestamp,
    pub priority: bool,
    pub completed: bool,
    pub completed_date: Option<Timestamp>,
    pub grade: Option<f64>,
}

/// A malformed `dueDate` is kept, not rejected; callers decide whether to
/// accept it (imports) or refuse it (form input).
pub fn parse_assignment_record(raw: &Value) -> Result<AssignmentRecord, RecordError> {
    let Some(obj) = raw.as_object() else {
        return Err(RecordError::NotAnObject);
    };
    let map = canonicalize(obj);

    let class_id = opt_int(&map, "classId")?.ok_or(RecordError::Missing("classId"))?;
    let due_date = required_string(&map, "dueDate").map(|s| Timestamp::parse(&s))?;
    let completed = flag(&map, "completed")?;
    let completed_date = if completed {
        opt_string(&map, "completedDate").map(|s| Timestamp::parse(&s))
    } else {
        None
    };

    Ok(AssignmentRecord {
        id: opt_int(&map, "id")?,
        title: required_string(&map, "title")?,
        description: opt_string(&map, "description"),
        class_id,
        due_date,
        priority: flag(&map, "priority")?,
        completed,
        completed_date,
        grade: opt_percent(&map, "grade")?,
    })
}
