use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

/// Stored timestamp text plus its local date-time, when it parses.
///
/// Records come from a hosted store that writes ISO strings with an offset,
/// while older records and form input carry naive local strings. Both are
/// accepted; anything else is kept verbatim and reported as malformed.
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamp {
    raw: String,
    parsed: Option<NaiveDateTime>,
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

impl Timestamp {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let parsed = parse_local(&raw);
        Self { raw, parsed }
    }

    pub fn from_local(dt: NaiveDateTime) -> Self {
        Self {
            raw: dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            parsed: Some(dt),
        }
    }

    pub fn value(&self) -> Option<NaiveDateTime> {
        self.parsed
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.parsed.map(|dt| dt.date())
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_malformed(&self) -> bool {
        self.parsed.is_none()
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

fn parse_local(raw: &str) -> Option<NaiveDateTime> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub day_of_week: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: i64,
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

impl ScheduleSlot {
    /// Day names are matched trimmed and case-insensitively.
    pub fn falls_on(&self, weekday: &str) -> bool {
        self.day_of_week.trim().eq_ignore_ascii_case(weekday.trim())
    }
}

impl Class {
    pub fn meets_on(&self, weekday: &str) -> bool {
        self.schedule.iter().any(|s| s.falls_on(weekday))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub class_id: i64,
    pub due_date: Timestamp,
    pub priority: bool,
    pub completed: bool,
    pub completed_date: Option<Timestamp>,
    pub grade: Option<f64>,
}

impl Assignment {
    /// Completed and carrying a score; the only assignments grade math sees.
    pub fn scored_grade(&self) -> Option<f64> {
        if self.completed {
            self.grade
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    Class,
    Assignment,
}

/// A record the engine skipped because one of its fields is unusable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIssue {
    pub kind: RecordKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub field: String,
    pub message: String,
}

impl DataIssue {
    pub fn malformed_due_date(a: &Assignment) -> Self {
        Self {
            kind: RecordKind::Assignment,
            id: Some(a.id),
            field: "dueDate".to_string(),
            message: format!("unparseable due date: {:?}", a.due_date.raw()),
        }
    }
}
