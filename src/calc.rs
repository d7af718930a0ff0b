use crate::model::{Assignment, Class, DataIssue};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DUE_SOON_DAYS: i64 = 3;
pub const DEFAULT_CREDITS: i64 = 3;
/// Upper bound on a single class's credit count.
pub const MAX_CREDITS: i64 = 30;

/// Percent thresholds onto the 4.0 scale, highest first.
const GRADE_POINT_SCALE: [(f64, f64); 11] = [
    (97.0, 4.0),
    (93.0, 3.7),
    (90.0, 3.3),
    (87.0, 3.0),
    (83.0, 2.7),
    (80.0, 2.3),
    (77.0, 2.0),
    (73.0, 1.7),
    (70.0, 1.3),
    (67.0, 1.0),
    (65.0, 0.7),
];

/// Half-up rounding to a whole number: `floor(x + 0.5)`.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

pub fn round_to_hundredths(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcConfig {
    pub due_soon_days: i64,
    pub upcoming_window_days: i64,
    pub upcoming_limit: usize,
    pub default_credits: i64,
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            due_soon_days: DEFAULT_DUE_SOON_DAYS,
            upcoming_window_days: 7,
            upcoming_limit: 5,
            default_credits: DEFAULT_CREDITS,
        }
    }
}

fn positive_int(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> Result<Option<i64>, CalcError> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_i64() {
            Some(n) if n > 0 => Ok(Some(n)),
            _ => Err(CalcError::new(
                "bad_params",
                format!("{key} must be a positive integer"),
            )),
        },
    }
}

/// Applies a partial `calc.config.update` payload on top of `current`.
pub fn parse_calc_config_patch(
    current: &CalcConfig,
    raw: &serde_json::Value,
) -> Result<CalcConfig, CalcError> {
    let Some(obj) = raw.as_object() else {
        return Err(CalcError::new("bad_params", "config patch must be an object"));
    };
    let mut next = *current;
    if let Some(n) = positive_int(obj, "dueSoonDays")? {
        next.due_soon_days = n;
    }
    if let Some(n) = positive_int(obj, "upcomingWindowDays")? {
        next.upcoming_window_days = n;
    }
    if let Some(n) = positive_int(obj, "upcomingLimit")? {
        next.upcoming_limit = n as usize;
    }
    if let Some(n) = positive_int(obj, "defaultCredits")? {
        if n > MAX_CREDITS {
            return Err(CalcError::new(
                "bad_params",
                format!("defaultCredits must be at most {MAX_CREDITS}"),
            ));
        }
        next.default_credits = n;
    }
    Ok(next)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DueStatus {
    Completed,
    Overdue,
    DueToday,
    DueSoon { days: i64 },
    Scheduled { date: NaiveDate },
}

/// Whole calendar days from `now` to `due`; negative once the day has passed.
pub fn days_until(due: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (due.date() - now.date()).num_days()
}

pub fn classify_due_within(
    due: NaiveDateTime,
    completed: bool,
    now: NaiveDateTime,
    due_soon_days: i64,
) -> DueStatus {
    if completed {
        return DueStatus::Completed;
    }
    let days = days_until(due, now);
    if days < 0 {
        DueStatus::Overdue
    } else if days == 0 {
        DueStatus::DueToday
    } else if days <= due_soon_days {
        DueStatus::DueSoon { days }
    } else {
        DueStatus::Scheduled { date: due.date() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStatus {
    pub assignment_id: i64,
    pub days_until: i64,
    #[serde(flatten)]
    pub status: DueStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub statuses: Vec<AssignmentStatus>,
    pub data_issues: Vec<DataIssue>,
}

pub fn assignment_status(
    a: &Assignment,
    now: NaiveDateTime,
    due_soon_days: i64,
) -> Option<AssignmentStatus> {
    let due = a.due_date.value()?;
    Some(AssignmentStatus {
        assignment_id: a.id,
        days_until: days_until(due, now),
        status: classify_due_within(due, a.completed, now, due_soon_days),
    })
}

pub fn classify_assignments(
    assignments: &[Assignment],
    now: NaiveDateTime,
    due_soon_days: i64,
) -> StatusReport {
    let mut report = StatusReport::default();
    for a in assignments {
        match assignment_status(a, now, due_soon_days) {
            Some(s) => report.statuses.push(s),
            None => report.data_issues.push(DataIssue::malformed_due_date(a)),
        }
    }
    report
}

pub fn due_date_issues(assignments: &[Assignment]) -> Vec<DataIssue> {
    assignments
        .iter()
        .filter(|a| a.due_date.is_malformed())
        .map(DataIssue::malformed_due_date)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GradeSource {
    Override,
    Computed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGrade {
    pub value: f64,
    pub source: GradeSource,
}

/// Rounded mean of completed, scored assignments in the class.
pub fn computed_class_average(class_id: i64, assignments: &[Assignment]) -> Option<f64> {
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for a in assignments.iter().filter(|a| a.class_id == class_id) {
        if let Some(g) = a.scored_grade() {
            sum += g;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(round_half_up(sum / count as f64))
}

pub fn class_grade(class: &Class, assignments: &[Assignment]) -> Option<ClassGrade> {
    if let Some(value) = class.current_grade {
        return Some(ClassGrade {
            value,
            source: GradeSource::Override,
        });
    }
    computed_class_average(class.id, assignments).map(|value| ClassGrade {
        value,
        source: GradeSource::Computed,
    })
}

pub fn grade_points(percent: f64) -> f64 {
    GRADE_POINT_SCALE
        .iter()
        .find(|(min, _)| percent >= *min)
        .map(|(_, gp)| *gp)
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gpa {
    pub value: f64,
    pub credits: i64,
    pub classes_counted: usize,
}

/// Credit-weighted grade points over `(credits, percent)` pairs.
pub fn weighted_gpa<I>(graded: I) -> Option<Gpa>
where
    I: IntoIterator<Item = (i64, f64)>,
{
    let mut points = 0.0_f64;
    let mut credits = 0_i64;
    let mut classes_counted = 0_usize;
    for (c, percent) in graded {
        if c <= 0 {
            continue;
        }
        // Out-of-range stored credits make the average meaningless.
        credits = credits.checked_add(c)?;
        points += grade_points(percent) * c as f64;
        classes_counted += 1;
    }
    if credits == 0 {
        return None;
    }
    Some(Gpa {
        value: round_to_hundredths(points / credits as f64),
        credits,
        classes_counted,
    })
}

pub fn overall_gpa(classes: &[Class], assignments: &[Assignment]) -> Option<Gpa> {
    weighted_gpa(
        classes
            .iter()
            .filter_map(|c| class_grade(c, assignments).map(|g| (c.credits, g.value))),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradeBand {
    A,
    B,
    C,
    #[serde(rename = "D/F")]
    DF,
}

pub fn grade_band(grade: f64) -> GradeBand {
    if grade >= 90.0 {
        GradeBand::A
    } else if grade >= 80.0 {
        GradeBand::B
    } else if grade >= 70.0 {
        GradeBand::C
    } else {
        GradeBand::DF
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeDistribution {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub d_f: usize,
}

pub fn grade_distribution(assignments: &[Assignment]) -> GradeDistribution {
    let mut dist = GradeDistribution::default();
    for g in assignments.iter().filter_map(|a| a.scored_grade()) {
        match grade_band(g) {
            GradeBand::A => dist.a += 1,
            GradeBand::B => dist.b += 1,
            GradeBand::C => dist.c += 1,
            GradeBand::DF => dist.d_f += 1,
        }
    }
    dist
}
