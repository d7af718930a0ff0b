use crate::calc::{
    self, assignment_status, class_grade, days_until, grade_distribution, grade_points,
    overall_gpa, round_half_up, AssignmentStatus, CalcConfig, CalcError, ClassGrade,
    GradeDistribution,
};
use crate::calendar::weekday_name;
use crate::model::{Assignment, Class};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

const RECENT_GRADES_SHOWN: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingAssignment<'a> {
    pub assignment: &'a Assignment,
    #[serde(flatten)]
    pub status: AssignmentStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary<'a> {
    pub total_classes: usize,
    pub upcoming_assignments: usize,
    pub completed_today: usize,
    pub average_grade: Option<f64>,
    pub todays_classes: Vec<&'a Class>,
    pub upcoming: Vec<UpcomingAssignment<'a>>,
}

pub fn dashboard_summary<'a>(
    classes: &'a [Class],
    assignments: &'a [Assignment],
    now: NaiveDateTime,
    cfg: &CalcConfig,
) -> DashboardSummary<'a> {
    let today = now.date();

    let open_ahead: Vec<(&Assignment, i64)> = assignments
        .iter()
        .filter(|a| !a.completed)
        .filter_map(|a| a.due_date.value().map(|due| (a, days_until(due, now))))
        .filter(|(_, days)| *days >= 0)
        .collect();

    let completed_today = assignments
        .iter()
        .filter(|a| a.completed)
        .filter(|a| a.completed_date.as_ref().and_then(|t| t.date()) == Some(today))
        .count();

    let grades: Vec<f64> = classes
        .iter()
        .filter_map(|c| class_grade(c, assignments).map(|g| g.value))
        .collect();
    let average_grade = mean(&grades).map(round_half_up);

    let weekday = weekday_name(today);
    let todays_classes = classes.iter().filter(|c| c.meets_on(weekday)).collect();

    let mut soon: Vec<&Assignment> = open_ahead
        .iter()
        .filter(|(_, days)| *days <= cfg.upcoming_window_days)
        .map(|(a, _)| *a)
        .collect();
    soon.sort_by_key(|a| a.due_date.value());
    let upcoming = soon
        .into_iter()
        .take(cfg.upcoming_limit)
        .filter_map(|a| {
            assignment_status(a, now, cfg.due_soon_days)
                .map(|status| UpcomingAssignment { assignment: a, status })
        })
        .collect();

    DashboardSummary {
        total_classes: classes.len(),
        upcoming_assignments: open_ahead.len(),
        completed_today,
        average_grade,
        todays_classes,
        upcoming,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentGrade<'a> {
    pub assignment_id: i64,
    pub title: &'a str,
    pub grade: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGradeRow<'a> {
    pub class_id: i64,
    pub name: &'a str,
    pub code: &'a str,
    pub credits: i64,
    pub grade: Option<ClassGrade>,
    pub grade_points: Option<f64>,
    pub graded_count: usize,
    pub recent_grades: Vec<RecentGrade<'a>>,
}

pub fn class_grade_rows<'a>(
    classes: &'a [Class],
    assignments: &'a [Assignment],
) -> Vec<ClassGradeRow<'a>> {
    classes
        .iter()
        .map(|c| {
            let graded: Vec<&Assignment> = assignments
                .iter()
                .filter(|a| a.class_id == c.id && a.scored_grade().is_some())
                .collect();
            let skip = graded.len().saturating_sub(RECENT_GRADES_SHOWN);
            let recent_grades = graded
                .iter()
                .skip(skip)
                .filter_map(|a| {
                    a.scored_grade().map(|grade| RecentGrade {
                        assignment_id: a.id,
                        title: &a.title,
                        grade,
                    })
                })
                .collect();
            let grade = class_grade(c, assignments);
            ClassGradeRow {
                class_id: c.id,
                name: &c.name,
                code: &c.code,
                credits: c.credits,
                grade,
                grade_points: grade.map(|g| grade_points(g.value)),
                graded_count: graded.len(),
                recent_grades,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradesSummary<'a> {
    pub overall_gpa: Option<f64>,
    pub gpa_credits: i64,
    pub total_classes: usize,
    pub graded_assignments: usize,
    pub average_grade: Option<f64>,
    pub distribution: GradeDistribution,
    pub classes: Vec<ClassGradeRow<'a>>,
}

pub fn grades_summary<'a>(classes: &'a [Class], assignments: &'a [Assignment]) -> GradesSummary<'a> {
    let scored: Vec<f64> = assignments.iter().filter_map(|a| a.scored_grade()).collect();
    let gpa = overall_gpa(classes, assignments);
    GradesSummary {
        overall_gpa: gpa.map(|g| g.value),
        gpa_credits: gpa.map(|g| g.credits).unwrap_or(0),
        total_classes: classes.len(),
        graded_assignments: scored.len(),
        average_grade: mean(&scored).map(round_half_up),
        distribution: grade_distribution(assignments),
        classes: class_grade_rows(classes, assignments),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusFilter {
    #[default]
    All,
    Upcoming,
    Completed,
    Overdue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    DueDate,
    Priority,
    Class,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentQuery {
    pub class_id: Option<i64>,
    pub status: StatusFilter,
    pub sort_by: SortBy,
}

pub fn parse_assignment_query(raw: Option<&serde_json::Value>) -> Result<AssignmentQuery, CalcError> {
    let Some(raw) = raw else {
        return Ok(AssignmentQuery::default());
    };
    if raw.is_null() {
        return Ok(AssignmentQuery::default());
    }
    let Some(obj) = raw.as_object() else {
        return Err(CalcError::new("bad_params", "filters must be an object"));
    };

    let class_id = match obj.get("classId") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) if v.as_str().map(|s| s.trim().is_empty()).unwrap_or(false) => None,
        Some(v) => {
            let parsed = v
                .as_i64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()));
            let Some(n) = parsed else {
                return Err(CalcError::new("bad_params", "filters.classId must be an integer"));
            };
            Some(n)
        }
    };

    let status = match obj.get("status").and_then(|v| v.as_str()).map(str::trim) {
        None | Some("") | Some("all") => StatusFilter::All,
        Some("upcoming") => StatusFilter::Upcoming,
        Some("completed") => StatusFilter::Completed,
        Some("overdue") => StatusFilter::Overdue,
        Some(other) => {
            return Err(CalcError::new(
                "bad_params",
                format!("unknown filters.status: {other}"),
            ))
        }
    };

    let sort_by = match obj.get("sortBy").and_then(|v| v.as_str()).map(str::trim) {
        None | Some("") | Some("dueDate") => SortBy::DueDate,
        Some("priority") => SortBy::Priority,
        Some("class") => SortBy::Class,
        Some(other) => {
            return Err(CalcError::new(
                "bad_params",
                format!("unknown filters.sortBy: {other}"),
            ))
        }
    };

    Ok(AssignmentQuery {
        class_id,
        status,
        sort_by,
    })
}

fn matches_status(a: &Assignment, status: StatusFilter, now: NaiveDateTime) -> bool {
    let days = a.due_date.value().map(|due| calc::days_until(due, now));
    match status {
        StatusFilter::All => true,
        StatusFilter::Completed => a.completed,
        StatusFilter::Upcoming => !a.completed && days.map(|d| d >= 0).unwrap_or(false),
        StatusFilter::Overdue => !a.completed && days.map(|d| d < 0).unwrap_or(false),
    }
}

pub fn select_assignments<'a>(
    assignments: &'a [Assignment],
    classes: &[Class],
    query: &AssignmentQuery,
    now: NaiveDateTime,
) -> Vec<&'a Assignment> {
    let mut out: Vec<&Assignment> = assignments
        .iter()
        .filter(|a| query.class_id.map(|id| a.class_id == id).unwrap_or(true))
        .filter(|a| matches_status(a, query.status, now))
        .collect();

    match query.sort_by {
        SortBy::DueDate => out.sort_by(|a, b| match (a.due_date.value(), b.due_date.value()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortBy::Priority => out.sort_by_key(|a| !a.priority),
        SortBy::Class => {
            let names: HashMap<i64, &str> =
                classes.iter().map(|c| (c.id, c.name.as_str())).collect();
            out.sort_by(|a, b| {
                let x = names.get(&a.class_id).copied().unwrap_or("");
                let y = names.get(&b.class_id).copied().unwrap_or("");
                x.to_lowercase().cmp(&y.to_lowercase())
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::tests::{assignment, at, class};
    use crate::calc::DueStatus;
    use crate::model::Timestamp;

    #[test]
    fn dashboard_counts_upcoming_and_completed_today() {
        let now = at(2026, 10, 19, 10, 0);
        let classes = vec![class(1, 3, Some(90.0)), class(2, 3, None)];
        let mut done_today = assignment(1, 1, "2026-10-18T09:00", Some(70.0));
        done_today.completed_date = Some(Timestamp::parse("2026-10-19T08:30"));
        let items = vec![
            done_today,
            assignment(2, 2, "2026-10-19T23:00", None),
            assignment(3, 2, "2026-10-21T09:00", None),
            assignment(4, 2, "2026-10-30T09:00", None),
            assignment(5, 2, "2026-10-10T09:00", None),
            assignment(6, 2, "not a date", None),
        ];
        let s = dashboard_summary(&classes, &items, now, &CalcConfig::default());
        assert_eq!(s.total_classes, 2);
        assert_eq!(s.upcoming_assignments, 3);
        assert_eq!(s.completed_today, 1);
        // class 1 override 90, class 2 has no scored work
        assert_eq!(s.average_grade, Some(90.0));
        assert_eq!(s.todays_classes.len(), 2);
        let ids: Vec<i64> = s.upcoming.iter().map(|u| u.assignment.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(s.upcoming[0].status.status, DueStatus::DueToday);
    }

    #[test]
    fn dashboard_upcoming_list_respects_limit() {
        let now = at(2026, 10, 19, 10, 0);
        let items: Vec<Assignment> = (1..=8)
            .map(|i| assignment(i, 1, &format!("2026-10-{:02}T09:00", 19 + i), None))
            .collect();
        let cfg = CalcConfig {
            upcoming_limit: 2,
            ..CalcConfig::default()
        };
        let s = dashboard_summary(&[], &items, now, &cfg);
        assert_eq!(s.upcoming.len(), 2);
        assert_eq!(s.upcoming[0].assignment.id, 1);
        assert_eq!(s.average_grade, None);
    }

    #[test]
    fn grades_summary_rolls_up_classes() {
        let classes = vec![class(1, 3, None), class(2, 4, Some(84.0)), class(3, 2, None)];
        let items = vec![
            assignment(1, 1, "2026-10-01", Some(95.0)),
            assignment(2, 1, "2026-10-02", Some(99.0)),
            assignment(3, 2, "2026-10-02", Some(50.0)),
            assignment(4, 3, "2026-10-02", None),
        ];
        let s = grades_summary(&classes, &items);
        // class 1 -> 97 (4.0, 3cr), class 2 -> 84 override (2.7, 4cr), class 3 ungraded
        assert_eq!(s.overall_gpa, Some(3.26));
        assert_eq!(s.gpa_credits, 7);
        assert_eq!(s.graded_assignments, 3);
        assert_eq!(s.average_grade, Some(81.0));
        assert_eq!(s.classes.len(), 3);
        assert_eq!(s.classes[0].grade.map(|g| g.value), Some(97.0));
        assert_eq!(s.classes[0].graded_count, 2);
        assert_eq!(s.classes[2].grade, None);
        assert_eq!(s.classes[2].grade_points, None);
    }

    #[test]
    fn recent_grades_keep_the_last_five() {
        let classes = vec![class(1, 3, None)];
        let items: Vec<Assignment> = (1..=7)
            .map(|i| assignment(i, 1, "2026-10-01", Some(70.0 + i as f64)))
            .collect();
        let rows = class_grade_rows(&classes, &items);
        let ids: Vec<i64> = rows[0].recent_grades.iter().map(|r| r.assignment_id).collect();
        assert_eq!(ids, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn query_parsing_defaults_and_rejects_unknown_values() {
        assert_eq!(parse_assignment_query(None).expect("default"), AssignmentQuery::default());
        let q = parse_assignment_query(Some(&serde_json::json!({
            "classId": "4",
            "status": "overdue",
            "sortBy": "priority"
        })))
        .expect("query");
        assert_eq!(q.class_id, Some(4));
        assert_eq!(q.status, StatusFilter::Overdue);
        assert_eq!(q.sort_by, SortBy::Priority);

        let err = parse_assignment_query(Some(&serde_json::json!({ "status": "late" })))
            .expect_err("bad status");
        assert_eq!(err.code, "bad_params");
    }

    #[test]
    fn select_filters_and_sorts() {
        let now = at(2026, 10, 19, 10, 0);
        let mut b = class(2, 3, None);
        b.name = "Biology".to_string();
        let mut a = class(1, 3, None);
        a.name = "Algebra".to_string();
        let classes = vec![b, a];

        let mut flagged = assignment(3, 1, "2026-10-25T09:00", None);
        flagged.priority = true;
        let items = vec![
            assignment(1, 2, "2026-10-22T09:00", None),
            assignment(2, 2, "2026-10-01T09:00", None),
            flagged,
            assignment(4, 1, "2026-10-02T09:00", Some(88.0)),
            assignment(5, 1, "bad", None),
        ];

        let overdue = select_assignments(
            &items,
            &classes,
            &AssignmentQuery {
                status: StatusFilter::Overdue,
                ..AssignmentQuery::default()
            },
            now,
        );
        assert_eq!(overdue.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2]);

        let by_due = select_assignments(&items, &classes, &AssignmentQuery::default(), now);
        assert_eq!(by_due.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2, 4, 1, 3, 5]);

        let by_priority = select_assignments(
            &items,
            &classes,
            &AssignmentQuery {
                sort_by: SortBy::Priority,
                ..AssignmentQuery::default()
            },
            now,
        );
        assert_eq!(by_priority[0].id, 3);

        let by_class = select_assignments(
            &items,
            &classes,
            &AssignmentQuery {
                sort_by: SortBy::Class,
                status: StatusFilter::Upcoming,
                ..AssignmentQuery::default()
            },
            now,
        );
        assert_eq!(by_class.iter().map(|a| a.id).collect::<Vec<_>>(), vec![3, 1]);

        let in_class = select_assignments(
            &items,
            &classes,
            &AssignmentQuery {
                class_id: Some(1),
                status: StatusFilter::Completed,
                ..AssignmentQuery::default()
            },
            now,
        );
        assert_eq!(in_class.iter().map(|a| a.id).collect::<Vec<_>>(), vec![4]);
    }
}
