use crate::model::{Assignment, Class, ScheduleSlot};
use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledClass<'a> {
    pub class: &'a Class,
    pub slots: Vec<&'a ScheduleSlot>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAgenda<'a> {
    pub date: NaiveDate,
    pub weekday: &'static str,
    pub assignments: Vec<&'a Assignment>,
    pub classes: Vec<ScheduledClass<'a>>,
}

pub fn assignments_due_on(date: NaiveDate, assignments: &[Assignment]) -> Vec<&Assignment> {
    let mut due: Vec<&Assignment> = assignments
        .iter()
        .filter(|a| a.due_date.date() == Some(date))
        .collect();
    due.sort_by_key(|a| a.due_date.value());
    due
}

pub fn classes_meeting_on<'a>(date: NaiveDate, classes: &'a [Class]) -> Vec<ScheduledClass<'a>> {
    let weekday = weekday_name(date);
    classes
        .iter()
        .filter_map(|c| {
            let slots: Vec<&ScheduleSlot> = c
                .schedule
                .iter()
                .filter(|s| s.falls_on(weekday))
                .collect();
            if slots.is_empty() {
                None
            } else {
                Some(ScheduledClass { class: c, slots })
            }
        })
        .collect()
}

pub fn day_agenda<'a>(
    date: NaiveDate,
    classes: &'a [Class],
    assignments: &'a [Assignment],
) -> DayAgenda<'a> {
    DayAgenda {
        date,
        weekday: weekday_name(date),
        assignments: assignments_due_on(date, assignments),
        classes: classes_meeting_on(date, classes),
    }
}

fn first_of_month(anchor: NaiveDate) -> NaiveDate {
    anchor.with_day(1).unwrap_or(anchor)
}

/// Whole Sunday-to-Saturday weeks covering `anchor`'s month.
pub fn month_grid(anchor: NaiveDate) -> Vec<NaiveDate> {
    let first = first_of_month(anchor);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(first);

    let lead = u64::from(first.weekday().num_days_from_sunday());
    let trail = 6 - u64::from(last.weekday().num_days_from_sunday());
    let start = first.checked_sub_days(Days::new(lead)).unwrap_or(first);
    let end = last.checked_add_days(Days::new(trail)).unwrap_or(last);

    start.iter_days().take_while(|d| *d <= end).collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay<'a> {
    pub in_month: bool,
    pub is_today: bool,
    #[serde(flatten)]
    pub agenda: DayAgenda<'a>,
}

pub fn month_view<'a>(
    anchor: NaiveDate,
    now: NaiveDateTime,
    classes: &'a [Class],
    assignments: &'a [Assignment],
) -> Vec<CalendarDay<'a>> {
    month_grid(anchor)
        .into_iter()
        .map(|date| CalendarDay {
            in_month: date.month() == anchor.month() && date.year() == anchor.year(),
            is_today: date == now.date(),
            agenda: day_agenda(date, classes, assignments),
        })
        .collect()
}
