use crate::calc::CalcConfig;
use crate::legacy::{AssignmentRecord, ClassRecord};
use crate::model::{Assignment, Class, ScheduleSlot, Timestamp};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DB_FILE: &str = "studyflow.sqlite3";
pub const CALC_CONFIG_KEY: &str = "calc.config";

pub fn db_path(workspace: &Path) -> PathBuf {
    workspace.join(DB_FILE)
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(db_path(workspace))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT NOT NULL,
            instructor TEXT,
            department TEXT,
            location TEXT,
            credits INTEGER NOT NULL DEFAULT 3,
            color TEXT,
            current_grade REAL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_schedule_slots(
            class_id INTEGER NOT NULL,
            sort_order INTEGER NOT NULL,
            day_of_week TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            location TEXT,
            PRIMARY KEY(class_id, sort_order),
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id INTEGER PRIMARY KEY,
            class_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            due_date TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            completed INTEGER NOT NULL DEFAULT 0,
            completed_date TEXT,
            grade REAL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_class ON assignments(class_id)",
        [],
    )?;

    // Workspaces created before descriptions and edit stamps were tracked.
    ensure_assignments_description(&conn)?;
    ensure_assignments_updated_at(&conn)?;
    migrate_completed_dates(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_assignments_description(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "assignments", "description")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE assignments ADD COLUMN description TEXT", [])?;
    Ok(())
}

fn ensure_assignments_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "assignments", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE assignments ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn migrate_completed_dates(conn: &Connection) -> anyhow::Result<()> {
    // completed_date is present iff completed. Older rows kept the stamp after
    // an assignment was reopened; completed rows without one keep their due date.
    conn.execute(
        "UPDATE assignments SET completed_date = NULL
         WHERE completed = 0 AND completed_date IS NOT NULL",
        [],
    )?;
    conn.execute(
        "UPDATE assignments SET completed_date = due_date
         WHERE completed <> 0 AND completed_date IS NULL",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn now_stamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let text: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match text {
        Some(t) => Ok(Some(
            serde_json::from_str(&t).with_context(|| format!("setting {key} is not valid JSON"))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Stored config, falling back to defaults for a missing or unreadable entry.
pub fn load_calc_config(conn: &Connection) -> anyhow::Result<CalcConfig> {
    let Some(v) = settings_get_json(conn, CALC_CONFIG_KEY)? else {
        return Ok(CalcConfig::default());
    };
    match serde_json::from_value::<CalcConfig>(v) {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable calc.config");
            Ok(CalcConfig::default())
        }
    }
}

pub fn save_calc_config(conn: &Connection, cfg: &CalcConfig) -> anyhow::Result<()> {
    settings_set_json(conn, CALC_CONFIG_KEY, &serde_json::to_value(cfg)?)
}

fn load_schedules(conn: &Connection) -> anyhow::Result<HashMap<i64, Vec<ScheduleSlot>>> {
    let mut stmt = conn.prepare(
        "SELECT class_id, day_of_week, start_time, end_time, location
         FROM class_schedule_slots
         ORDER BY class_id, sort_order",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                ScheduleSlot {
                    day_of_week: r.get(1)?,
                    start_time: r.get(2)?,
                    end_time: r.get(3)?,
                    location: r.get(4)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let mut by_class: HashMap<i64, Vec<ScheduleSlot>> = HashMap::new();
    for (class_id, slot) in rows {
        by_class.entry(class_id).or_default().push(slot);
    }
    Ok(by_class)
}

const CLASS_COLUMNS: &str =
    "id, name, code, instructor, department, location, credits, color, current_grade";

fn class_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: r.get(0)?,
        name: r.get(1)?,
        code: r.get(2)?,
        instructor: r.get(3)?,
        department: r.get(4)?,
        location: r.get(5)?,
        credits: r.get(6)?,
        color: r.get(7)?,
        schedule: Vec::new(),
        current_grade: r.get(8)?,
    })
}

pub fn list_classes(conn: &Connection) -> anyhow::Result<Vec<Class>> {
    let mut schedules = load_schedules(conn)?;
    let sql = format!("SELECT {CLASS_COLUMNS} FROM classes ORDER BY name, id");
    let mut stmt = conn.prepare(&sql)?;
    let mut classes = stmt
        .query_map([], class_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for c in &mut classes {
        c.schedule = schedules.remove(&c.id).unwrap_or_default();
    }
    Ok(classes)
}

pub fn get_class(conn: &Connection, class_id: i64) -> anyhow::Result<Option<Class>> {
    let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = ?");
    let class = conn.query_row(&sql, [class_id], class_from_row).optional()?;
    let Some(mut class) = class else {
        return Ok(None);
    };
    let mut stmt = conn.prepare(
        "SELECT day_of_week, start_time, end_time, location
         FROM class_schedule_slots
         WHERE class_id = ?
         ORDER BY sort_order",
    )?;
    class.schedule = stmt
        .query_map([class_id], |r| {
            Ok(ScheduleSlot {
                day_of_week: r.get(0)?,
                start_time: r.get(1)?,
                end_time: r.get(2)?,
                location: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(class))
}

pub fn class_exists(conn: &Connection, class_id: i64) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn write_schedule(conn: &Connection, class_id: i64, slots: &[ScheduleSlot]) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM class_schedule_slots WHERE class_id = ?",
        [class_id],
    )?;
    for (i, s) in slots.iter().enumerate() {
        conn.execute(
            "INSERT INTO class_schedule_slots(class_id, sort_order, day_of_week, start_time, end_time, location)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                class_id,
                i as i64,
                &s.day_of_week,
                &s.start_time,
                &s.end_time,
                &s.location,
            ),
        )?;
    }
    Ok(())
}

/// Inserts, or replaces the row when `rec.id` names an existing class.
/// Writes the class row and its schedule; run it inside the caller's transaction.
pub fn upsert_class(conn: &Connection, rec: &ClassRecord) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO classes(id, name, code, instructor, department, location, credits, color, current_grade, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           code = excluded.code,
           instructor = excluded.instructor,
           department = excluded.department,
           location = excluded.location,
           credits = excluded.credits,
           color = excluded.color,
           current_grade = excluded.current_grade,
           updated_at = excluded.updated_at",
        rusqlite::params![
            rec.id,
            rec.name,
            rec.code,
            rec.instructor,
            rec.department,
            rec.location,
            rec.credits,
            rec.color,
            rec.current_grade,
            now_stamp(),
        ],
    )?;
    let class_id = match rec.id {
        Some(id) => id,
        None => conn.last_insert_rowid(),
    };
    write_schedule(conn, class_id, &rec.schedule)?;
    Ok(class_id)
}

/// Removes a class with its schedule and assignments. Returns false if absent.
pub fn delete_class(conn: &Connection, class_id: i64) -> anyhow::Result<bool> {
    if !class_exists(conn, class_id)? {
        return Ok(false);
    }
    let tx = conn.unchecked_transaction()?;
    // No ON DELETE CASCADE; delete in dependency order.
    tx.execute("DELETE FROM assignments WHERE class_id = ?", [class_id])
        .context("delete assignments")?;
    tx.execute(
        "DELETE FROM class_schedule_slots WHERE class_id = ?",
        [class_id],
    )
    .context("delete class_schedule_slots")?;
    tx.execute("DELETE FROM classes WHERE id = ?", [class_id])
        .context("delete classes")?;
    tx.commit()?;
    Ok(true)
}

const ASSIGNMENT_COLUMNS: &str =
    "id, class_id, title, description, due_date, priority, completed, completed_date, grade";

fn assignment_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Assignment> {
    let due: String = r.get(4)?;
    let completed_date: Option<String> = r.get(7)?;
    Ok(Assignment {
        id: r.get(0)?,
        class_id: r.get(1)?,
        title: r.get(2)?,
        description: r.get(3)?,
        due_date: Timestamp::parse(&due),
        priority: r.get::<_, i64>(5)? != 0,
        completed: r.get::<_, i64>(6)? != 0,
        completed_date: completed_date.map(|s| Timestamp::parse(&s)),
        grade: r.get(8)?,
    })
}

/// All assignments in insertion order.
pub fn list_assignments(conn: &Connection) -> anyhow::Result<Vec<Assignment>> {
    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], assignment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_assignment(conn: &Connection, assignment_id: i64) -> anyhow::Result<Option<Assignment>> {
    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ?");
    Ok(conn
        .query_row(&sql, [assignment_id], assignment_from_row)
        .optional()?)
}

/// Inserts, or replaces the row when `rec.id` names an existing assignment.
/// A completed record without a completion stamp is stamped now.
pub fn upsert_assignment(conn: &Connection, rec: &AssignmentRecord) -> anyhow::Result<i64> {
    let completed_date = if rec.completed {
        Some(
            rec.completed_date
                .as_ref()
                .map(|t| t.raw().to_string())
                .unwrap_or_else(now_stamp),
        )
    } else {
        None
    };
    conn.execute(
        "INSERT INTO assignments(id, class_id, title, description, due_date, priority, completed, completed_date, grade, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           class_id = excluded.class_id,
           title = excluded.title,
           description = excluded.description,
           due_date = excluded.due_date,
           priority = excluded.priority,
           completed = excluded.completed,
           completed_date = excluded.completed_date,
           grade = excluded.grade,
           updated_at = excluded.updated_at",
        rusqlite::params![
            rec.id,
            rec.class_id,
            rec.title,
            rec.description,
            rec.due_date.raw(),
            rec.priority as i64,
            rec.completed as i64,
            completed_date,
            rec.grade,
            now_stamp(),
        ],
    )?;
    Ok(rec.id.unwrap_or_else(|| conn.last_insert_rowid()))
}

pub fn delete_assignment(conn: &Connection, assignment_id: i64) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM assignments WHERE id = ?", [assignment_id])?;
    Ok(n > 0)
}

/// Flips completion and keeps `completed_date` in step with it.
pub fn set_assignment_completed(
    conn: &Connection,
    assignment_id: i64,
    completed: bool,
    stamp: &Timestamp,
) -> anyhow::Result<bool> {
    let completed_date = if completed {
        Some(stamp.raw().to_string())
    } else {
        None
    };
    let n = conn.execute(
        "UPDATE assignments
         SET completed = ?, completed_date = ?, updated_at = ?
         WHERE id = ?",
        (completed as i64, completed_date, now_stamp(), assignment_id),
    )?;
    Ok(n > 0)
}

pub fn set_assignment_grade(
    conn: &Connection,
    assignment_id: i64,
    grade: Option<f64>,
) -> anyhow::Result<bool> {
    let n = conn.execute(
        "UPDATE assignments SET grade = ?, updated_at = ? WHERE id = ?",
        (grade, now_stamp(), assignment_id),
    )?;
    Ok(n > 0)
}
