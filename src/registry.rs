//! Student registry and course catalog.
//!
//! Enrollments point at these rows by id and keep a copy of the display names,
//! so deleting a student or course leaves its enrollments readable.

use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{Course, Student, StudentStatus};
use crate::store::{coerce_amount, coerce_date};

// ---------------------------------------------------------------------------
// Students
// ---------------------------------------------------------------------------

pub struct NewStudent {
    pub matricule: Option<String>,
    pub last_name: String,
    pub first_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: StudentStatus,
    pub registered_on: Value,
}

pub fn insert_student(conn: &Connection, s: &NewStudent) -> Result<i64> {
    conn.execute(
        "INSERT INTO students (matricule, last_name, first_name, email, phone, address, status, registered_on) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            s.matricule,
            s.last_name,
            s.first_name,
            s.email,
            s.phone,
            s.address,
            s.status.key(),
            s.registered_on
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

const STUDENT_COLUMNS: &str =
    "id, matricule, last_name, first_name, email, phone, address, status, registered_on";

fn student_from_row(row: &Row) -> rusqlite::Result<Student> {
    let status: Option<String> = row.get(7)?;
    Ok(Student {
        id: row.get(0)?,
        matricule: row.get(1)?,
        last_name: row.get(2)?,
        first_name: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        address: row.get(6)?,
        status: StudentStatus::parse_lenient(status.as_deref().unwrap_or("")),
        registered_on: coerce_date(&row.get::<_, Value>(8)?),
    })
}

pub fn fetch_students(conn: &Connection) -> Result<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE, id"
    ))?;
    let rows = stmt.query_map([], student_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn get_student(conn: &Connection, id: i64) -> Result<Option<Student>> {
    Ok(conn
        .query_row(
            &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
            [id],
            student_from_row,
        )
        .optional()?)
}

/// Id of the one student whose full name matches `name`, ignoring case and
/// surrounding blanks. Ambiguous or unknown names give `None`.
pub fn find_student_by_name(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return Ok(None);
    }
    let hits: Vec<i64> = fetch_students(conn)?
        .into_iter()
        .filter(|s| s.full_name().to_lowercase() == wanted)
        .map(|s| s.id)
        .collect();
    Ok(match hits.as_slice() {
        [id] => Some(*id),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

pub struct NewCourse {
    pub code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub price: Value,
}

pub fn insert_course(conn: &Connection, c: &NewCourse) -> Result<i64> {
    conn.execute(
        "INSERT INTO courses (code, name, description, duration, price) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![c.code, c.name, c.description, c.duration, c.price],
    )?;
    Ok(conn.last_insert_rowid())
}

const COURSE_COLUMNS: &str = "id, code, name, description, duration, price";

fn course_from_row(row: &Row) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        duration: row.get(4)?,
        price: coerce_amount(&row.get::<_, Value>(5)?),
    })
}

pub fn fetch_courses(conn: &Connection) -> Result<Vec<Course>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses ORDER BY name COLLATE NOCASE, id"
    ))?;
    let rows = stmt.query_map([], course_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn get_course(conn: &Connection, id: i64) -> Result<Option<Course>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"),
            [id],
            course_from_row,
        )
        .optional()?)
}

/// Same matching rule as [`find_student_by_name`], on course name or code.
pub fn find_course_by_name(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return Ok(None);
    }
    let hits: Vec<i64> = fetch_courses(conn)?
        .into_iter()
        .filter(|c| {
            c.name.trim().to_lowercase() == wanted
                || c.code.as_deref().is_some_and(|code| code.trim().to_lowercase() == wanted)
        })
        .map(|c| c.id)
        .collect();
    Ok(match hits.as_slice() {
        [id] => Some(*id),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Enrollment count per linked id, for `column` = `student_id` or `course_id`.
pub fn enrollment_counts(conn: &Connection, column: &str) -> Result<HashMap<i64, usize>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, count(*) FROM enrollments WHERE {column} IS NOT NULL GROUP BY {column}"
    ))?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
    let mut counts = HashMap::new();
    for row in rows {
        let (id, n) = row?;
        counts.insert(id, usize::try_from(n).unwrap_or(0));
    }
    Ok(counts)
}

pub fn count_students(conn: &Connection) -> Result<usize> {
    let n: i64 = conn.query_row("SELECT count(*) FROM students", [], |r| r.get(0))?;
    Ok(usize::try_from(n).unwrap_or(0))
}
