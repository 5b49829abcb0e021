use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

use crate::dates::parse_date;
use crate::error::{InventaireError, Result};
use crate::models::{
    Enrollment, EnrollmentStatus, Entity, Expense, Payment, RecordKind, RecordSet, Service, StudentStatus,
};

// ---------------------------------------------------------------------------
// Coercion of stored values
// ---------------------------------------------------------------------------

/// Parse amount text such as `1 500 000 GNF`, `1,234.50`, `1 234,50` or `12,5`.
///
/// A lone comma followed by one or two digits is a decimal comma. Otherwise
/// commas and dots only separate thousands when they sit before exact
/// three-digit groups; anything else is unreadable.
pub fn parse_amount_text(raw: &str) -> Option<f64> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let s = s.trim_end_matches(|c: char| c.is_alphabetic());
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.strip_prefix('+').unwrap_or(s)),
    };
    if digits.is_empty() {
        return None;
    }

    let normalized = match (digits.rfind(','), digits.rfind('.')) {
        (None, None) => digits.to_string(),
        (None, Some(_)) => {
            if digits.matches('.').count() == 1 {
                digits.to_string()
            } else {
                ungroup(digits, '.')?
            }
        }
        (Some(comma), None) => {
            let decimals = &digits[comma + 1..];
            if digits.matches(',').count() == 1 && (1..=2).contains(&decimals.len()) {
                digits.replace(',', ".")
            } else {
                ungroup(digits, ',')?
            }
        }
        // Both present: the last one is the decimal mark.
        (Some(comma), Some(dot)) => {
            let (group, decimal, at) = if dot > comma { (',', '.', dot) } else { ('.', ',', comma) };
            let int_part = ungroup(&digits[..at], group)?;
            let frac = &digits[at + 1..];
            if frac.contains(decimal) || !frac.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            format!("{int_part}.{frac}")
        }
    };
    format!("{sign}{normalized}").parse::<f64>().ok()
}

/// Remove `sep` from `1,234,567`-style grouping, or `None` if the groups are malformed.
fn ungroup(digits: &str, sep: char) -> Option<String> {
    let mut groups = digits.split(sep);
    let head = groups.next()?;
    if head.is_empty() || head.len() > 3 || !head.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut out = head.to_string();
    for g in groups {
        if g.len() != 3 || !g.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        out.push_str(g);
    }
    Some(out)
}

/// Finite, non-negative amount; anything else reads as 0.
pub fn coerce_amount(value: &Value) -> f64 {
    let raw = match value {
        Value::Integer(i) => *i as f64,
        Value::Real(r) => *r,
        Value::Text(t) => parse_amount_text(t).unwrap_or(0.0),
        Value::Null | Value::Blob(_) => 0.0,
    };
    if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        0.0
    }
}

/// Whole, non-negative quantity, or `None` when missing or fractional.
pub fn coerce_quantity(value: &Value) -> Option<u32> {
    let raw = match value {
        Value::Integer(i) => return u32::try_from(*i).ok(),
        Value::Real(r) => *r,
        Value::Text(t) => parse_amount_text(t)?,
        Value::Null | Value::Blob(_) => return None,
    };
    if raw.is_finite() && raw >= 0.0 && raw.fract() == 0.0 && raw <= u32::MAX as f64 {
        Some(raw as u32)
    } else {
        None
    }
}

pub fn coerce_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Text(t) => parse_date(t),
        _ => None,
    }
}

pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Integer(i) => *i != 0,
        Value::Real(r) => *r != 0.0,
        Value::Text(t) => matches!(
            t.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "oui" | "y"
        ),
        Value::Null | Value::Blob(_) => false,
    }
}

/// Empty strings become NULL so blanks read back as missing.
pub fn text_value(raw: Option<&str>) -> Value {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => Value::Text(s.to_string()),
        _ => Value::Null,
    }
}

pub fn date_value(date: Option<NaiveDate>) -> Value {
    match date {
        Some(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
        None => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// Inserts (values kept raw; coercion happens on fetch)
// ---------------------------------------------------------------------------

pub struct NewEnrollment {
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub student: String,
    pub course: Option<String>,
    pub status: EnrollmentStatus,
    pub price: Value,
    pub enrolled_on: Value,
}

pub struct NewPayment {
    pub enrollment_id: Option<i64>,
    pub amount_total: Value,
    pub amount_paid: Value,
    pub is_settled: bool,
    pub created_on: Value,
}

pub struct NewExpense {
    pub name: String,
    pub reason: Option<String>,
    pub amount: Value,
    pub created_on: Value,
}

pub struct NewService {
    pub name: String,
    pub client: String,
    pub phone: Option<String>,
    pub unit_price: Value,
    pub quantity: Value,
    pub service_date: Value,
}

pub fn insert_enrollment(conn: &Connection, e: &NewEnrollment, import_id: Option<i64>) -> Result<i64> {
    if let Some(id) = e.student_id {
        if !exists(conn, Entity::Student, id)? {
            return Err(InventaireError::NotFound(format!("student #{id}")));
        }
    }
    if let Some(id) = e.course_id {
        if !exists(conn, Entity::Course, id)? {
            return Err(InventaireError::NotFound(format!("course #{id}")));
        }
    }
    conn.execute(
        "INSERT INTO enrollments (student_id, course_id, student, course, status, price, enrolled_on, import_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            e.student_id,
            e.course_id,
            e.student,
            e.course,
            e.status.key(),
            e.price,
            e.enrolled_on,
            import_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_payment(conn: &Connection, p: &NewPayment, import_id: Option<i64>) -> Result<i64> {
    if let Some(id) = p.enrollment_id {
        if !enrollment_exists(conn, id)? {
            return Err(InventaireError::NotFound(format!("enrollment #{id}")));
        }
    }
    conn.execute(
        "INSERT INTO payments (enrollment_id, amount_total, amount_paid, is_settled, created_on, import_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            p.enrollment_id,
            p.amount_total,
            p.amount_paid,
            p.is_settled,
            p.created_on,
            import_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_expense(conn: &Connection, e: &NewExpense, import_id: Option<i64>) -> Result<i64> {
    conn.execute(
        "INSERT INTO expenses (name, reason, amount, created_on, import_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![e.name, e.reason, e.amount, e.created_on, import_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_service(conn: &Connection, s: &NewService, import_id: Option<i64>) -> Result<i64> {
    conn.execute(
        "INSERT INTO services (name, client, phone, unit_price, quantity, service_date, import_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![s.name, s.client, s.phone, s.unit_price, s.quantity, s.service_date, import_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn exists(conn: &Connection, entity: Entity, id: i64) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("SELECT 1 FROM {} WHERE id = ?1", entity.table()))?;
    Ok(stmt.exists([id])?)
}

pub fn enrollment_exists(conn: &Connection, id: i64) -> Result<bool> {
    exists(conn, Entity::Record(RecordKind::Enrollment), id)
}

/// Delete one row by id. Returns false when no row matched.
pub fn delete_record(conn: &Connection, entity: Entity, id: i64) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", entity.table());
    Ok(conn.execute(&sql, [id])? > 0)
}

pub fn set_payment_settled(conn: &Connection, id: i64, settled: bool) -> Result<bool> {
    Ok(conn.execute(
        "UPDATE payments SET is_settled = ?1 WHERE id = ?2",
        rusqlite::params![settled, id],
    )? > 0)
}

pub fn count(conn: &Connection, entity: Entity) -> Result<i64> {
    let sql = format!("SELECT count(*) FROM {}", entity.table());
    Ok(conn.query_row(&sql, [], |r| r.get(0))?)
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// How an edited value is checked before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Blank clears the column.
    Text,
    RequiredText,
    Amount,
    Quantity,
    Date,
    Bool,
    EnrollmentStatus,
    StudentStatus,
    /// Id of a row in another table; blank or `none` unlinks.
    Link(Entity),
}

const STUDENT_FIELDS: &[(&str, FieldType)] = &[
    ("matricule", FieldType::Text),
    ("last_name", FieldType::RequiredText),
    ("first_name", FieldType::RequiredText),
    ("email", FieldType::Text),
    ("phone", FieldType::Text),
    ("address", FieldType::Text),
    ("status", FieldType::StudentStatus),
    ("registered_on", FieldType::Date),
];

const COURSE_FIELDS: &[(&str, FieldType)] = &[
    ("code", FieldType::Text),
    ("name", FieldType::RequiredText),
    ("description", FieldType::Text),
    ("duration", FieldType::Text),
    ("price", FieldType::Amount),
];

const ENROLLMENT_FIELDS: &[(&str, FieldType)] = &[
    ("student", FieldType::RequiredText),
    ("course", FieldType::Text),
    ("student_id", FieldType::Link(Entity::Student)),
    ("course_id", FieldType::Link(Entity::Course)),
    ("status", FieldType::EnrollmentStatus),
    ("price", FieldType::Amount),
    ("enrolled_on", FieldType::Date),
];

const PAYMENT_FIELDS: &[(&str, FieldType)] = &[
    ("enrollment_id", FieldType::Link(Entity::Record(RecordKind::Enrollment))),
    ("amount_total", FieldType::Amount),
    ("amount_paid", FieldType::Amount),
    ("is_settled", FieldType::Bool),
    ("created_on", FieldType::Date),
];

const EXPENSE_FIELDS: &[(&str, FieldType)] = &[
    ("name", FieldType::RequiredText),
    ("reason", FieldType::Text),
    ("amount", FieldType::Amount),
    ("created_on", FieldType::Date),
];

const SERVICE_FIELDS: &[(&str, FieldType)] = &[
    ("name", FieldType::RequiredText),
    ("client", FieldType::RequiredText),
    ("phone", FieldType::Text),
    ("unit_price", FieldType::Amount),
    ("quantity", FieldType::Quantity),
    ("service_date", FieldType::Date),
];

/// Columns `edit` may change, by entity. Field names are the column names.
pub fn editable_fields(entity: Entity) -> &'static [(&'static str, FieldType)] {
    match entity {
        Entity::Student => STUDENT_FIELDS,
        Entity::Course => COURSE_FIELDS,
        Entity::Record(RecordKind::Enrollment) => ENROLLMENT_FIELDS,
        Entity::Record(RecordKind::Payment) => PAYMENT_FIELDS,
        Entity::Record(RecordKind::Expense) => EXPENSE_FIELDS,
        Entity::Record(RecordKind::Service) => SERVICE_FIELDS,
    }
}

fn field_type(entity: Entity, field: &str) -> Result<(&'static str, FieldType)> {
    let wanted = field.trim().to_lowercase().replace('-', "_");
    let fields = editable_fields(entity);
    fields
        .iter()
        .find(|(name, _)| *name == wanted)
        .copied()
        .ok_or_else(|| InventaireError::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
            allowed: fields.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", "),
        })
}

fn invalid(field: &str, reason: impl Into<String>) -> InventaireError {
    InventaireError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Check `raw` against the field type and turn it into the stored value.
pub fn parse_field_value(conn: &Connection, field: &str, ty: FieldType, raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    let value = match ty {
        FieldType::Text => text_value(Some(trimmed)),
        FieldType::RequiredText => {
            if trimmed.is_empty() {
                return Err(invalid(field, "cannot be empty"));
            }
            Value::Text(trimmed.to_string())
        }
        FieldType::Amount => match parse_amount_text(trimmed) {
            Some(v) if v.is_finite() && v >= 0.0 => Value::Real(v),
            _ => return Err(invalid(field, format!("`{raw}` is not an amount of 0 or more"))),
        },
        FieldType::Quantity => match coerce_quantity(&Value::Text(trimmed.to_string())) {
            Some(q) => Value::Integer(i64::from(q)),
            None => return Err(invalid(field, format!("`{raw}` is not a whole quantity"))),
        },
        FieldType::Date => {
            if trimmed.is_empty() {
                Value::Null
            } else {
                match parse_date(trimmed) {
                    Some(d) => date_value(Some(d)),
                    None => return Err(invalid(field, format!("`{raw}` is not a date (YYYY-MM-DD)"))),
                }
            }
        }
        FieldType::Bool => match trimmed.to_lowercase().as_str() {
            "1" | "true" | "yes" | "oui" | "y" => Value::Integer(1),
            "0" | "false" | "no" | "non" | "n" => Value::Integer(0),
            _ => return Err(invalid(field, format!("`{raw}` is not yes or no"))),
        },
        FieldType::EnrollmentStatus => {
            let status = <EnrollmentStatus as clap::ValueEnum>::from_str(trimmed, true)
                .map_err(|_| invalid(field, "expected enrolled, completed or dropped"))?;
            Value::Text(status.key().to_string())
        }
        FieldType::StudentStatus => {
            let status = <StudentStatus as clap::ValueEnum>::from_str(trimmed, true)
                .map_err(|_| invalid(field, "expected active, inactive or suspended"))?;
            Value::Text(status.key().to_string())
        }
        FieldType::Link(target) => {
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                Value::Null
            } else {
                let id: i64 = trimmed
                    .parse()
                    .map_err(|_| invalid(field, format!("`{raw}` is not an id")))?;
                if !exists(conn, target, id)? {
                    return Err(InventaireError::NotFound(format!("{target} #{id}")));
                }
                Value::Integer(id)
            }
        }
    };
    Ok(value)
}

/// Apply `field=value` changes to one row in a single transaction.
/// Returns false when the row does not exist.
///
/// Linking an enrollment to a student or course also refreshes the name kept
/// on the enrollment.
pub fn update_fields(conn: &Connection, entity: Entity, id: i64, changes: &[(String, String)]) -> Result<bool> {
    if !exists(conn, entity, id)? {
        return Ok(false);
    }
    let tx = conn.unchecked_transaction()?;
    for (field, raw) in changes {
        let (column, ty) = field_type(entity, field)?;
        let value = parse_field_value(&tx, column, ty, raw)?;
        let linked = matches!(value, Value::Integer(_));
        tx.execute(
            &format!("UPDATE {} SET {column} = ?1 WHERE id = ?2", entity.table()),
            rusqlite::params![value, id],
        )?;
        match (ty, linked) {
            (FieldType::Link(Entity::Student), true) => {
                tx.execute(
                    "UPDATE enrollments SET student = \
                     (SELECT TRIM(first_name || ' ' || last_name) FROM students WHERE id = enrollments.student_id) \
                     WHERE id = ?1",
                    [id],
                )?;
            }
            (FieldType::Link(Entity::Course), true) => {
                tx.execute(
                    "UPDATE enrollments SET course = \
                     (SELECT name FROM courses WHERE id = enrollments.course_id) WHERE id = ?1",
                    [id],
                )?;
            }
            _ => {}
        }
    }
    tx.commit()?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

fn enrollment_from_row(row: &Row) -> rusqlite::Result<Enrollment> {
    let status: Option<String> = row.get(5)?;
    Ok(Enrollment {
        id: row.get(0)?,
        student_id: row.get(1)?,
        course_id: row.get(2)?,
        student: row.get(3)?,
        course: row.get(4)?,
        status: EnrollmentStatus::parse_lenient(status.as_deref().unwrap_or("")),
        price: coerce_amount(&row.get::<_, Value>(6)?),
        enrolled_on: coerce_date(&row.get::<_, Value>(7)?),
    })
}

// Registry names win over the copies kept on the enrollment.
const STUDENT_NAME: &str =
    "COALESCE(NULLIF(TRIM(s.first_name || ' ' || s.last_name), ''), e.student)";
const COURSE_NAME: &str = "COALESCE(c.name, e.course)";
const REGISTRY_JOINS: &str = "LEFT JOIN students s ON e.student_id = s.id \
     LEFT JOIN courses c ON e.course_id = c.id";

fn payment_from_row(row: &Row) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        enrollment_id: row.get(1)?,
        amount_total: coerce_amount(&row.get::<_, Value>(2)?),
        amount_paid: coerce_amount(&row.get::<_, Value>(3)?),
        is_settled: coerce_bool(&row.get::<_, Value>(4)?),
        created_on: coerce_date(&row.get::<_, Value>(5)?),
    })
}

fn expense_from_row(row: &Row) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        name: row.get(1)?,
        reason: row.get(2)?,
        sum: coerce_amount(&row.get::<_, Value>(3)?),
        created_on: coerce_date(&row.get::<_, Value>(4)?),
    })
}

fn service_from_row(row: &Row) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        client: row.get(2)?,
        phone: row.get(3)?,
        unit_price: coerce_amount(&row.get::<_, Value>(4)?),
        quantity: coerce_quantity(&row.get::<_, Value>(5)?),
        service_date: coerce_date(&row.get::<_, Value>(6)?),
    })
}

pub fn fetch_enrollments(conn: &Connection) -> Result<Vec<Enrollment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT e.id, e.student_id, e.course_id, {STUDENT_NAME}, {COURSE_NAME}, \
         e.status, e.price, e.enrolled_on \
         FROM enrollments e {REGISTRY_JOINS} ORDER BY e.id"
    ))?;
    let rows = stmt.query_map([], enrollment_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn fetch_payments(conn: &Connection) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT id, enrollment_id, amount_total, amount_paid, is_settled, created_on \
         FROM payments ORDER BY id",
    )?;
    let rows = stmt.query_map([], payment_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn fetch_expenses(conn: &Connection) -> Result<Vec<Expense>> {
    let mut stmt =
        conn.prepare("SELECT id, name, reason, amount, created_on FROM expenses ORDER BY id")?;
    let rows = stmt.query_map([], expense_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn fetch_services(conn: &Connection) -> Result<Vec<Service>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, client, phone, unit_price, quantity, service_date FROM services ORDER BY id",
    )?;
    let rows = stmt.query_map([], service_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn fetch_records(conn: &Connection) -> Result<RecordSet> {
    Ok(RecordSet {
        enrollments: fetch_enrollments(conn)?,
        payments: fetch_payments(conn)?,
        expenses: fetch_expenses(conn)?,
        services: fetch_services(conn)?,
    })
}

/// A payment with the student and course of its enrollment, for listings.
#[derive(Debug, Clone)]
pub struct PaymentRow {
    pub payment: Payment,
    pub student: Option<String>,
    pub course: Option<String>,
}

pub fn fetch_payment_rows(conn: &Connection) -> Result<Vec<PaymentRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT p.id, p.enrollment_id, p.amount_total, p.amount_paid, p.is_settled, p.created_on, \
         {STUDENT_NAME}, {COURSE_NAME} \
         FROM payments p LEFT JOIN enrollments e ON p.enrollment_id = e.id {REGISTRY_JOINS} \
         ORDER BY p.id"
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(PaymentRow {
            payment: payment_from_row(row)?,
            student: row.get(6)?,
            course: row.get(7)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_parse_amount_text() {
        assert_eq!(parse_amount_text("1 500 000 GNF"), Some(1_500_000.0));
        assert_eq!(parse_amount_text("1,234.50"), Some(1234.5));
        assert_eq!(parse_amount_text("1\u{a0}200"), Some(1200.0));
        assert_eq!(parse_amount_text("  "), None);
        assert_eq!(parse_amount_text("abc"), None);
    }

    #[test]
    fn test_parse_amount_text_decimal_comma() {
        assert_eq!(parse_amount_text("12,5"), Some(12.5));
        assert_eq!(parse_amount_text("1 234,50"), Some(1234.5));
        assert_eq!(parse_amount_text("1\u{202f}234,50 GNF"), Some(1234.5));
        assert_eq!(parse_amount_text("1.234,50"), Some(1234.5));
        assert_eq!(parse_amount_text("1,500,000"), Some(1_500_000.0));
        assert_eq!(parse_amount_text("1,234"), Some(1234.0));
        assert_eq!(parse_amount_text("-12,5"), Some(-12.5));
    }

    #[test]
    fn test_parse_amount_text_rejects_bad_grouping() {
        assert_eq!(parse_amount_text("12,5,0"), None);
        assert_eq!(parse_amount_text("1,23,456"), None);
        assert_eq!(parse_amount_text("1.2.3"), None);
        assert_eq!(parse_amount_text("1,2345"), None);
        assert_eq!(parse_amount_text("1,234.5.6"), None);
    }

    #[test]
    fn test_coerce_amount_degrades_to_zero() {
        assert_eq!(coerce_amount(&Value::Integer(5000)), 5000.0);
        assert_eq!(coerce_amount(&Value::Real(12.5)), 12.5);
        assert_eq!(coerce_amount(&text("800000")), 800_000.0);
        assert_eq!(coerce_amount(&text("n/a")), 0.0);
        assert_eq!(coerce_amount(&Value::Null), 0.0);
        assert_eq!(coerce_amount(&Value::Integer(-40)), 0.0);
    }

    #[test]
    fn test_coerce_quantity() {
        assert_eq!(coerce_quantity(&Value::Integer(3)), Some(3));
        assert_eq!(coerce_quantity(&Value::Integer(0)), Some(0));
        assert_eq!(coerce_quantity(&Value::Integer(-1)), None);
        assert_eq!(coerce_quantity(&Value::Real(2.0)), Some(2));
        assert_eq!(coerce_quantity(&Value::Real(2.5)), None);
        assert_eq!(coerce_quantity(&text("4")), Some(4));
        assert_eq!(coerce_quantity(&text("2,5")), None);
        assert_eq!(coerce_quantity(&text("3,0")), Some(3));
        assert_eq!(coerce_quantity(&Value::Null), None);
    }

    #[test]
    fn test_coerce_bool() {
        assert!(coerce_bool(&Value::Integer(1)));
        assert!(coerce_bool(&text("Oui")));
        assert!(coerce_bool(&text("true")));
        assert!(!coerce_bool(&text("non")));
        assert!(!coerce_bool(&Value::Null));
    }

    #[test]
    fn test_fetch_coerces_dirty_rows() {
        let (_dir, conn) = test_db();
        insert_expense(
            &conn,
            &NewExpense {
                name: "Loyer".into(),
                reason: None,
                amount: text("1 200 000"),
                created_on: text("2024-09-01T08:00:00Z"),
            },
            None,
        )
        .unwrap();
        insert_expense(
            &conn,
            &NewExpense {
                name: "Divers".into(),
                reason: Some("caisse".into()),
                amount: text("???"),
                created_on: text("hier"),
            },
            None,
        )
        .unwrap();
        let expenses = fetch_expenses(&conn).unwrap();
        assert_eq!(expenses.len(), 2);
        assert_eq!(expenses[0].sum, 1_200_000.0);
        assert_eq!(expenses[0].created_on, NaiveDate::from_ymd_opt(2024, 9, 1));
        assert_eq!(expenses[1].sum, 0.0);
        assert_eq!(expenses[1].created_on, None);
    }

    #[test]
    fn test_fetch_records_all_kinds() {
        let (_dir, conn) = test_db();
        let eid = insert_enrollment(
            &conn,
            &NewEnrollment {
                student_id: None,
                course_id: None,
                student: "Mamadou Diallo".into(),
                course: Some("AutoCAD".into()),
                status: EnrollmentStatus::Enrolled,
                price: Value::Real(1_500_000.0),
                enrolled_on: text("2024-09-15"),
            },
            None,
        )
        .unwrap();
        insert_payment(
            &conn,
            &NewPayment {
                enrollment_id: Some(eid),
                amount_total: Value::Real(1_500_000.0),
                amount_paid: Value::Real(800_000.0),
                is_settled: false,
                created_on: text("2024-09-20"),
            },
            None,
        )
        .unwrap();
        insert_service(
            &conn,
            &NewService {
                name: "Maintenance".into(),
                client: "Orange".into(),
                phone: None,
                unit_price: Value::Real(5000.0),
                quantity: Value::Integer(3),
                service_date: Value::Null,
            },
            None,
        )
        .unwrap();

        let records = fetch_records(&conn).unwrap();
        assert_eq!(records.enrollments.len(), 1);
        assert_eq!(records.payments[0].enrollment_id, Some(eid));
        assert!(!records.payments[0].is_settled);
        assert_eq!(records.services[0].quantity, Some(3));
        assert_eq!(records.services[0].service_date, None);
        assert!(records.expenses.is_empty());

        let rows = fetch_payment_rows(&conn).unwrap();
        assert_eq!(rows[0].student.as_deref(), Some("Mamadou Diallo"));
        assert_eq!(rows[0].course.as_deref(), Some("AutoCAD"));
    }

    #[test]
    fn test_payment_requires_existing_enrollment() {
        let (_dir, conn) = test_db();
        let err = insert_payment(
            &conn,
            &NewPayment {
                enrollment_id: Some(42),
                amount_total: Value::Real(1.0),
                amount_paid: Value::Real(1.0),
                is_settled: true,
                created_on: Value::Null,
            },
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("enrollment #42"), "got: {err}");
    }

    #[test]
    fn test_delete_and_settle() {
        let (_dir, conn) = test_db();
        let id = insert_payment(
            &conn,
            &NewPayment {
                enrollment_id: None,
                amount_total: Value::Real(10.0),
                amount_paid: Value::Real(5.0),
                is_settled: false,
                created_on: Value::Null,
            },
            None,
        )
        .unwrap();
        assert!(set_payment_settled(&conn, id, true).unwrap());
        assert!(fetch_payments(&conn).unwrap()[0].is_settled);
        let payment = Entity::Record(RecordKind::Payment);
        assert!(delete_record(&conn, payment, id).unwrap());
        assert!(!delete_record(&conn, payment, id).unwrap());
        assert_eq!(count(&conn, payment).unwrap(), 0);
    }

    fn expense_row(conn: &Connection) -> i64 {
        insert_expense(
            conn,
            &NewExpense {
                name: "Loyer".into(),
                reason: None,
                amount: Value::Real(1_000_000.0),
                created_on: text("2024-09-01"),
            },
            None,
        )
        .unwrap()
    }

    fn set(field: &str, value: &str) -> (String, String) {
        (field.to_string(), value.to_string())
    }

    #[test]
    fn test_update_fields_edits_expense() {
        let (_dir, conn) = test_db();
        let id = expense_row(&conn);
        let expense = Entity::Record(RecordKind::Expense);
        let changed = update_fields(
            &conn,
            expense,
            id,
            &[set("amount", "1 250 000"), set("reason", "Local"), set("created-on", "2024-10-01")],
        )
        .unwrap();
        assert!(changed);
        let e = &fetch_expenses(&conn).unwrap()[0];
        assert_eq!(e.sum, 1_250_000.0);
        assert_eq!(e.reason.as_deref(), Some("Local"));
        assert_eq!(e.created_on, NaiveDate::from_ymd_opt(2024, 10, 1));

        update_fields(&conn, expense, id, &[set("reason", " ")]).unwrap();
        assert_eq!(fetch_expenses(&conn).unwrap()[0].reason, None);
        assert!(!update_fields(&conn, expense, 99, &[set("reason", "x")]).unwrap());
    }

    #[test]
    fn test_update_fields_rejects_bad_input_atomically() {
        let (_dir, conn) = test_db();
        let id = expense_row(&conn);
        let expense = Entity::Record(RecordKind::Expense);

        let err = update_fields(&conn, expense, id, &[set("name", "Eau"), set("amount", "-5")]).unwrap_err();
        assert!(matches!(err, InventaireError::InvalidValue { .. }), "got: {err}");
        assert_eq!(fetch_expenses(&conn).unwrap()[0].name, "Loyer");

        let err = update_fields(&conn, expense, id, &[set("import_id", "1")]).unwrap_err();
        assert!(err.to_string().contains("editable: name, reason, amount, created_on"), "got: {err}");

        let err = update_fields(&conn, expense, id, &[set("name", "")]).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_update_fields_links_and_settles_payment() {
        let (_dir, conn) = test_db();
        let payment = insert_payment(
            &conn,
            &NewPayment {
                enrollment_id: None,
                amount_total: Value::Real(10.0),
                amount_paid: Value::Real(5.0),
                is_settled: false,
                created_on: Value::Null,
            },
            None,
        )
        .unwrap();
        let entity = Entity::Record(RecordKind::Payment);

        let err = update_fields(&conn, entity, payment, &[set("enrollment_id", "4")]).unwrap_err();
        assert!(err.to_string().contains("enrollments #4"), "got: {err}");

        update_fields(&conn, entity, payment, &[set("is_settled", "oui"), set("amount_paid", "10")]).unwrap();
        let p = &fetch_payments(&conn).unwrap()[0];
        assert!(p.is_settled);
        assert_eq!(p.amount_paid, 10.0);
    }

    #[test]
    fn test_parse_field_value_types() {
        let (_dir, conn) = test_db();
        let q = parse_field_value(&conn, "quantity", FieldType::Quantity, "2,5");
        assert!(q.is_err());
        assert_eq!(
            parse_field_value(&conn, "quantity", FieldType::Quantity, "3").unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            parse_field_value(&conn, "status", FieldType::EnrollmentStatus, "Completed").unwrap(),
            text("completed")
        );
        assert!(parse_field_value(&conn, "status", FieldType::StudentStatus, "gone").is_err());
        assert_eq!(
            parse_field_value(&conn, "student_id", FieldType::Link(Entity::Student), "none").unwrap(),
            Value::Null
        );
        assert!(parse_field_value(&conn, "created_on", FieldType::Date, "hier").is_err());
    }

    #[test]
    fn test_text_value_blank_is_null() {
        assert_eq!(text_value(Some("  ")), Value::Null);
        assert_eq!(text_value(None), Value::Null);
        assert_eq!(text_value(Some(" 12 ")), text("12"));
    }
}
