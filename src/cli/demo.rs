use chrono::{Datelike, Local, NaiveDate};
use rusqlite::types::Value;
use rusqlite::Connection;

use crate::cli::open_db;
use crate::db::{get_metadata, set_metadata};
use crate::error::Result;
use crate::models::{EnrollmentStatus, StudentStatus};
use crate::registry::{self, NewCourse, NewStudent};
use crate::settings::load_settings;
use crate::store::{self, date_value, NewEnrollment, NewExpense, NewPayment, NewService};

const DEMO_FLAG: &str = "demo_loaded";

/// First name, last name.
const STUDENTS: &[(&str, &str)] = &[
    ("Mamadou", "Diallo"),
    ("Aissatou", "Bah"),
    ("Ibrahima", "Sow"),
    ("Fatoumata", "Camara"),
    ("Alpha", "Barry"),
    ("Mariama", "Sylla"),
    ("Ousmane", "Keita"),
    ("Kadiatou", "Conde"),
    ("Sekou", "Toure"),
    ("Hawa", "Soumah"),
];

/// Catalog code, course name, duration, enrollment price.
const COURSES: &[(&str, &str, &str, f64)] = &[
    ("ACAD", "AutoCAD", "3 mois", 1_500_000.0),
    ("XLS", "Excel avancé", "1 mois", 800_000.0),
    ("PS", "Photoshop", "2 mois", 1_200_000.0),
    ("SAGE", "Comptabilité Sage", "2 mois", 1_000_000.0),
];

/// Monthly fixed costs: name, reason, day, amount.
const FIXED_EXPENSES: &[(&str, &str, u32, f64)] = &[
    ("Loyer", "Local de formation", 1, 2_500_000.0),
    ("Électricité", "EDG", 10, 350_000.0),
    ("Internet", "Abonnement fibre", 12, 450_000.0),
];

/// One-off expenses rotated across months.
const ROTATING_EXPENSES: &[(&str, &str, f64)] = &[
    ("Fournitures", "Papeterie", 120_000.0),
    ("Carburant", "Groupe électrogène", 600_000.0),
    ("Maintenance", "Réparation climatiseur", 275_000.0),
    ("Licences", "Renouvellement logiciels", 900_000.0),
];

/// Service name, client, unit price.
const SERVICES: &[(&str, &str, f64)] = &[
    ("Saisie de documents", "Cabinet Bangoura", 25_000.0),
    ("Dépannage informatique", "Orange Guinée", 150_000.0),
    ("Impression plans", "BTP Conakry", 40_000.0),
    ("Formation sur site", "Banque Islamique", 1_800_000.0),
];

/// Clamp a day to the last valid day of the given year/month.
fn clamp_day(year: i32, month: u32, day: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).map_or(28, |d| d.day()).min(day)
}

fn make_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, clamp_day(year, month, day))
}

pub struct DemoCounts {
    pub students: usize,
    pub courses: usize,
    pub enrollments: usize,
    pub payments: usize,
    pub expenses: usize,
    pub services: usize,
}

/// Insert 12 months of records ending at the month containing `today`.
/// Output depends only on `today`.
pub fn insert_demo_data(conn: &Connection, today: NaiveDate) -> Result<DemoCounts> {
    let mut counts = DemoCounts {
        students: 0,
        courses: 0,
        enrollments: 0,
        payments: 0,
        expenses: 0,
        services: 0,
    };
    let tx = conn.unchecked_transaction()?;
    let first_month = today - chrono::Months::new(11);

    let mut student_ids = Vec::with_capacity(STUDENTS.len());
    for (n, &(first, last)) in STUDENTS.iter().enumerate() {
        let id = registry::insert_student(
            &tx,
            &NewStudent {
                matricule: Some(format!("ETU-{:03}", n + 1)),
                last_name: last.to_string(),
                first_name: first.to_string(),
                email: None,
                phone: None,
                address: Some("Conakry".to_string()),
                status: StudentStatus::Active,
                registered_on: date_value(make_date(first_month.year(), first_month.month(), 1)),
            },
        )?;
        student_ids.push(id);
        counts.students += 1;
    }

    let mut course_ids = Vec::with_capacity(COURSES.len());
    for &(code, name, duration, price) in COURSES {
        let id = registry::insert_course(
            &tx,
            &NewCourse {
                code: Some(code.to_string()),
                name: name.to_string(),
                description: None,
                duration: Some(duration.to_string()),
                price: Value::Real(price),
            },
        )?;
        course_ids.push(id);
        counts.courses += 1;
    }

    for i in 0..12u32 {
        let target = today - chrono::Months::new(11 - i);
        let (year, month) = (target.year(), target.month());
        let idx = i as usize;

        // Two enrollments per month, each with a first payment
        for j in 0..2usize {
            let s = (idx * 2 + j) % STUDENTS.len();
            let (first, last) = STUDENTS[s];
            let c = (idx + j) % COURSES.len();
            let (_, course, _, price) = COURSES[c];
            let status = match (idx + j) % 5 {
                0 if i < 9 => EnrollmentStatus::Completed,
                3 if i < 6 => EnrollmentStatus::Dropped,
                _ => EnrollmentStatus::Enrolled,
            };
            let day = 3 + (j as u32) * 11;
            let enrolled_on = make_date(year, month, day);
            let eid = store::insert_enrollment(
                &tx,
                &NewEnrollment {
                    student_id: Some(student_ids[s]),
                    course_id: Some(course_ids[c]),
                    student: format!("{first} {last}"),
                    course: Some(course.to_string()),
                    status,
                    price: Value::Real(price),
                    enrolled_on: date_value(enrolled_on),
                },
                None,
            )?;
            counts.enrollments += 1;

            // Older enrollments are paid in full, recent ones carry a balance
            let settled = i < 8 || (idx + j) % 3 == 0;
            let paid = if settled { price } else { (price * 0.6).round() };
            store::insert_payment(
                &tx,
                &NewPayment {
                    enrollment_id: Some(eid),
                    amount_total: Value::Real(price),
                    amount_paid: Value::Real(paid),
                    is_settled: settled,
                    created_on: date_value(make_date(year, month, day + 2)),
                },
                None,
            )?;
            counts.payments += 1;
        }

        for &(name, reason, day, amount) in FIXED_EXPENSES {
            store::insert_expense(
                &tx,
                &NewExpense {
                    name: name.to_string(),
                    reason: Some(reason.to_string()),
                    amount: Value::Real(amount),
                    created_on: date_value(make_date(year, month, day)),
                },
                None,
            )?;
            counts.expenses += 1;
        }
        let (name, reason, amount) = ROTATING_EXPENSES[idx % ROTATING_EXPENSES.len()];
        store::insert_expense(
            &tx,
            &NewExpense {
                name: name.to_string(),
                reason: Some(reason.to_string()),
                amount: Value::Real(amount),
                created_on: date_value(make_date(year, month, 20)),
            },
            None,
        )?;
        counts.expenses += 1;

        let (name, client, unit_price) = SERVICES[idx % SERVICES.len()];
        store::insert_service(
            &tx,
            &NewService {
                name: name.to_string(),
                client: client.to_string(),
                phone: None,
                unit_price: Value::Real(unit_price),
                quantity: Value::Integer(1 + (idx % 3) as i64),
                service_date: date_value(make_date(year, month, 25)),
            },
            None,
        )?;
        counts.services += 1;
    }

    set_metadata(&tx, DEMO_FLAG, &today.format("%Y-%m-%d").to_string())?;
    tx.commit()?;
    Ok(counts)
}

pub fn run() -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;

    if let Some(loaded_on) = get_metadata(&conn, DEMO_FLAG) {
        println!("Demo data already loaded (on {loaded_on}).");
        return Ok(());
    }

    let counts = insert_demo_data(&conn, Local::now().date_naive())?;

    println!("Demo data loaded!");
    println!("  Students:     {}", counts.students);
    println!("  Courses:      {}", counts.courses);
    println!("  Enrollments:  {}", counts.enrollments);
    println!("  Payments:     {}", counts.payments);
    println!("  Expenses:     {}", counts.expenses);
    println!("  Services:     {}", counts.services);
    println!();
    println!("Try these next:");
    println!("  inventaire report dashboard");
    println!("  inventaire report inventory");
    println!("  inventaire list payments --settled false");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{build_inventory, MonthOrder};
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
    }

    #[test]
    fn test_demo_counts() {
        let (_dir, conn) = test_db();
        let counts = insert_demo_data(&conn, today()).unwrap();
        assert_eq!(counts.students, 10);
        assert_eq!(counts.courses, 4);
        assert_eq!(counts.enrollments, 24);
        assert_eq!(counts.payments, 24);
        assert_eq!(counts.expenses, 12 * 4);
        assert_eq!(counts.services, 12);
        assert_eq!(get_metadata(&conn, DEMO_FLAG).as_deref(), Some("2025-03-31"));
    }

    #[test]
    fn test_demo_spans_twelve_months() {
        let (_dir, conn) = test_db();
        insert_demo_data(&conn, today()).unwrap();
        let records = store::fetch_records(&conn).unwrap();
        assert_eq!(records.undated_count(), 0);
        assert!(records.enrollments.iter().all(|e| e.student_id.is_some() && e.course_id.is_some()));
        assert_eq!(records.enrollments[0].student, "Mamadou Diallo");
        let view = build_inventory(&records, MonthOrder::Calendar);
        assert_eq!(view.monthly.len(), 12);
        assert_eq!(view.monthly[0].key, "2024-04");
        assert_eq!(view.monthly[11].key, "2025-03");
    }

    #[test]
    fn test_demo_is_deterministic() {
        let (_a, first) = test_db();
        let (_b, second) = test_db();
        insert_demo_data(&first, today()).unwrap();
        insert_demo_data(&second, today()).unwrap();
        let a = build_inventory(&store::fetch_records(&first).unwrap(), MonthOrder::Calendar);
        let b = build_inventory(&store::fetch_records(&second).unwrap(), MonthOrder::Calendar);
        assert_eq!(a.totals, b.totals);
        assert_eq!(a.monthly, b.monthly);
    }

    #[test]
    fn test_clamp_day() {
        assert_eq!(clamp_day(2024, 2, 31), 29);
        assert_eq!(clamp_day(2025, 2, 31), 28);
        assert_eq!(clamp_day(2025, 12, 31), 31);
        assert_eq!(clamp_day(2025, 4, 5), 5);
    }
}
