use std::collections::HashMap;

use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::types::Value;

use crate::cli::{open_db, parse_date_arg, AddCommands, ListCommands, PageArgs};
use crate::error::{InventaireError, Result};
use crate::fmt::money;
use crate::listing::{matches_search, paginate, Page};
use crate::models::{Course, Enrollment, Entity, Expense, Service, Student, StudentStatus};
use crate::registry::{self, NewCourse, NewStudent};
use crate::settings::{load_settings, Settings};
use crate::store::{self, date_value, NewEnrollment, NewExpense, NewPayment, NewService, PaymentRow};

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

pub fn add(cmd: AddCommands) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;

    match cmd {
        AddCommands::Student { first_name, last_name, matricule, email, phone, address, status, date } => {
            let new = NewStudent {
                matricule: non_blank(matricule),
                last_name: required(&last_name, "last name")?,
                first_name: required(&first_name, "first name")?,
                email: non_blank(email),
                phone: non_blank(phone),
                address: non_blank(address),
                status,
                registered_on: date_value(Some(parse_date_arg(date.as_deref())?)),
            };
            let id = registry::insert_student(&conn, &new)?;
            println!("Added student #{id}: {} {}", new.first_name, new.last_name);
        }
        AddCommands::Course { name, code, price, description, duration } => {
            let new = NewCourse {
                code: non_blank(code),
                name: required(&name, "course name")?,
                description: non_blank(description),
                duration: non_blank(duration),
                price: Value::Real(price),
            };
            let id = registry::insert_course(&conn, &new)?;
            println!("Added course #{id}: {} ({})", new.name, money(price, &settings.currency));
        }
        AddCommands::Enrollment { student, student_id, price, course, course_id, date, status } => {
            let registered = match student_id {
                Some(id) => Some(
                    registry::get_student(&conn, id)?
                        .ok_or_else(|| InventaireError::NotFound(format!("student #{id}")))?,
                ),
                None => None,
            };
            let catalog = match course_id {
                Some(id) => Some(
                    registry::get_course(&conn, id)?
                        .ok_or_else(|| InventaireError::NotFound(format!("course #{id}")))?,
                ),
                None => None,
            };
            let student = registered
                .as_ref()
                .map(Student::full_name)
                .or_else(|| non_blank(student))
                .ok_or_else(|| InventaireError::Other("Give a student name or --student-id".into()))?;
            let price = price
                .or_else(|| catalog.as_ref().map(|c| c.price))
                .ok_or_else(|| InventaireError::Other("Give --price or a --course-id from the catalog".into()))?;
            let new = NewEnrollment {
                student_id,
                course_id,
                student,
                course: catalog.map(|c| c.name).or_else(|| non_blank(course)),
                status,
                price: Value::Real(price),
                enrolled_on: date_value(Some(parse_date_arg(date.as_deref())?)),
            };
            let id = store::insert_enrollment(&conn, &new, None)?;
            println!(
                "Added enrollment #{id}: {} ({})",
                new.student,
                money(price, &settings.currency)
            );
        }
        AddCommands::Payment { paid, total, enrollment, settled, date } => {
            let total = total.unwrap_or(paid);
            let new = NewPayment {
                enrollment_id: enrollment,
                amount_total: Value::Real(total),
                amount_paid: Value::Real(paid),
                is_settled: settled,
                created_on: date_value(Some(parse_date_arg(date.as_deref())?)),
            };
            let id = store::insert_payment(&conn, &new, None)?;
            println!(
                "Added payment #{id}: {} of {}",
                money(paid, &settings.currency),
                money(total, &settings.currency)
            );
        }
        AddCommands::Expense { name, sum, reason, date } => {
            let new = NewExpense {
                name: name.trim().to_string(),
                reason,
                amount: Value::Real(sum),
                created_on: date_value(Some(parse_date_arg(date.as_deref())?)),
            };
            let id = store::insert_expense(&conn, &new, None)?;
            println!("Added expense #{id}: {} ({})", new.name, money(sum, &settings.currency));
        }
        AddCommands::Service { name, client, unit_price, quantity, phone, date } => {
            let new = NewService {
                name: name.trim().to_string(),
                client: client.trim().to_string(),
                phone,
                unit_price: Value::Real(unit_price),
                quantity: Value::Integer(i64::from(quantity)),
                service_date: date_value(Some(parse_date_arg(date.as_deref())?)),
            };
            let id = store::insert_service(&conn, &new, None)?;
            println!(
                "Added service #{id}: {} for {} ({})",
                new.name,
                new.client,
                money(unit_price * f64::from(quantity), &settings.currency)
            );
        }
    }
    Ok(())
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn required(raw: &str, what: &str) -> Result<String> {
    non_blank(Some(raw.to_string())).ok_or_else(|| InventaireError::InvalidValue {
        field: what.to_string(),
        reason: "cannot be empty".into(),
    })
}

pub fn delete(kind: &str, id: i64) -> Result<()> {
    let entity: Entity = kind.parse()?;
    let conn = open_db(&load_settings())?;
    if !store::delete_record(&conn, entity, id)? {
        return Err(InventaireError::NotFound(format!("{entity} #{id}")));
    }
    println!("Deleted {entity} #{id}");
    Ok(())
}

pub fn edit(kind: &str, id: i64, changes: &[(String, String)]) -> Result<()> {
    let entity: Entity = kind.parse()?;
    let conn = open_db(&load_settings())?;
    if !store::update_fields(&conn, entity, id, changes)? {
        return Err(InventaireError::NotFound(format!("{entity} #{id}")));
    }
    let fields: Vec<&str> = changes.iter().map(|(f, _)| f.as_str()).collect();
    println!("Updated {entity} #{id}: {}", fields.join(", "));
    Ok(())
}

pub fn settle(id: i64, undo: bool) -> Result<()> {
    let conn = open_db(&load_settings())?;
    if !store::set_payment_settled(&conn, id, !undo)? {
        return Err(InventaireError::NotFound(format!("payment #{id}")));
    }
    if undo {
        println!("Payment #{id} marked unsettled");
    } else {
        println!("Payment #{id} marked settled");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

pub fn list(cmd: ListCommands) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;

    let out = match cmd {
        ListCommands::Students { page, status } => {
            let counts = registry::enrollment_counts(&conn, "student_id")?;
            let rows = filter_students(registry::fetch_students(&conn)?, &page, status);
            format_students(&paginate(&rows, page.page, settings.page_size), &counts)
        }
        ListCommands::Courses { page } => {
            let counts = registry::enrollment_counts(&conn, "course_id")?;
            let rows = filter_courses(registry::fetch_courses(&conn)?, &page);
            format_courses(&paginate(&rows, page.page, settings.page_size), &counts, &settings)
        }
        ListCommands::Enrollments { page, status } => {
            let rows = filter_enrollments(store::fetch_enrollments(&conn)?, &page, status);
            format_enrollments(&paginate(&rows, page.page, settings.page_size), &settings)
        }
        ListCommands::Payments { page, settled } => {
            let rows = filter_payments(store::fetch_payment_rows(&conn)?, &page, settled);
            format_payments(&paginate(&rows, page.page, settings.page_size), &settings)
        }
        ListCommands::Expenses { page } => {
            let rows = filter_expenses(store::fetch_expenses(&conn)?, &page);
            format_expenses(&paginate(&rows, page.page, settings.page_size), &settings)
        }
        ListCommands::Services { page } => {
            let rows = filter_services(store::fetch_services(&conn)?, &page);
            format_services(&paginate(&rows, page.page, settings.page_size), &settings)
        }
    };
    println!("{out}");
    Ok(())
}

fn search_term(args: &PageArgs) -> &str {
    args.search.as_deref().unwrap_or("")
}

pub fn filter_students(rows: Vec<Student>, args: &PageArgs, status: Option<StudentStatus>) -> Vec<Student> {
    rows.into_iter()
        .filter(|s| status.map_or(true, |st| s.status == st))
        .filter(|s| {
            let name = s.full_name();
            matches_search(
                [
                    Some(name.as_str()),
                    s.matricule.as_deref(),
                    s.email.as_deref(),
                    s.phone.as_deref(),
                ],
                search_term(args),
            )
        })
        .collect()
}

pub fn filter_courses(rows: Vec<Course>, args: &PageArgs) -> Vec<Course> {
    rows.into_iter()
        .filter(|c| matches_search([Some(c.name.as_str()), c.code.as_deref()], search_term(args)))
        .collect()
}

pub fn filter_enrollments(
    rows: Vec<Enrollment>,
    args: &PageArgs,
    status: Option<crate::models::EnrollmentStatus>,
) -> Vec<Enrollment> {
    rows.into_iter()
        .filter(|e| status.map_or(true, |s| e.status == s))
        .filter(|e| matches_search([Some(e.student.as_str()), e.course.as_deref()], search_term(args)))
        .collect()
}

pub fn filter_payments(rows: Vec<PaymentRow>, args: &PageArgs, settled: Option<bool>) -> Vec<PaymentRow> {
    rows.into_iter()
        .filter(|r| settled.map_or(true, |s| r.payment.is_settled == s))
        .filter(|r| matches_search([r.student.as_deref(), r.course.as_deref()], search_term(args)))
        .collect()
}

pub fn filter_expenses(rows: Vec<Expense>, args: &PageArgs) -> Vec<Expense> {
    rows.into_iter()
        .filter(|e| matches_search([Some(e.name.as_str()), e.reason.as_deref()], search_term(args)))
        .collect()
}

pub fn filter_services(rows: Vec<Service>, args: &PageArgs) -> Vec<Service> {
    rows.into_iter()
        .filter(|s| matches_search([Some(s.name.as_str()), Some(s.client.as_str())], search_term(args)))
        .collect()
}

fn date_cell(date: Option<chrono::NaiveDate>) -> Cell {
    match date {
        Some(d) => Cell::new(d.format("%Y-%m-%d")),
        None => Cell::new("-".dimmed()),
    }
}

fn footer<T>(page: &Page<T>) -> String {
    format!(
        "Page {}/{} ({} records)",
        page.page, page.total_pages, page.total_items
    )
}

fn format_students(page: &Page<Student>, enrollments: &HashMap<i64, usize>) -> String {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Matricule", "Name", "Email", "Phone", "Status", "Registered", "Enrollments"]);
    for s in &page.items {
        let status = match s.status {
            StudentStatus::Active => s.status.key().green(),
            StudentStatus::Inactive => s.status.key().red(),
            StudentStatus::Suspended => s.status.key().yellow(),
        };
        table.add_row(vec![
            Cell::new(s.id),
            Cell::new(s.matricule.as_deref().unwrap_or("")),
            Cell::new(s.full_name()),
            Cell::new(s.email.as_deref().unwrap_or("")),
            Cell::new(s.phone.as_deref().unwrap_or("")),
            Cell::new(status),
            date_cell(s.registered_on),
            Cell::new(enrollments.get(&s.id).copied().unwrap_or(0)),
        ]);
    }
    format!("Students\n{table}\n{}", footer(page))
}

fn format_courses(page: &Page<Course>, enrollments: &HashMap<i64, usize>, settings: &Settings) -> String {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Code", "Course", "Duration", "Price", "Enrollments"]);
    for c in &page.items {
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(c.code.as_deref().unwrap_or("")),
            Cell::new(&c.name),
            Cell::new(c.duration.as_deref().unwrap_or("")),
            Cell::new(money(c.price, &settings.currency)),
            Cell::new(enrollments.get(&c.id).copied().unwrap_or(0)),
        ]);
    }
    format!("Courses\n{table}\n{}", footer(page))
}

fn format_enrollments(page: &Page<Enrollment>, settings: &Settings) -> String {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Student", "Course", "Status", "Price"]);
    for e in &page.items {
        table.add_row(vec![
            Cell::new(e.id),
            date_cell(e.enrolled_on),
            Cell::new(&e.student),
            Cell::new(e.course.as_deref().unwrap_or("")),
            Cell::new(e.status),
            Cell::new(money(e.price, &settings.currency)),
        ]);
    }
    format!("Enrollments\n{table}\n{}", footer(page))
}

fn format_payments(page: &Page<PaymentRow>, settings: &Settings) -> String {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Student", "Course", "Paid", "Total", "Settled"]);
    for r in &page.items {
        let p = &r.payment;
        let settled = if p.is_settled { "yes".green() } else { "no".yellow() };
        table.add_row(vec![
            Cell::new(p.id),
            date_cell(p.created_on),
            Cell::new(r.student.as_deref().unwrap_or("")),
            Cell::new(r.course.as_deref().unwrap_or("")),
            Cell::new(money(p.amount_paid, &settings.currency)),
            Cell::new(money(p.amount_total, &settings.currency)),
            Cell::new(settled),
        ]);
    }
    format!("Payments\n{table}\n{}", footer(page))
}

fn format_expenses(page: &Page<Expense>, settings: &Settings) -> String {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Name", "Reason", "Amount"]);
    for e in &page.items {
        table.add_row(vec![
            Cell::new(e.id),
            date_cell(e.created_on),
            Cell::new(&e.name),
            Cell::new(e.reason.as_deref().unwrap_or("")),
            Cell::new(money(e.sum, &settings.currency)),
        ]);
    }
    format!("Expenses\n{table}\n{}", footer(page))
}

fn format_services(page: &Page<Service>, settings: &Settings) -> String {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Service", "Client", "Qty", "Unit price", "Total"]);
    for s in &page.items {
        let qty = match s.quantity {
            Some(q) => Cell::new(q),
            None => Cell::new("?".yellow()),
        };
        table.add_row(vec![
            Cell::new(s.id),
            date_cell(s.service_date),
            Cell::new(&s.name),
            Cell::new(&s.client),
            qty,
            Cell::new(money(s.unit_price, &settings.currency)),
            Cell::new(money(s.unit_price * f64::from(s.quantity.unwrap_or(0)), &settings.currency)),
        ]);
    }
    format!("Services\n{table}\n{}", footer(page))
}
