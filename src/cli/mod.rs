pub mod demo;
pub mod import;
pub mod init;
pub mod load;
pub mod records;
pub mod report;
pub mod status;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rusqlite::Connection;

use crate::aggregate::MonthOrder;
use crate::dates::parse_date;
use crate::db::{get_connection, init_db};
use crate::error::{InventaireError, Result};
use crate::models::{EnrollmentStatus, StudentStatus};
use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "inventaire",
    version,
    about = "Financial inventory and dashboard for a training center."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for the data directory (default: ~/Documents/inventaire)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Name printed at the top of every report
        #[arg(long = "center-name")]
        center_name: Option<String>,
        /// Currency code appended to amounts (default: GNF)
        #[arg(long)]
        currency: Option<String>,
    },
    /// Switch to an existing data directory.
    Load {
        /// Path to a data directory containing inventaire.db
        path: String,
    },
    /// Show the current database and record counts.
    Status,
    /// Register a student or course, or record an enrollment, payment, expense or service.
    Add {
        #[command(subcommand)]
        command: AddCommands,
    },
    /// List records with search, filters and pagination.
    List {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Delete a student, course or record by id.
    Delete {
        /// students, courses, enrollments, payments, expenses or services
        kind: String,
        /// Id shown by `inventaire list`
        id: i64,
    },
    /// Change fields of a student, course or record.
    Edit {
        /// students, courses, enrollments, payments, expenses or services
        kind: String,
        /// Id shown by `inventaire list`
        id: i64,
        /// field=value, repeatable (e.g. --set price=900000 --set status=completed)
        #[arg(long = "set", value_parser = parse_assignment, required = true)]
        changes: Vec<(String, String)>,
    },
    /// Mark a payment as settled (or unsettled with --undo).
    Settle {
        /// Payment id
        id: i64,
        #[arg(long)]
        undo: bool,
    },
    /// Import records of one kind from a CSV file.
    Import {
        /// Record kind: enrollments, payments, expenses, services
        kind: String,
        /// Path to the CSV file
        file: String,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Load a year of sample records to explore the reports.
    Demo,
    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum AddCommands {
    /// Register a student.
    Student {
        first_name: String,
        last_name: String,
        #[arg(long)]
        matricule: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long, value_enum, default_value = "active")]
        status: StudentStatus,
        /// Registration date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Add a course (logiciel) to the catalog.
    Course {
        name: String,
        /// Short catalog code
        #[arg(long)]
        code: Option<String>,
        /// Default enrollment price
        #[arg(long, value_parser = parse_amount_arg, default_value = "0")]
        price: f64,
        #[arg(long)]
        description: Option<String>,
        /// Free-form duration, e.g. "3 mois"
        #[arg(long)]
        duration: Option<String>,
    },
    /// Add an enrollment.
    Enrollment {
        /// Student full name (optional with --student-id)
        student: Option<String>,
        /// Registered student id
        #[arg(long = "student-id")]
        student_id: Option<i64>,
        /// Enrollment price (default: the catalog price of --course-id)
        #[arg(long, value_parser = parse_amount_arg)]
        price: Option<f64>,
        /// Course (logiciel) name
        #[arg(long)]
        course: Option<String>,
        /// Catalog course id
        #[arg(long = "course-id")]
        course_id: Option<i64>,
        /// Enrollment date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long, value_enum, default_value = "enrolled")]
        status: EnrollmentStatus,
    },
    /// Add a payment against an enrollment.
    Payment {
        /// Amount received
        #[arg(long, value_parser = parse_amount_arg)]
        paid: f64,
        /// Amount due in total (default: same as paid)
        #[arg(long, value_parser = parse_amount_arg)]
        total: Option<f64>,
        /// Enrollment id the payment belongs to
        #[arg(long)]
        enrollment: Option<i64>,
        /// Balance fully paid
        #[arg(long)]
        settled: bool,
        /// Payment date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Add an expense.
    Expense {
        /// Expense name
        name: String,
        /// Amount spent
        #[arg(long, value_parser = parse_amount_arg)]
        sum: f64,
        /// Reason (motif)
        #[arg(long)]
        reason: Option<String>,
        /// Expense date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Add a billable service.
    Service {
        /// Service name
        name: String,
        /// Client name
        #[arg(long)]
        client: String,
        /// Price per unit
        #[arg(long = "unit-price", value_parser = parse_amount_arg)]
        unit_price: f64,
        #[arg(long, default_value = "1")]
        quantity: u32,
        #[arg(long)]
        phone: Option<String>,
        /// Service date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Args, Clone, Default)]
pub struct PageArgs {
    /// Page number, starting at 1
    #[arg(long, default_value = "1")]
    pub page: usize,
    /// Case-insensitive search term
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// List registered students.
    Students {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long, value_enum)]
        status: Option<StudentStatus>,
    },
    /// List the course catalog.
    Courses {
        #[command(flatten)]
        page: PageArgs,
    },
    /// List enrollments.
    Enrollments {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long, value_enum)]
        status: Option<EnrollmentStatus>,
    },
    /// List payments.
    Payments {
        #[command(flatten)]
        page: PageArgs,
        /// Only settled (true) or unsettled (false) payments
        #[arg(long)]
        settled: Option<bool>,
    },
    /// List expenses.
    Expenses {
        #[command(flatten)]
        page: PageArgs,
    },
    /// List services.
    Services {
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Clone, Default)]
pub struct ReportOutputArgs {
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// Write to this file instead of stdout
    #[arg(long)]
    pub output: Option<String>,
}

#[derive(Subcommand, Clone)]
pub enum ReportCommands {
    /// Totals, gross and net revenue, monthly series and composition.
    Inventory {
        /// Month ordering: calendar or insertion (default: from settings)
        #[arg(long = "month-order", value_enum)]
        month_order: Option<MonthOrder>,
        #[command(flatten)]
        out: ReportOutputArgs,
    },
    /// Home dashboard KPIs.
    Dashboard {
        /// Number of recent enrollments to show
        #[arg(long, default_value = "5")]
        recent: usize,
        #[command(flatten)]
        out: ReportOutputArgs,
    },
    /// Revenue vs expenses per month.
    Monthly {
        #[arg(long = "month-order", value_enum)]
        month_order: Option<MonthOrder>,
        #[command(flatten)]
        out: ReportOutputArgs,
    },
    /// Share of each record kind.
    Composition {
        #[command(flatten)]
        out: ReportOutputArgs,
    },
    /// Write every text report to a directory.
    All {
        /// Output directory (default: <data_dir>/exports)
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
    },
}

/// clap value parser for money flags: a finite number, zero or more.
pub fn parse_amount_arg(raw: &str) -> std::result::Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("`{raw}` must be a finite amount of 0 or more"));
    }
    Ok(value)
}

/// clap value parser for `--set field=value`.
pub fn parse_assignment(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => Ok((field.trim().to_string(), value.to_string())),
        _ => Err(format!("`{raw}` should look like field=value")),
    }
}

/// Open the configured database, failing with a hint when `init` has not run.
pub fn open_db(settings: &Settings) -> Result<Connection> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(InventaireError::Settings(format!(
            "No database found at {}\nRun `inventaire init` to set one up.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    Ok(conn)
}

/// Parse an optional `--date` flag, defaulting to today.
pub fn parse_date_arg(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        None => Ok(Local::now().date_naive()),
        Some(s) => parse_date(s)
            .ok_or_else(|| InventaireError::Other(format!("Invalid date: {s} (expected YYYY-MM-DD)"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_arg() {
        assert_eq!(parse_amount_arg("1500000"), Ok(1_500_000.0));
        assert_eq!(parse_amount_arg("0"), Ok(0.0));
        assert_eq!(parse_amount_arg("12.5"), Ok(12.5));
        for bad in ["-100", "NaN", "inf", "-inf", "abc", ""] {
            assert!(parse_amount_arg(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("price=900000"), Ok(("price".into(), "900000".into())));
        assert_eq!(parse_assignment("reason="), Ok(("reason".into(), String::new())));
        assert_eq!(parse_assignment("note=a=b"), Ok(("note".into(), "a=b".into())));
        assert!(parse_assignment("price").is_err());
        assert!(parse_assignment("=5").is_err());
    }

    #[test]
    fn test_edit_requires_a_change() {
        assert!(Cli::try_parse_from(["inventaire", "edit", "students", "1"]).is_err());
        let cli = Cli::try_parse_from(["inventaire", "edit", "courses", "2", "--set", "price=5", "--set", "code=XL"])
            .unwrap();
        match cli.command {
            Some(Commands::Edit { kind, id, changes }) => {
                assert_eq!((kind.as_str(), id), ("courses", 2));
                assert_eq!(changes.len(), 2);
            }
            _ => panic!("expected edit"),
        }
    }

    #[test]
    fn test_negative_price_rejected_by_clap() {
        let parsed = Cli::try_parse_from(["inventaire", "add", "enrollment", "Awa", "--price=-100"]);
        assert!(parsed.is_err());
        let parsed = Cli::try_parse_from(["inventaire", "add", "expense", "Loyer", "--sum", "NaN"]);
        assert!(parsed.is_err());
        let parsed = Cli::try_parse_from(["inventaire", "add", "expense", "Loyer", "--sum", "250000"]);
        assert!(parsed.is_ok());
        let parsed = Cli::try_parse_from(["inventaire", "add", "course", "Excel", "--price", "-1"]);
        assert!(parsed.is_err());
    }
}
