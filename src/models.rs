use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::InventaireError;

// ---------------------------------------------------------------------------
// Record kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Enrollment,
    Payment,
    Service,
    Expense,
}

/// Which side of the ledger a kind lands on in the monthly series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Inflow,
    Outflow,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Enrollment,
        RecordKind::Payment,
        RecordKind::Service,
        RecordKind::Expense,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Enrollment => "enrollments",
            Self::Payment => "payments",
            Self::Service => "services",
            Self::Expense => "expenses",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Enrollment => "Enrollments",
            Self::Payment => "Payments",
            Self::Service => "Services",
            Self::Expense => "Expenses",
        }
    }

    /// Chart color, stable per kind so slices keep their color across renders.
    pub fn color_hint(&self) -> &'static str {
        match self {
            Self::Enrollment => "#3b82f6",
            Self::Payment => "#10b981",
            Self::Service => "#f59e0b",
            Self::Expense => "#ef4444",
        }
    }

    pub fn flow(&self) -> Flow {
        match self {
            Self::Expense => Flow::Outflow,
            _ => Flow::Inflow,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RecordKind {
    type Err = InventaireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "enrollment" | "enrollments" | "inscription" | "inscriptions" => Ok(Self::Enrollment),
            "payment" | "payments" | "paiement" | "paiements" => Ok(Self::Payment),
            "service" | "services" | "prestation" | "prestations" => Ok(Self::Service),
            "expense" | "expenses" | "depense" | "depenses" => Ok(Self::Expense),
            other => Err(InventaireError::UnknownKind(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Enrollment status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Enrolled,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Enrolled => "enrolled",
            Self::Completed => "completed",
            Self::Dropped => "dropped",
        }
    }

    /// Lenient parse used at the fetch boundary; unknown values read as enrolled.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "completed" | "termine" | "terminé" => Self::Completed,
            "dropped" | "abandon" => Self::Dropped,
            _ => Self::Enrolled,
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Student registry and course catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
    Suspended,
}

impl StudentStatus {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }

    /// Unknown values read as active.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "inactive" | "inactif" => Self::Inactive,
            "suspended" | "suspendu" => Self::Suspended,
            _ => Self::Active,
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: i64,
    pub matricule: Option<String>,
    pub last_name: String,
    pub first_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: StudentStatus,
    pub registered_on: Option<NaiveDate>,
}

impl Student {
    /// First name then last name, the form enrollments display.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: i64,
    pub code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub price: f64,
}

/// Anything `delete` and `edit` address by id: a registry row or a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Student,
    Course,
    Record(RecordKind),
}

impl Entity {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::Course => "courses",
            Self::Record(kind) => kind.key(),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for Entity {
    type Err = InventaireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" | "students" | "etudiant" | "etudiants" | "étudiant" | "étudiants" => Ok(Self::Student),
            "course" | "courses" | "formation" | "formations" | "logiciel" | "logiciels" => Ok(Self::Course),
            other => other.parse().map(Self::Record),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub id: i64,
    /// Registry links; `student` and `course` hold the display names either way.
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub student: String,
    pub course: Option<String>,
    pub status: EnrollmentStatus,
    pub price: f64,
    pub enrolled_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i64,
    pub enrollment_id: Option<i64>,
    pub amount_total: f64,
    pub amount_paid: f64,
    pub is_settled: bool,
    pub created_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Expense {
    pub id: i64,
    pub name: String,
    pub reason: Option<String>,
    pub sum: f64,
    pub created_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub client: String,
    pub phone: Option<String>,
    pub unit_price: f64,
    /// `None` when the stored quantity was missing or not a whole number.
    pub quantity: Option<u32>,
    pub service_date: Option<NaiveDate>,
}

/// A record that feeds the aggregation engine: one amount, one optional date.
pub trait LedgerEntry {
    const KIND: RecordKind;

    fn amount(&self) -> f64;
    fn date(&self) -> Option<NaiveDate>;
}

impl LedgerEntry for Enrollment {
    const KIND: RecordKind = RecordKind::Enrollment;

    fn amount(&self) -> f64 {
        self.price
    }

    fn date(&self) -> Option<NaiveDate> {
        self.enrolled_on
    }
}

impl LedgerEntry for Payment {
    const KIND: RecordKind = RecordKind::Payment;

    fn amount(&self) -> f64 {
        self.amount_paid
    }

    fn date(&self) -> Option<NaiveDate> {
        self.created_on
    }
}

impl LedgerEntry for Expense {
    const KIND: RecordKind = RecordKind::Expense;

    fn amount(&self) -> f64 {
        self.sum
    }

    fn date(&self) -> Option<NaiveDate> {
        self.created_on
    }
}

impl LedgerEntry for Service {
    const KIND: RecordKind = RecordKind::Service;

    fn amount(&self) -> f64 {
        self.unit_price * self.quantity.map(f64::from).unwrap_or(0.0)
    }

    fn date(&self) -> Option<NaiveDate> {
        self.service_date
    }
}

/// The four record arrays as handed over by the fetcher.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub enrollments: Vec<Enrollment>,
    pub payments: Vec<Payment>,
    pub expenses: Vec<Expense>,
    pub services: Vec<Service>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.enrollments.len() + self.payments.len() + self.expenses.len() + self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records without a usable date, across all kinds.
    pub fn undated_count(&self) -> usize {
        count_undated(&self.enrollments)
            + count_undated(&self.payments)
            + count_undated(&self.expenses)
            + count_undated(&self.services)
    }
}

fn count_undated<R: LedgerEntry>(records: &[R]) -> usize {
    records.iter().filter(|r| r.date().is_none()).count()
}
