//! Financial aggregation over fetched records.
//!
//! Every function here is pure and infallible: dirty input degrades to a zero
//! contribution or to exclusion from the monthly series, never to an error.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::dates::MonthKey;
use crate::models::{Enrollment, Flow, LedgerEntry, RecordKind, RecordSet};

// ---------------------------------------------------------------------------
// Category totals
// ---------------------------------------------------------------------------

/// Sum of the amounts of one kind. Non-finite or negative amounts count as 0.
pub fn category_total<R: LedgerEntry>(records: &[R]) -> f64 {
    records.iter().map(|r| sanitize(r.amount())).sum()
}

fn sanitize(amount: f64) -> f64 {
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryTotals {
    pub enrollments: f64,
    pub payments: f64,
    pub services: f64,
    pub expenses: f64,
}

impl CategoryTotals {
    pub fn from_records(records: &RecordSet) -> Self {
        Self {
            enrollments: category_total(&records.enrollments),
            payments: category_total(&records.payments),
            services: category_total(&records.services),
            expenses: category_total(&records.expenses),
        }
    }

    pub fn get(&self, kind: RecordKind) -> f64 {
        match kind {
            RecordKind::Enrollment => self.enrollments,
            RecordKind::Payment => self.payments,
            RecordKind::Service => self.services,
            RecordKind::Expense => self.expenses,
        }
    }
}

// ---------------------------------------------------------------------------
// Net figures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NetFigures {
    pub gross: f64,
    pub net: f64,
}

impl NetFigures {
    /// `net` may be negative; labelling it a loss is the caller's business.
    pub fn from_totals(totals: &CategoryTotals) -> Self {
        let gross = totals.enrollments + totals.payments + totals.services;
        Self {
            gross,
            net: gross - totals.expenses,
        }
    }
}

// ---------------------------------------------------------------------------
// Monthly series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MonthOrder {
    /// Keyed by `YYYY-MM`, ascending.
    #[default]
    Calendar,
    /// Keyed by short month label only, in first-seen order. Months of
    /// different years share a bucket.
    Insertion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBucket {
    pub key: String,
    pub label: String,
    pub revenue: f64,
    pub expense: f64,
}

impl MonthBucket {
    fn open(month: MonthKey) -> Self {
        Self {
            key: month.key(),
            label: month.short_label(),
            revenue: 0.0,
            expense: 0.0,
        }
    }

    fn add(&mut self, flow: Flow, amount: f64) {
        match flow {
            Flow::Inflow => self.revenue += amount,
            Flow::Outflow => self.expense += amount,
        }
    }

    pub fn net(&self) -> f64 {
        self.revenue - self.expense
    }

    /// Row label for tables: `Sep 2024` under calendar order, where several
    /// years can appear; the bare month under insertion order, where a
    /// bucket may merge the same month of different years.
    pub fn display_label(&self, order: MonthOrder) -> String {
        match (order, self.key.get(..4)) {
            (MonthOrder::Calendar, Some(year)) => format!("{} {year}", self.label),
            _ => self.label.clone(),
        }
    }
}

/// Accumulates dated amounts into month buckets under one ordering policy.
struct MonthlyAccumulator {
    order: MonthOrder,
    by_month: BTreeMap<MonthKey, MonthBucket>,
    by_label: Vec<MonthBucket>,
    label_index: HashMap<String, usize>,
}

impl MonthlyAccumulator {
    fn new(order: MonthOrder) -> Self {
        Self {
            order,
            by_month: BTreeMap::new(),
            label_index: HashMap::new(),
            by_label: Vec::new(),
        }
    }

    fn feed<R: LedgerEntry>(&mut self, records: &[R]) {
        let flow = R::KIND.flow();
        for r in records {
            let Some(date) = r.date() else { continue };
            let month = MonthKey::of(date);
            let amount = sanitize(r.amount());
            let bucket = match self.order {
                MonthOrder::Calendar => self
                    .by_month
                    .entry(month)
                    .or_insert_with(|| MonthBucket::open(month)),
                MonthOrder::Insertion => {
                    let label = month.short_label();
                    let idx = match self.label_index.get(&label) {
                        Some(&idx) => idx,
                        None => {
                            self.by_label.push(MonthBucket::open(month));
                            self.label_index.insert(label, self.by_label.len() - 1);
                            self.by_label.len() - 1
                        }
                    };
                    &mut self.by_label[idx]
                }
            };
            bucket.add(flow, amount);
        }
    }

    fn finish(self) -> Vec<MonthBucket> {
        match self.order {
            MonthOrder::Calendar => self.by_month.into_values().collect(),
            MonthOrder::Insertion => self.by_label,
        }
    }
}

/// Revenue vs expense per month. Kinds are visited Enrollments, Payments,
/// Services, Expenses; undated records are skipped.
pub fn monthly_series(records: &RecordSet, order: MonthOrder) -> Vec<MonthBucket> {
    let mut acc = MonthlyAccumulator::new(order);
    acc.feed(&records.enrollments);
    acc.feed(&records.payments);
    acc.feed(&records.services);
    acc.feed(&records.expenses);
    acc.finish()
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionSlice {
    pub kind: RecordKind,
    pub label: String,
    pub value: f64,
    pub color_hint: String,
}

/// One slice per requested kind, zero totals included.
pub fn composition(totals: &CategoryTotals, kinds: &[RecordKind]) -> Vec<CompositionSlice> {
    kinds
        .iter()
        .map(|&kind| CompositionSlice {
            kind,
            label: kind.label().to_string(),
            value: totals.get(kind),
            color_hint: kind.color_hint().to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Inventory view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct InventoryView {
    pub month_order: MonthOrder,
    pub totals: CategoryTotals,
    pub gross: f64,
    pub net: f64,
    pub monthly: Vec<MonthBucket>,
    pub composition: Vec<CompositionSlice>,
}

pub fn build_inventory(records: &RecordSet, order: MonthOrder) -> InventoryView {
    let totals = CategoryTotals::from_records(records);
    let figures = NetFigures::from_totals(&totals);
    InventoryView {
        month_order: order,
        totals,
        gross: figures.gross,
        net: figures.net,
        monthly: monthly_series(records, order),
        composition: composition(&totals, &RecordKind::ALL),
    }
}

// ---------------------------------------------------------------------------
// Dashboard view
// ---------------------------------------------------------------------------

pub const UNKNOWN_COURSE: &str = "Unknown";
pub const RECENT_ENROLLMENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseCount {
    pub course: String,
    pub enrollments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    /// Distinct student names across enrollments.
    pub student_count: usize,
    /// Rows in the student registry; 0 until `with_registry` fills it in.
    pub registered_students: usize,
    pub enrollment_count: usize,
    pub total_collected: f64,
    pub pending_payments: usize,
    pub outstanding_balance: f64,
    pub monthly_collections: Vec<MonthBucket>,
    pub enrollments_by_course: Vec<CourseCount>,
    pub recent_enrollments: Vec<Enrollment>,
}

pub fn build_dashboard(records: &RecordSet, recent_limit: usize) -> DashboardView {
    let students: HashSet<String> = records
        .enrollments
        .iter()
        .map(|e| e.student.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let unsettled = records.payments.iter().filter(|p| !p.is_settled);
    let pending_payments = unsettled.clone().count();
    let outstanding_balance = unsettled
        .map(|p| sanitize(p.amount_total - sanitize(p.amount_paid)))
        .sum();

    let payments_only = RecordSet {
        payments: records.payments.clone(),
        ..RecordSet::default()
    };

    DashboardView {
        student_count: students.len(),
        registered_students: 0,
        enrollment_count: records.enrollments.len(),
        total_collected: category_total(&records.payments),
        pending_payments,
        outstanding_balance,
        monthly_collections: monthly_series(&payments_only, MonthOrder::Calendar),
        enrollments_by_course: enrollments_by_course(&records.enrollments),
        recent_enrollments: recent_enrollments(&records.enrollments, recent_limit),
    }
}

impl DashboardView {
    pub fn with_registry(mut self, registered_students: usize) -> Self {
        self.registered_students = registered_students;
        self
    }
}

/// Counts per course in first-seen order.
pub fn enrollments_by_course(enrollments: &[Enrollment]) -> Vec<CourseCount> {
    let mut counts: Vec<CourseCount> = Vec::new();
    for e in enrollments {
        let name = e
            .course
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN_COURSE);
        match counts.iter_mut().find(|c| c.course == name) {
            Some(c) => c.enrollments += 1,
            None => counts.push(CourseCount {
                course: name.to_string(),
                enrollments: 1,
            }),
        }
    }
    counts
}

/// Most recent first; undated enrollments sort last, ties broken by id descending.
pub fn recent_enrollments(enrollments: &[Enrollment], limit: usize) -> Vec<Enrollment> {
    let mut sorted: Vec<&Enrollment> = enrollments.iter().collect();
    sorted.sort_by(|a, b| b.enrolled_on.cmp(&a.enrolled_on).then(b.id.cmp(&a.id)));
    sorted.into_iter().take(limit).cloned().collect()
}
