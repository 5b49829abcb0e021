use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aggregate::{CompositionSlice, DashboardView, InventoryView, MonthBucket, MonthOrder};
use crate::fmt::money;

/// Prepend the center name as a header line if non-empty.
pub fn with_header(center_name: &str, body: String) -> String {
    if center_name.is_empty() {
        body
    } else {
        format!("{center_name}\n{body}")
    }
}

pub fn undated_warning(undated: usize) -> Option<String> {
    match undated {
        0 => None,
        1 => Some("1 record has no readable date and is left out of the monthly series.".into()),
        n => Some(format!(
            "{n} records have no readable date and are left out of the monthly series."
        )),
    }
}

/// Share of `value` in `total`, as a percentage; 0 when the total is empty.
pub fn percent(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total * 100.0
    } else {
        0.0
    }
}

fn net_cell(net: f64, currency: &str) -> (Cell, Cell) {
    let label = if net >= 0.0 {
        "NET (Profit)".green().bold()
    } else {
        "NET (Loss)".red().bold()
    };
    let amount = if net >= 0.0 {
        money(net, currency).green()
    } else {
        money(net, currency).red()
    };
    (Cell::new(label), Cell::new(amount))
}

// ---------------------------------------------------------------------------
// Pure formatting functions (report data → String)
// ---------------------------------------------------------------------------

pub fn format_inventory(view: &InventoryView, currency: &str) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Category", "Total"]);
    table.add_row(vec![Cell::new("REVENUE".green().bold()), Cell::new("")]);
    for (label, total) in [
        ("Enrollments", view.totals.enrollments),
        ("Payments", view.totals.payments),
        ("Services", view.totals.services),
    ] {
        table.add_row(vec![Cell::new(format!("  {label}")), Cell::new(money(total, currency))]);
    }
    table.add_row(vec![Cell::new("Gross revenue".bold()), Cell::new(money(view.gross, currency))]);
    table.add_row(vec![Cell::new(""), Cell::new("")]);
    table.add_row(vec![Cell::new("EXPENSES".red().bold()), Cell::new("")]);
    table.add_row(vec![
        Cell::new("  Expenses"),
        Cell::new(money(view.totals.expenses, currency)),
    ]);
    table.add_row(vec![Cell::new(""), Cell::new("")]);
    let (label, amount) = net_cell(view.net, currency);
    table.add_row(vec![label, amount]);

    let mut out = format!("Financial Inventory\n{table}");
    if !view.monthly.is_empty() {
        out.push_str("\n\n");
        out.push_str(&format_monthly(&view.monthly, view.month_order, currency));
    }
    out.push_str("\n\n");
    out.push_str(&format_composition(&view.composition, currency));
    out
}

pub fn format_monthly(buckets: &[MonthBucket], order: MonthOrder, currency: &str) -> String {
    if buckets.is_empty() {
        return "Monthly Revenue vs Expenses\nNo dated records.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["Month", "Revenue", "Expenses", "Net"]);
    let (mut revenue, mut expense) = (0.0, 0.0);
    for b in buckets {
        revenue += b.revenue;
        expense += b.expense;
        let net = b.net();
        let net_str = if net >= 0.0 {
            money(net, currency).green()
        } else {
            money(net, currency).red()
        };
        table.add_row(vec![
            Cell::new(b.display_label(order)),
            Cell::new(money(b.revenue, currency)),
            Cell::new(money(b.expense, currency)),
            Cell::new(net_str),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(money(revenue, currency)),
        Cell::new(money(expense, currency)),
        Cell::new(money(revenue - expense, currency)),
    ]);
    format!("Monthly Revenue vs Expenses\n{table}")
}

pub fn format_composition(slices: &[CompositionSlice], currency: &str) -> String {
    let total: f64 = slices.iter().map(|s| s.value).sum();
    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount", "%", "Color"]);
    for s in slices {
        table.add_row(vec![
            Cell::new(&s.label),
            Cell::new(money(s.value, currency)),
            Cell::new(format!("{:.1}%", percent(s.value, total))),
            Cell::new(&s.color_hint),
        ]);
    }
    format!("Composition\n{table}")
}

pub fn format_dashboard(view: &DashboardView, currency: &str) -> String {
    let mut kpis = Table::new();
    kpis.set_header(vec!["Indicator", "Value"]);
    kpis.add_row(vec![Cell::new("Students"), Cell::new(view.student_count)]);
    if view.registered_students > 0 {
        kpis.add_row(vec![Cell::new("Registered students"), Cell::new(view.registered_students)]);
    }
    kpis.add_row(vec![Cell::new("Enrollments"), Cell::new(view.enrollment_count)]);
    kpis.add_row(vec![
        Cell::new("Collected"),
        Cell::new(money(view.total_collected, currency).green()),
    ]);
    let pending = if view.pending_payments > 0 {
        view.pending_payments.to_string().yellow()
    } else {
        view.pending_payments.to_string().normal()
    };
    kpis.add_row(vec![Cell::new("Pending payments"), Cell::new(pending)]);
    kpis.add_row(vec![
        Cell::new("Outstanding balance"),
        Cell::new(money(view.outstanding_balance, currency)),
    ]);
    let mut out = format!("Dashboard\n{kpis}");

    if !view.monthly_collections.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Month", "Collected"]);
        for b in &view.monthly_collections {
            table.add_row(vec![
                Cell::new(b.display_label(MonthOrder::Calendar)),
                Cell::new(money(b.revenue, currency)),
            ]);
        }
        out.push_str(&format!("\n\nMonthly Collections\n{table}"));
    }

    if !view.enrollments_by_course.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Course", "Enrollments"]);
        for c in &view.enrollments_by_course {
            table.add_row(vec![Cell::new(&c.course), Cell::new(c.enrollments)]);
        }
        out.push_str(&format!("\n\nEnrollments by Course\n{table}"));
    }

    if !view.recent_enrollments.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Date", "Student", "Course", "Status", "Price"]);
        for e in &view.recent_enrollments {
            table.add_row(vec![
                Cell::new(e.enrolled_on.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()),
                Cell::new(&e.student),
                Cell::new(e.course.as_deref().unwrap_or("")),
                Cell::new(e.status),
                Cell::new(money(e.price, currency)),
            ]);
        }
        out.push_str(&format!("\n\nRecent Enrollments\n{table}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{build_dashboard, build_inventory, MonthOrder};
    use crate::models::{Expense, Payment, RecordSet};
    use chrono::NaiveDate;

    fn sample() -> RecordSet {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day);
        RecordSet {
            payments: vec![Payment {
                id: 1,
                enrollment_id: None,
                amount_total: 1_500_000.0,
                amount_paid: 800_000.0,
                is_settled: false,
                created_on: d(9, 20),
            }],
            expenses: vec![Expense {
                id: 1,
                name: "Loyer".into(),
                reason: None,
                sum: 1_000_000.0,
                created_on: d(10, 1),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_with_header() {
        assert_eq!(with_header("", "body".into()), "body");
        assert_eq!(with_header("Centre", "body".into()), "Centre\nbody");
    }

    #[test]
    fn test_percent_handles_empty_total() {
        assert_eq!(percent(5.0, 0.0), 0.0);
        assert_eq!(percent(25.0, 100.0), 25.0);
    }

    #[test]
    fn test_format_inventory_shows_loss() {
        colored::control::set_override(false);
        let view = build_inventory(&sample(), MonthOrder::Calendar);
        let out = format_inventory(&view, "GNF");
        assert!(out.contains("800,000 GNF"));
        assert!(out.contains("NET (Loss)"));
        assert!(out.contains("-200,000 GNF"));
        assert!(out.contains("Sep"));
        assert!(out.contains("Oct"));
    }

    #[test]
    fn test_format_monthly_calendar_labels_carry_year() {
        colored::control::set_override(false);
        let mut records = sample();
        let mut older = records.payments[0].clone();
        older.id = 2;
        older.created_on = NaiveDate::from_ymd_opt(2023, 9, 5);
        records.payments.push(older);

        let series = crate::aggregate::monthly_series(&records, MonthOrder::Calendar);
        let out = format_monthly(&series, MonthOrder::Calendar, "GNF");
        assert!(out.contains("Sep 2023"), "{out}");
        assert!(out.contains("Sep 2024"), "{out}");

        let merged = crate::aggregate::monthly_series(&records, MonthOrder::Insertion);
        let out = format_monthly(&merged, MonthOrder::Insertion, "GNF");
        assert!(!out.contains("2023"), "{out}");

        let out = format_dashboard(&build_dashboard(&records, 5), "GNF");
        assert!(out.contains("Sep 2023"), "{out}");
    }

    #[test]
    fn test_format_composition_percentages() {
        colored::control::set_override(false);
        let view = build_inventory(&sample(), MonthOrder::Calendar);
        let out = format_composition(&view.composition, "GNF");
        assert!(out.contains("44.4%"), "{out}");
        assert!(out.contains("55.6%"), "{out}");
    }

    #[test]
    fn test_format_dashboard() {
        colored::control::set_override(false);
        let view = build_dashboard(&sample(), 5);
        let out = format_dashboard(&view, "GNF");
        assert!(out.contains("Pending payments"));
        assert!(out.contains("700,000 GNF"));
        assert!(!out.contains("Registered students"));
        let out = format_dashboard(&view.with_registry(12), "GNF");
        assert!(out.contains("Registered students"));
    }

    #[test]
    fn test_undated_warning() {
        assert_eq!(undated_warning(0), None);
        assert!(undated_warning(3).unwrap().starts_with("3 records"));
    }
}
