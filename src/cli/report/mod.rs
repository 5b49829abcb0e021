pub mod text;

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::aggregate::{build_dashboard, build_inventory, composition, CategoryTotals, MonthOrder};
use crate::cli::{open_db, OutputFormat, ReportCommands, ReportOutputArgs};
use crate::db::get_metadata;
use crate::error::Result;
use crate::models::{RecordKind, RecordSet};
use crate::registry::count_students;
use crate::settings::{load_settings, Settings};
use crate::store::fetch_records;

/// Everything a report needs, loaded once per invocation.
pub struct ReportContext {
    pub center_name: String,
    pub currency: String,
    pub month_order: MonthOrder,
    pub records: RecordSet,
    pub registered_students: usize,
}

impl ReportContext {
    pub fn load(settings: &Settings) -> Result<Self> {
        let conn = open_db(settings)?;
        let center_name = get_metadata(&conn, "center_name")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| settings.center_name.clone());
        Ok(Self {
            center_name,
            currency: settings.currency.clone(),
            month_order: settings.month_order,
            records: fetch_records(&conn)?,
            registered_students: count_students(&conn)?,
        })
    }
}

pub fn dispatch(cmd: ReportCommands) -> Result<()> {
    let ctx = ReportContext::load(&load_settings())?;

    if let ReportCommands::All { output_dir } = &cmd {
        return export_all(&ctx, output_dir.clone());
    }

    if ctx.records.is_empty() {
        eprintln!(
            "{}",
            "No records yet. Try `inventaire add`, `inventaire import` or `inventaire demo`.".yellow()
        );
    } else if matches!(cmd, ReportCommands::Inventory { .. } | ReportCommands::Monthly { .. }) {
        warn_undated(&ctx.records);
    }

    let out = output_args(&cmd);
    if out.output.is_some() {
        colored::control::set_override(false);
    }
    let rendered = render(&cmd, &ctx)?;
    match out.output {
        Some(path) => {
            let p = PathBuf::from(path);
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&p, &rendered)?;
            println!("Wrote {}", p.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn output_args(cmd: &ReportCommands) -> ReportOutputArgs {
    match cmd {
        ReportCommands::Inventory { out, .. }
        | ReportCommands::Dashboard { out, .. }
        | ReportCommands::Monthly { out, .. }
        | ReportCommands::Composition { out } => out.clone(),
        ReportCommands::All { .. } => ReportOutputArgs::default(),
    }
}

fn warn_undated(records: &RecordSet) {
    if let Some(msg) = text::undated_warning(records.undated_count()) {
        eprintln!("{}", format!("Warning: {msg}").yellow());
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render one report as text or JSON.
pub fn render(cmd: &ReportCommands, ctx: &ReportContext) -> Result<String> {
    let format = output_args(cmd).format;
    let cur = ctx.currency.as_str();
    let s = match cmd {
        ReportCommands::Inventory { month_order, .. } => {
            let view = build_inventory(&ctx.records, month_order.unwrap_or(ctx.month_order));
            match format {
                OutputFormat::Json => to_json(&view)?,
                OutputFormat::Text => text::with_header(&ctx.center_name, text::format_inventory(&view, cur)),
            }
        }
        ReportCommands::Dashboard { recent, .. } => {
            let view = build_dashboard(&ctx.records, *recent).with_registry(ctx.registered_students);
            match format {
                OutputFormat::Json => to_json(&view)?,
                OutputFormat::Text => text::with_header(&ctx.center_name, text::format_dashboard(&view, cur)),
            }
        }
        ReportCommands::Monthly { month_order, .. } => {
            let order = month_order.unwrap_or(ctx.month_order);
            let series = crate::aggregate::monthly_series(&ctx.records, order);
            match format {
                OutputFormat::Json => to_json(&series)?,
                OutputFormat::Text => {
                    text::with_header(&ctx.center_name, text::format_monthly(&series, order, cur))
                }
            }
        }
        ReportCommands::Composition { .. } => {
            let totals = CategoryTotals::from_records(&ctx.records);
            let slices = composition(&totals, &RecordKind::ALL);
            match format {
                OutputFormat::Json => to_json(&slices)?,
                OutputFormat::Text => {
                    text::with_header(&ctx.center_name, text::format_composition(&slices, cur))
                }
            }
        }
        ReportCommands::All { .. } => {
            return Err(crate::error::InventaireError::Other("`report all` writes files only".into()))
        }
    };
    Ok(s)
}

fn export_all(ctx: &ReportContext, output_dir: Option<String>) -> Result<()> {
    let data_dir = crate::settings::get_data_dir();
    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    let dir = output_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("exports"));
    std::fs::create_dir_all(&dir)?;

    warn_undated(&ctx.records);
    colored::control::set_override(false);
    let reports = [
        ("inventory", ReportCommands::Inventory { month_order: None, out: ReportOutputArgs::default() }),
        ("dashboard", ReportCommands::Dashboard {
            recent: crate::aggregate::RECENT_ENROLLMENTS,
            out: ReportOutputArgs::default(),
        }),
        ("monthly", ReportCommands::Monthly { month_order: None, out: ReportOutputArgs::default() }),
        ("composition", ReportCommands::Composition { out: ReportOutputArgs::default() }),
    ];

    for (name, cmd) in &reports {
        match render(cmd, ctx) {
            Ok(content) => {
                let path = dir.join(format!("{name}-{date}.txt"));
                std::fs::write(&path, content)?;
                println!("Wrote {}", path.display());
            }
            Err(e) => eprintln!("Skipping {name}: {e}"),
        }
    }
    Ok(())
}
