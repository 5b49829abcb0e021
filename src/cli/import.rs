use std::path::PathBuf;

use colored::Colorize;

use crate::cli::open_db;
use crate::error::{InventaireError, Result};
use crate::importer::import_file;
use crate::models::RecordKind;
use crate::settings::load_settings;

pub fn run(kind: &str, file: &str) -> Result<()> {
    let kind: RecordKind = kind.parse()?;
    let file_path = PathBuf::from(file);
    if !file_path.exists() {
        return Err(InventaireError::NotFound(format!("file {}", file_path.display())));
    }
    let conn = open_db(&load_settings())?;

    let result = import_file(&conn, &file_path, kind)?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    for warning in &result.warnings {
        eprintln!("{}", format!("Warning: {warning}").yellow());
    }
    println!("{} {} imported", result.imported, kind.key());
    Ok(())
}
