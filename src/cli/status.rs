use crate::db::{get_connection, get_metadata, init_db};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::models::{Entity, RecordKind};
use crate::settings::load_settings;
use crate::store;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Currency:   {}", settings.currency);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `inventaire init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    let center = get_metadata(&conn, "center_name");
    println!("Center:     {}", center.as_deref().unwrap_or("(not set)"));

    println!();
    println!("{:<13} {}", "Students:", store::count(&conn, Entity::Student)?);
    println!("{:<13} {}", "Courses:", store::count(&conn, Entity::Course)?);
    for kind in RecordKind::ALL {
        let n = store::count(&conn, Entity::Record(kind))?;
        println!("{:<13} {n}", format!("{}:", kind.label()));
    }
    let imports: i64 = conn.query_row("SELECT count(*) FROM imports", [], |r| r.get(0))?;
    println!("{:<13} {imports}", "Imports:");
    Ok(())
}
