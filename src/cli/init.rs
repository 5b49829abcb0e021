use std::path::PathBuf;

use crate::db::{get_connection, init_db, set_metadata};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(
    data_dir: Option<String>,
    center_name: Option<String>,
    currency: Option<String>,
) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(name) = center_name {
        settings.center_name = name.trim().to_string();
    }
    if let Some(code) = currency {
        settings.currency = code.trim().to_string();
    }

    let dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(dir.join("imports"))?;
    std::fs::create_dir_all(dir.join("exports"))?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    if !settings.center_name.is_empty() {
        set_metadata(&conn, "center_name", &settings.center_name)?;
    }
    save_settings(&settings)?;

    println!("Initialized {}", settings.db_path().display());
    Ok(())
}
