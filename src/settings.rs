use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::aggregate::MonthOrder;
use crate::error::{InventaireError, Result};
use crate::listing::DEFAULT_PAGE_SIZE;

pub const DB_FILE: &str = "inventaire.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    #[serde(default)]
    pub center_name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub month_order: MonthOrder,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_currency() -> String {
    "GNF".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            center_name: String::new(),
            currency: default_currency(),
            month_order: MonthOrder::default(),
            page_size: default_page_size(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("inventaire")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("inventaire")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| InventaireError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            center_name: "Centre Kaloum".to_string(),
            currency: "XOF".to_string(),
            month_order: MonthOrder::Insertion,
            page_size: 20,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.center_name, "Centre Kaloum");
        assert_eq!(loaded.currency, "XOF");
        assert_eq!(loaded.month_order, MonthOrder::Insertion);
        assert_eq!(loaded.page_size, 20);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.center_name.is_empty());
        assert_eq!(s.currency, "GNF");
        assert_eq!(s.month_order, MonthOrder::Calendar);
        assert_eq!(s.page_size, 8);
        assert!(s.db_path().ends_with(DB_FILE));
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "month_order": "insertion"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.data_dir, "/tmp/test");
        assert_eq!(s.currency, "GNF");
        assert_eq!(s.month_order, MonthOrder::Insertion);
    }

    #[test]
    fn test_shellexpand_tilde() {
        if let Some(home) = dirs::home_dir() {
            let expanded = shellexpand_path("~/data");
            assert!(expanded.starts_with(&*home.to_string_lossy()));
            assert!(expanded.ends_with("data"));
        }
    }
}
