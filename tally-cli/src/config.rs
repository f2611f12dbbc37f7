use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tally_core::time::DEFAULT_TIMEZONE;
use tally_ledger::SessionConfig;

use crate::state::ensure_tally_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ocr: OcrSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub ledger: LedgerSection,
    /// Replaces the built-in authorized beneficiary tokens when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_tokens: Option<Vec<String>>,
    #[serde(default)]
    pub groups: Vec<GroupSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSection {
    pub api_url: String,
    /// `OCR_API_KEY` in the environment wins over this.
    pub api_key: Option<String>,
    pub language: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.ocr.space/parse/image".to_string(),
            api_key: None,
            language: "eng".to_string(),
            timeout_secs: 45,
            max_retries: 3,
        }
    }
}

impl OcrSection {
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var("OCR_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub buffer_delay_secs: u64,
    pub edit_delay_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            buffer_delay_secs: 30,
            edit_delay_secs: 60,
        }
    }
}

impl SessionSection {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            buffer_delay: Duration::from_secs(self.buffer_delay_secs),
            edit_delay: Duration::from_secs(self.edit_delay_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// IANA name; timestamps in notifications are shown in this zone.
    pub timezone: String,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSection {
    pub id: i64,
    pub name: String,
    /// JSON object mapping house number to occupant name.
    pub houses_file: PathBuf,
    /// Directory of per-reason CSV sheets.
    pub ledger_dir: PathBuf,
    #[serde(default)]
    pub admin_user_ids: Vec<i64>,
}

impl GroupSection {
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_user_ids.contains(&user_id)
    }
}

impl Config {
    pub fn group(&self, id: i64) -> Result<&GroupSection> {
        self.groups
            .iter()
            .find(|g| g.id == id)
            .with_context(|| format!("group {id} is not configured"))
    }

    fn sample() -> Self {
        let home = PathBuf::from("~/.tally");
        Self {
            groups: vec![GroupSection {
                id: -1001234567890,
                name: "Example block".to_string(),
                houses_file: home.join("houses.json"),
                ledger_dir: home.join("ledger"),
                admin_user_ids: Vec::new(),
            }],
            ..Self::default()
        }
    }
}

pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(p) => Ok(p.to_path_buf()),
        None => Ok(ensure_tally_home()?.join("config.toml")),
    }
}

pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let p = config_path(explicit)?;
    if !p.exists() {
        tracing::debug!(path = %p.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config, explicit: Option<&Path>) -> Result<PathBuf> {
    let p = config_path(explicit)?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(p)
}

pub fn init_config(explicit: Option<&Path>) -> Result<()> {
    let p = config_path(explicit)?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let written = save_config(&Config::sample(), explicit)?;
    println!("Wrote {}", written.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [session]
            buffer_delay_secs = 5

            [[groups]]
            id = -100
            name = "Block A"
            houses_file = "houses.json"
            ledger_dir = "ledger"
            admin_user_ids = [42]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.session.buffer_delay_secs, 5);
        assert_eq!(cfg.session.edit_delay_secs, 60);
        assert_eq!(cfg.ocr.timeout_secs, 45);
        assert_eq!(cfg.ocr.max_retries, 3);
        assert_eq!(cfg.ledger.timezone, "Africa/Addis_Ababa");
        assert!(cfg.authorized_tokens.is_none());

        let group = cfg.group(-100).unwrap();
        assert!(group.is_admin(42));
        assert!(!group.is_admin(7));
        assert!(cfg.group(1).is_err());
        assert_eq!(cfg.session.session_config().buffer_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_init_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        init_config(Some(&path)).unwrap();
        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.groups.len(), 1);
        assert_eq!(loaded.ocr.language, "eng");

        fs::write(&path, "[ocr]\nlanguage = \"amh\"\n").unwrap();
        init_config(Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().ocr.language, "amh");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(cfg.groups.is_empty());
    }
}
