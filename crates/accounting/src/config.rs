//! Engine configuration.

use serde::{Deserialize, Serialize};

use bookkeep_core::{DomainError, DomainResult};

pub const ENV_LEDGER_TAG: &str = "BOOKKEEP_LEDGER_TAG";
pub const ENV_LEDGER_NAME: &str = "BOOKKEEP_LEDGER_NAME";
pub const ENV_JOURNAL_TAG: &str = "BOOKKEEP_JOURNAL_TAG";
pub const ENV_JOURNAL_NAME: &str = "BOOKKEEP_JOURNAL_NAME";
pub const ENV_FIRST_SID: &str = "BOOKKEEP_FIRST_SID";

/// Settings [`Ledger::from_config`](crate::Ledger::from_config) builds a
/// ledger from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub ledger_tag: String,
    pub ledger_name: String,
    pub general_journal_tag: String,
    pub general_journal_name: String,
    /// First sequence id handed out (entries and posts share the sequence).
    pub first_sid: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_tag: "GL".to_string(),
            ledger_name: "General Ledger".to_string(),
            general_journal_tag: "GJ".to_string(),
            general_journal_name: "General Journal".to_string(),
            first_sid: 1,
        }
    }
}

impl LedgerConfig {
    /// Defaults overridden by `BOOKKEEP_*` environment variables.
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DomainResult<Self> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_LEDGER_TAG) {
            config.ledger_tag = value;
        }
        if let Some(value) = lookup(ENV_LEDGER_NAME) {
            config.ledger_name = value;
        }
        if let Some(value) = lookup(ENV_JOURNAL_TAG) {
            config.general_journal_tag = value;
        }
        if let Some(value) = lookup(ENV_JOURNAL_NAME) {
            config.general_journal_name = value;
        }
        if let Some(value) = lookup(ENV_FIRST_SID) {
            config.first_sid = value.trim().parse().map_err(|_| {
                DomainError::config(format!("{ENV_FIRST_SID} must be a number, got '{value}'"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON document; missing keys keep their defaults.
    pub fn from_json(text: &str) -> DomainResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| DomainError::config(format!("ledger config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.ledger_tag.trim().is_empty() {
            return Err(DomainError::config("ledger tag must not be empty"));
        }
        if self.general_journal_tag.trim().is_empty() {
            return Err(DomainError::config("general journal tag must not be empty"));
        }
        Ok(())
    }
}
