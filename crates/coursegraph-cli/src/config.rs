//! Configuration from environment variables, overridable by flags.
//!
//! - `COURSEGRAPH_DB_PATH`: SQLite database file (default: "coursegraph.db")
//! - `COURSEGRAPH_SCRIPTS_DIR`: folder holding `courses.yml` (default: "scripts")
//! - `COURSEGRAPH_ACCOUNT_ID`: account owning database courses (default: 1)

use std::path::PathBuf;

use coursegraph_core::id::AccountId;

pub const DB_PATH_VAR: &str = "COURSEGRAPH_DB_PATH";
pub const SCRIPTS_DIR_VAR: &str = "COURSEGRAPH_SCRIPTS_DIR";
pub const ACCOUNT_ID_VAR: &str = "COURSEGRAPH_ACCOUNT_ID";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be an integer account id, got '{value}'")]
    InvalidAccount { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub scripts_dir: PathBuf,
    pub account: AccountId,
}

/// Flag values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_path: Option<PathBuf>,
    pub scripts_dir: Option<PathBuf>,
    pub account: Option<i64>,
}

impl Config {
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok(), overrides)
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let account = match overrides.account {
            Some(id) => AccountId(id),
            None => match lookup(ACCOUNT_ID_VAR) {
                Some(value) => value
                    .trim()
                    .parse()
                    .map(AccountId)
                    .map_err(|_| ConfigError::InvalidAccount {
                        var: ACCOUNT_ID_VAR,
                        value,
                    })?,
                None => AccountId(1),
            },
        };

        Ok(Config {
            db_path: overrides
                .db_path
                .or_else(|| lookup(DB_PATH_VAR).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("coursegraph.db")),
            scripts_dir: overrides
                .scripts_dir
                .or_else(|| lookup(SCRIPTS_DIR_VAR).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("scripts")),
            account,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[]), Overrides::default()).unwrap();
        assert_eq!(config.db_path, PathBuf::from("coursegraph.db"));
        assert_eq!(config.scripts_dir, PathBuf::from("scripts"));
        assert_eq!(config.account, AccountId(1));
    }

    #[test]
    fn flags_override_environment() {
        let env = lookup(&[(DB_PATH_VAR, "/var/lib/cg.db"), (ACCOUNT_ID_VAR, "7")]);
        let config = Config::from_lookup(
            env,
            Overrides {
                db_path: Some("local.db".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("local.db"));
        assert_eq!(config.account, AccountId(7));
    }

    #[test]
    fn bad_account_is_rejected() {
        let err = Config::from_lookup(lookup(&[(ACCOUNT_ID_VAR, "abc")]), Overrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("COURSEGRAPH_ACCOUNT_ID"));
    }
}
