use std::path::{Path, PathBuf};

use crate::account::INTEREST_RATE_PERCENT;
use crate::error::{BankError, Result};

pub const DEFAULT_DATA_DIR: &str = "./CSVs";
pub const PERSONS_FILE: &str = "Persons.csv";
pub const ACCOUNTS_FILE: &str = "Accounts.csv";

pub const DATA_DIR_ENV: &str = "BANK_DATA_DIR";
pub const INTEREST_RATE_ENV: &str = "BANK_INTEREST_RATE_PERCENT";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub interest_rate_percent: f64,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            data_dir: data_dir.into(),
            interest_rate_percent: INTEREST_RATE_PERCENT,
        }
    }

    /// Resolves the configuration from the command line argument first, then
    /// the environment, then the defaults.
    pub fn from_env(arg: Option<String>) -> Result<Self> {
        Self::resolve(
            arg,
            std::env::var(DATA_DIR_ENV).ok(),
            std::env::var(INTEREST_RATE_ENV).ok(),
        )
    }

    fn resolve(arg: Option<String>, env_dir: Option<String>, env_rate: Option<String>) -> Result<Self> {
        let data_dir = arg
            .or(env_dir)
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());

        let mut config = Config::new(data_dir);
        if let Some(rate) = env_rate {
            config.interest_rate_percent = parse_rate(&rate)?;
        }
        Ok(config)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn persons_path(&self) -> PathBuf {
        self.data_dir.join(PERSONS_FILE)
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join(ACCOUNTS_FILE)
    }
}

fn parse_rate(value: &str) -> Result<f64> {
    let rate: f64 = value
        .trim()
        .parse()
        .map_err(|_| BankError::InvalidConfig(format!("{INTEREST_RATE_ENV}={value:?} is not a number")))?;
    if !rate.is_finite() || rate < 0.0 {
        return Err(BankError::InvalidConfig(format!("{INTEREST_RATE_ENV} must not be negative")));
    }
    Ok(rate)
}
