use std::path::PathBuf;

use thiserror::Error;

use crate::account::MIN_BALANCE;
use crate::person::{MAX_AGE, MIN_AGE, NATIONAL_ID_LENGTH};

#[derive(Debug, Error)]
pub enum BankError {
    #[error("invalid age entered, the valid age must be between {} and {}", MIN_AGE, MAX_AGE)]
    InvalidAge,
    #[error("invalid national ID, it must be {} digits long", NATIONAL_ID_LENGTH)]
    InvalidNationalId,
    #[error("invalid balance value")]
    InvalidBalance,
    #[error("insufficient balance, the account balance cannot go below ${}", MIN_BALANCE)]
    InsufficientBalance,
    #[error("invalid amount, please enter a positive value")]
    InvalidAmount,
    #[error("person record is incomplete: {0}")]
    IncompletePerson(String),
    #[error("the name cannot be empty or contain commas")]
    EmptyName,
    #[error("the phone number cannot be empty or contain commas")]
    EmptyPhoneNumber,
    #[error("this client already exists in the system")]
    PersonAlreadyExists,
    #[error("person with national ID {0} is not registered in the bank")]
    PersonNotFound(u64),
    #[error("account {0} does not exist")]
    AccountNotFound(u32),
    #[error("account {account_id} is not owned by national ID {national_id}")]
    AccountNotOwned { account_id: u32, national_id: u64 },
    #[error("{0} is not supported by this account type")]
    UnsupportedOperation(&'static str),
    #[error("could not access data file {}", path.display())]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse CSV row")]
    Csv(#[from] csv::Error),
    #[error("malformed stored row: {0}")]
    InvalidRow(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("console I/O failed")]
    Console(#[from] std::io::Error),
}

impl BankError {
    pub fn invalid_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BankError::InvalidFile {
            path: path.into(),
            source,
        }
    }

    /// Errors that end the interactive session instead of being reported
    /// for the current operation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BankError::InvalidFile { .. }
                | BankError::InvalidInput(_)
                | BankError::InvalidConfig(_)
                | BankError::Console(_)
                | BankError::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BankError>;
