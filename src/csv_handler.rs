use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::account::{AccountKind, BankAccount, CertificateAccount, SavingAccount};
use crate::error::{BankError, Result};
use crate::person::{Person, PersonRecord};
use crate::timestamp::CreationTimestamp;

const PERSON_FIELDS: usize = 4;
const ACCOUNT_FIELDS: usize = 6;

/// Durable form of an account, one line of the accounts file:
/// `accountID,nationalID,balance,creationTimestamp,interestRatePercent,withdrawnAmount`.
///
/// The last two fields are empty for a savings account; whether the interest
/// rate is empty is the only thing telling the two kinds apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRow {
    pub account_id: u32,
    pub national_id: u64,
    pub balance: f64,
    pub created: CreationTimestamp,
    pub interest_rate_percent: Option<f64>,
    pub withdrawn_amount: Option<f64>,
}

impl AccountRow {
    pub fn encode(account: &BankAccount) -> AccountRow {
        let (interest_rate_percent, withdrawn_amount) = match account {
            BankAccount::Saving(_) => (None, None),
            BankAccount::Certificate(certificate) => (
                Some(certificate.interest_rate_percent()),
                Some(certificate.withdrawn_amount()),
            ),
        };
        AccountRow {
            account_id: account.account_id(),
            national_id: account.person().national_id().value(),
            balance: account.balance(),
            created: account.created(),
            interest_rate_percent,
            withdrawn_amount,
        }
    }

    fn check_amounts(&self) -> Result<()> {
        let amounts = [Some(self.balance), self.interest_rate_percent, self.withdrawn_amount];
        if amounts.into_iter().flatten().all(f64::is_finite) {
            Ok(())
        } else {
            Err(BankError::InvalidRow(format!("account {} has a non-finite amount", self.account_id)))
        }
    }

    pub fn kind(&self) -> AccountKind {
        match self.interest_rate_percent {
            None => AccountKind::Saving,
            Some(_) => AccountKind::Certificate,
        }
    }

    /// Rebuilds the account, attaching `owner` as its person. `owner` must be
    /// the person whose national ID the row carries.
    pub fn decode(&self, owner: &Person) -> Result<BankAccount> {
        if owner.national_id().value() != self.national_id {
            return Err(BankError::InvalidRow(format!(
                "account {} belongs to {}, not {}",
                self.account_id,
                self.national_id,
                owner.national_id()
            )));
        }
        let person = owner.clone();
        match (self.kind(), self.interest_rate_percent, self.withdrawn_amount) {
            (AccountKind::Saving, _, _) => Ok(BankAccount::Saving(SavingAccount::restore(
                self.account_id,
                person,
                self.balance,
                self.created,
            )?)),
            (AccountKind::Certificate, Some(interest_rate_percent), Some(withdrawn_amount)) => {
                Ok(BankAccount::Certificate(CertificateAccount::restore(
                    self.account_id,
                    person,
                    self.balance,
                    self.created,
                    interest_rate_percent,
                    withdrawn_amount,
                )?))
            }
            (AccountKind::Certificate, _, _) => Err(BankError::InvalidRow(format!(
                "certificate account {} has no withdrawn amount",
                self.account_id
            ))),
        }
    }
}

/// Creates an empty data file (and its directory) if it does not exist yet.
pub fn ensure_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BankError::invalid_file(parent, e))?;
    }
    debug!("Creating empty data file {}", path.display());
    fs::write(path, b"").map_err(|e| BankError::invalid_file(path, e))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            ensure_file(path)?;
            Ok(Vec::new())
        }
        Err(e) => Err(BankError::invalid_file(path, e)),
    }
}

/// Parses persons rows (`nationalID,name,age,phoneNumber`, no header).
pub fn parse_persons(data: &[u8]) -> Result<Vec<Person>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut persons = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() != PERSON_FIELDS {
            return Err(BankError::IncompletePerson(record.iter().collect::<Vec<_>>().join(",")));
        }
        let raw: PersonRecord = record.deserialize(None)?;
        persons.push(Person::try_from(raw)?);
    }
    Ok(persons)
}

/// Parses account rows, skipping the ones that cannot be read. Every row is
/// checked on its own, so a short row never hides the rows after it.
pub fn parse_accounts(data: &[u8]) -> Vec<AccountRow> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut rows = Vec::new();
    for result in reader.records() {
        let row = result.map_err(BankError::from).and_then(|record| {
            if record.len() != ACCOUNT_FIELDS {
                return Err(BankError::InvalidRow(format!(
                    "expected {} fields, found {}",
                    ACCOUNT_FIELDS,
                    record.len()
                )));
            }
            let row: AccountRow = record.deserialize(None)?;
            row.check_amounts()?;
            Ok(row)
        });
        match row {
            Ok(row) => rows.push(row),
            Err(e) => warn!("Failed to parse an account from the accounts file: {}. Skipping invalid record.", e),
        }
    }
    rows
}

pub fn render_persons(persons: &[Person]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for person in persons {
        writer.serialize(person)?;
    }
    writer
        .into_inner()
        .map_err(|e| BankError::InvalidRow(format!("could not render persons: {}", e.error())))
}

pub fn render_accounts(rows: &[AccountRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| BankError::InvalidRow(format!("could not render accounts: {}", e.error())))
}

/// Loads all persons from the persons file, creating the file if it is missing.
pub fn load_persons(path: &Path) -> Result<Vec<Person>> {
    parse_persons(&read_file(path)?)
}

/// Loads all account rows from the accounts file, creating the file if it is missing.
pub fn load_accounts(path: &Path) -> Result<Vec<AccountRow>> {
    Ok(parse_accounts(&read_file(path)?))
}

/// Rewrites the whole persons file. The content is rendered before the file is
/// touched, so a rendering failure never leaves a truncated file behind.
pub fn write_persons(path: &Path, persons: &[Person]) -> Result<()> {
    let data = render_persons(persons)?;
    fs::write(path, data).map_err(|e| BankError::invalid_file(path, e))
}

pub fn write_accounts(path: &Path, rows: &[AccountRow]) -> Result<()> {
    let data = render_accounts(rows)?;
    fs::write(path, data).map_err(|e| BankError::invalid_file(path, e))
}
