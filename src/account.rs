use chrono::{Local, NaiveDateTime};
use log::trace;

use crate::error::{BankError, Result};
use crate::person::Person;
use crate::timestamp::CreationTimestamp;

/// Lowest balance an account may be opened with, and the floor a savings
/// account may never drop below.
pub const MIN_BALANCE: f64 = 1000.0;
/// Interest rate given to new certificate accounts unless configured otherwise.
pub const INTEREST_RATE_PERCENT: f64 = 25.0;
/// 365.25 days.
pub const SECONDS_PER_YEAR: i64 = 31_557_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Saving,
    Certificate,
}

impl AccountKind {
    pub fn label(&self) -> &'static str {
        match self {
            AccountKind::Saving => "Saving Account",
            AccountKind::Certificate => "Certificate Account",
        }
    }
}

fn check_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(BankError::InvalidAmount);
    }
    Ok(())
}

fn check_opening_balance(balance: f64) -> Result<()> {
    if !balance.is_finite() {
        return Err(BankError::InvalidBalance);
    }
    if balance < MIN_BALANCE {
        return Err(BankError::InsufficientBalance);
    }
    Ok(())
}

/// Fields shared by every account variant.
#[derive(Debug, Clone, PartialEq)]
struct AccountBase {
    account_id: u32,
    person: Person,
    balance: f64,
    created: CreationTimestamp,
}

impl AccountBase {
    fn new(person: Person, balance: f64) -> Result<Self> {
        check_opening_balance(balance)?;
        Ok(AccountBase {
            account_id: 0,
            person,
            balance,
            created: CreationTimestamp::now(),
        })
    }

    fn restore(account_id: u32, person: Person, balance: f64, created: CreationTimestamp) -> Result<Self> {
        check_opening_balance(balance)?;
        Ok(AccountBase {
            account_id,
            person,
            balance,
            created,
        })
    }
}

/// Deposit/withdraw account that must keep at least [`MIN_BALANCE`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavingAccount {
    base: AccountBase,
}

impl SavingAccount {
    pub fn new(person: Person, balance: f64) -> Result<Self> {
        Ok(SavingAccount {
            base: AccountBase::new(person, balance)?,
        })
    }

    pub fn restore(account_id: u32, person: Person, balance: f64, created: CreationTimestamp) -> Result<Self> {
        Ok(SavingAccount {
            base: AccountBase::restore(account_id, person, balance, created)?,
        })
    }

    pub fn deposit(&mut self, amount: f64) -> Result<()> {
        check_amount(amount)?;
        let balance = self.base.balance + amount;
        if !balance.is_finite() {
            trace!("Account {} cannot take a deposit of {}", self.base.account_id, amount);
            return Err(BankError::InvalidAmount);
        }
        self.base.balance = balance;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: f64) -> Result<()> {
        check_amount(amount)?;
        if self.base.balance - amount < MIN_BALANCE {
            trace!(
                "Account {} cannot withdraw {}. Balance: {}",
                self.base.account_id, amount, self.base.balance
            );
            return Err(BankError::InsufficientBalance);
        }
        self.base.balance -= amount;
        Ok(())
    }

    /// Largest amount a withdrawal may take right now.
    pub fn withdrawable(&self) -> f64 {
        self.base.balance - MIN_BALANCE
    }
}

/// Fixed-rate account. The base balance never changes; only the accrued
/// returns can be withdrawn.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateAccount {
    base: AccountBase,
    interest_rate_percent: f64,
    withdrawn_amount: f64,
}

impl CertificateAccount {
    pub fn new(person: Person, balance: f64, interest_rate_percent: f64) -> Result<Self> {
        Ok(CertificateAccount {
            base: AccountBase::new(person, balance)?,
            interest_rate_percent,
            withdrawn_amount: 0.0,
        })
    }

    pub fn restore(
        account_id: u32,
        person: Person,
        balance: f64,
        created: CreationTimestamp,
        interest_rate_percent: f64,
        withdrawn_amount: f64,
    ) -> Result<Self> {
        if !interest_rate_percent.is_finite() || !withdrawn_amount.is_finite() || withdrawn_amount < 0.0 {
            return Err(BankError::InvalidBalance);
        }
        Ok(CertificateAccount {
            base: AccountBase::restore(account_id, person, balance, created)?,
            interest_rate_percent,
            withdrawn_amount,
        })
    }

    pub fn interest_rate_percent(&self) -> f64 {
        self.interest_rate_percent
    }

    pub fn withdrawn_amount(&self) -> f64 {
        self.withdrawn_amount
    }

    /// Whole years elapsed between creation and `now`, truncated toward zero.
    pub fn years_since_creation_at(&self, now: NaiveDateTime) -> Result<i64> {
        Ok(self.base.created.seconds_until(now)? / SECONDS_PER_YEAR)
    }

    pub fn total_returns_at(&self, now: NaiveDateTime) -> Result<f64> {
        let years = self.years_since_creation_at(now)?;
        Ok(self.base.balance * years as f64 * (self.interest_rate_percent / 100.0))
    }

    pub fn saving_balance_at(&self, now: NaiveDateTime) -> Result<f64> {
        Ok(self.total_returns_at(now)? - self.withdrawn_amount)
    }

    pub fn withdraw_at(&mut self, amount: f64, now: NaiveDateTime) -> Result<()> {
        check_amount(amount)?;
        let saving_balance = self.saving_balance_at(now)?;
        if amount > saving_balance {
            trace!(
                "Certificate account {} cannot withdraw {}. Saving balance: {}",
                self.base.account_id, amount, saving_balance
            );
            return Err(BankError::InsufficientBalance);
        }
        self.withdrawn_amount += amount;
        Ok(())
    }

    pub fn years_since_creation(&self) -> Result<i64> {
        self.years_since_creation_at(Local::now().naive_local())
    }

    pub fn total_returns(&self) -> Result<f64> {
        self.total_returns_at(Local::now().naive_local())
    }

    pub fn saving_balance(&self) -> Result<f64> {
        self.saving_balance_at(Local::now().naive_local())
    }

    pub fn withdraw(&mut self, amount: f64) -> Result<()> {
        self.withdraw_at(amount, Local::now().naive_local())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BankAccount {
    Saving(SavingAccount),
    Certificate(CertificateAccount),
}

impl BankAccount {
    /// Opens a new account of the given kind. The ID stays 0 until the
    /// repository assigns a position.
    pub fn open(kind: AccountKind, person: Person, balance: f64, interest_rate_percent: f64) -> Result<Self> {
        Ok(match kind {
            AccountKind::Saving => BankAccount::Saving(SavingAccount::new(person, balance)?),
            AccountKind::Certificate => {
                BankAccount::Certificate(CertificateAccount::new(person, balance, interest_rate_percent)?)
            }
        })
    }

    fn base(&self) -> &AccountBase {
        match self {
            BankAccount::Saving(account) => &account.base,
            BankAccount::Certificate(account) => &account.base,
        }
    }

    fn base_mut(&mut self) -> &mut AccountBase {
        match self {
            BankAccount::Saving(account) => &mut account.base,
            BankAccount::Certificate(account) => &mut account.base,
        }
    }

    pub fn kind(&self) -> AccountKind {
        match self {
            BankAccount::Saving(_) => AccountKind::Saving,
            BankAccount::Certificate(_) => AccountKind::Certificate,
        }
    }

    pub fn account_id(&self) -> u32 {
        self.base().account_id
    }

    pub fn set_account_id(&mut self, account_id: u32) {
        self.base_mut().account_id = account_id;
    }

    pub fn person(&self) -> &Person {
        &self.base().person
    }

    pub fn balance(&self) -> f64 {
        self.base().balance
    }

    pub fn created(&self) -> CreationTimestamp {
        self.base().created
    }

    pub fn withdraw(&mut self, amount: f64) -> Result<()> {
        match self {
            BankAccount::Saving(account) => account.withdraw(amount),
            BankAccount::Certificate(account) => account.withdraw(amount),
        }
    }

    pub fn deposit(&mut self, amount: f64) -> Result<()> {
        match self {
            BankAccount::Saving(account) => account.deposit(amount),
            BankAccount::Certificate(_) => Err(BankError::UnsupportedOperation("deposit")),
        }
    }
}
