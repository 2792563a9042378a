use std::path::PathBuf;

use log::{debug, error, info, trace, warn};

use crate::account::{AccountKind, BankAccount};
use crate::config::Config;
use crate::csv_handler::{self, AccountRow};
use crate::error::{BankError, Result};
use crate::person::Person;

/// Changes to apply to a person. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonUpdate {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub phone_number: Option<String>,
}

/// In-memory store of persons and account rows, backed by two CSV files.
///
/// Persons are kept sorted by national ID. Accounts are kept as rows in file
/// order; an account's ID is its position plus one and is reassigned every
/// time the accounts file is written, so deleting an account renumbers every
/// account after it.
///
/// Every mutation builds the new collection, writes it to disk and only then
/// replaces the in-memory one. A failed write leaves the repository as it was.
#[derive(Debug)]
pub struct Repository {
    persons: Vec<Person>,
    accounts: Vec<AccountRow>,
    persons_path: PathBuf,
    accounts_path: PathBuf,
    interest_rate_percent: f64,
}

fn renumber(rows: &mut [AccountRow]) {
    for (position, row) in rows.iter_mut().enumerate() {
        row.account_id = position as u32 + 1;
    }
}

impl Repository {
    pub fn open(config: &Config) -> Result<Self> {
        let persons_path = config.persons_path();
        let accounts_path = config.accounts_path();

        let mut persons = csv_handler::load_persons(&persons_path)?;
        persons.sort();
        let loaded = persons.len();
        persons.dedup_by_key(|person| person.national_id());
        if persons.len() != loaded {
            warn!(
                "Dropped {} duplicate persons from {}",
                loaded - persons.len(),
                persons_path.display()
            );
        }
        let mut accounts = csv_handler::load_accounts(&accounts_path)?;
        renumber(&mut accounts);

        info!(
            "Loaded {} persons and {} accounts from {}",
            persons.len(),
            accounts.len(),
            config.data_dir().display()
        );

        Ok(Repository {
            persons,
            accounts,
            persons_path,
            accounts_path,
            interest_rate_percent: config.interest_rate_percent,
        })
    }

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[AccountRow] {
        &self.accounts
    }

    /// Binary search over the persons, which are always sorted by national ID.
    pub fn find_person(&self, national_id: u64) -> Option<&Person> {
        self.find_person_index(national_id).map(|index| &self.persons[index])
    }

    pub fn find_person_index(&self, national_id: u64) -> Option<usize> {
        self.persons
            .binary_search_by_key(&national_id, |person| person.national_id().value())
            .ok()
    }

    fn person(&self, national_id: u64) -> Result<&Person> {
        self.find_person(national_id).ok_or_else(|| {
            trace!("Person {} not found", national_id);
            BankError::PersonNotFound(national_id)
        })
    }

    pub fn create_person(&mut self, person: Person) -> Result<()> {
        let position = match self.persons.binary_search(&person) {
            Ok(_) => {
                trace!("Person {} already exists", person.national_id());
                return Err(BankError::PersonAlreadyExists);
            }
            Err(position) => position,
        };
        debug!("Adding person {}", person.national_id());
        let mut persons = self.persons.clone();
        persons.insert(position, person);
        self.commit_persons(persons)
    }

    /// Applies every field of `update` to a copy of the person; nothing is
    /// stored unless all of them are valid.
    pub fn update_person(&mut self, national_id: u64, update: PersonUpdate) -> Result<Person> {
        let index = self
            .find_person_index(national_id)
            .ok_or(BankError::PersonNotFound(national_id))?;

        let mut person = self.persons[index].clone();
        if let Some(name) = update.name {
            person.set_name(name)?;
        }
        if let Some(age) = update.age {
            person.set_age(age)?;
        }
        if let Some(phone_number) = update.phone_number {
            person.set_phone_number(phone_number)?;
        }

        debug!("Updating person {}", national_id);
        let mut persons = self.persons.clone();
        persons[index] = person.clone();
        self.commit_persons(persons)?;
        Ok(person)
    }

    /// Deletes a person together with every account they own. Returns the
    /// number of accounts removed.
    pub fn delete_person(&mut self, national_id: u64) -> Result<usize> {
        let index = self
            .find_person_index(national_id)
            .ok_or(BankError::PersonNotFound(national_id))?;

        // Group the person's rows into one block, cut it out, then restore ID order.
        let mut rows = self.accounts.clone();
        rows.sort_by_key(|row| row.national_id);
        let removed = match rows.iter().position(|row| row.national_id == national_id) {
            Some(first) => {
                let count = rows[first..]
                    .iter()
                    .take_while(|row| row.national_id == national_id)
                    .count();
                rows.drain(first..first + count);
                count
            }
            None => 0,
        };
        rows.sort_by_key(|row| row.account_id);

        let mut persons = self.persons.clone();
        persons.remove(index);

        debug!("Deleting person {} and {} accounts", national_id, removed);
        self.commit_all(persons, rows)?;
        Ok(removed)
    }

    /// Opens a new account for an existing person and returns its ID.
    pub fn create_account(&mut self, national_id: u64, kind: AccountKind, balance: f64) -> Result<u32> {
        let person = self.person(national_id)?.clone();
        let mut account = BankAccount::open(kind, person, balance, self.interest_rate_percent)?;

        let account_id = self.accounts.len() as u32 + 1;
        account.set_account_id(account_id);
        debug!("Opening {} {} for {}", kind.label(), account_id, national_id);

        let mut rows = self.accounts.clone();
        rows.push(AccountRow::encode(&account));
        self.commit_accounts(rows)?;
        Ok(account_id)
    }

    fn row_index(&self, account_id: u32) -> Result<usize> {
        account_id
            .checked_sub(1)
            .map(|index| index as usize)
            .filter(|&index| index < self.accounts.len())
            .ok_or(BankError::AccountNotFound(account_id))
    }

    fn decode(&self, row: &AccountRow) -> Result<BankAccount> {
        row.decode(self.person(row.national_id)?)
    }

    pub fn account(&self, account_id: u32) -> Result<BankAccount> {
        let index = self.row_index(account_id)?;
        self.decode(&self.accounts[index])
    }

    pub fn accounts(&self) -> Result<Vec<BankAccount>> {
        self.accounts.iter().map(|row| self.decode(row)).collect()
    }

    pub fn accounts_of(&self, national_id: u64) -> Result<Vec<BankAccount>> {
        let owner = self.person(national_id)?;
        self.accounts
            .iter()
            .filter(|row| row.national_id == national_id)
            .map(|row| row.decode(owner))
            .collect()
    }

    fn owned_account(&self, national_id: u64, account_id: u32) -> Result<(usize, BankAccount)> {
        let owner = self.person(national_id)?;
        let index = self.row_index(account_id)?;
        let row = &self.accounts[index];
        if row.national_id != national_id {
            trace!("Account {} is not owned by {}", account_id, national_id);
            return Err(BankError::AccountNotOwned {
                account_id,
                national_id,
            });
        }
        Ok((index, row.decode(owner)?))
    }

    fn update_account(
        &mut self,
        national_id: u64,
        account_id: u32,
        apply: impl FnOnce(&mut BankAccount) -> Result<()>,
    ) -> Result<BankAccount> {
        let (index, mut account) = self.owned_account(national_id, account_id)?;
        apply(&mut account)?;

        let mut rows = self.accounts.clone();
        rows[index] = AccountRow::encode(&account);
        self.commit_accounts(rows)?;
        Ok(account)
    }

    pub fn deposit(&mut self, national_id: u64, account_id: u32, amount: f64) -> Result<BankAccount> {
        debug!("Deposit of {} into account {}", amount, account_id);
        self.update_account(national_id, account_id, |account| account.deposit(amount))
    }

    pub fn withdraw(&mut self, national_id: u64, account_id: u32, amount: f64) -> Result<BankAccount> {
        debug!("Withdrawal of {} from account {}", amount, account_id);
        self.update_account(national_id, account_id, |account| account.withdraw(amount))
    }

    /// Removes an account; every account after it moves down by one ID.
    pub fn delete_account(&mut self, national_id: u64, account_id: u32) -> Result<BankAccount> {
        let (index, account) = self.owned_account(national_id, account_id)?;
        debug!("Deleting account {}", account_id);

        let mut rows = self.accounts.clone();
        rows.remove(index);
        self.commit_accounts(rows)?;
        Ok(account)
    }

    /// Rewrites both backing files from memory.
    pub fn save(&mut self) -> Result<()> {
        self.commit_all(self.persons.clone(), self.accounts.clone())
    }

    fn commit_persons(&mut self, persons: Vec<Person>) -> Result<()> {
        csv_handler::write_persons(&self.persons_path, &persons)?;
        info!("Saved {} persons to {}", persons.len(), self.persons_path.display());
        self.persons = persons;
        Ok(())
    }

    fn commit_accounts(&mut self, mut rows: Vec<AccountRow>) -> Result<()> {
        renumber(&mut rows);
        csv_handler::write_accounts(&self.accounts_path, &rows)?;
        info!("Saved {} accounts to {}", rows.len(), self.accounts_path.display());
        self.accounts = rows;
        Ok(())
    }

    fn commit_all(&mut self, persons: Vec<Person>, mut rows: Vec<AccountRow>) -> Result<()> {
        renumber(&mut rows);
        csv_handler::write_accounts(&self.accounts_path, &rows)?;
        if let Err(e) = csv_handler::write_persons(&self.persons_path, &persons) {
            if let Err(restore) = csv_handler::write_accounts(&self.accounts_path, &self.accounts) {
                error!("Could not restore {}: {}", self.accounts_path.display(), restore);
            }
            return Err(e);
        }
        info!(
            "Saved {} persons and {} accounts",
            persons.len(),
            rows.len()
        );
        self.persons = persons;
        self.accounts = rows;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{INTEREST_RATE_PERCENT, MIN_BALANCE};
    use std::fs;
    use tempfile::TempDir;

    const A: u64 = 20_000_000_000_001;
    const B: u64 = 20_000_000_000_002;
    const C: u64 = 20_000_000_000_003;

    fn open(dir: &TempDir) -> Repository {
        Repository::open(&Config::new(dir.path())).unwrap()
    }

    fn person(national_id: u64) -> Person {
        Person::new(national_id, format!("Person {national_id}"), 30, "0100").unwrap()
    }

    fn ids_and_owners(repo: &Repository) -> Vec<(u32, u64)> {
        repo.rows().iter().map(|row| (row.account_id, row.national_id)).collect()
    }

    #[test]
    fn test_open_creates_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open(&dir);
        assert!(repo.persons().is_empty());
        assert!(repo.rows().is_empty());
        assert!(dir.path().join("Persons.csv").exists());
        assert!(dir.path().join("Accounts.csv").exists());
    }

    #[test]
    fn test_create_person_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(A)).unwrap();
        assert!(matches!(repo.create_person(person(A)), Err(BankError::PersonAlreadyExists)));
        assert_eq!(repo.persons().len(), 1);
    }

    #[test]
    fn test_find_person_matches_linear_scan() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        let keys = [
            55_000_000_000_000,
            10_000_000_000_000,
            99_999_999_999_999,
            31_000_000_000_007,
            31_000_000_000_003,
            72_123_456_789_012,
        ];
        for key in keys {
            repo.create_person(person(key)).unwrap();
        }

        for key in keys {
            let linear = repo.persons().iter().find(|p| p.national_id().value() == key);
            assert_eq!(repo.find_person(key), linear);
            assert!(repo.find_person_index(key).is_some());
        }
        for absent in [10_000_000_000_001, 31_000_000_000_005, 99_999_999_999_998, 42] {
            assert_eq!(repo.find_person(absent), None);
            assert_eq!(repo.find_person_index(absent), None);
        }
    }

    #[test]
    fn test_persons_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(B)).unwrap();
        repo.create_person(person(A)).unwrap();

        let reopened = open(&dir);
        assert_eq!(reopened.persons(), &[person(A), person(B)]);
    }

    #[test]
    fn test_update_person_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(A)).unwrap();
        let file_before = fs::read_to_string(dir.path().join("Persons.csv")).unwrap();

        let update = PersonUpdate {
            name: Some("New Name".into()),
            age: Some(150),
            phone_number: None,
        };
        assert!(matches!(repo.update_person(A, update), Err(BankError::InvalidAge)));
        assert_eq!(repo.find_person(A), Some(&person(A)));
        assert_eq!(fs::read_to_string(dir.path().join("Persons.csv")).unwrap(), file_before);

        let update = PersonUpdate {
            name: Some("New Name".into()),
            age: None,
            phone_number: Some("0111".into()),
        };
        let updated = repo.update_person(A, update).unwrap();
        assert_eq!(updated.name(), "New Name");
        assert_eq!(updated.age(), 30);
        assert_eq!(updated.phone_number(), "0111");
        assert_eq!(open(&dir).find_person(A), Some(&updated));
    }

    #[test]
    fn test_update_missing_person() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        assert!(matches!(
            repo.update_person(A, PersonUpdate::default()),
            Err(BankError::PersonNotFound(A))
        ));
    }

    #[test]
    fn test_create_account_assigns_positions() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(A)).unwrap();

        assert_eq!(repo.create_account(A, AccountKind::Saving, 1500.0).unwrap(), 1);
        assert_eq!(repo.create_account(A, AccountKind::Certificate, 2000.0).unwrap(), 2);
        assert!(matches!(
            repo.create_account(A, AccountKind::Saving, MIN_BALANCE - 1.0),
            Err(BankError::InsufficientBalance)
        ));
        assert!(matches!(
            repo.create_account(B, AccountKind::Saving, 1500.0),
            Err(BankError::PersonNotFound(B))
        ));

        match repo.account(2).unwrap() {
            BankAccount::Certificate(certificate) => {
                assert_eq!(certificate.interest_rate_percent(), INTEREST_RATE_PERCENT);
                assert_eq!(certificate.withdrawn_amount(), 0.0);
            }
            other => panic!("expected a certificate account, got {other:?}"),
        }
        assert_eq!(open(&dir).accounts().unwrap(), repo.accounts().unwrap());
    }

    #[test]
    fn test_delete_account_renumbers_following_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(A)).unwrap();
        repo.create_person(person(B)).unwrap();
        for owner in [A, B, A, B, A] {
            repo.create_account(owner, AccountKind::Saving, 1000.0).unwrap();
        }

        let removed = repo.delete_account(B, 2).unwrap();
        assert_eq!(removed.person().national_id().value(), B);
        assert_eq!(ids_and_owners(&repo), vec![(1, A), (2, A), (3, B), (4, A)]);

        let on_disk = open(&dir);
        assert_eq!(ids_and_owners(&on_disk), vec![(1, A), (2, A), (3, B), (4, A)]);
    }

    #[test]
    fn test_delete_account_checks_owner() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(A)).unwrap();
        repo.create_person(person(B)).unwrap();
        repo.create_account(A, AccountKind::Saving, 1000.0).unwrap();

        assert!(matches!(
            repo.delete_account(B, 1),
            Err(BankError::AccountNotOwned { account_id: 1, national_id: B })
        ));
        assert!(matches!(repo.delete_account(A, 2), Err(BankError::AccountNotFound(2))));
        assert!(matches!(repo.delete_account(A, 0), Err(BankError::AccountNotFound(0))));
        assert_eq!(repo.rows().len(), 1);
    }

    #[test]
    fn test_delete_person_cascades_to_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        for id in [A, B, C] {
            repo.create_person(person(id)).unwrap();
        }
        for owner in [A, B, B, C] {
            repo.create_account(owner, AccountKind::Saving, 1000.0).unwrap();
        }

        assert_eq!(repo.delete_person(B).unwrap(), 2);
        assert_eq!(ids_and_owners(&repo), vec![(1, A), (2, C)]);
        assert_eq!(repo.find_person(B), None);

        let on_disk = open(&dir);
        assert_eq!(ids_and_owners(&on_disk), vec![(1, A), (2, C)]);
        assert_eq!(on_disk.persons(), &[person(A), person(C)]);
    }

    #[test]
    fn test_delete_person_keeps_order_of_other_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        for id in [A, B, C] {
            repo.create_person(person(id)).unwrap();
        }
        for owner in [C, B, A, B, C] {
            repo.create_account(owner, AccountKind::Saving, 1000.0).unwrap();
        }

        assert_eq!(repo.delete_person(B).unwrap(), 2);
        assert_eq!(ids_and_owners(&repo), vec![(1, C), (2, A), (3, C)]);
    }

    #[test]
    fn test_delete_person_without_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(A)).unwrap();
        repo.create_person(person(B)).unwrap();
        repo.create_account(A, AccountKind::Saving, 1000.0).unwrap();

        assert_eq!(repo.delete_person(B).unwrap(), 0);
        assert_eq!(ids_and_owners(&repo), vec![(1, A)]);
        assert!(matches!(repo.delete_person(B), Err(BankError::PersonNotFound(B))));
    }

    #[test]
    fn test_deposit_and_withdraw_saving() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(A)).unwrap();
        repo.create_account(A, AccountKind::Saving, 1200.0).unwrap();

        assert_eq!(repo.deposit(A, 1, 300.0).unwrap().balance(), 1500.0);
        assert_eq!(repo.withdraw(A, 1, 500.0).unwrap().balance(), 1000.0);
        assert!(matches!(repo.withdraw(A, 1, 0.5), Err(BankError::InsufficientBalance)));
        assert!(matches!(repo.deposit(A, 1, -1.0), Err(BankError::InvalidAmount)));
        assert_eq!(open(&dir).account(1).unwrap().balance(), 1000.0);
    }

    #[test]
    fn test_certificate_rejects_deposit_and_early_withdrawal() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(A)).unwrap();
        repo.create_account(A, AccountKind::Certificate, 5000.0).unwrap();

        assert!(matches!(repo.deposit(A, 1, 10.0), Err(BankError::UnsupportedOperation(_))));
        assert!(matches!(repo.withdraw(A, 1, 10.0), Err(BankError::InsufficientBalance)));
        assert_eq!(repo.rows()[0].withdrawn_amount, Some(0.0));
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(A)).unwrap();

        let accounts_path = dir.path().join("Accounts.csv");
        fs::remove_file(&accounts_path).unwrap();
        fs::create_dir(&accounts_path).unwrap();

        assert!(matches!(
            repo.create_account(A, AccountKind::Saving, 1000.0),
            Err(BankError::InvalidFile { .. })
        ));
        assert!(repo.rows().is_empty());

        assert!(matches!(repo.delete_person(A), Err(BankError::InvalidFile { .. })));
        assert_eq!(repo.persons(), &[person(A)]);
    }

    #[test]
    fn test_account_with_unknown_owner_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Accounts.csv"),
            format!("1,{A},1000.0,125-9-19-14-3-7,,\n"),
        )
        .unwrap();
        let repo = open(&dir);
        assert_eq!(repo.rows().len(), 1);
        assert!(matches!(repo.account(1), Err(BankError::PersonNotFound(A))));
    }

    #[test]
    fn test_deposit_that_overflows_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = open(&dir);
        repo.create_person(person(A)).unwrap();
        repo.create_account(A, AccountKind::Saving, 1000.0).unwrap();

        repo.deposit(A, 1, f64::MAX).unwrap();
        assert!(matches!(repo.deposit(A, 1, f64::MAX), Err(BankError::InvalidAmount)));
        assert!(repo.rows()[0].balance.is_finite());
        assert_eq!(open(&dir).accounts().unwrap().len(), 1);
    }

    #[test]
    fn test_ids_follow_positions_after_skipped_row() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Persons.csv"), format!("{A},Ahmed,30,0100\n")).unwrap();
        fs::write(
            dir.path().join("Accounts.csv"),
            format!(
                "1,{A},1000.0,125-9-19-14-3-7,,\n\
                 2,{A},abc,125-9-19-14-3-8,,\n\
                 3,{A},3000.0,125-9-19-14-3-9,,\n"
            ),
        )
        .unwrap();

        let repo = open(&dir);
        assert_eq!(ids_and_owners(&repo), vec![(1, A), (2, A)]);
        for (position, account) in repo.accounts().unwrap().iter().enumerate() {
            assert_eq!(account.account_id() as usize, position + 1);
        }
        assert_eq!(repo.account(2).unwrap().account_id(), 2);
        assert_eq!(repo.account(2).unwrap().balance(), 3000.0);
        assert!(matches!(repo.account(3), Err(BankError::AccountNotFound(3))));
    }

    #[test]
    fn test_bad_first_row_keeps_accounts_on_save() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Persons.csv"), format!("{A},Ahmed,30,0100\n")).unwrap();
        fs::write(
            dir.path().join("Accounts.csv"),
            format!(
                "1,{A},1000.0,125-9-19-14-3-7,\n\
                 2,{A},2000.0,125-9-19-14-3-8,,\n\
                 3,{A},3000.0,125-9-19-14-3-9,25.0,0.0\n"
            ),
        )
        .unwrap();

        let mut repo = open(&dir);
        assert_eq!(repo.rows().len(), 2);
        repo.save().unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("Accounts.csv")).unwrap(),
            format!("1,{A},2000.0,125-9-19-14-3-8,,\n2,{A},3000.0,125-9-19-14-3-9,25.0,0.0\n")
        );
    }

    #[test]
    fn test_save_renumbers_loaded_rows() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Persons.csv"), format!("{A},Ahmed,30,0100\n")).unwrap();
        fs::write(
            dir.path().join("Accounts.csv"),
            format!("7,{A},1000.0,125-9-19-14-3-7,,\n9,{A},2000.0,125-9-19-14-3-8,25.0,0.0\n"),
        )
        .unwrap();

        let mut repo = open(&dir);
        repo.save().unwrap();
        assert_eq!(ids_and_owners(&repo), vec![(1, A), (2, A)]);
        assert_eq!(
            fs::read_to_string(dir.path().join("Accounts.csv")).unwrap(),
            format!("1,{A},1000.0,125-9-19-14-3-7,,\n2,{A},2000.0,125-9-19-14-3-8,25.0,0.0\n")
        );
    }
}
