use std::io::{BufRead, Write};
use std::str::FromStr;

use chrono::Local;
use log::debug;

use crate::account::{AccountKind, BankAccount, MIN_BALANCE};
use crate::display;
use crate::error::{BankError, Result};
use crate::person::{validate_age, validate_name, validate_phone_number, NationalId, Person};
use crate::repository::{PersonUpdate, Repository};

const MENU_OPTIONS: [&str; 9] = [
    "Add new person",
    "Create new account",
    "Search person",
    "Update person",
    "Update account",
    "List all persons",
    "List all accounts",
    "Delete person",
    "Delete account",
];

const KEEP: &str = "0";

/// Interactive console session over a repository.
///
/// Validation failures are reported and the operation ends (or the field is
/// asked again). Input that cannot be read as the requested number, a broken
/// data file, or end of input in the middle of an operation ends the session.
pub struct Shell<'a, R, W> {
    repository: &'a mut Repository,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Shell<'a, R, W> {
    pub fn new(repository: &'a mut Repository, input: R, output: W) -> Self {
        Shell {
            repository,
            input,
            output,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        writeln!(self.output, "Welcome to the Banking System!")?;
        writeln!(self.output, "{}", Local::now().format("%a %b %e %H:%M:%S %Y"))?;
        writeln!(self.output)?;

        loop {
            display::print_table(&mut self.output, &display::options_table("Option", &MENU_OPTIONS))?;
            let Some(line) = self.read_line("Please enter your choice (1-9): ")? else {
                break;
            };
            let mut choice: usize = parse_number(&line)?;
            if !(1..=MENU_OPTIONS.len()).contains(&choice) {
                writeln!(self.output, "Error: Invalid choice. Please select a number between 1 and 9.")?;
                choice = self.ask_choice("Please enter your choice (1-9): ", MENU_OPTIONS.len())?;
            }

            debug!("Menu choice {}", choice);
            match self.dispatch(choice) {
                Err(e) if !e.is_fatal() => writeln!(self.output, "Error: {e}")?,
                other => other?,
            }

            let answer = self.read_line(
                "Would you like to perform another operation? (Y/y for yes, any other key to exit): ",
            )?;
            if !answer.is_some_and(|answer| answer.trim().eq_ignore_ascii_case("y")) {
                break;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, choice: usize) -> Result<()> {
        match choice {
            1 => self.add_person(),
            2 => self.create_account(),
            3 => self.search_person(),
            4 => self.update_person(),
            5 => self.update_account(),
            6 => self.list_persons(),
            7 => self.list_accounts(),
            8 => self.delete_person(),
            9 => self.delete_account(),
            _ => unreachable!("menu choice is range checked"),
        }
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.read_line(prompt)?
            .ok_or_else(|| BankError::InvalidInput("unexpected end of input".to_string()))
    }

    fn ask_number<T: FromStr>(&mut self, prompt: &str) -> Result<T> {
        let line = self.ask(prompt)?;
        parse_number(&line)
    }

    /// Asks until `check` accepts the answer, reporting every rejection.
    fn ask_until<T>(&mut self, prompt: &str, mut check: impl FnMut(&mut Self, &str) -> Result<T>) -> Result<T> {
        loop {
            let line = self.ask(prompt)?;
            match check(self, &line) {
                Err(e) if !e.is_fatal() => writeln!(self.output, "Error: {e}")?,
                other => return other,
            }
        }
    }

    fn ask_choice(&mut self, prompt: &str, count: usize) -> Result<usize> {
        loop {
            let choice: usize = self.ask_number(prompt)?;
            if (1..=count).contains(&choice) {
                return Ok(choice);
            }
            writeln!(
                self.output,
                "Error: Invalid choice. Please select a number between 1 and {count}."
            )?;
        }
    }

    fn ask_national_id(&mut self) -> Result<u64> {
        self.ask_number("Please enter the person's national ID: ")
    }

    fn registered_person(&mut self) -> Result<Person> {
        let national_id = self.ask_national_id()?;
        self.repository
            .find_person(national_id)
            .cloned()
            .ok_or(BankError::PersonNotFound(national_id))
    }

    fn show_person(&mut self, person: &Person) -> Result<()> {
        let accounts = self.repository.accounts_of(person.national_id().value())?;
        writeln!(self.output, "Client Information:")?;
        display::print_table(&mut self.output, &display::persons_table([person]))?;
        writeln!(self.output, "Client Accounts:")?;
        display::print_table(&mut self.output, &display::accounts_table(&accounts)?)
    }

    fn add_person(&mut self) -> Result<()> {
        let national_id = NationalId::new(self.ask_national_id()?)?;
        if self.repository.find_person(national_id.value()).is_some() {
            return Err(BankError::PersonAlreadyExists);
        }

        let name = self.ask_until("Please enter the person's name: ", |_, line| {
            let name = line.trim();
            validate_name(name).map(|_| name.to_string())
        })?;
        let age = self.ask_until("Please enter the person's age: ", |_, line| {
            let age = parse_number(line)?;
            validate_age(age).map(|_| age)
        })?;
        let phone_number = self.ask_until("Please enter the person's phone number: ", |_, line| {
            let phone_number = line.trim();
            validate_phone_number(phone_number).map(|_| phone_number.to_string())
        })?;

        self.repository
            .create_person(Person::new(national_id.value(), name, age, phone_number)?)?;
        writeln!(self.output, "The person has been successfully added.")?;
        Ok(())
    }

    fn create_account(&mut self) -> Result<()> {
        let person = self.registered_person()?;
        let national_id = person.national_id().value();
        self.show_person(&person)?;

        writeln!(
            self.output,
            "A savings account allows deposits and withdrawals while keeping a minimum balance of ${MIN_BALANCE}."
        )?;
        writeln!(
            self.output,
            "A certificate account keeps a fixed base balance and earns yearly interest that can be withdrawn."
        )?;
        let labels = [AccountKind::Saving.label(), AccountKind::Certificate.label()];
        display::print_table(&mut self.output, &display::options_table("Account Type", &labels))?;
        let kind = match self.ask_choice("Please select an account type: ", labels.len())? {
            1 => AccountKind::Saving,
            _ => AccountKind::Certificate,
        };

        let account_id = self.ask_until("Enter the initial balance for the new account: ", |shell, line| {
            let balance = parse_number(line)?;
            shell.repository.create_account(national_id, kind, balance)
        })?;
        writeln!(self.output, "{} {} has been created.", kind.label(), account_id)?;
        Ok(())
    }

    fn search_person(&mut self) -> Result<()> {
        let person = self.registered_person()?;
        self.show_person(&person)
    }

    fn update_person(&mut self) -> Result<()> {
        let person = self.registered_person()?;
        self.show_person(&person)?;

        let name = self.ask_until("Please enter the new name (or 0 to keep unchanged): ", |_, line| {
            let line = line.trim();
            if line == KEEP {
                return Ok(None);
            }
            validate_name(line).map(|_| Some(line.to_string()))
        })?;
        let age = self.ask_until("Please enter the new age (or 0 to keep unchanged): ", |_, line| {
            match parse_number(line)? {
                0 => Ok(None),
                age => validate_age(age).map(|_| Some(age)),
            }
        })?;
        let phone_number = self.ask_until(
            "Please enter the new phone number (or 0 to keep unchanged): ",
            |_, line| {
                let line = line.trim();
                if line == KEEP {
                    return Ok(None);
                }
                validate_phone_number(line).map(|_| Some(line.to_string()))
            },
        )?;

        let update = PersonUpdate {
            name,
            age,
            phone_number,
        };
        self.repository.update_person(person.national_id().value(), update)?;
        writeln!(self.output, "The person has been successfully updated.")?;
        Ok(())
    }

    fn ask_owned_account(&mut self, person: &Person, prompt: &str) -> Result<BankAccount> {
        let national_id = person.national_id().value();
        self.ask_until(prompt, |shell, line| {
            let account = shell.repository.account(parse_number(line)?)?;
            if account.person().national_id() != person.national_id() {
                return Err(BankError::AccountNotOwned {
                    account_id: account.account_id(),
                    national_id,
                });
            }
            Ok(account)
        })
    }

    fn update_account(&mut self) -> Result<()> {
        let person = self.registered_person()?;
        let national_id = person.national_id().value();
        self.show_person(&person)?;
        let account = self.ask_owned_account(&person, "Enter the Account ID to update: ")?;
        let account_id = account.account_id();

        let updated = match account {
            BankAccount::Saving(saving) => {
                display::print_table(
                    &mut self.output,
                    &display::options_table("Update Option", &["Deposit", "Withdraw"]),
                )?;
                if self.ask_choice("Please select an option: ", 2)? == 1 {
                    self.ask_until("Enter the deposit amount: ", |shell, line| {
                        shell.repository.deposit(national_id, account_id, parse_number(line)?)
                    })?
                } else {
                    writeln!(self.output, "You can withdraw up to ${:.2}.", saving.withdrawable())?;
                    self.ask_until("Enter the withdrawal amount: ", |shell, line| {
                        shell.repository.withdraw(national_id, account_id, parse_number(line)?)
                    })?
                }
            }
            BankAccount::Certificate(certificate) => {
                writeln!(
                    self.output,
                    "This certificate is {} year(s) old and has earned ${:.2} in total.",
                    certificate.years_since_creation()?,
                    certificate.total_returns()?
                )?;
                writeln!(
                    self.output,
                    "Your current saving balance is ${:.2}.",
                    certificate.saving_balance()?
                )?;
                self.ask_until("Enter the withdrawal amount: ", |shell, line| {
                    shell.repository.withdraw(national_id, account_id, parse_number(line)?)
                })?
            }
        };

        display::print_table(&mut self.output, &display::accounts_table([&updated])?)
    }

    fn list_persons(&mut self) -> Result<()> {
        let table = display::persons_table(self.repository.persons());
        display::print_table(&mut self.output, &table)
    }

    fn list_accounts(&mut self) -> Result<()> {
        let accounts = self.repository.accounts()?;
        display::print_table(&mut self.output, &display::accounts_table(&accounts)?)
    }

    fn delete_person(&mut self) -> Result<()> {
        let person = self.registered_person()?;
        self.show_person(&person)?;
        let answer = self.ask(
            "Deleting this person will also delete all associated accounts. Confirm with (Y/y): ",
        )?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            writeln!(
                self.output,
                "Deletion canceled. The person and their accounts remain in the system."
            )?;
            return Ok(());
        }
        let removed = self.repository.delete_person(person.national_id().value())?;
        writeln!(
            self.output,
            "The person and their {removed} account(s) have been successfully deleted."
        )?;
        Ok(())
    }

    fn delete_account(&mut self) -> Result<()> {
        let person = self.registered_person()?;
        self.show_person(&person)?;
        let account = self.ask_owned_account(&person, "Enter the Account ID to delete: ")?;
        self.repository
            .delete_account(person.national_id().value(), account.account_id())?;
        writeln!(
            self.output,
            "Account {} has been deleted. The following accounts have been renumbered.",
            account.account_id()
        )?;
        Ok(())
    }
}

fn parse_number<T: FromStr>(line: &str) -> Result<T> {
    let line = line.trim();
    line.parse()
        .map_err(|_| BankError::InvalidInput(format!("{line:?} is not a valid number")))
}
