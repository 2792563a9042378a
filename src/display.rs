use std::io::Write;

use crate::account::BankAccount;
use crate::error::Result;
use crate::person::Person;

pub const PERSON_HEADER: [&str; 4] = ["NationalID", "Name", "Age", "Phone Number"];
pub const ACCOUNT_HEADER: [&str; 8] = [
    "AccountID",
    "Account Type",
    "NationalID",
    "Balance",
    "Creation Date & Time",
    "Interest Rate",
    "Withdrawn Amount",
    "Saving Balance",
];

/// Renders rows as a boxed table. The first row is the header; every row is
/// expected to have as many cells as the header.
pub fn render_table(rows: &[Vec<String>]) -> String {
    let Some(header) = rows.first() else {
        return String::new();
    };
    let mut widths = vec![0; header.len()];
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let line = "-".repeat(widths.iter().sum::<usize>() + widths.len() + 1);

    let mut table = String::new();
    for row in rows {
        table.push_str(&line);
        table.push('\n');
        table.push('|');
        for (&width, cell) in widths.iter().zip(row) {
            table.push_str(&format!("{cell:<width$}|"));
        }
        table.push('\n');
    }
    table.push_str(&line);
    table.push('\n');
    table
}

pub fn print_table(out: &mut impl Write, rows: &[Vec<String>]) -> Result<()> {
    out.write_all(render_table(rows).as_bytes())?;
    Ok(())
}

fn header(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|cell| cell.to_string()).collect()
}

pub fn person_cells(person: &Person) -> Vec<String> {
    vec![
        person.national_id().to_string(),
        person.name().to_string(),
        person.age().to_string(),
        person.phone_number().to_string(),
    ]
}

pub fn account_cells(account: &BankAccount) -> Result<Vec<String>> {
    let (interest_rate, withdrawn, saving_balance) = match account {
        BankAccount::Saving(_) => (String::new(), String::new(), String::new()),
        BankAccount::Certificate(certificate) => (
            format!("{}%", certificate.interest_rate_percent()),
            format!("{:.2}", certificate.withdrawn_amount()),
            format!("{:.2}", certificate.saving_balance()?),
        ),
    };
    Ok(vec![
        account.account_id().to_string(),
        account.kind().label().to_string(),
        account.person().national_id().to_string(),
        format!("{:.2}", account.balance()),
        account.created().to_human()?,
        interest_rate,
        withdrawn,
        saving_balance,
    ])
}

pub fn persons_table<'a>(persons: impl IntoIterator<Item = &'a Person>) -> Vec<Vec<String>> {
    std::iter::once(header(&PERSON_HEADER))
        .chain(persons.into_iter().map(person_cells))
        .collect()
}

pub fn accounts_table<'a>(accounts: impl IntoIterator<Item = &'a BankAccount>) -> Result<Vec<Vec<String>>> {
    let mut table = vec![header(&ACCOUNT_HEADER)];
    for account in accounts {
        table.push(account_cells(account)?);
    }
    Ok(table)
}

pub fn options_table(title: &str, options: &[&str]) -> Vec<Vec<String>> {
    std::iter::once(vec!["No.".to_string(), title.to_string()])
        .chain(
            options
                .iter()
                .enumerate()
                .map(|(i, option)| vec![format!("{}.", i + 1), option.to_string()]),
        )
        .collect()
}
