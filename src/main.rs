use std::error::Error;
use std::io;
use std::process::ExitCode;

use crate::config::Config;
use crate::repository::Repository;

mod account;
mod cli;
mod config;
mod csv_handler;
mod display;
mod error;
mod person;
mod repository;
mod timestamp;

fn run() -> error::Result<()> {
    let config = Config::from_env(std::env::args().nth(1))?;
    let mut repository = Repository::open(&config)?;

    let outcome = cli::Shell::new(&mut repository, io::stdin().lock(), io::stdout().lock()).run();
    // Save even when the session ended on bad input; nothing entered so far is lost.
    repository.save()?;
    outcome
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            let mut message = e.to_string();
            let mut source = e.source();
            while let Some(cause) = source {
                message.push_str(&format!(": {cause}"));
                source = cause.source();
            }
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}
