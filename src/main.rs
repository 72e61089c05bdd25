mod cli;
mod config;
mod control;
mod error;
mod http;
mod install;
mod process;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use config::InstallerSettings;
use error::InstallerError;
use http::HttpFetcher;
use install::Installer;
use install::prompt::{Prompter, TerminalPrompter, ask_until, parse_choice};
use install::shortcut::RenameOutcome;
use install::{privilege, wizard};
use process::SystemRunner;

fn main() {
    // Initialize logger with the same format as the service tooling
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = real_main() {
        error!("{e:#}");
        if let Some(hint) = e
            .downcast_ref::<InstallerError>()
            .and_then(InstallerError::remediation)
        {
            eprintln!("hint: {hint}");
        }
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let args = cli::Args::parse();

    privilege::require_root()?;

    let settings = InstallerSettings::load(args.settings.as_deref())
        .context("Failed to load installer settings")?;
    let runner = SystemRunner;
    let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;
    let installer = Installer::new(&settings, &runner, &fetcher);
    let mut prompter = TerminalPrompter;

    match args.sub.unwrap_or(cli::Cmd::Menu) {
        cli::Cmd::Menu => run_menu(&installer, &mut prompter),
        cmd => dispatch(cmd, &installer, &mut prompter),
    }
}

fn run_menu(installer: &Installer<'_>, prompter: &mut dyn Prompter) -> Result<()> {
    wizard::show_welcome();
    let choice = ask_until(prompter, "Choose", None, |input| {
        parse_choice(input, &["1", "2", "3", "4", "0"])
    })?;

    let cmd = match choice {
        "1" => cli::Cmd::Install,
        "2" => cli::Cmd::Uninstall,
        "3" => cli::Cmd::Inspect,
        "4" => cli::Cmd::RenameShortcut,
        _ => {
            info!("Exiting");
            return Ok(());
        }
    };
    dispatch(cmd, installer, prompter)
}

fn dispatch(cmd: cli::Cmd, installer: &Installer<'_>, prompter: &mut dyn Prompter) -> Result<()> {
    match cmd {
        cli::Cmd::Install => {
            let report = installer.install(prompter).context("Installation failed")?;
            wizard::show_completion(&report);
        }
        cli::Cmd::Uninstall => {
            let report = installer.uninstall();
            wizard::show_uninstall(&report);
        }
        cli::Cmd::Inspect => {
            let report = installer.inspect().context("Cannot show the configuration")?;
            wizard::show_inspect(&report);
        }
        cli::Cmd::RenameShortcut => match installer.rename_shortcut(prompter)? {
            RenameOutcome::Renamed { to, .. } => {
                prompter.say(&format!("Shortcut renamed to {}", to.display()))
            }
            RenameOutcome::Created(path) => {
                prompter.say(&format!("Created shortcut {}", path.display()))
            }
            RenameOutcome::Unchanged(path) => {
                prompter.say(&format!("Shortcut {} unchanged", path.display()))
            }
        },
        cli::Cmd::Menu => run_menu(installer, prompter)?,
    }
    Ok(())
}
