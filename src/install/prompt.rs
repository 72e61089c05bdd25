//! Operator input with validation and in-place re-asking
//!
//! Validation rules are plain functions returning `Result<T, Reask>`; the
//! [`ask_until`] loop owns the I/O and keeps asking until a rule accepts.

use std::fmt;

use inquire::{InquireError, Text};

use crate::config::is_path_component;
use crate::error::{InstallerError, Result};

/// Source of operator answers
pub trait Prompter {
    /// Ask `question`; an empty answer yields `default` when one is given.
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String>;

    /// Show a note or a re-ask reason to the operator
    fn say(&mut self, message: &str);
}

/// Interactive terminal prompts
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String> {
        let mut prompt = Text::new(question);
        if let Some(default) = default {
            prompt = prompt.with_default(default);
        }
        match prompt.prompt() {
            Ok(answer) => Ok(answer.trim().to_string()),
            Err(e @ (InquireError::OperationCanceled | InquireError::OperationInterrupted)) => {
                Err(InstallerError::Cancelled(e.to_string()))
            }
            Err(e) => Err(InstallerError::Cancelled(format!("{question}: {e}"))),
        }
    }

    fn say(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Why an answer was rejected; shown before asking again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reask(pub String);

impl fmt::Display for Reask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type Validated<T> = std::result::Result<T, Reask>;

/// Ask until `validate` accepts the answer
pub fn ask_until<T>(
    prompter: &mut dyn Prompter,
    question: &str,
    default: Option<&str>,
    validate: impl Fn(&str) -> Validated<T>,
) -> Result<T> {
    loop {
        let answer = prompter.ask(question, default)?;
        match validate(answer.trim()) {
            Ok(value) => return Ok(value),
            Err(reask) => prompter.say(&reask.0),
        }
    }
}

pub fn parse_port(input: &str) -> Validated<u16> {
    match input.parse::<u32>() {
        Ok(port) if (1..=65535).contains(&port) => Ok(port as u16),
        Ok(_) => Err(Reask("port must be between 1 and 65535".to_string())),
        Err(_) => Err(Reask("enter a valid port number (1-65535)".to_string())),
    }
}

/// `y`/`yes` or `n`/`no`, case-insensitive
pub fn parse_yes_no(input: &str) -> Validated<bool> {
    match input.to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(Reask("answer y or n".to_string())),
    }
}

/// Accept one of the listed option keys
pub fn parse_choice<'a>(input: &str, options: &[&'a str]) -> Validated<&'a str> {
    options
        .iter()
        .find(|option| **option == input)
        .copied()
        .ok_or_else(|| Reask(format!("choose one of: {}", options.join(", "))))
}

/// A port-hop range needs `start < end`, both inside 1-65535
pub fn validate_port_range(start: u16, end: u16) -> Validated<(u16, u16)> {
    if start >= 1 && start < end {
        Ok((start, end))
    } else {
        Err(Reask("the start port must be lower than the end port".to_string()))
    }
}

/// Characters that change the meaning of a plain YAML scalar when leading
const YAML_INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

/// An auth secret must survive the YAML config and the share URI unquoted
pub fn parse_secret(input: &str) -> Validated<String> {
    if input.is_empty() {
        return Err(Reask("the password must not be empty".to_string()));
    }
    if input.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Reask("the password must not contain spaces".to_string()));
    }
    if input.contains('#') || input.contains(": ") {
        return Err(Reask("the password must not contain '#' or ': '".to_string()));
    }
    if input.starts_with(YAML_INDICATORS) {
        return Err(Reask(format!(
            "the password must not start with any of {}",
            YAML_INDICATORS.iter().collect::<String>()
        )));
    }
    Ok(input.to_string())
}

/// Domain names for ACME issuance: dotted LDH labels
pub fn parse_domain(input: &str) -> Validated<String> {
    let domain = input.trim_end_matches('.').to_ascii_lowercase();
    let labels_ok = domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    if domain.contains('.') && labels_ok {
        Ok(domain)
    } else {
        Err(Reask(format!("'{input}' is not a valid domain name")))
    }
}

pub fn parse_email(input: &str) -> Validated<String> {
    let valid = match input.split_once('@') {
        Some((local, host)) => {
            !local.is_empty()
                && host.contains('.')
                && !host.contains('@')
                && !input.chars().any(|c| c.is_whitespace() || "'\"`$\\;|&".contains(c))
        }
        None => false,
    };
    if valid {
        Ok(input.to_string())
    } else {
        Err(Reask(format!("'{input}' is not a valid email address")))
    }
}

/// Shortcut names become a file in /usr/local/bin
pub fn parse_command_name(input: &str) -> Validated<String> {
    if is_path_component(input) && !input.starts_with('.') {
        Ok(input.to_string())
    } else {
        Err(Reask("use letters, digits, '-', '_' or '.' only".to_string()))
    }
}

pub fn parse_node_name(input: &str) -> Validated<String> {
    if input.is_empty() {
        Err(Reask("the node name must not be empty".to_string()))
    } else {
        Ok(input.to_string())
    }
}
