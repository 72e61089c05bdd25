//! Test doubles for the installer's external capabilities

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{InstallerError, Result};
use crate::http::Fetcher;
use crate::install::prompt::Prompter;
use crate::process::{CommandOutput, CommandRunner, CommandSpec};

/// Records every command and answers from a small rule table.
///
/// Commands succeed with empty output unless a rule whose needle is contained
/// in the rendered command line says otherwise. The first matching rule wins.
#[derive(Default)]
pub struct FakeRunner {
    rules: Vec<(String, CommandOutput)>,
    missing: Vec<String>,
    log: RefCell<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, needle: &str, stdout: &str) -> Self {
        self.rules.push((
            needle.to_string(),
            CommandOutput {
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        ));
        self
    }

    pub fn exit_with(mut self, needle: &str, code: i32) -> Self {
        self.rules.push((
            needle.to_string(),
            CommandOutput {
                exit_code: code,
                stdout: String::new(),
                stderr: format!("simulated failure of {needle}"),
            },
        ));
        self
    }

    pub fn fail_on(self, needle: &str) -> Self {
        self.exit_with(needle, 1)
    }

    /// Every program is on the fake PATH unless listed here.
    pub fn without_program(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.log.borrow().iter().any(|c| c.contains(needle))
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let line = spec.to_string();
        self.log.borrow_mut().push(line.clone());
        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        if self.missing.iter().any(|m| m == program) {
            None
        } else {
            Some(Path::new("/usr/bin").join(program))
        }
    }
}

/// Serves canned bodies by exact URL; anything else is a 404-style error.
#[derive(Default)]
pub struct FakeFetcher {
    texts: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    requested: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, url: &str, body: &str) -> Self {
        self.texts.insert(url.to_string(), body.to_string());
        self
    }

    pub fn file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

fn not_found(url: &str) -> InstallerError {
    InstallerError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no canned response for {url}"),
    ))
}

impl Fetcher for FakeFetcher {
    fn fetch_text(&self, url: &str) -> Result<String> {
        self.requested.borrow_mut().push(url.to_string());
        self.texts.get(url).cloned().ok_or_else(|| not_found(url))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.requested.borrow_mut().push(url.to_string());
        let bytes = self.files.get(url).ok_or_else(|| not_found(url))?;
        fs::write(dest, bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Replays answers in order; an empty answer accepts the default.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub questions: Vec<String>,
    pub messages: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String> {
        self.questions.push(question.to_string());
        let answer = self.answers.pop_front().ok_or_else(|| {
            InstallerError::Cancelled(format!("no scripted answer for '{question}'"))
        })?;
        if answer.is_empty() {
            Ok(default.unwrap_or_default().to_string())
        } else {
            Ok(answer)
        }
    }

    fn say(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Write an os-release file identifying `id` under `root`.
pub fn write_os_release(root: &Path, id: &str) {
    let etc = root.join("etc");
    fs::create_dir_all(&etc).unwrap();
    fs::write(etc.join("os-release"), format!("ID={id}\nPRETTY_NAME=\"{id} test\"\n")).unwrap();
}
