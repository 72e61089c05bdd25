//! Interactive installation wizard and operator-facing summaries

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use super::certificates::{
    CUSTOM_HOSTNAME_CHOICE, CredentialRequest, FALLBACK_HOSTNAME, RECOMMENDED_HOSTNAMES,
    hostname_for_choice,
};
use super::prompt::{
    Prompter, Reask, Validated, ask_until, parse_choice, parse_domain, parse_email,
    parse_node_name, parse_port, parse_secret, parse_yes_no, validate_port_range,
};
use super::share::DEFAULT_NODE_NAME;
use super::uninstall::{StepOutcome, UninstallReport};
use super::unit::ServiceActivation;
use super::{InspectReport, InstallReport, PortHopStatus};
use crate::config::is_path_component;
use crate::error::Result;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Everything the install workflow needs from the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallAnswers {
    pub listen_port: u16,
    pub auth_secret: String,
    pub credential: CredentialRequest,
    /// External UDP range redirected onto the listen port
    pub port_hop: Option<(u16, u16)>,
    pub node_name: String,
}

/// Ask every install question up front, re-asking invalid answers in place.
pub fn gather_install_answers(prompter: &mut dyn Prompter) -> Result<InstallAnswers> {
    let listen_port = ask_until(prompter, "Port (1-65535)", Some("443"), parse_port)?;

    let generated = uuid::Uuid::new_v4().to_string();
    let auth_secret = ask_until(
        prompter,
        "Password (Enter for a random UUID)",
        Some(generated.as_str()),
        parse_secret,
    )?;

    let credential = ask_credential(prompter)?;
    let port_hop = ask_port_hop(prompter)?;

    let node_name = ask_until(prompter, "Node name", Some(DEFAULT_NODE_NAME), parse_node_name)?;

    Ok(InstallAnswers {
        listen_port,
        auth_secret,
        credential,
        port_hop,
        node_name,
    })
}

fn ask_credential(prompter: &mut dyn Prompter) -> Result<CredentialRequest> {
    prompter.say(
        "Certificate:\n  1. Self-signed certificate\n  2. ACME certificate (requires a domain)",
    );
    let mode = ask_until(prompter, "Certificate", Some("1"), |input| {
        parse_choice(input, &["1", "2"])
    })?;

    if mode == "2" {
        let domain = ask_until(prompter, "Domain", None, parse_domain)?;
        let email = ask_until(prompter, "Email", None, parse_email)?;
        return Ok(CredentialRequest::Acme { domain, email });
    }

    let mut menu = String::from("Recommended hostnames:");
    for (i, hostname) in RECOMMENDED_HOSTNAMES.iter().enumerate() {
        menu.push_str(&format!("\n  {}. {hostname}", i + 1));
    }
    menu.push_str(&format!("\n  {CUSTOM_HOSTNAME_CHOICE}. Custom hostname"));
    prompter.say(&menu);

    let choice = ask_until(prompter, "Hostname", Some("1"), |input| {
        parse_choice(input, &["1", "2", "3", "4", "5", CUSTOM_HOSTNAME_CHOICE])
    })?;
    let custom = if choice == CUSTOM_HOSTNAME_CHOICE {
        Some(ask_until(
            prompter,
            "Custom hostname",
            Some(FALLBACK_HOSTNAME),
            parse_custom_hostname,
        )?)
    } else {
        None
    };

    Ok(CredentialRequest::SelfSigned {
        hostname: hostname_for_choice(choice, custom.as_deref()),
    })
}

/// Custom hostnames also name the credential files
fn parse_custom_hostname(input: &str) -> Validated<String> {
    if input.is_empty() || is_path_component(input) {
        Ok(input.to_string())
    } else {
        Err(Reask(format!("'{input}' is not a usable hostname")))
    }
}

fn ask_port_hop(prompter: &mut dyn Prompter) -> Result<Option<(u16, u16)>> {
    if !ask_until(prompter, "Enable port hopping? (y/n)", Some("n"), parse_yes_no)? {
        return Ok(None);
    }
    loop {
        let start = ask_until(prompter, "Start port", None, parse_port)?;
        let end = ask_until(prompter, "End port", None, parse_port)?;
        match validate_port_range(start, end) {
            Ok(range) => return Ok(Some(range)),
            Err(reask) => prompter.say(&reask.0),
        }
    }
}

fn colored_line(stdout: &mut StandardStream, color: Color, bold: bool, text: &str) {
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
    let _ = writeln!(stdout, "{text}");
    let _ = stdout.reset();
}

fn status_line(stdout: &mut StandardStream, ok: bool, text: &str) {
    if ok {
        colored_line(stdout, Color::Green, false, &format!("  ✓ {text}"));
    } else {
        colored_line(stdout, Color::Yellow, false, &format!("  ⚠ {text}"));
    }
}

/// Display welcome banner
pub fn show_welcome() {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    colored_line(&mut stdout, Color::Cyan, false, &format!("\n{RULE}"));
    colored_line(&mut stdout, Color::Cyan, true, "\n                 H Y S T E R I A   2");
    let _ = writeln!(stdout, "\n              Server installer and manager");
    colored_line(&mut stdout, Color::Cyan, false, &format!("\n{RULE}\n"));

    let _ = writeln!(stdout, "  1. Install");
    let _ = writeln!(stdout, "  2. Uninstall");
    let _ = writeln!(stdout, "  3. Show configuration");
    let _ = writeln!(stdout, "  4. Rename shortcut command");
    let _ = writeln!(stdout, "  0. Exit\n");
}

/// Display installation completion summary
pub fn show_completion(report: &InstallReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    colored_line(&mut stdout, Color::Cyan, false, &format!("\n{RULE}"));
    colored_line(
        &mut stdout,
        Color::Green,
        true,
        "\n                    ✓ INSTALLATION COMPLETE\n",
    );
    colored_line(&mut stdout, Color::Cyan, false, &format!("{RULE}\n"));

    let _ = writeln!(stdout, "Platform: {}", report.platform);
    let _ = writeln!(stdout, "State: {}\n", report.state);
    status_line(&mut stdout, true, &format!("Binary {}", report.binary_path.display()));
    status_line(&mut stdout, true, &format!("Config {}", report.config_path.display()));
    status_line(
        &mut stdout,
        true,
        &format!(
            "{} certificate for {}",
            report.credentials.issuance_mode, report.credentials.subject_hostname
        ),
    );

    match &report.port_hop {
        PortHopStatus::NotRequested => {}
        PortHopStatus::Applied(rule) => {
            status_line(&mut stdout, true, &format!("Port hopping {rule}"))
        }
        PortHopStatus::Failed(reason) => {
            status_line(&mut stdout, false, &format!("Port hopping not configured: {reason}"))
        }
    }

    match &report.shortcut {
        Some(path) => status_line(&mut stdout, true, &format!("Shortcut {}", path.display())),
        None => status_line(&mut stdout, false, "Shortcut not created"),
    }

    let _ = writeln!(stdout, "\nService status:");
    match &report.activation {
        ServiceActivation::Active => status_line(&mut stdout, true, "Running and enabled at boot"),
        ServiceActivation::Inactive { remediation } => {
            status_line(&mut stdout, false, "Installed but not running; check with:");
            for command in remediation {
                let _ = writeln!(stdout, "      {command}");
            }
        }
    }

    let _ = writeln!(stdout, "\nShare link:");
    colored_line(&mut stdout, Color::Cyan, true, &format!("  {}", report.share));
    colored_line(&mut stdout, Color::Cyan, false, &format!("\n{RULE}\n"));
}

pub fn show_uninstall(report: &UninstallReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    let _ = writeln!(stdout);
    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Done => status_line(&mut stdout, true, &step.name),
            StepOutcome::Skipped => {
                let _ = writeln!(stdout, "  - {} (nothing to do)", step.name);
            }
            StepOutcome::Failed(reason) => {
                status_line(&mut stdout, false, &format!("{}: {reason}", step.name))
            }
        }
    }
    colored_line(&mut stdout, Color::Green, true, "\nUninstall complete\n");
}

pub fn show_inspect(report: &InspectReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    colored_line(&mut stdout, Color::Cyan, true, "\nConfiguration:");
    let _ = writeln!(stdout, "{}", report.config.raw);

    if let Some(path) = &report.config.cert_path {
        match &report.certificate {
            Some(summary) => {
                let _ = writeln!(stdout, "Certificate: {} ({summary})", path.display());
            }
            None => {
                let _ = writeln!(stdout, "Certificate: {}", path.display());
            }
        }
    }
    if let Some(path) = &report.config.key_path {
        let _ = writeln!(stdout, "Key: {}", path.display());
    }
    status_line(
        &mut stdout,
        report.service_active,
        if report.service_active {
            "Service is running"
        } else {
            "Service is not running"
        },
    );

    colored_line(&mut stdout, Color::Cyan, true, "\nShare link:");
    let _ = writeln!(stdout, "  {}\n", report.share);
}
