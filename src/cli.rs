use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Hysteria 2 server installer and manager")]
pub struct Args {
    /// Installer settings file (default: /etc/hysteria-installer.toml when present)
    #[arg(long, short = 's', global = true)]
    pub settings: Option<PathBuf>,

    /// Workflow to run (interactive menu if omitted)
    #[command(subcommand)]
    pub sub: Option<Cmd>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    /// Install or reinstall the proxy server
    Install,
    /// Remove the proxy server, its config, unit and shortcut
    Uninstall,
    /// Show the installed config and its share link
    Inspect,
    /// Rename (or create) the shortcut command
    RenameShortcut,
    /// Interactive numeric menu (default if no sub-command)
    Menu,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_menu() {
        let args = Args::try_parse_from(["hy2-install"]).unwrap();
        assert!(args.sub.is_none());
        assert!(args.settings.is_none());
    }

    #[test]
    fn test_settings_and_subcommand() {
        let args =
            Args::try_parse_from(["hy2-install", "rename-shortcut", "--settings", "/tmp/s.toml"])
                .unwrap();
        assert_eq!(args.sub, Some(Cmd::RenameShortcut));
        assert_eq!(args.settings, Some(PathBuf::from("/tmp/s.toml")));
    }
}
