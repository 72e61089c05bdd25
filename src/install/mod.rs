//! Hysteria 2 host installation
//!
//! Components, leaf first: platform detection, dependency installation,
//! binary provisioning, credential provisioning, config synthesis, port
//! hopping and service registration. [`Installer`] sequences them into the
//! install, uninstall, inspect and rename-shortcut workflows.

pub mod certificates;
pub mod dependencies;
pub mod detection;
mod download;
pub mod file_ops;
mod orchestration;
pub mod port_hop;
pub mod privilege;
pub mod prompt;
pub mod service_config;
pub mod share;
pub mod shortcut;
pub mod uninstall;
pub mod unit;
pub mod wizard;

pub use orchestration::{InspectReport, InstallReport, Installer, PortHopStatus};
