//! Proxy binary acquisition and verification
//!
//! ## Module Organization
//!
//! - `github` - GitHub API interaction for release discovery
//! - `platform` - Release artifact naming per architecture
//! - `checksum` - SHA-256 verification against the release hash manifest
//! - `core` - Bootstrap, fallback download, relocation and self-check

mod checksum;
mod core;
mod github;
mod platform;

// Re-export public API
pub use core::BinaryProvisioner;
