//! Release artifact naming

use crate::install::detection::Architecture;

/// File name of the Linux release artifact for `arch`
pub fn artifact_name(arch: Architecture) -> String {
    format!("hysteria-linux-{}", arch.as_str())
}

/// Deterministic download URL of a release asset
pub fn asset_url(download_base: &str, repo: &str, tag: &str, asset: &str) -> String {
    format!(
        "{}/{}/releases/download/{}/{}",
        download_base.trim_end_matches('/'),
        repo,
        tag,
        asset
    )
}
