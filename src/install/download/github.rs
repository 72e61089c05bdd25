//! GitHub release API interaction

use serde::Deserialize;

use crate::error::{InstallerError, Result};
use crate::http::Fetcher;

/// GitHub release metadata from API
#[derive(Deserialize, Debug)]
pub struct GitHubRelease {
    pub tag_name: String,
}

/// Fetch the tag of the latest release of `repo` (`owner/name`)
pub fn latest_release_tag(fetcher: &dyn Fetcher, api_base: &str, repo: &str) -> Result<String> {
    let url = format!("{}/repos/{}/releases/latest", api_base.trim_end_matches('/'), repo);
    let body = fetcher.fetch_text(&url)?;
    let release: GitHubRelease = serde_json::from_str(&body)?;

    let tag = release.tag_name.trim();
    if tag.is_empty() {
        return Err(InstallerError::BinaryAcquisition(format!(
            "latest release of {repo} has an empty tag"
        )));
    }
    Ok(tag.to_string())
}
