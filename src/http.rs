//! HTTP access for release metadata, artifact downloads and IP lookup

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use crate::error::Result;

pub trait Fetcher {
    /// GET `url` and return the body as text. Non-2xx statuses are errors.
    fn fetch_text(&self, url: &str) -> Result<String>;

    /// Stream `url` into `dest`, returning the number of bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Blocking reqwest client. Timeouts are the client defaults.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("hysteria-installer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("GET {url}");
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.text()?)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!("downloading {url} -> {}", dest.display());
        let response = self.client.get(url).send()?.error_for_status()?;

        let pb = match response.content_length() {
            Some(total) => {
                let pb = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("   [{bar:40.green/blue}] {bytes}/{total_bytes}  {msg}")
                {
                    pb.set_style(style.progress_chars("█▓░"));
                }
                pb
            }
            None => ProgressBar::new_spinner(),
        };
        if let Some(name) = dest.file_name() {
            pb.set_message(name.to_string_lossy().to_string());
        }

        let mut file = File::create(dest)?;
        let written = io::copy(&mut pb.wrap_read(response), &mut file)?;
        file.flush()?;
        file.sync_all()?;
        pb.finish_and_clear();

        Ok(written)
    }
}
