//! Client share link

use std::fmt;
use std::net::IpAddr;

use log::{debug, warn};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

use crate::error::{InstallerError, Result};
use crate::http::Fetcher;

pub const DEFAULT_NODE_NAME: &str = "hysteria2";

/// Shown in place of the address when no lookup endpoint answers
pub const ADDRESS_PLACEHOLDER: &str = "YOUR_SERVER_IP";

/// Escaped in the userinfo and fragment: all but RFC 3986 unreserved characters.
/// `Url` leaves `%` alone in both, so a literal `%` must be escaped here.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Everything a client needs to connect; derived, never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareDescriptor {
    pub auth_secret: String,
    pub server_address: Option<IpAddr>,
    pub listen_port: u16,
    pub node_name: String,
}

impl ShareDescriptor {
    /// `hysteria2://<secret>@<address>:<port>?alpn=h3&insecure=1#<node>`
    pub fn to_uri(&self) -> Result<String> {
        let host = match self.server_address {
            Some(IpAddr::V6(v6)) => format!("[{v6}]"),
            Some(IpAddr::V4(v4)) => v4.to_string(),
            None => ADDRESS_PLACEHOLDER.to_string(),
        };

        let mut url = Url::parse(&format!("hysteria2://{host}:{}", self.listen_port))
            .map_err(|e| InstallerError::ShareLink(e.to_string()))?;
        let secret = utf8_percent_encode(&self.auth_secret, COMPONENT).to_string();
        url.set_username(&secret)
            .map_err(|()| InstallerError::ShareLink("URI has no authority".to_string()))?;
        url.set_query(Some("alpn=h3&insecure=1"));
        let node = utf8_percent_encode(&self.node_name, COMPONENT).to_string();
        url.set_fragment(Some(&node));

        Ok(url.to_string())
    }
}

impl fmt::Display for ShareDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_uri() {
            Ok(uri) => f.write_str(&uri),
            Err(e) => write!(f, "<{e}>"),
        }
    }
}

/// Public address of this host, trying each endpoint in order.
pub fn lookup_public_address(fetcher: &dyn Fetcher, endpoints: &[String]) -> Option<IpAddr> {
    for endpoint in endpoints {
        match fetcher.fetch_text(endpoint) {
            Ok(body) => match body.trim().parse::<IpAddr>() {
                Ok(address) => return Some(address),
                Err(_) => debug!("{endpoint} answered with something other than an IP address"),
            },
            Err(e) => debug!("IP lookup via {endpoint} failed: {e}"),
        }
    }
    warn!(
        "Could not determine the public IP address; \
         replace {ADDRESS_PLACEHOLDER} in the share link"
    );
    None
}
