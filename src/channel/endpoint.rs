//! Channel Endpoint
//!
//! The stream channel lives on the same host as the page that hosts the
//! client, at `/ch/streams/{stream}/`. A secure page always gets a secure
//! channel and an insecure page an insecure one.

use std::fmt;

use url::Url;

use super::error::{ChannelError, ChannelResult};

/// Scheme of the hosting page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageScheme {
    Http,
    Https,
}

/// Scheme of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelScheme {
    Ws,
    Wss,
}

impl PageScheme {
    /// Parse a page scheme (`http` / `https`, case-insensitive)
    pub fn parse(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(PageScheme::Http),
            "https" => Some(PageScheme::Https),
            _ => None,
        }
    }

    /// Channel scheme matching this page scheme
    pub fn channel_scheme(self) -> ChannelScheme {
        match self {
            PageScheme::Http => ChannelScheme::Ws,
            PageScheme::Https => ChannelScheme::Wss,
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, PageScheme::Https)
    }
}

impl ChannelScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelScheme::Ws => "ws",
            ChannelScheme::Wss => "wss",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, ChannelScheme::Wss)
    }
}

/// Location of the page hosting the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub scheme: PageScheme,
    /// Host with an explicit port when the page uses a non-default one
    pub host: String,
}

impl PageLocation {
    pub fn new(scheme: PageScheme, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
        }
    }

    /// Parse a page URL such as `https://social.example.org/streams/public/`
    pub fn parse(page_url: &str) -> ChannelResult<Self> {
        let url = Url::parse(page_url)
            .map_err(|e| ChannelError::InvalidPageUrl(format!("{}: {}", page_url, e)))?;

        let scheme = PageScheme::parse(url.scheme()).ok_or_else(|| {
            ChannelError::InvalidPageUrl(format!("unsupported scheme '{}'", url.scheme()))
        })?;

        let host = url
            .host_str()
            .ok_or_else(|| ChannelError::InvalidPageUrl(format!("{}: missing host", page_url)))?;

        // `Url::port` is None for the scheme's default port
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self { scheme, host })
    }
}

/// Address of the stream channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUrl {
    pub scheme: ChannelScheme,
    pub host: String,
    pub path: String,
}

impl ChannelUrl {
    /// Derive the channel URL for a stream on the given page
    pub fn for_stream(page: &PageLocation, stream: &str) -> Self {
        Self {
            scheme: page.scheme.channel_scheme(),
            host: page.host.clone(),
            path: format!("/ch/streams/{}/", urlencoding::encode(stream)),
        }
    }
}

impl fmt::Display for ChannelUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme.as_str(), self.host, self.path)
    }
}
