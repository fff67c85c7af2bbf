//! # Remote Resource Locator
//!
//! Resolves where the current firmware image and the cartridge label database
//! can be downloaded from.
//!
//! The firmware has no stable URL: the vendor support page is fetched and the one
//! anchor whose visible text reads like `Download [12.3MB]` is taken. This is a
//! best-effort scrape. If the page changes shape the lookup fails with
//! [`UpdaterError::NotFound`] carrying the page URL for a manual check. The
//! extraction strategy sits behind [`LinkExtractor`] so it can be replaced
//! without touching the rest of the crate.
//!
//! The label database is published as a "latest release" asset whose URL always
//! redirects to the newest file, so it needs no lookup at all.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::blocking::Client;
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, UpdaterError};

pub const FIRMWARE_PAGE: &str = "https://www.analogue.co/support/3d/firmware/latest";
pub const LABELS_DB_URL: &str =
    "https://github.com/retrogamecorps/Analogue-3D-Images/releases/latest/download/labels.db";

/// A downloadable file on a remote server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    pub url: String,
    /// Last path segment of `url`, query string removed.
    pub filename: String,
}

impl RemoteArtifact {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let filename = filename_from_url(&url);
        if filename.is_empty() {
            return Err(UpdaterError::InvalidUrl(format!("no file name in '{}'", url)));
        }
        Ok(Self { url, filename })
    }
}

/// Returns the final `/`-delimited segment of `url` with any `?` query removed.
pub fn filename_from_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    without_query.rsplit('/').next().unwrap_or(without_query).to_string()
}

/// Strategy for picking the firmware link out of a page body.
pub trait LinkExtractor {
    /// Returns the raw `href` of the first matching link, if any.
    fn extract(&self, html: &str) -> Option<String>;
}

/// Matches the first `<a href=...>` whose visible text contains every needle.
#[derive(Debug, Clone)]
pub struct AnchorTextExtractor {
    needles: Vec<String>,
}

impl AnchorTextExtractor {
    pub fn new<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { needles: needles.into_iter().map(Into::into).collect() }
    }

    /// The pattern used by the firmware page: `Download [xx.xMB]`.
    pub fn firmware() -> Self {
        Self::new(["Download [", "MB"])
    }
}

impl Default for AnchorTextExtractor {
    fn default() -> Self {
        Self::firmware()
    }
}

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").expect("valid anchor regex"))
}

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).expect("valid href regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"))
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

impl LinkExtractor for AnchorTextExtractor {
    fn extract(&self, html: &str) -> Option<String> {
        for caps in anchor_re().captures_iter(html) {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let Some(href) = href_re().captures(attrs).and_then(|h| {
                h.get(1).or_else(|| h.get(2)).or_else(|| h.get(3)).map(|m| m.as_str().to_string())
            }) else {
                continue;
            };
            let inner = caps.get(2).map_or("", |m| m.as_str());
            let text = decode_entities(&tag_re().replace_all(inner, ""));
            if self.needles.iter().all(|n| text.contains(n.as_str())) {
                debug!(text = text.trim(), href = %href, "matched download anchor");
                return Some(decode_entities(&href));
            }
        }
        None
    }
}

/// Picks the firmware link out of `html` and resolves it against `page_url`.
pub fn resolve_firmware_in_page(
    html: &str,
    page_url: &str,
    extractor: &dyn LinkExtractor,
) -> Result<RemoteArtifact> {
    let href = extractor
        .extract(html)
        .ok_or_else(|| UpdaterError::NotFound { page: page_url.to_string() })?;
    let absolute = Url::parse(page_url)?.join(&href)?;
    RemoteArtifact::new(absolute.to_string())
}

/// Fetches the firmware page and returns the current firmware image.
pub fn resolve_firmware(client: &Client, page_url: &str) -> Result<RemoteArtifact> {
    info!(page = page_url, "fetching latest firmware info");
    let resp = client.get(page_url).send()?;
    let status = resp.status();
    if !status.is_success() {
        return Err(UpdaterError::Network {
            url: page_url.to_string(),
            status: Some(status.as_u16()),
            message: format!("server answered {}", status),
        });
    }
    // Relative links resolve against where the page actually came from.
    let base = resp.url().to_string();
    let body = resp.text()?;
    let artifact = resolve_firmware_in_page(&body, &base, &AnchorTextExtractor::firmware())
        .map_err(|e| match e {
            UpdaterError::NotFound { .. } => UpdaterError::NotFound { page: page_url.to_string() },
            other => other,
        })?;
    info!(file = %artifact.filename, "latest firmware");
    Ok(artifact)
}

/// The label database always lives behind the same redirect URL.
pub fn resolve_labels_database(url: &str) -> Result<RemoteArtifact> {
    RemoteArtifact::new(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::http_client;
    use crate::testutil::{serve, Reply};
    use std::time::Duration;

    const PAGE: &str = "https://www.analogue.co/support/3d/firmware/latest";

    #[test]
    fn filename_strips_query() {
        assert_eq!(filename_from_url("https://cdn.example.com/fw/a3d_os_102.bin?sig=abc/def"), "a3d_os_102.bin");
        assert_eq!(filename_from_url("https://cdn.example.com/fw/a3d_os_102.bin"), "a3d_os_102.bin");
        assert_eq!(filename_from_url("labels.db"), "labels.db");
        assert_eq!(filename_from_url("https://example.com/dir/"), "");
    }

    #[test]
    fn first_matching_anchor_wins() {
        let html = r#"
            <a href="/support">Support</a>
            <a class="btn" href="/files/a3d_os_1_1.bin">Download [<span>41.2</span>MB]</a>
            <a href="/files/a3d_os_1_0.bin">Download [40.0MB]</a>
        "#;
        let artifact = resolve_firmware_in_page(html, PAGE, &AnchorTextExtractor::firmware()).unwrap();
        assert_eq!(artifact.url, "https://www.analogue.co/files/a3d_os_1_1.bin");
        assert_eq!(artifact.filename, "a3d_os_1_1.bin");
    }

    #[test]
    fn absolute_href_kept_and_entities_decoded() {
        let html = r#"<A HREF='https://cdn.example.com/a3d_os_2.bin?x=1&amp;y=2'>Download [12MB]</A>"#;
        let artifact = resolve_firmware_in_page(html, PAGE, &AnchorTextExtractor::firmware()).unwrap();
        assert_eq!(artifact.url, "https://cdn.example.com/a3d_os_2.bin?x=1&y=2");
        assert_eq!(artifact.filename, "a3d_os_2.bin");
    }

    #[test]
    fn anchors_without_href_are_skipped() {
        let html = r#"<a name="x">Download [1MB]</a><a href="b.bin">Download [2MB]</a>"#;
        let artifact = resolve_firmware_in_page(html, PAGE, &AnchorTextExtractor::firmware()).unwrap();
        assert_eq!(artifact.filename, "b.bin");
    }

    #[test]
    fn missing_link_is_not_found() {
        let html = r#"<a href="/x.bin">Download now</a><p>Download [40MB]</p>"#;
        match resolve_firmware_in_page(html, PAGE, &AnchorTextExtractor::firmware()) {
            Err(UpdaterError::NotFound { page }) => assert_eq!(page, PAGE),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn page_error_status_is_network_error() {
        let base = serve(vec![Reply::new("HTTP/1.1 503 Service Unavailable", "busy")]);
        let page = format!("{}/support/3d/firmware/latest", base);
        let client = http_client(Duration::from_secs(10)).unwrap();
        match resolve_firmware(&client, &page) {
            Err(UpdaterError::Network { status, url, .. }) => {
                assert_eq!(status, Some(503));
                assert_eq!(url, page);
            }
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[test]
    fn relative_link_resolves_against_redirected_page() {
        let html = r#"<p>Latest</p><a href="a3d_os_9.bin?v=2">Download [40.1MB]</a>"#;
        let base = serve(vec![
            Reply::new("HTTP/1.1 302 Found", "").header("Location: /moved/fw/latest"),
            Reply::new("HTTP/1.1 200 OK", html).header("Content-Type: text/html"),
        ]);
        let client = http_client(Duration::from_secs(10)).unwrap();
        let artifact = resolve_firmware(&client, &format!("{}/fw/latest", base)).unwrap();
        assert_eq!(artifact.url, format!("{}/moved/fw/a3d_os_9.bin?v=2", base));
        assert_eq!(artifact.filename, "a3d_os_9.bin");
    }

    #[test]
    fn page_without_link_names_requested_page() {
        let base = serve(vec![Reply::new("HTTP/1.1 200 OK", "<a href=\"/x\">Support</a>")]);
        let page = format!("{}/fw/latest", base);
        let client = http_client(Duration::from_secs(10)).unwrap();
        match resolve_firmware(&client, &page) {
            Err(UpdaterError::NotFound { page: p }) => assert_eq!(p, page),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn labels_database_is_fixed() {
        let artifact = resolve_labels_database(LABELS_DB_URL).unwrap();
        assert_eq!(artifact.filename, "labels.db");
        assert_eq!(artifact.url, LABELS_DB_URL);
    }
}
