//! Page metadata signals used by the heuristic factors.

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use veracity_http::{HttpClient, HttpError, RequestOpts};

static RE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static RE_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s+[^>]*?(?:name|property)\s*=\s*["']([^"']+)["'][^>]*?content\s*=\s*["']([^"']*)["']"#)
        .expect("valid regex")
});
static RE_META_REVERSED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s+[^>]*?content\s*=\s*["']([^"']*)["'][^>]*?(?:name|property)\s*=\s*["']([^"']+)["']"#)
        .expect("valid regex")
});
static RE_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("valid regex"));
static RE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid regex"));
static RE_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<cite\b|<blockquote\b|class\s*=\s*["'][^"']*(?:reference|citation|footnote)|doi\.org/"#)
        .expect("valid regex")
});
static RE_AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)rel\s*=\s*["']author["']|class\s*=\s*["'][^"']*\bauthor\b"#).expect("valid regex")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub modified_date: Option<NaiveDate>,
    pub has_citations: bool,
    pub has_author_info: bool,
    pub has_about_page: bool,
    pub has_contact_info: bool,
    pub has_privacy_policy: bool,
    pub has_terms_of_service: bool,
    pub has_funding_info: bool,
}

impl PageMetadata {
    /// Signals found in an HTML document. Missing signals stay unset.
    pub fn from_html(html: &str) -> Self {
        let mut meta = PageMetadata {
            title: RE_TITLE
                .captures(html)
                .map(|c| collapse(&c[1]))
                .filter(|t| !t.is_empty()),
            ..Self::default()
        };

        let pairs = RE_META
            .captures_iter(html)
            .map(|c| (c[1].to_ascii_lowercase(), c[2].to_string()))
            .chain(
                RE_META_REVERSED
                    .captures_iter(html)
                    .map(|c| (c[2].to_ascii_lowercase(), c[1].to_string())),
            );
        for (key, value) in pairs {
            let value = collapse(&value);
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "og:site_name" => {
                    meta.site_name.get_or_insert(value);
                }
                "description" | "og:description" => {
                    meta.description.get_or_insert(value);
                }
                "author" | "article:author" => {
                    meta.author.get_or_insert(value);
                }
                "article:published_time" | "date" | "dc.date" => {
                    if meta.published_date.is_none() {
                        meta.published_date = parse_date(&value);
                    }
                }
                "article:modified_time" | "og:updated_time" | "last-modified" => {
                    if meta.modified_date.is_none() {
                        meta.modified_date = parse_date(&value);
                    }
                }
                _ => {}
            }
        }

        for c in RE_HREF.captures_iter(html) {
            let href = c[1].to_ascii_lowercase();
            meta.has_about_page |= ["/about", "o-nas", "about-us", "/o-projektu"]
                .iter()
                .any(|p| href.contains(p));
            meta.has_contact_info |=
                href.starts_with("mailto:") || href.contains("contact") || href.contains("kontakt");
            meta.has_privacy_policy |= href.contains("privacy")
                || href.contains("ochrana-osobnich-udaju")
                || href.contains("gdpr");
            meta.has_terms_of_service |= href.contains("terms") || href.contains("podminky");
            meta.has_funding_info |= ["funding", "financovani", "donors", "sponsors", "podporovatele"]
                .iter()
                .any(|p| href.contains(p));
        }

        meta.has_author_info = meta.author.is_some() || RE_AUTHOR.is_match(html);
        meta.has_citations = RE_CITATION.is_match(html);
        meta
    }

    /// The newer of the modified and published dates.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.modified_date.or(self.published_date)
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let c = RE_DATE.captures(value)?;
    NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
}

#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("fetch failed: {0}")]
    Http(#[from] HttpError),
}

#[async_trait]
pub trait PageMetadataSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageMetadata, MetadataError>;
}

/// Downloads the page and extracts signals from its HTML.
pub struct HttpMetadataFetcher {
    http: HttpClient,
    timeout: Duration,
}

impl HttpMetadataFetcher {
    pub fn new(timeout: Duration) -> Result<Self, MetadataError> {
        // Requests always carry absolute URLs; the base is never joined.
        let http = HttpClient::new("http://localhost/")?
            .with_timeout(timeout)
            .with_retries(1);
        Ok(Self { http, timeout })
    }
}

#[async_trait]
impl PageMetadataSource for HttpMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<PageMetadata, MetadataError> {
        let opts = RequestOpts {
            timeout: Some(self.timeout),
            allow_absolute: true,
            ..Default::default()
        };
        let html = self.http.get_text(url, opts).await?;
        let meta = PageMetadata::from_html(&html);
        tracing::debug!(
            url,
            bytes = html.len(),
            author = meta.has_author_info,
            citations = meta.has_citations,
            "sources.metadata.fetched"
        );
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
<title>  Inflace v roce 2023 </title>
<meta property="og:site_name" content="Statistika dnes">
<meta name="description" content="Přehled inflace">
<meta name="author" content="Jana Nováková">
<meta property="article:published_time" content="2023-03-01T08:00:00+01:00">
<meta content="2023-03-05" property="article:modified_time">
</head><body>
<a href="/o-nas">O nás</a> <a href="mailto:redakce@example.cz">Kontakt</a>
<a href="/ochrana-osobnich-udaju">Soukromí</a> <a href="/podminky">Podmínky</a>
<p>Zdroj: <cite>ČSÚ</cite></p>
</body></html>"#;

    #[test]
    fn extracts_page_signals() {
        let meta = PageMetadata::from_html(PAGE);
        assert_eq!(meta.title.as_deref(), Some("Inflace v roce 2023"));
        assert_eq!(meta.site_name.as_deref(), Some("Statistika dnes"));
        assert_eq!(meta.description.as_deref(), Some("Přehled inflace"));
        assert_eq!(meta.author.as_deref(), Some("Jana Nováková"));
        assert_eq!(meta.published_date, NaiveDate::from_ymd_opt(2023, 3, 1));
        assert_eq!(meta.latest_date(), NaiveDate::from_ymd_opt(2023, 3, 5));
        assert!(meta.has_author_info);
        assert!(meta.has_about_page);
        assert!(meta.has_contact_info);
        assert!(meta.has_privacy_policy);
        assert!(meta.has_terms_of_service);
        assert!(!meta.has_funding_info);
        assert!(meta.has_citations);
    }

    #[test]
    fn bare_page_has_no_signals() {
        let meta = PageMetadata::from_html("<p>hello</p>");
        assert_eq!(meta, PageMetadata::default());
    }
}
