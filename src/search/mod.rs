//! Feed search client: queries an RSS search source and synthesizes
//! magnet links from the announced info hashes.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::DateTime;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use tracing::warn;

use crate::common::config::SearchSettings;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const TRACKERS: [&str; 3] = [
    "http://nyaa.tracker.wf:7777/announce",
    "udp://open.stealth.si:80/announce",
    "udp://tracker.opentrackr.org:1337/announce",
];

#[derive(Debug)]
pub enum SearchError {
    Upstream(reqwest::Error),
    Feed(String),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::Upstream(err) => write!(f, "error fetching search feed: {err}"),
            SearchError::Feed(msg) => write!(f, "error parsing search feed: {msg}"),
        }
    }
}

impl std::error::Error for SearchError {}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    pub magnet: String,
    pub size: String,
    pub seeders: u32,
    pub leechers: u32,
    pub category: String,
    pub date: String,
    pub link: String,
}

pub struct SearchClient {
    http: reqwest::Client,
    settings: SearchSettings,
}

impl SearchClient {
    pub fn new(settings: SearchSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build search client")?;
        Ok(Self { http, settings })
    }

    /// Query the feed ordered by seeders, capped at the configured result
    /// limit. Malformed items are skipped with a warning, not fatal.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let body = self
            .http
            .get(&self.settings.feed_url)
            .query(&[("page", "rss"), ("q", query), ("s", "seeders"), ("o", "desc")])
            .send()
            .await
            .map_err(SearchError::Upstream)?
            .error_for_status()
            .map_err(SearchError::Upstream)?
            .text()
            .await
            .map_err(SearchError::Upstream)?;

        let results = parse_feed(&body)?
            .into_iter()
            .filter_map(|item| match item.into_result() {
                Ok(result) => Some(result),
                Err(reason) => {
                    warn!(reason, "skipping malformed feed item");
                    None
                }
            })
            .take(self.settings.results_limit)
            .collect();
        Ok(results)
    }
}

/// One `<item>` as it appears in the feed, before validation.
#[derive(Debug, Default)]
struct RawItem {
    title: String,
    guid: String,
    info_hash: String,
    size: String,
    seeders: String,
    leechers: String,
    category: String,
    pub_date: String,
}

impl RawItem {
    fn append(&mut self, element: &str, text: &str) {
        let field = match element {
            "title" => &mut self.title,
            "guid" => &mut self.guid,
            "nyaa:infoHash" => &mut self.info_hash,
            "nyaa:size" => &mut self.size,
            "nyaa:seeders" => &mut self.seeders,
            "nyaa:leechers" => &mut self.leechers,
            "nyaa:category" => &mut self.category,
            "pubDate" => &mut self.pub_date,
            _ => return,
        };
        field.push_str(text);
    }

    fn into_result(self) -> Result<SearchResult, &'static str> {
        let info_hash = self.info_hash.trim();
        if info_hash.is_empty() {
            return Err("missing info hash");
        }
        let id = self
            .guid
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Ok(SearchResult {
            id,
            magnet: magnet_link(info_hash, &self.title),
            name: self.title,
            size: or_unknown(self.size),
            seeders: self.seeders.trim().parse().unwrap_or(0),
            leechers: self.leechers.trim().parse().unwrap_or(0),
            category: or_unknown(self.category),
            date: format_pub_date(&self.pub_date),
            link: self.guid,
        })
    }
}

fn or_unknown(value: String) -> String {
    if value.is_empty() {
        "Unknown".to_string()
    } else {
        value
    }
}

fn magnet_link(info_hash: &str, title: &str) -> String {
    let name = utf8_percent_encode(title, NON_ALPHANUMERIC);
    let trackers: String = TRACKERS
        .iter()
        .map(|tracker| format!("&tr={tracker}"))
        .collect();
    format!("magnet:?xt=urn:btih:{info_hash}&dn={name}{trackers}")
}

/// RFC 2822 publication dates become `YYYY-MM-DD HH:MM`; anything else is
/// passed through as-is.
fn format_pub_date(raw: &str) -> String {
    if raw.is_empty() {
        return "Unknown".to_string();
    }
    match DateTime::parse_from_rfc2822(raw) {
        Ok(date) => date.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

fn parse_feed(xml: &str) -> Result<Vec<RawItem>, SearchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<RawItem> = None;
    let mut element: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                if name == "item" {
                    current = Some(RawItem::default());
                    element = None;
                } else if current.is_some() {
                    element = Some(name);
                }
            }
            Ok(Event::Text(text)) => {
                if let (Some(item), Some(element)) = (current.as_mut(), element.as_deref()) {
                    let text = text
                        .unescape()
                        .map_err(|err| SearchError::Feed(err.to_string()))?;
                    item.append(element, &text);
                }
            }
            Ok(Event::CData(data)) => {
                if let (Some(item), Some(element)) = (current.as_mut(), element.as_deref()) {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    item.append(element, &text);
                }
            }
            Ok(Event::End(end)) => {
                if end.name().as_ref() == b"item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                element = None;
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(SearchError::Feed(err.to_string())),
            _ => {}
        }
    }
    Ok(items)
}
