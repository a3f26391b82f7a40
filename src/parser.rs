//! Two-stage parsing of the headline feed.
//!
//! The outer payload is plain RSS 2.0. Each `<item>` is a topic, and its
//! `<description>` carries escaped HTML with an `<ol>` of the articles that
//! actually get stored. [`parse_entries`] handles the RSS layer,
//! [`parse_inner_articles`] handles the HTML layer, and [`parse_feed`]
//! connects them through [`unescape_description`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PubDatePolicy;

/// One `<item>` of the outer feed, before its description is unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFeedEntry {
    pub guid: String,
    pub title: String,
    pub link: String,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub published_at_raw: Option<String>,
    pub inner_markup: String,
}

/// One `<li>` of an entry's description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerArticle {
    pub order: i64,
    pub title: String,
    pub url: String,
    pub press_name: Option<String>,
}

/// An article ready to be stored, carrying its enclosing topic's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub topic_guid: String,
    pub topic_title: String,
    pub topic_link: String,
    pub topic_source_name: Option<String>,
    pub topic_source_url: Option<String>,
    pub topic_published_at: DateTime<Utc>,
    pub article_order: i64,
    pub article_title: String,
    pub article_url: String,
    pub article_press_name: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("missing required element <{0}>")]
    MissingField(&'static str),

    #[error("unparseable pubDate: {0:?}")]
    InvalidPubDate(String),
}

/// Parse a raw feed payload into articles, stamping undated entries with `Utc::now()`
/// when the policy allows it.
pub fn parse_feed(xml: &str, policy: PubDatePolicy) -> Vec<ParsedArticle> {
    parse_feed_at(xml, policy, Utc::now())
}

/// Same as [`parse_feed`] with an explicit fallback instant.
///
/// An article URL appears at most once in the result. When several topics
/// list the same article, the first one in feed order keeps it.
pub fn parse_feed_at(xml: &str, policy: PubDatePolicy, now: DateTime<Utc>) -> Vec<ParsedArticle> {
    let mut seen = HashSet::new();

    parse_entries(xml)
        .into_iter()
        .filter_map(|entry| match expand_entry(&entry, policy, now) {
            Ok(articles) => Some(articles),
            Err(e) => {
                warn!("Skipping feed entry '{}': {}", entry.guid, e);
                None
            }
        })
        .flatten()
        .filter(|article| {
            let first = seen.insert(article.article_url.clone());
            if !first {
                debug!(
                    "Dropping repeat of {} under topic '{}'",
                    article.article_url, article.topic_guid
                );
            }
            first
        })
        .collect()
}

fn expand_entry(
    entry: &RawFeedEntry,
    policy: PubDatePolicy,
    now: DateTime<Utc>,
) -> Result<Vec<ParsedArticle>, EntryError> {
    let published_at = resolve_pub_date(entry.published_at_raw.as_deref(), policy, now)?;
    let inner = unescape_description(&entry.inner_markup);

    let articles = parse_inner_articles(&inner)
        .into_iter()
        .map(|article| ParsedArticle {
            topic_guid: entry.guid.clone(),
            topic_title: entry.title.clone(),
            topic_link: entry.link.clone(),
            topic_source_name: entry.source_name.clone(),
            topic_source_url: entry.source_url.clone(),
            topic_published_at: published_at,
            article_order: article.order,
            article_title: article.title,
            article_url: article.url,
            article_press_name: article.press_name,
        })
        .collect();

    Ok(articles)
}

/// Parse the RSS layer. Malformed XML yields no entries, and an item missing
/// its guid, title or link is dropped without affecting its siblings.
pub fn parse_entries(xml: &str) -> Vec<RawFeedEntry> {
    if xml.trim().is_empty() {
        debug!("Empty feed payload");
        return Vec::new();
    }

    let doc = match Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Failed to parse feed XML: {}", e);
            return Vec::new();
        }
    };

    doc.descendants()
        .filter(|node| node.has_tag_name("item"))
        .filter_map(|item| match read_entry(&item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping malformed feed item: {}", e);
                None
            }
        })
        .collect()
}

fn read_entry(item: &Node<'_, '_>) -> Result<RawFeedEntry, EntryError> {
    let required = |name: &'static str| child_text(item, name).ok_or(EntryError::MissingField(name));

    let guid = required("guid")?;
    let title = required("title")?;
    let link = required("link")?;

    let source = child(item, "source");
    let source_name = source.and_then(|node| non_blank(node.text()));
    let source_url = source.and_then(|node| non_blank(node.attribute("url")));

    Ok(RawFeedEntry {
        guid,
        title,
        link,
        source_name,
        source_url,
        published_at_raw: child_text(item, "pubDate"),
        inner_markup: child(item, "description")
            .and_then(|node| node.text())
            .unwrap_or_default()
            .to_string(),
    })
}

fn child<'a, 'input>(node: &Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn child_text(node: &Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).and_then(|c| non_blank(c.text()))
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Parse an RFC 2822 `pubDate` (e.g. `Mon, 15 Jan 2024 10:00:00 GMT`) into UTC.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn resolve_pub_date(
    raw: Option<&str>,
    policy: PubDatePolicy,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, EntryError> {
    if let Some(parsed) = raw.and_then(parse_pub_date) {
        return Ok(parsed);
    }

    let raw = raw.unwrap_or_default().to_string();
    match policy {
        PubDatePolicy::Skip => Err(EntryError::InvalidPubDate(raw)),
        PubDatePolicy::Now => {
            warn!("Unparseable pubDate {:?}, using current time", raw);
            Ok(now)
        }
    }
}

/// Decode HTML entities left in a description after XML unescaping.
pub fn unescape_description(description: &str) -> String {
    html_escape::decode_html_entities(description).into_owned()
}

/// Extract the ordered article list from an (unescaped) description fragment.
///
/// Every `<li>` with an `<a href>` becomes one article, numbered from 1 in
/// document order. Items without a usable link are skipped and do not consume
/// a number. The first `<font>` inside the item, if any, names the press.
pub fn parse_inner_articles(html: &str) -> Vec<InnerArticle> {
    if html.trim().is_empty() {
        return Vec::new();
    }

    let (Ok(li_selector), Ok(anchor_selector), Ok(press_selector)) = (
        Selector::parse("li"),
        Selector::parse("a[href]"),
        Selector::parse("font"),
    ) else {
        return Vec::new();
    };

    let fragment = Html::parse_fragment(html);
    let mut articles = Vec::new();

    for li in fragment.select(&li_selector) {
        let Some((title, url)) = li
            .select(&anchor_selector)
            .find_map(|anchor| read_anchor(&anchor))
        else {
            debug!("Skipping list item without a link");
            continue;
        };

        let press_name = li
            .select(&press_selector)
            .next()
            .map(|font| collapse_whitespace(&font.text().collect::<String>()))
            .filter(|name| !name.is_empty());

        articles.push(InnerArticle {
            order: articles.len() as i64 + 1,
            title,
            url,
            press_name,
        });
    }

    articles
}

fn read_anchor(anchor: &ElementRef<'_>) -> Option<(String, String)> {
    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let title = collapse_whitespace(&anchor.text().collect::<String>());
    Some((title, href.to_string()))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
