//! Filtered, paginated reads over stored headlines.

use chrono::{FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::{format_timestamp, Article, ArticleFilter, Database};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const DEFAULT_ARCHIVE_PAGE_SIZE: i64 = 50;

/// Offset of the archive's "today", in seconds east of UTC (KST).
const ARCHIVE_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// Query string of the search endpoint. Everything is optional and lenient.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub press: Option<String>,
    pub keyword: Option<String>,
}

/// Query string of the one-day archive endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ArchiveQuery {
    pub date: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// A validated search: page and size are usable and filters are normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub page: i64,
    pub size: i64,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub press: Option<String>,
    pub keyword: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, page: i64, size: i64, total_elements: i64) -> Self {
        let per_page = size.max(1);
        let total_pages = total_elements / per_page + i64::from(total_elements % per_page != 0);

        Self {
            content,
            page,
            size,
            total_elements,
            total_pages,
            has_previous: page > 0,
            has_next: page.saturating_add(1).saturating_mul(size) < total_elements,
        }
    }
}

impl SearchRequest {
    pub fn from_query(query: SearchQuery) -> Self {
        Self {
            page: normalize_page(query.page),
            size: normalize_size(query.size, DEFAULT_PAGE_SIZE),
            from_date: parse_date_param("fromDate", query.from_date.as_deref()),
            to_date: parse_date_param("toDate", query.to_date.as_deref()),
            press: non_blank(query.press),
            keyword: non_blank(query.keyword),
        }
    }

    /// A single-day request; a missing or malformed date means today in KST.
    pub fn from_archive_query(query: ArchiveQuery) -> Self {
        let date = parse_date_param("date", query.date.as_deref()).unwrap_or_else(archive_today);

        Self {
            page: normalize_page(query.page),
            size: normalize_size(query.size, DEFAULT_ARCHIVE_PAGE_SIZE),
            from_date: Some(date),
            to_date: Some(date),
            press: None,
            keyword: None,
        }
    }

    /// Translate the request into a storage filter. Dates cover whole UTC days.
    pub fn filter(&self) -> ArticleFilter {
        ArticleFilter {
            published_from: self
                .from_date
                .map(|d| format_timestamp(d.and_time(NaiveTime::MIN).and_utc())),
            published_to: self.to_date.and_then(|d| {
                NaiveTime::from_hms_opt(23, 59, 59).map(|end| format_timestamp(d.and_time(end).and_utc()))
            }),
            press: self.press.clone(),
            keyword: self.keyword.clone(),
        }
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }
}

/// Run `request` against the store: one page plus the total it was cut from.
pub async fn search(db: &Database, request: &SearchRequest) -> anyhow::Result<Page<Article>> {
    let filter = request.filter();

    let total = db.count_articles(&filter).await?;
    let content = db
        .search_articles(&filter, request.size, request.offset())
        .await?;

    Ok(Page::new(content, request.page, request.size, total))
}

fn normalize_page(page: Option<i64>) -> i64 {
    page.unwrap_or(0).max(0)
}

fn normalize_size(size: Option<i64>, default: i64) -> i64 {
    match size {
        Some(size) if size > 0 => size,
        _ => default,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `YYYY-MM-DD`, or `None` when absent, blank, or malformed.
fn parse_date_param(name: &str, value: Option<&str>) -> Option<NaiveDate> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("Ignoring malformed {} {:?}: {}", name, value, e);
            None
        }
    }
}

fn archive_today() -> NaiveDate {
    match FixedOffset::east_opt(ARCHIVE_UTC_OFFSET_SECS) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}
