use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::parser::ParsedArticle;

const ARTICLE_COLUMNS: &str = "id, topic_guid, topic_title, topic_link, topic_source_name, \
     topic_source_url, topic_published_at, article_order, article_title, article_url, \
     article_press_name, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub topic_guid: String,
    pub topic_title: String,
    pub topic_link: String,
    pub topic_source_name: Option<String>,
    pub topic_source_url: Option<String>,
    pub topic_published_at: String,
    pub article_order: i64,
    pub article_title: String,
    pub article_url: String,
    pub article_press_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Search predicate shared by the page query and the count query.
///
/// Bounds are inclusive and already rendered with [`format_timestamp`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub published_from: Option<String>,
    pub published_to: Option<String>,
    pub press: Option<String>,
    pub keyword: Option<String>,
}

/// RFC 3339, UTC, whole seconds. Stored values sort in time order as text.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news_google_headline (
                id INTEGER PRIMARY KEY,
                topic_guid TEXT NOT NULL,
                topic_title TEXT NOT NULL,
                topic_link TEXT NOT NULL,
                topic_source_name TEXT,
                topic_source_url TEXT,
                topic_published_at TEXT NOT NULL,
                article_order INTEGER NOT NULL,
                article_title TEXT NOT NULL,
                article_url TEXT NOT NULL UNIQUE,
                article_press_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_headline_published ON news_google_headline(topic_published_at)",
            "CREATE INDEX IF NOT EXISTS idx_headline_press ON news_google_headline(article_press_name)",
            "CREATE INDEX IF NOT EXISTS idx_headline_topic ON news_google_headline(topic_guid)",
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    pub async fn exists_by_article_url(&self, article_url: &str) -> anyhow::Result<bool> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(1) FROM news_google_headline WHERE article_url = ?")
                .bind(article_url)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    /// Store a new article. Returns `false` when a row with the same URL
    /// already exists; the existing row is left untouched.
    pub async fn insert_article(&self, article: &ParsedArticle) -> anyhow::Result<bool> {
        let now = format_timestamp(Utc::now());

        let result = sqlx::query(
            r#"
            INSERT INTO news_google_headline (
                topic_guid, topic_title, topic_link, topic_source_name, topic_source_url,
                topic_published_at, article_order, article_title, article_url,
                article_press_name, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(article_url) DO NOTHING
            "#,
        )
        .bind(&article.topic_guid)
        .bind(&article.topic_title)
        .bind(&article.topic_link)
        .bind(&article.topic_source_name)
        .bind(&article.topic_source_url)
        .bind(format_timestamp(article.topic_published_at))
        .bind(article.article_order)
        .bind(&article.article_title)
        .bind(&article.article_url)
        .bind(&article.article_press_name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn search_articles(
        &self,
        filter: &ArticleFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Article>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM news_google_headline",
            ARTICLE_COLUMNS
        ));
        push_filters(&mut builder, filter);
        builder
            .push(" ORDER BY topic_published_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let articles = builder
            .build_query_as::<Article>()
            .fetch_all(&self.pool)
            .await?;
        Ok(articles)
    }

    pub async fn count_articles(&self, filter: &ArticleFilter) -> anyhow::Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM news_google_headline");
        push_filters(&mut builder, filter);

        let count: (i64,) = builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(count.0)
    }
}

#[cfg(test)]
impl Database {
    pub(crate) async fn get_article_by_url(&self, article_url: &str) -> anyhow::Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {} FROM news_google_headline WHERE article_url = ?",
            ARTICLE_COLUMNS
        ))
        .bind(article_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }
}

/// Append the WHERE clause for `filter`. Both search and count go through here
/// so a page and its total can never disagree.
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ArticleFilter) {
    builder.push(" WHERE 1=1");

    if let Some(from) = &filter.published_from {
        builder.push(" AND topic_published_at >= ").push_bind(from.clone());
    }
    if let Some(to) = &filter.published_to {
        builder.push(" AND topic_published_at <= ").push_bind(to.clone());
    }
    if let Some(press) = &filter.press {
        builder
            .push(" AND LOWER(article_press_name) LIKE LOWER(")
            .push_bind(like_pattern(press))
            .push(") ESCAPE '\\'");
    }
    if let Some(keyword) = &filter.keyword {
        builder
            .push(" AND LOWER(article_title) LIKE LOWER(")
            .push_bind(like_pattern(keyword))
            .push(") ESCAPE '\\'");
    }
}

/// `%needle%` with LIKE wildcards in the needle matched literally.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
