use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::db::{Article, Database};
use crate::search::{self, ArchiveQuery, Page, SearchQuery, SearchRequest};

pub struct AppState {
    pub db: Arc<Database>,
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/news/google/headlines", get(headlines))
        .route("/api/archive/headlines", get(archive_headlines))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Route handlers
pub async fn headlines(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<Article>>, AppError> {
    let request = SearchRequest::from_query(query);
    let page = search::search(&state.db, &request).await?;
    Ok(Json(page))
}

pub async fn archive_headlines(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArchiveQuery>,
) -> Result<Json<Page<Article>>, AppError> {
    let request = SearchRequest::from_archive_query(query);
    let page = search::search(&state.db, &request).await?;
    Ok(Json(page))
}

pub async fn health() -> impl IntoResponse {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedArticle;
    use axum::{body::Body, http::Request};
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn create_test_app() -> (Router, Arc<Database>) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        let db = Arc::new(db);

        let state = Arc::new(AppState { db: db.clone() });
        (router(state), db)
    }

    async fn setup_test_data(db: &Database) {
        for day in 1..=8u32 {
            let article = ParsedArticle {
                topic_guid: format!("topic-{}", day),
                topic_title: format!("Topic {}", day),
                topic_link: format!("https://news.google.com/topic/{}", day),
                topic_source_name: Some("Google News".to_string()),
                topic_source_url: Some("https://news.google.com".to_string()),
                topic_published_at: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
                article_order: 1,
                article_title: format!("Article {}", day),
                article_url: format!("https://press.example.com/{}", day),
                article_press_name: Some(if day % 2 == 0 { "Even Daily" } else { "Odd Weekly" }.to_string()),
            };
            db.insert_article(&article).await.unwrap();
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    mod health_tests {
        use super::*;

        #[tokio::test]
        async fn test_health_endpoint() {
            let (app, _db) = create_test_app().await;

            let response = app
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = response.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(&body[..], b"OK");
        }
    }

    mod headlines_tests {
        use super::*;

        #[tokio::test]
        async fn test_empty_store() {
            let (app, _db) = create_test_app().await;

            let (status, json) = get_json(app, "/api/news/google/headlines").await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["content"].as_array().unwrap().len(), 0);
            assert_eq!(json["page"], 0);
            assert_eq!(json["size"], 20);
            assert_eq!(json["totalElements"], 0);
            assert_eq!(json["totalPages"], 0);
            assert_eq!(json["hasPrevious"], false);
            assert_eq!(json["hasNext"], false);
        }

        #[tokio::test]
        async fn test_article_fields_are_camel_case() {
            let (app, db) = create_test_app().await;
            setup_test_data(&db).await;

            let (_, json) = get_json(app, "/api/news/google/headlines?size=1").await;
            let first = &json["content"][0];

            assert_eq!(first["articleUrl"], "https://press.example.com/8");
            assert_eq!(first["articleTitle"], "Article 8");
            assert_eq!(first["articlePressName"], "Even Daily");
            assert_eq!(first["articleOrder"], 1);
            assert_eq!(first["topicGuid"], "topic-8");
            assert_eq!(first["topicPublishedAt"], "2024-01-08T09:00:00Z");
            assert!(first["id"].is_i64());
            assert!(first["createdAt"].is_string());
            assert_eq!(json["hasNext"], true);
            assert_eq!(json["totalPages"], 8);
        }

        #[tokio::test]
        async fn test_filters_are_combined() {
            let (app, db) = create_test_app().await;
            setup_test_data(&db).await;

            let (_, json) = get_json(
                app,
                "/api/news/google/headlines?fromDate=2024-01-03&toDate=2024-01-06&press=even",
            )
            .await;

            let urls: Vec<&str> = json["content"]
                .as_array()
                .unwrap()
                .iter()
                .map(|a| a["articleUrl"].as_str().unwrap())
                .collect();
            assert_eq!(json["totalElements"], 2);
            assert_eq!(urls, vec!["https://press.example.com/6", "https://press.example.com/4"]);
        }

        #[tokio::test]
        async fn test_malformed_date_is_ignored() {
            let (app, db) = create_test_app().await;
            setup_test_data(&db).await;

            let (status, json) =
                get_json(app, "/api/news/google/headlines?fromDate=01/03/2024&keyword=article").await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["totalElements"], 8);
        }

        #[tokio::test]
        async fn test_second_page() {
            let (app, db) = create_test_app().await;
            setup_test_data(&db).await;

            let (_, json) = get_json(app, "/api/news/google/headlines?page=1&size=3").await;

            assert_eq!(json["content"].as_array().unwrap().len(), 3);
            assert_eq!(json["content"][0]["articleUrl"], "https://press.example.com/5");
            assert_eq!(json["hasPrevious"], true);
            assert_eq!(json["hasNext"], true);
            assert_eq!(json["totalPages"], 3);
        }
    }

    mod oversized_page_tests {
        use super::*;

        #[tokio::test]
        async fn test_max_size_returns_everything() {
            let (app, db) = create_test_app().await;
            setup_test_data(&db).await;

            let (status, json) =
                get_json(app, "/api/news/google/headlines?size=9223372036854775807").await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["content"].as_array().unwrap().len(), 8);
            assert_eq!(json["totalPages"], 1);
            assert_eq!(json["hasNext"], false);
        }
    }

    mod archive_tests {
        use super::*;

        #[tokio::test]
        async fn test_archive_single_day() {
            let (app, db) = create_test_app().await;
            setup_test_data(&db).await;

            let (status, json) = get_json(app, "/api/archive/headlines?date=2024-01-04").await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["totalElements"], 1);
            assert_eq!(json["size"], 50);
            assert_eq!(json["content"][0]["articleUrl"], "https://press.example.com/4");
        }
    }
}
