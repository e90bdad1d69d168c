pub mod health;

use axum::{routing::get, Router};

use crate::blog::handlers as blog;
use crate::feeds::handlers as feeds;
use crate::micropub::handlers as micropub;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Syndication
        .route("/atom/entries/", get(feeds::handle_entries_feed))
        .route("/atom/links/", get(feeds::handle_blogmarks_feed))
        .route("/atom/everything/", get(feeds::handle_everything_feed))
        .route("/sitemap.xml", get(feeds::handle_sitemap))
        // Browsing
        .route("/tags/:tag", get(blog::handle_tag_page))
        .route("/search", get(blog::handle_search))
        // Publishing
        .route(
            "/micropub",
            get(micropub::handle_micropub_get).post(micropub::handle_micropub_post),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::errors::AppError;
    use crate::micropub::auth::{Identity, TokenVerifier};
    use crate::models::{Blogmark, Draft, Entry, Kind, Payload, Quotation, Tag};
    use crate::store::{ContentStore, MemoryContentStore};

    const GOOD_TOKEN: &str = "good-token";

    struct StubVerifier;

    #[async_trait]
    impl TokenVerifier for StubVerifier {
        async fn verify(&self, token: &str) -> Result<Identity, AppError> {
            if token == GOOD_TOKEN {
                Ok(Identity {
                    me: "https://example.org/".into(),
                    client_id: None,
                    scope: "create".into(),
                })
            } else {
                Err(AppError::Forbidden)
            }
        }
    }

    fn tags(names: &[&str]) -> Vec<Tag> {
        names.iter().map(|t| Tag::parse(t).unwrap()).collect()
    }

    async fn seeded_store() -> Arc<MemoryContentStore> {
        let store = Arc::new(MemoryContentStore::new());
        let day = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 9, 0, 0).unwrap();

        store
            .insert(
                Draft::new(
                    day(1),
                    "hi",
                    Payload::Entry(Entry {
                        title: "Hi".into(),
                        body: "<p>Hello python world</p>".into(),
                    }),
                )
                .with_tags(tags(&["python", "web"])),
            )
            .await
            .unwrap();
        store
            .insert(
                Draft::new(
                    day(2),
                    "cool",
                    Payload::Blogmark(Blogmark {
                        link_url: "https://example.com/".into(),
                        link_title: "Cool".into(),
                        commentary: "A python link".into(),
                        via_url: None,
                        via_title: None,
                    }),
                )
                .with_tags(tags(&["python"])),
            )
            .await
            .unwrap();
        store
            .insert(Draft::new(
                day(3),
                "zen",
                Payload::Quotation(Quotation {
                    quotation: "Flat is better than nested".into(),
                    source: "Tim Peters".into(),
                    source_url: None,
                }),
            ))
            .await
            .unwrap();
        store
    }

    fn app(store: Arc<MemoryContentStore>) -> Router {
        build_router(AppState {
            store,
            token_verifier: Arc::new(StubVerifier),
            config: Config::for_tests(),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn micropub_post(token: Option<&str>, content_type: &str, body: String) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/micropub")
            .header(header::CONTENT_TYPE, content_type);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn spec_entry_json() -> String {
        json!({
            "type": ["h-entry"],
            "properties": {"content": ["hi there"], "mp-slug": ["hi"], "name": ["hi"]}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(seeded_store().await).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["service"], "weblog");
    }

    #[tokio::test]
    async fn test_micropub_get_returns_empty_object() {
        let response = app(seeded_store().await)
            .oneshot(get("/micropub"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({}));
    }

    #[tokio::test]
    async fn test_micropub_post_creates_entry() {
        let store = Arc::new(MemoryContentStore::new());
        let response = app(store.clone())
            .oneshot(micropub_post(
                Some(GOOD_TOKEN),
                "application/json",
                spec_entry_json(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let stored = store.page(Kind::Entry, &Default::default(), None, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        let record = &stored[0];
        assert_eq!(
            location,
            format!("https://example.org{}", record.canonical_path())
        );
        assert!(location.ends_with("/hi/"));
        match &record.payload {
            Payload::Entry(entry) => {
                assert_eq!(entry.title, "hi");
                assert_eq!(entry.body, "<p>hi there</p>");
            }
            other => panic!("expected an entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_micropub_post_form_encoded() {
        let store = Arc::new(MemoryContentStore::new());
        let response = app(store.clone())
            .oneshot(micropub_post(
                Some(GOOD_TOKEN),
                "application/x-www-form-urlencoded",
                "h=entry&name=Form+post&content=hello&category[]=rust".to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let stored = store.page(Kind::Entry, &Default::default(), None, 10).await.unwrap();
        assert_eq!(stored[0].meta.slug, "form-post");
        assert_eq!(stored[0].tags(), tags(&["rust"]).as_slice());
    }

    #[tokio::test]
    async fn test_micropub_post_requires_credentials() {
        let store = Arc::new(MemoryContentStore::new());
        let response = app(store.clone())
            .oneshot(micropub_post(None, "application/json", spec_entry_json()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(store
            .page(Kind::Entry, &Default::default(), None, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_micropub_form_body_token() {
        let store = Arc::new(MemoryContentStore::new());
        let response = app(store.clone())
            .oneshot(micropub_post(
                None,
                "application/x-www-form-urlencoded",
                format!("h=entry&content=hello&mp-slug=body-token&access_token={GOOD_TOKEN}"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let stored = store.page(Kind::Entry, &Default::default(), None, 10).await.unwrap();
        assert_eq!(stored[0].meta.slug, "body-token");

        let rejected = app(store)
            .oneshot(micropub_post(
                None,
                "application/x-www-form-urlencoded",
                "h=entry&content=hello&mp-slug=other&access_token=stolen".to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_micropub_json_body_token_is_ignored() {
        let body = json!({
            "type": ["h-entry"],
            "properties": {"content": ["x"], "mp-slug": ["x"]},
            "access_token": GOOD_TOKEN
        })
        .to_string();
        let response = app(Arc::new(MemoryContentStore::new()))
            .oneshot(micropub_post(None, "application/json", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_micropub_post_rejected_token() {
        let response = app(Arc::new(MemoryContentStore::new()))
            .oneshot(micropub_post(
                Some("stolen"),
                "application/json",
                spec_entry_json(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_micropub_post_unsupported_type() {
        let body = json!({"type": ["h-event"], "properties": {"name": ["party"]}}).to_string();
        let response = app(Arc::new(MemoryContentStore::new()))
            .oneshot(micropub_post(Some(GOOD_TOKEN), "application/json", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "UNSUPPORTED");
    }

    #[tokio::test]
    async fn test_micropub_duplicate_slug_conflicts() {
        let store = Arc::new(MemoryContentStore::new());
        let first = app(store.clone())
            .oneshot(micropub_post(Some(GOOD_TOKEN), "application/json", spec_entry_json()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = app(store)
            .oneshot(micropub_post(Some(GOOD_TOKEN), "application/json", spec_entry_json()))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_everything_feed_headers() {
        let response = app(seeded_store().await)
            .oneshot(get("/atom/everything/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "s-maxage=120"
        );
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("application/atom+xml"));

        let xml = body_text(response).await;
        assert_eq!(xml.matches("<entry>").count(), 3);
        let zen = xml.find("2024/Jan/3/zen/").unwrap();
        let cool = xml.find("2024/Jan/2/cool/").unwrap();
        let hi = xml.find("2024/Jan/1/hi/").unwrap();
        assert!(zen < cool && cool < hi);
    }

    #[tokio::test]
    async fn test_single_kind_feeds() {
        let router = app(seeded_store().await);
        let entries = body_text(router.clone().oneshot(get("/atom/entries/")).await.unwrap()).await;
        assert!(entries.contains("2024/Jan/1/hi/#atom-entries"));
        assert!(!entries.contains("cool"));

        let links = body_text(router.oneshot(get("/atom/links/")).await.unwrap()).await;
        assert!(links.contains("2024/Jan/2/cool/#atom-blogmarks"));
        assert!(!links.contains("/hi/"));
    }

    #[tokio::test]
    async fn test_sitemap() {
        let response = app(seeded_store().await)
            .oneshot(get("/sitemap.xml"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let xml = body_text(response).await;
        assert!(xml.contains("<loc>https://example.org/2024/Jan/1/hi/</loc>"));
        assert!(xml.contains("<loc>https://example.org/2024/Jan/2/cool/</loc>"));
        assert!(xml.contains("<loc>https://example.org/2024/Jan/3/zen/</loc>"));
    }

    #[tokio::test]
    async fn test_tag_page() {
        let router = app(seeded_store().await);
        let response = router.clone().oneshot(get("/tags/python")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["counts"]["total"], 2);
        assert_eq!(page["related"], json!(["web"]));
        assert_eq!(page["items"].as_array().unwrap().len(), 2);
        assert_eq!(page["items"][0]["title"], "Cool");

        let missing = router.clone().oneshot(get("/tags/unused")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let invalid = router.oneshot(get("/tags/Not-Valid")).await.unwrap();
        assert_eq!(invalid.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search() {
        let router = app(seeded_store().await);
        let response = router.clone().oneshot(get("/search?q=python")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let found = body_json(response).await;
        let results = found["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);

        let tagged = body_json(router.clone().oneshot(get("/search?tags=python,web")).await.unwrap()).await;
        assert_eq!(tagged["results"].as_array().unwrap().len(), 1);
        assert_eq!(tagged["results"][0]["item"]["title"], "Hi");

        let empty = router.oneshot(get("/search")).await.unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    }
}
