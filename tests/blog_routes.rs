use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use blogpit::{
    application::{blog::Blog, handler::HandlerKind},
    cache::{CacheBackend, CacheConfig, LruCacheBackend},
    config::{BlogSettings, DEFAULT_SPAM_MESSAGE},
    infra::{
        http::{HttpState, REQUEST_ID_HEADER, build_router, flash::FLASH_COOKIE},
        store::MemoryStore,
    },
};
use tower::ServiceExt;
use url::Url;

fn sample_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_articles([
        ("blog/a", "Title: A\n\nFirst"),
        ("blog/b", "Title: B\n\nSecond"),
        ("blog/c", "Title: C\n\nThird"),
        ("blog/logo.png", "\u{89}PNG"),
        ("notes/only", "Only one"),
    ]))
}

fn site() -> BlogSettings {
    BlogSettings {
        mount_path: String::new(),
        title: "Pit".to_string(),
        site_url: Url::parse("https://pit.example/").expect("valid url"),
        comments: false,
        serve_xhr_raw: false,
        spam_message: DEFAULT_SPAM_MESSAGE.to_string(),
    }
}

fn router(store: Arc<MemoryStore>, site: BlogSettings) -> Router {
    let cache: Option<Arc<dyn CacheBackend>> =
        Some(Arc::new(LruCacheBackend::new(&CacheConfig::default())));
    let blog = Blog::new(store, HandlerKind::Markdown.build(), cache);
    build_router(HttpState {
        blog: Arc::new(blog),
        site: Arc::new(site),
    })
}

fn commenting_site() -> BlogSettings {
    BlogSettings {
        comments: true,
        ..site()
    }
}

async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    app.clone().oneshot(request).await.expect("router should respond")
}

async fn post_form(app: &Router, uri: &str, body: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request should build");
    app.clone().oneshot(request).await.expect("router should respond")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn content_type(response: &Response) -> &str {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn flash_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{FLASH_COOKIE}=")))
        .map(|value| value.split(';').next().unwrap_or_default().to_string())
}

#[tokio::test]
async fn section_lists_articles_newest_name_first() {
    let app = router(sample_store(), site());

    let response = get(&app, "/blog/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let html = body_text(response).await;
    let c = html.find("href=\"/blog/c\"").expect("c listed");
    let b = html.find("href=\"/blog/b\"").expect("b listed");
    let a = html.find("href=\"/blog/a\"").expect("a listed");
    assert!(c < b && b < a);
    assert!(html.contains("<p>Third</p>"));
    assert!(!html.contains("href=\"/blog/logo.png\""));
    assert!(html.contains("href=\"/blog/rss\""));
    assert!(html.contains("href=\"/notes/\""));
}

#[tokio::test]
async fn section_feed_is_rss() {
    let app = router(sample_store(), site());

    let response = get(&app, "/blog/rss").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "application/rss+xml");

    let xml = body_text(response).await;
    assert!(xml.contains("<rss version=\"2.0\">"));
    assert!(xml.contains("<link>https://pit.example/blog/c</link>"));
    assert!(xml.contains("<title>C</title>"));
    let c = xml.find("https://pit.example/blog/c").expect("c item");
    let a = xml.find("https://pit.example/blog/a").expect("a item");
    assert!(c < a);
}

#[tokio::test]
async fn unknown_article_is_not_found() {
    let app = router(sample_store(), site());

    let response = get(&app, "/blog/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_text(response).await;
    assert!(html.contains("Page Not Found"));
}

#[tokio::test]
async fn singleton_section_shows_its_only_article() {
    let app = router(sample_store(), site());

    let response = get(&app, "/notes/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<p>Only one</p>"));

    let response = get(&app, "/notes/rss").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn binary_article_is_served_with_guessed_mimetype() {
    let app = router(sample_store(), site());

    let response = get(&app, "/blog/logo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), "\u{89}PNG".as_bytes());
}

#[tokio::test]
async fn comment_form_only_when_enabled() {
    let app = router(sample_store(), site());
    let html = body_text(get(&app, "/blog/a").await).await;
    assert!(html.contains("<p>First</p>"));
    assert!(!html.contains("name=\"homepage\""));

    let app = router(sample_store(), commenting_site());
    let html = body_text(get(&app, "/blog/a").await).await;
    assert!(html.contains("action=\"/blog/a\""));
    assert!(html.contains("name=\"homepage\""));
}

#[tokio::test]
async fn valid_comment_is_written_and_flashed() {
    let store = sample_store();
    let app = router(Arc::clone(&store), commenting_site());

    let response = post_form(&app, "/blog/a", "name=Ann&content=Nice+post&homepage=").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
        Some("/blog/a")
    );
    let cookie = flash_cookie(&response).expect("flash cookie set");

    let commits = store.commits();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].path, "blog/a");
    assert!(commits[0].message.starts_with("Unknown source\n\n"));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/blog/a")
        .header(COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = flash_cookie(&response).expect("flash cookie cleared");
    assert_eq!(cleared, format!("{FLASH_COOKIE}="));

    let html = body_text(response).await;
    assert!(html.contains("Thank you for your comment"));
    assert!(html.contains("<h3 class=\"blogpit-comment\">Ann</h3>"));
    assert!(html.contains("Nice post"));
}

#[tokio::test]
async fn comment_on_collapsed_section_redirects_to_the_article() {
    let store = sample_store();
    let app = router(Arc::clone(&store), commenting_site());

    let response = post_form(&app, "/notes/", "name=Ann&content=Hi").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
        Some("/notes/only")
    );
    assert_eq!(store.commits()[0].path, "notes/only");
}

#[tokio::test]
async fn invalid_comment_rerenders_with_errors() {
    let store = sample_store();
    let app = router(Arc::clone(&store), commenting_site());

    let response = post_form(&app, "/blog/a", "name=Ann&content=").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("This field is required."));
    assert!(html.contains("value=\"Ann\""));
    assert!(store.commits().is_empty());
}

#[tokio::test]
async fn spam_trap_hides_form_and_never_writes() {
    let store = sample_store();
    let app = router(Arc::clone(&store), commenting_site());

    let response = post_form(
        &app,
        "/blog/a",
        "name=Bot&content=Buy+now&homepage=http%3A%2F%2Fspam.example",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(DEFAULT_SPAM_MESSAGE));
    assert!(!html.contains("name=\"homepage\""));
    assert!(store.commits().is_empty());
}

#[tokio::test]
async fn disabled_comments_ignore_posts() {
    let store = sample_store();
    let app = router(Arc::clone(&store), site());

    let response = post_form(&app, "/blog/a", "name=Ann&content=Hi").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.commits().is_empty());
}

#[tokio::test]
async fn xhr_clients_get_raw_text_when_enabled() {
    let site = BlogSettings {
        serve_xhr_raw: true,
        ..site()
    };
    let app = router(sample_store(), site);

    let request = Request::builder()
        .uri("/blog/a")
        .header("X-Requested-With", "XMLHttpRequest")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "text/plain; charset=utf-8");
    assert_eq!(body_text(response).await, "Title: A\n\nFirst");

    let html = body_text(get(&app, "/blog/a").await).await;
    assert!(html.contains("<p>First</p>"));
}

#[tokio::test]
async fn store_changes_are_visible_on_next_request() {
    let store = sample_store();
    let app = router(Arc::clone(&store), site());

    assert!(body_text(get(&app, "/blog/a").await).await.contains("<p>First</p>"));
    store.insert("blog/a", "Title: A\n\nRewritten");
    assert!(body_text(get(&app, "/blog/a").await).await.contains("<p>Rewritten</p>"));

    store.insert("blog/d", "Title: D\n\nFourth");
    let html = body_text(get(&app, "/blog/").await).await;
    assert!(html.contains("href=\"/blog/d\""));
}

#[tokio::test]
async fn routes_live_under_the_mount_path() {
    let site = BlogSettings {
        mount_path: "/site".to_string(),
        ..site()
    };
    let app = router(sample_store(), site);

    let response = get(&app, "/site/blog/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("href=\"/site/blog/c\""));
    assert!(html.contains("href=\"/site/\""));

    let response = get(&app, "/site").await;
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(
        response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
        Some("/site/")
    );

    assert_eq!(get(&app, "/blog/").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn root_lists_top_level_sections() {
    let app = router(sample_store(), site());

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("href=\"/blog/\""));
    assert!(html.contains("href=\"/notes/\""));
    assert!(html.contains("<title>Pit | Pit</title>"));
}

async fn post_untyped(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::from("not a form"))
        .expect("request should build");
    app.clone().oneshot(request).await.expect("router should respond")
}

#[tokio::test]
async fn posts_without_a_form_body_render_like_gets() {
    let store = sample_store();
    let app = router(Arc::clone(&store), site());

    let response = post_untyped(&app, "/blog/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("href=\"/blog/c\""));

    let response = post_untyped(&app, "/blog/rss").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "application/rss+xml");

    let response = post_untyped(&app, "/blog/logo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/png");

    let response = post_untyped(&app, "/blog/a").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<p>First</p>"));

    let app = router(Arc::clone(&store), commenting_site());
    let response = post_untyped(&app, "/blog/a").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("name=\"homepage\""));
    assert!(!html.contains("This field is required."));

    assert!(store.commits().is_empty());
}

#[tokio::test]
async fn links_and_redirects_encode_article_names() {
    let store = Arc::new(MemoryStore::with_articles([
        ("blog/hello world", "Title: Hello\n\nSpaced"),
        ("blog/café", "Title: Cafe\n\nAccented"),
    ]));
    let app = router(Arc::clone(&store), commenting_site());

    let html = body_text(get(&app, "/blog/").await).await;
    assert!(html.contains("href=\"/blog/hello%20world\""));
    assert!(html.contains("href=\"/blog/caf%C3%A9\""));

    let response = post_form(&app, "/blog/caf%C3%A9", "name=Ann&content=Hi").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
        Some("/blog/caf%C3%A9")
    );
    assert_eq!(store.commits()[0].path, "blog/café");

    let response = post_form(&app, "/blog/hello%20world", "name=Ann&content=Hi").await;
    assert_eq!(
        response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
        Some("/blog/hello%20world")
    );
}
