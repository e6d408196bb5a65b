use std::{net::SocketAddr, sync::Arc};

use axum::{
    Form, Router,
    body::Body,
    extract::{ConnectInfo, FromRequest, Path, State},
    http::{
        HeaderMap, HeaderValue, Request, StatusCode,
        header::{ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE, REFERER, USER_AGENT},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use bytes::Bytes;
use metrics::counter;
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    application::{
        blog::{Blog, Resolution, SectionListing, Snapshot},
        error::HttpError,
        syndication::{FeedChannel, RSS_CONTENT_TYPE, rss_feed},
    },
    config::BlogSettings,
    domain::{
        article::{Article, Document},
        comment::{CommentForm, CommentInput, Provenance},
    },
    presentation::views::{
        ArticleTemplate, ArticleView, LayoutChrome, LayoutContext, SectionTemplate, SectionView,
        encode_path, render_not_found_response, render_template_response,
    },
};

use super::{
    flash,
    middleware::{log_responses, set_request_context},
};

const SOURCE: &str = "infra::http::public";

const XHR_HEADER: &str = "x-requested-with";
const XHR_VALUE: &str = "XMLHttpRequest";

const COMMENT_SAVED: &str = "Thank you for your comment";
const COMMENT_FAILED: &str =
    "Oops, we are unable to submit your comment at this time, please try again later!";

#[derive(Clone)]
pub struct HttpState {
    pub blog: Arc<Blog>,
    pub site: Arc<BlogSettings>,
}

/// Routes for the blog root and every path below it, under the configured mount path.
pub fn build_router(state: HttpState) -> Router {
    let mount = state.site.mount_path.clone();

    let mut router = Router::new()
        .route(&format!("{mount}/"), get(show_root).post(submit_root))
        .route(&format!("{mount}/{{*path}}"), get(show_path).post(submit_path));
    if !mount.is_empty() {
        router = router.route(&mount, get(redirect_to_root));
    }

    router
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Request details the article view needs beyond the path itself.
#[derive(Debug, Default)]
struct RequestInfo {
    xhr: bool,
    provenance: Provenance,
}

impl RequestInfo {
    fn from_request(request: &Request<Body>) -> Self {
        let headers = request.headers();
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Self {
            xhr: header_text(headers, XHR_HEADER)
                .is_some_and(|value| value.eq_ignore_ascii_case(XHR_VALUE)),
            provenance: Provenance {
                referer: header_text(headers, REFERER.as_str()),
                remote_addr,
                language: header_text(headers, ACCEPT_LANGUAGE.as_str()),
                user_agent: header_text(headers, USER_AGENT.as_str()),
            },
        }
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn redirect_to_root(State(state): State<HttpState>) -> Redirect {
    Redirect::permanent(&format!("{}/", state.site.mount_path))
}

async fn show_root(
    State(state): State<HttpState>,
    jar: CookieJar,
    request: Request<Body>,
) -> Response {
    let info = RequestInfo::from_request(&request);
    respond(&state, "", jar, info, None).await
}

async fn show_path(
    State(state): State<HttpState>,
    Path(path): Path<String>,
    jar: CookieJar,
    request: Request<Body>,
) -> Response {
    let info = RequestInfo::from_request(&request);
    respond(&state, &path, jar, info, None).await
}

async fn submit_root(
    State(state): State<HttpState>,
    jar: CookieJar,
    request: Request<Body>,
) -> Response {
    submit(&state, "", jar, request).await
}

async fn submit_path(
    State(state): State<HttpState>,
    Path(path): Path<String>,
    jar: CookieJar,
    request: Request<Body>,
) -> Response {
    submit(&state, &path, jar, request).await
}

/// The body stays unread until the path turns out to be a commentable article.
async fn submit(state: &HttpState, path: &str, jar: CookieJar, request: Request<Body>) -> Response {
    let info = RequestInfo::from_request(&request);
    respond(state, path, jar, info, Some(request)).await
}

async fn respond(
    state: &HttpState,
    path: &str,
    jar: CookieJar,
    info: RequestInfo,
    submission: Option<Request<Body>>,
) -> Response {
    let snapshot = match state.blog.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let resolution = match snapshot.resolve(path).await {
        Ok(resolution) => resolution,
        Err(err) => return HttpError::from(err).into_response(),
    };

    match resolution {
        Resolution::Feed(listing) => feed_response(state, &listing),
        Resolution::Article { path, article } => match article.as_ref() {
            Article::Binary(data) => binary_response(&path, data.clone()),
            Article::Document(document) => {
                let page = ArticlePage {
                    path: &path,
                    article: &article,
                    document,
                };
                article_response(state, &snapshot, page, jar, info, submission).await
            }
        },
        Resolution::Listing(listing) => {
            let (jar, chrome) = match load_chrome(state, &snapshot, jar).await {
                Ok(loaded) => loaded,
                Err(err) => return err.into_response(),
            };
            let content = SectionView::from_listing(&chrome, &listing);
            let view = LayoutContext::new(chrome, content);
            (jar, render_template_response(SectionTemplate { view }, StatusCode::OK))
                .into_response()
        }
        Resolution::NotFound => match load_chrome(state, &snapshot, jar).await {
            Ok((jar, chrome)) => (jar, render_not_found_response(chrome)).into_response(),
            Err(err) => err.into_response(),
        },
    }
}

/// A resolved document together with the path it was found at.
struct ArticlePage<'a> {
    path: &'a str,
    article: &'a Article,
    document: &'a Document,
}

async fn article_response(
    state: &HttpState,
    snapshot: &Snapshot<'_>,
    page: ArticlePage<'_>,
    jar: CookieJar,
    info: RequestInfo,
    submission: Option<Request<Body>>,
) -> Response {
    let ArticlePage {
        path,
        article,
        document,
    } = page;

    let form = if state.site.comments {
        let input = match submission {
            Some(request) => read_comment(request).await,
            None => None,
        };
        Some(input.map_or_else(CommentForm::blank, CommentForm::submitted))
    } else {
        None
    };

    let href = format!("{}/{}", state.site.mount_path, encode_path(path));
    if let Some(form) = form.as_ref().filter(|form| form.is_submitted()) {
        let outcome = if form.spam_detected() {
            "spam"
        } else if form.is_valid() {
            "accepted"
        } else {
            "invalid"
        };
        counter!("blogpit_comment_total", "outcome" => outcome).increment(1);
    }

    if let Some(comment) = form.as_ref().and_then(CommentForm::comment) {
        let root = format!("{}/", state.site.mount_path);
        let jar = match state
            .blog
            .submit_comment(path, &comment, &info.provenance)
            .await
        {
            Ok(true) => flash::push(jar, &root, flash::CATEGORY_MESSAGE, COMMENT_SAVED),
            Ok(false) => flash::push(jar, &root, flash::CATEGORY_ERROR, COMMENT_FAILED),
            Err(err) => return HttpError::from(err).into_response(),
        };
        return (jar, Redirect::to(&href)).into_response();
    }

    if info.xhr && state.site.serve_xhr_raw {
        return raw_response(state.blog.raw_data(article));
    }

    let (jar, chrome) = match load_chrome(state, snapshot, jar).await {
        Ok(loaded) => loaded,
        Err(err) => return err.into_response(),
    };
    let mut content = ArticleView::new(path, document);
    if let Some(form) = form.as_ref() {
        content = content.with_comments(href, form, &state.site.spam_message);
    }
    let view = LayoutContext::new(chrome, content);
    (jar, render_template_response(ArticleTemplate { view }, StatusCode::OK)).into_response()
}

/// Comment fields of a POST body; `None` when the body is not a form.
async fn read_comment(request: Request<Body>) -> Option<CommentInput> {
    match Form::<CommentInput>::from_request(request, &()).await {
        Ok(Form(input)) => Some(input),
        Err(rejection) => {
            debug!(
                target: SOURCE,
                status = %rejection.status(),
                reason = %rejection.body_text(),
                "ignoring POST body that is not a comment form"
            );
            None
        }
    }
}

/// Site title, menu and pending flashes for an HTML page.
async fn load_chrome(
    state: &HttpState,
    snapshot: &Snapshot<'_>,
    jar: CookieJar,
) -> Result<(CookieJar, LayoutChrome), HttpError> {
    let menu = snapshot.menu().await?;
    let chrome = LayoutChrome::new(&state.site.title, &state.site.mount_path, &menu);
    let (jar, flashes) = flash::take(jar, &chrome.root_href);
    Ok((jar, chrome.with_flashes(flashes)))
}

fn feed_response(state: &HttpState, listing: &SectionListing) -> Response {
    let channel = FeedChannel {
        site_title: &state.site.title,
        base: &state.site.site_url,
        built_at: OffsetDateTime::now_utc(),
    };
    xml_response(rss_feed(&channel, listing), RSS_CONTENT_TYPE)
}

fn binary_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }

    response
}

fn xml_response(body: String, content_type: &str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn raw_response(body: Bytes) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
