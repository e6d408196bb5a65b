//! One-shot flash messages carried in a cookie across the comment redirect.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::presentation::views::FlashView;

pub const FLASH_COOKIE: &str = "blogpit_flash";

pub const CATEGORY_MESSAGE: &str = "message";
pub const CATEGORY_ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FlashPayload {
    category: String,
    message: String,
}

/// Queue a message for the next rendered page under `path`.
pub fn push(jar: CookieJar, path: &str, category: &str, message: &str) -> CookieJar {
    let mut pending = read(&jar);
    pending.push(FlashPayload {
        category: category.to_string(),
        message: message.to_string(),
    });

    let serialized = match serde_json::to_vec(&pending) {
        Ok(serialized) => serialized,
        Err(err) => {
            warn!(target: "blogpit::http::flash", error = %err, "failed to encode flash message");
            return jar;
        }
    };

    let cookie = Cookie::build((FLASH_COOKIE, URL_SAFE_NO_PAD.encode(serialized)))
        .path(path.to_string())
        .http_only(true)
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

/// Drain pending messages, clearing the cookie when there were any.
pub fn take(jar: CookieJar, path: &str) -> (CookieJar, Vec<FlashView>) {
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, Vec::new());
    }

    let flashes = read(&jar)
        .into_iter()
        .map(|payload| FlashView {
            category: payload.category,
            message: payload.message,
        })
        .collect();
    let jar = jar.remove(Cookie::build(FLASH_COOKIE).path(path.to_string()));
    (jar, flashes)
}

fn read(jar: &CookieJar) -> Vec<FlashPayload> {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return Vec::new();
    };

    URL_SAFE_NO_PAD
        .decode(cookie.value())
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}
