//! One-shot flash messages
//!
//! Admin actions answer with a redirect; the outcome message travels in a
//! short-lived cookie and is shown by the next page render, which clears it.
//! The message text is hex encoded so any UTF-8 survives the cookie syntax.

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};

const COOKIE_NAME: &str = "unitforge_flash";
const COOKIE_ATTRS: &str = "Path=/admin; HttpOnly; SameSite=Lax";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Error => "error",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(FlashLevel::Success),
            "info" => Some(FlashLevel::Info),
            "error" => Some(FlashLevel::Error),
            _ => None,
        }
    }
}

/// User-facing outcome of an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }

    fn encode(&self) -> String {
        format!("{}.{}", self.level.as_str(), hex::encode(self.message.as_bytes()))
    }

    fn decode(value: &str) -> Option<Self> {
        let (level, message) = value.split_once('.')?;
        let bytes = hex::decode(message).ok()?;
        Some(Self {
            level: FlashLevel::parse(level)?,
            message: String::from_utf8(bytes).ok()?,
        })
    }
}

/// Flash stored in the request cookies, if any
pub fn take(headers: &HeaderMap) -> Option<Flash> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(COOKIE_NAME)?.strip_prefix('='))
        .find_map(Flash::decode)
}

/// `Set-Cookie` value that stores `flash`
pub fn set_cookie(flash: &Flash) -> HeaderValue {
    let cookie = format!("{}={}; Max-Age=60; {}", COOKIE_NAME, flash.encode(), COOKIE_ATTRS);
    // Hex payload and fixed attributes are always visible ASCII
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| clear_cookie())
}

/// `Set-Cookie` value that removes a stored flash
pub fn clear_cookie() -> HeaderValue {
    HeaderValue::from_static("unitforge_flash=; Max-Age=0; Path=/admin; HttpOnly; SameSite=Lax")
}

/// 303 redirect carrying `flash` to the next page
pub fn redirect(location: &str, flash: &Flash) -> Response {
    ([(SET_COOKIE, set_cookie(flash))], Redirect::to(location)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn cookie_pair(flash: &Flash) -> String {
        let set = set_cookie(flash);
        set.to_str().unwrap().split(';').next().unwrap().to_string()
    }

    #[test]
    fn test_flash_survives_cookie() {
        let flash = Flash::error("Jednotka Kusy nelze smazat; \"in use\"");
        let headers = cookie_headers(&format!("theme=dark; {}", cookie_pair(&flash)));

        assert_eq!(take(&headers), Some(flash));
    }

    #[test]
    fn test_missing_or_garbled_cookie() {
        assert_eq!(take(&HeaderMap::new()), None);
        assert_eq!(take(&cookie_headers("unitforge_flash=info.zz")), None);
        assert_eq!(take(&cookie_headers("unitforge_flash=loud.6869")), None);
        assert_eq!(take(&cookie_headers("unitforge_flash_other=info.6869")), None);
    }

    #[test]
    fn test_redirect_is_see_other() {
        let response = redirect("/admin/units", &Flash::success("ok"));

        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/admin/units");
        assert!(response.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .starts_with("unitforge_flash=success.6f6b"));
    }

    #[test]
    fn test_level_serializes_lowercase() {
        let json = serde_json::to_string(&Flash::info("x")).unwrap();
        assert_eq!(json, r#"{"level":"info","message":"x"}"#);
    }
}
