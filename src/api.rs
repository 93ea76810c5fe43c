// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The HTTP surface of a worker.
//!
//! | Method | Path  | Response                                  |
//! |--------|-------|-------------------------------------------|
//! | GET    | /     | `200`, [`Greeting`] for this process      |
//! | any    | other | `404`, `Cannot <METHOD> <path>`           |

use std::borrow::Cow;

use axum::http::{Method, StatusCode, Uri};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

pub const GREETING: &str = "Hello from the Node.js API!";

/// Body of `GET /`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    pub pid: u32,
    pub message: Cow<'static, str>,
}

impl Greeting {
    /// The greeting of the current process
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            message: Cow::Borrowed(GREETING),
        }
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(greet).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
}

async fn greet() -> Json<Greeting> {
    Json(Greeting::current())
}

async fn not_found(method: Method, uri: Uri) -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        format!("Cannot {} {}", method, uri.path()),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    async fn send(method: Method, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = router()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|value| value.to_str().unwrap().to_string());
        let body = response.into_body().collect().await.unwrap().to_bytes();

        (status, content_type, body.to_vec())
    }

    #[tokio::test]
    async fn test_greeting() {
        let (status, content_type, body) = send(Method::GET, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));

        let greeting: Greeting = serde_json::from_slice(&body).unwrap();
        assert_eq!(greeting.pid, std::process::id());
        assert_eq!(greeting.message, GREETING);
    }

    #[tokio::test]
    async fn test_greeting_wire_format() {
        let (_, _, body) = send(Method::GET, "/").await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "pid": std::process::id(),
                "message": "Hello from the Node.js API!",
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let (status, _, body) = send(Method::GET, "/missing?q=1").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, b"Cannot GET /missing");
    }

    #[tokio::test]
    async fn test_other_method_is_not_found() {
        let (status, _, body) = send(Method::POST, "/").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, b"Cannot POST /");
    }
}
