//! Session identity extraction (§6).
//!
//! A session cookie (`rt_session`) or `x-session-id` header identifies the
//! caller; a missing session falls back to a freshly generated id, which
//! `DispatchService::profile` turns into an on-the-fly user with a seeded
//! wallet (development mode). Cookie issuance back to the client is a
//! presentation concern the worker-runner/UI own, out of scope here (§1).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use uuid::Uuid;

pub struct Session(pub String);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(header) = parts.headers.get("x-session-id") {
            if let Ok(value) = header.to_str() {
                if !value.is_empty() {
                    return Ok(Session(value.to_string()));
                }
            }
        }
        if let Some(cookie_header) = parts.headers.get(axum::http::header::COOKIE) {
            if let Ok(raw) = cookie_header.to_str() {
                for pair in raw.split(';') {
                    let pair = pair.trim();
                    if let Some(value) = pair.strip_prefix("rt_session=") {
                        if !value.is_empty() {
                            return Ok(Session(value.to_string()));
                        }
                    }
                }
            }
        }
        Ok(Session(format!("anon_{}", Uuid::new_v4())))
    }
}
