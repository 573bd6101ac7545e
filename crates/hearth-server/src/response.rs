//! JSON responses
//!
//! Any request carrying a `pretty` query parameter (`/users?pretty`) gets
//! indented JSON back.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{FromRequestParts, Query},
    http::{HeaderValue, Uri, header::CONTENT_TYPE, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Whether the client asked for indented JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pretty(pub bool);

#[derive(Debug, Default, Deserialize)]
struct PrettyParams {
    pretty: Option<String>,
}

impl Pretty {
    /// `?pretty`, `?pretty=<anything>`, and their percent-encoded forms
    pub fn from_uri(uri: &Uri) -> Self {
        let params = Query::<PrettyParams>::try_from_uri(uri)
            .map(|Query(params)| params)
            .unwrap_or_default();
        Self(params.pretty.is_some())
    }

    pub fn json<T: Serialize>(self, value: T) -> JsonBody<T> {
        JsonBody {
            value,
            pretty: self.0,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Pretty {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_uri(&parts.uri))
    }
}

pub struct JsonBody<T> {
    value: T,
    pretty: bool,
}

impl<T: Serialize> IntoResponse for JsonBody<T> {
    fn into_response(self) -> Response {
        if !self.pretty {
            return Json(self.value).into_response();
        }

        match serde_json::to_vec_pretty(&self.value) {
            Ok(bytes) => (
                [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                bytes,
            )
                .into_response(),
            Err(e) => ApiError::from(hearth_core::Error::from(e)).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pretty(uri: &str) -> bool {
        Pretty::from_uri(&uri.parse::<Uri>().unwrap()).0
    }

    #[test]
    fn test_pretty_query_detection() {
        assert!(pretty("/users?pretty"));
        assert!(pretty("/users?pretty=1"));
        assert!(pretty("/users?a=b&pretty"));
        assert!(!pretty("/users?prettyish=1"));
        assert!(!pretty("/users?a=pretty"));
        assert!(!pretty("/users"));
    }

    #[test]
    fn test_pretty_key_is_percent_decoded() {
        assert!(pretty("/users?pr%65tty"));
        assert!(pretty("/users?%70retty=yes"));
        assert!(!pretty("/users?pretty%3D1=x"));
    }
}
