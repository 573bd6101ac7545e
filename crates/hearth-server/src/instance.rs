//! Instance resolution
//!
//! Requests address the configured default instance unless they carry an
//! `x-hearth-instance` header naming another one.

use std::fmt;

use axum::{extract::FromRequestParts, http::request::Parts};
use hearth_core::actor::{ActorHandle, validate_instance_name};
use hearth_core::Error;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const INSTANCE_HEADER: &str = "x-hearth-instance";

/// Validated name of the instance a request addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceName(pub String);

impl InstanceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ready actor for this instance, constructing it on first use
    pub async fn resolve(&self, state: &AppState) -> ApiResult<ActorHandle> {
        Ok(state.registry.get(&self.0).await?)
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromRequestParts<AppState> for InstanceName {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let name = match parts.headers.get(INSTANCE_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| {
                    Error::InvalidInstanceName(String::from_utf8_lossy(value.as_bytes()).into_owned())
                })?
                .to_string(),
            None => state.default_instance.to_string(),
        };

        validate_instance_name(&name)?;
        Ok(Self(name))
    }
}
