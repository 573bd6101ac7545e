//! Route handlers
//!
//! Request bodies are deserialized and validated here, before any actor is
//! touched. Counter routes answer with plain-text integers.

use axum::{
    extract::{FromRequest, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use hearth_core::domain::{NewUser, NewUserWithPosts, Post, User, UserWithPosts};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::instance::InstanceName;
use crate::response::{JsonBody, Pretty};
use crate::state::AppState;

pub const USER_CREATED: &str = "ユーザを作成しました。";
pub const USER_CREATE_FAILED: &str = "ユーザの作成に失敗しました。";
pub const USER_POSTS_CREATED: &str = "ユーザと投稿を作成しました。";

/// JSON body whose rejections answer 400 with the usual error body
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Payload<T>(pub T);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub instance: String,
    pub applied_migrations: usize,
}

pub async fn health(
    State(state): State<AppState>,
    instance: InstanceName,
) -> ApiResult<axum::Json<HealthResponse>> {
    let actor = instance.resolve(&state).await?;
    actor.health_check().await?;
    let migrations = actor.migration_status().await?;

    Ok(axum::Json(HealthResponse {
        status: "ok",
        instance: instance.0,
        applied_migrations: migrations.applied,
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    instance: InstanceName,
    pretty: Pretty,
) -> ApiResult<JsonBody<Vec<User>>> {
    let users = instance.resolve(&state).await?.fetch_users().await?;
    Ok(pretty.json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    instance: InstanceName,
    Payload(user): Payload<NewUser>,
) -> ApiResult<Response> {
    user.validate()?;

    let actor = instance.resolve(&state).await?;
    match actor.create_user(&user).await? {
        Some(id) => {
            debug!(instance = %instance, id, "Created user");
            Ok((StatusCode::CREATED, [(LOCATION, "/users")], USER_CREATED).into_response())
        }
        None => {
            warn!(instance = %instance, email = %user.email, "User insert returned no row");
            Ok((StatusCode::INTERNAL_SERVER_ERROR, USER_CREATE_FAILED).into_response())
        }
    }
}

pub async fn list_posts(
    State(state): State<AppState>,
    instance: InstanceName,
    pretty: Pretty,
) -> ApiResult<JsonBody<Vec<Post>>> {
    let posts = instance.resolve(&state).await?.fetch_posts().await?;
    Ok(pretty.json(posts))
}

pub async fn list_user_posts(
    State(state): State<AppState>,
    instance: InstanceName,
    pretty: Pretty,
) -> ApiResult<JsonBody<Vec<UserWithPosts>>> {
    let rows = instance.resolve(&state).await?.fetch_user_posts().await?;
    Ok(pretty.json(rows))
}

pub async fn create_user_posts(
    State(state): State<AppState>,
    instance: InstanceName,
    Payload(input): Payload<NewUserWithPosts>,
) -> ApiResult<Response> {
    input.validate()?;

    let created = instance
        .resolve(&state)
        .await?
        .create_user_and_posts(&input.user, &input.posts)
        .await?;

    debug!(
        instance = %instance,
        id = created.user.id,
        posts = created.posts.len(),
        "Created user with posts"
    );
    Ok((
        StatusCode::CREATED,
        [(LOCATION, "/user-posts")],
        USER_POSTS_CREATED,
    )
        .into_response())
}

pub async fn get_counter(
    State(state): State<AppState>,
    instance: InstanceName,
) -> ApiResult<String> {
    let value = instance.resolve(&state).await?.get_value().await?;
    Ok(value.to_string())
}

pub async fn increment_counter(
    State(state): State<AppState>,
    instance: InstanceName,
) -> ApiResult<String> {
    let value = instance.resolve(&state).await?.increment(1).await?;
    Ok(value.to_string())
}

pub async fn decrement_counter(
    State(state): State<AppState>,
    instance: InstanceName,
) -> ApiResult<String> {
    let value = instance.resolve(&state).await?.decrement(1).await?;
    Ok(value.to_string())
}
