//! Database operations for users and posts
//!
//! Every function takes any SQLite executor so the same statements run
//! against the pool, a pooled connection, or an open transaction.

use sqlx::{QueryBuilder, Sqlite, SqliteExecutor};

use super::entities::{NewPost, NewUser, Post, User};
use crate::Result;

/// Insert a user. `None` when the store produced no row (e.g. the email is taken).
pub async fn insert_user<'e, E>(executor: E, user: &NewUser) -> Result<Option<User>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, age, email)
        VALUES (?, ?, ?)
        ON CONFLICT DO NOTHING
        RETURNING id, name, age, email
        "#,
    )
    .bind(user.name.trim())
    .bind(user.age)
    .bind(user.email.trim())
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// List users in insertion order
pub async fn list_users<'e, E>(executor: E, limit: u32) -> Result<Vec<User>>
where
    E: SqliteExecutor<'e>,
{
    let users = sqlx::query_as::<_, User>("SELECT id, name, age, email FROM users ORDER BY id LIMIT ?")
        .bind(limit as i64)
        .fetch_all(executor)
        .await?;
    Ok(users)
}

/// Insert all posts for one author as a single statement
pub async fn insert_posts<'e, E>(executor: E, author_id: i64, posts: &[NewPost]) -> Result<Vec<Post>>
where
    E: SqliteExecutor<'e>,
{
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO posts (title, author_id) ");
    builder.push_values(posts, |mut row, post| {
        row.push_bind(post.title.clone()).push_bind(author_id);
    });
    builder.push(" RETURNING id, title, author_id");

    let mut inserted = builder.build_query_as::<Post>().fetch_all(executor).await?;
    inserted.sort_by_key(|post| post.id);
    Ok(inserted)
}

/// List posts in insertion order
pub async fn list_posts<'e, E>(executor: E, limit: u32) -> Result<Vec<Post>>
where
    E: SqliteExecutor<'e>,
{
    let posts = sqlx::query_as::<_, Post>("SELECT id, title, author_id FROM posts ORDER BY id LIMIT ?")
        .bind(limit as i64)
        .fetch_all(executor)
        .await?;
    Ok(posts)
}

/// List the posts written by one author
pub async fn list_posts_by_author<'e, E>(executor: E, author_id: i64, limit: u32) -> Result<Vec<Post>>
where
    E: SqliteExecutor<'e>,
{
    let posts = sqlx::query_as::<_, Post>(
        "SELECT id, title, author_id FROM posts WHERE author_id = ? ORDER BY id LIMIT ?",
    )
    .bind(author_id)
    .bind(limit as i64)
    .fetch_all(executor)
    .await?;
    Ok(posts)
}
