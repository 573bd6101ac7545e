//! Users and posts

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 320;
const MAX_TITLE_LEN: usize = 500;
const MAX_AGE: i64 = 150;

/// Upper bound on posts created together with one user
pub const MAX_POSTS_PER_REQUEST: usize = 500;

/// A stored user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub email: String,
}

/// A stored post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
}

/// A user together with the posts it authored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithPosts {
    #[serde(flatten)]
    pub user: User,
    pub posts: Vec<Post>,
}

/// Input for creating a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub name: String,
    pub age: i64,
    pub email: String,
}

impl NewUser {
    pub fn new(name: impl Into<String>, age: i64, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age,
            email: email.into(),
        }
    }

    /// Reject inputs that can't be a real user
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("name must not be blank".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(Error::InvalidInput(format!(
                "name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }
        if !(0..=MAX_AGE).contains(&self.age) {
            return Err(Error::InvalidInput(format!(
                "age must be between 0 and {}",
                MAX_AGE
            )));
        }
        let email = self.email.trim();
        if email.len() > MAX_EMAIL_LEN || !looks_like_email(email) {
            return Err(Error::InvalidInput(format!(
                "'{}' is not a valid email address",
                email
            )));
        }
        Ok(())
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Input for creating a post; the author is assigned by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewPost {
    pub title: String,
}

impl NewPost {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("title must not be blank".to_string()));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(Error::InvalidInput(format!(
                "title must be at most {} characters",
                MAX_TITLE_LEN
            )));
        }
        Ok(())
    }
}

/// Input for creating a user and its posts in one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUserWithPosts {
    pub user: NewUser,
    #[serde(default)]
    pub posts: Vec<NewPost>,
}

impl NewUserWithPosts {
    pub fn validate(&self) -> Result<()> {
        self.user.validate()?;
        if self.posts.len() > MAX_POSTS_PER_REQUEST {
            return Err(Error::InvalidInput(format!(
                "at most {} posts can be created at once",
                MAX_POSTS_PER_REQUEST
            )));
        }
        self.posts.iter().try_for_each(NewPost::validate)
    }
}
