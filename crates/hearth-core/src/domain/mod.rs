//! Domain entities and their persistence

pub mod entities;
pub mod repository;

pub use entities::{
    MAX_POSTS_PER_REQUEST, NewPost, NewUser, NewUserWithPosts, Post, User, UserWithPosts,
};
