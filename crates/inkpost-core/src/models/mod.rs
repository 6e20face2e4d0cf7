//! Data models for blog API entities.
//!
//! - `Post`, `NewPost`, `ImageUpload`: blog posts and drafts
//! - `UserProfile`, `SignUp`: account data

pub mod account;
pub mod post;

pub use account::{SignUp, UserProfile, MIN_PASSWORD_LENGTH};
pub use post::{ImageUpload, NewPost, Post};
