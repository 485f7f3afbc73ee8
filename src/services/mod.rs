//! Business rules: validation, ownership checks and transaction boundaries.
//! Every mutating method runs inside a single transaction.
pub mod auth;
pub mod comments;
pub mod likes;
pub mod stories;
pub mod users;
pub mod validation;

pub use auth::AuthService;
pub use comments::CommentService;
pub use likes::LikeService;
pub use stories::StoryService;
pub use users::UserService;

use sqlx::{Sqlite, SqlitePool, Transaction};

/// Opens a transaction that takes the write lock up front.
///
/// A deferred transaction that reads first cannot upgrade to a writer once
/// another connection has committed; SQLite fails that upgrade immediately
/// instead of waiting out the busy timeout.
pub(crate) async fn begin_write(db: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    db.begin_with("BEGIN IMMEDIATE").await
}
