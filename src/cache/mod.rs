// SPDX-License-Identifier: MPL-2.0

mod db;
mod feeds;
mod posts;
mod schema;
mod store;
mod users;

pub use db::CacheDb;
pub use feeds::{FeedCache, SyncCursor};
pub use posts::PostCache;
pub use store::LocalStore;
pub use users::UserCache;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("database path error: {0}")]
    Path(String),
}
