// SPDX-License-Identifier: MPL-2.0

use crate::cache::CacheError;
use crate::cache::schema::SCHEMA;
use crate::config::APP_NAME;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Handle to the cache database
#[derive(Clone)]
pub struct CacheDb {
    conn: Arc<Mutex<Connection>>,
}

impl CacheDb {
    /// Open or create the cache database at the default location
    /// Path: ~/.local/share/reader-sync/cache.db
    pub fn open() -> Result<Self, CacheError> {
        Self::open_at(&Self::cache_path()?)
    }

    /// Open or create a cache database at `path`
    pub fn open_at(path: &Path) -> Result<Self, CacheError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Path(format!("failed to create cache dir: {}", e)))?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Throwaway database, mostly for tests
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CacheError> {
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run schema migrations
    fn migrate(conn: &Connection) -> Result<(), CacheError> {
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version == 1 {
            // v1 ordered feed posts by their raw date text
            conn.execute_batch(
                r#"
                ALTER TABLE feed_posts ADD COLUMN published_ts INTEGER;
                UPDATE feed_posts
                SET published_ts = CAST(strftime('%s', published) AS INTEGER)
                WHERE published <> '';
                DROP INDEX IF EXISTS idx_feed_posts_published;
                "#,
            )?;
        }

        // Execute the schema (all CREATE IF NOT EXISTS)
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get XDG data directory for cache
    fn cache_path() -> Result<PathBuf, CacheError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| CacheError::Path("could not find data directory".to_string()))?;

        Ok(data_dir.join(APP_NAME).join("cache.db"))
    }

    /// Access connection for operations
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("cache lock poisoned")
    }

    /// Get current unix timestamp
    pub fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Drop feed membership older than a week. Posts themselves stay while
    /// any feed still references them or they were fetched within the week.
    pub fn cleanup_stale(&self) -> Result<(), CacheError> {
        let conn = self.conn();
        let cutoff = Self::now() - (7 * 24 * 60 * 60);

        conn.execute("DELETE FROM feed_posts WHERE fetched_at < ?", [cutoff])?;

        conn.execute(
            r#"
            DELETE FROM posts
            WHERE fetched_at < ?1
            AND NOT EXISTS (
                SELECT 1 FROM feed_posts fp
                WHERE fp.blog_id = posts.blog_id AND fp.post_id = posts.post_id
            )
            "#,
            [cutoff],
        )?;

        conn.execute(
            r#"
            DELETE FROM post_likes
            WHERE NOT EXISTS (
                SELECT 1 FROM posts p
                WHERE p.blog_id = post_likes.blog_id AND p.post_id = post_likes.post_id
            )
            "#,
            [],
        )?;

        Ok(())
    }
}
