// SPDX-License-Identifier: MPL-2.0

use crate::api::{Post, ReaderTag};
use crate::cache::{CacheDb, CacheError};
use rusqlite::{OptionalExtension, params};

/// Date cursors bounding a feed's next fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCursor {
    /// Newest date reported by the server for this feed
    pub newest_date: Option<String>,
    /// Oldest date reported by the server for this feed
    pub oldest_date: Option<String>,
    /// When newer posts were last requested (RFC 3339)
    pub last_updated: Option<String>,
}

/// Cache operations for feeds and their cursors
pub struct FeedCache<'a> {
    db: &'a CacheDb,
}

impl<'a> FeedCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    /// Get feed cursor, if one was ever stored
    pub fn get_cursor(&self, feed_key: &str) -> Result<Option<SyncCursor>, CacheError> {
        let conn = self.db.conn();

        let cursor = conn
            .query_row(
                r#"
                SELECT newest_date, oldest_date, last_updated
                FROM feed_state
                WHERE feed_key = ?
                "#,
                [feed_key],
                |row| {
                    Ok(SyncCursor {
                        newest_date: row.get(0)?,
                        oldest_date: row.get(1)?,
                        last_updated: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(cursor)
    }

    pub fn set_newest(&self, feed_key: &str, date: &str) -> Result<(), CacheError> {
        self.set_column(feed_key, "newest_date", date)
    }

    pub fn set_oldest(&self, feed_key: &str, date: &str) -> Result<(), CacheError> {
        self.set_column(feed_key, "oldest_date", date)
    }

    pub fn set_last_updated(&self, feed_key: &str, date: &str) -> Result<(), CacheError> {
        self.set_column(feed_key, "last_updated", date)
    }

    // `column` is always one of the literals above
    fn set_column(&self, feed_key: &str, column: &str, value: &str) -> Result<(), CacheError> {
        let conn = self.db.conn();
        conn.execute(
            &format!(
                r#"
                INSERT INTO feed_state (feed_key, {column}) VALUES (?1, ?2)
                ON CONFLICT(feed_key) DO UPDATE SET {column} = excluded.{column}
                "#
            ),
            params![feed_key, value],
        )?;
        Ok(())
    }

    pub fn has_posts(&self, feed_key: &str) -> Result<bool, CacheError> {
        Ok(self.count(feed_key)? > 0)
    }

    /// Get count of cached posts for feed
    pub fn count(&self, feed_key: &str) -> Result<usize, CacheError> {
        let conn = self.db.conn();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM feed_posts WHERE feed_key = ?",
            [feed_key],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    /// Publish date of the oldest post the feed has cached
    pub fn oldest_published(&self, feed_key: &str) -> Result<Option<String>, CacheError> {
        let conn = self.db.conn();

        let oldest = conn
            .query_row(
                r#"
                SELECT published FROM feed_posts
                WHERE feed_key = ? AND published_ts IS NOT NULL
                ORDER BY published_ts ASC
                LIMIT 1
                "#,
                [feed_key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(oldest)
    }

    /// How many of `posts` the feed hasn't seen yet
    pub fn count_unseen(&self, feed_key: &str, posts: &[Post]) -> Result<usize, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT 1 FROM feed_posts WHERE feed_key = ?1 AND blog_id = ?2 AND post_id = ?3",
        )?;

        let mut unseen = 0;
        for post in posts {
            if !stmt.exists(params![feed_key, post.blog_id, post.post_id])? {
                unseen += 1;
            }
        }

        Ok(unseen)
    }

    /// Clear a feed's membership and cursor
    pub fn clear_feed(&self, feed_key: &str) -> Result<(), CacheError> {
        let conn = self.db.conn();

        conn.execute("DELETE FROM feed_posts WHERE feed_key = ?", [feed_key])?;
        conn.execute("DELETE FROM feed_state WHERE feed_key = ?", [feed_key])?;

        Ok(())
    }

    pub fn get_tag(&self, name: &str) -> Result<Option<ReaderTag>, CacheError> {
        let conn = self.db.conn();

        let tag = conn
            .query_row(
                "SELECT name, endpoint FROM tags WHERE name = ?",
                [name],
                |row| {
                    Ok(ReaderTag {
                        name: row.get(0)?,
                        endpoint: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(tag)
    }

    pub fn store_tag(&self, tag: &ReaderTag) -> Result<(), CacheError> {
        let conn = self.db.conn();
        conn.execute(
            r#"
            INSERT INTO tags (name, endpoint) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET endpoint = excluded.endpoint
            "#,
            params![tag.name, tag.endpoint],
        )?;
        Ok(())
    }
}
