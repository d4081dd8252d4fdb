// SPDX-License-Identifier: MPL-2.0

use crate::api::ReaderUser;
use crate::cache::{CacheDb, CacheError};
use rusqlite::{OptionalExtension, params};

/// Cache operations for liking users and followed blogs
pub struct UserCache<'a> {
    db: &'a CacheDb,
}

impl<'a> UserCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    pub fn store_batch(&self, users: &[ReaderUser]) -> Result<(), CacheError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        let now = CacheDb::now();

        for user in users {
            tx.execute(
                r#"
                INSERT INTO users (user_id, login, display_name, avatar_url, url, fetched_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(user_id) DO UPDATE SET
                    login = excluded.login,
                    display_name = COALESCE(excluded.display_name, users.display_name),
                    avatar_url = COALESCE(excluded.avatar_url, users.avatar_url),
                    url = COALESCE(excluded.url, users.url),
                    fetched_at = excluded.fetched_at
                "#,
                params![
                    user.user_id,
                    user.login,
                    user.display_name,
                    user.avatar_url,
                    user.url,
                    now
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Replace the liking users of a post
    pub fn set_likes_for_post(
        &self,
        blog_id: i64,
        post_id: i64,
        user_ids: &[i64],
    ) -> Result<(), CacheError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM post_likes WHERE blog_id = ?1 AND post_id = ?2",
            params![blog_id, post_id],
        )?;
        for user_id in user_ids {
            tx.execute(
                "INSERT OR IGNORE INTO post_likes (blog_id, post_id, user_id) VALUES (?1, ?2, ?3)",
                params![blog_id, post_id, user_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Add or remove a single liker
    pub fn set_user_likes_post(
        &self,
        blog_id: i64,
        post_id: i64,
        user_id: i64,
        liked: bool,
    ) -> Result<(), CacheError> {
        let conn = self.db.conn();
        let sql = if liked {
            "INSERT OR IGNORE INTO post_likes (blog_id, post_id, user_id) VALUES (?1, ?2, ?3)"
        } else {
            "DELETE FROM post_likes WHERE blog_id = ?1 AND post_id = ?2 AND user_id = ?3"
        };
        conn.execute(sql, params![blog_id, post_id, user_id])?;
        Ok(())
    }

    pub fn liking_user_ids(&self, blog_id: i64, post_id: i64) -> Result<Vec<i64>, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id FROM post_likes WHERE blog_id = ?1 AND post_id = ?2 ORDER BY user_id",
        )?;

        let ids = stmt
            .query_map(params![blog_id, post_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    pub fn get(&self, user_id: i64) -> Result<Option<ReaderUser>, CacheError> {
        let conn = self.db.conn();

        let user = conn
            .query_row(
                "SELECT user_id, login, display_name, avatar_url, url FROM users WHERE user_id = ?",
                [user_id],
                |row| {
                    Ok(ReaderUser {
                        user_id: row.get(0)?,
                        login: row.get(1)?,
                        display_name: row.get(2)?,
                        avatar_url: row.get(3)?,
                        url: row.get(4)?,
                    })
                },
            )
            .optional()?;

        Ok(user)
    }

    pub fn set_blog_url_followed(&self, blog_url: &str, followed: bool) -> Result<(), CacheError> {
        let conn = self.db.conn();
        conn.execute(
            r#"
            INSERT INTO followed_blogs (blog_url, is_followed, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(blog_url) DO UPDATE SET
                is_followed = excluded.is_followed,
                updated_at = excluded.updated_at
            "#,
            params![blog_url, followed, CacheDb::now()],
        )?;
        Ok(())
    }

    pub fn is_blog_url_followed(&self, blog_url: &str) -> Result<Option<bool>, CacheError> {
        let conn = self.db.conn();

        let followed = conn
            .query_row(
                "SELECT is_followed FROM followed_blogs WHERE blog_url = ?",
                [blog_url],
                |row| row.get(0),
            )
            .optional()?;

        Ok(followed)
    }
}
