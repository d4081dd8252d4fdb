// SPDX-License-Identifier: MPL-2.0

use crate::api::Post;
use crate::cache::{CacheDb, CacheError};
use chrono::DateTime;
use rusqlite::{Connection, OptionalExtension, params};

const UPSERT_POST: &str = r#"
    INSERT INTO posts (
        blog_id, post_id, title, url, blog_url, published,
        num_likes, num_replies, is_liked, is_followed, is_comments_open, is_reblogged,
        featured_image, featured_video, is_videopress, fetched_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
    ON CONFLICT(blog_id, post_id) DO UPDATE SET
        title = excluded.title,
        url = excluded.url,
        blog_url = excluded.blog_url,
        published = excluded.published,
        num_likes = excluded.num_likes,
        num_replies = excluded.num_replies,
        is_liked = excluded.is_liked,
        is_followed = excluded.is_followed,
        is_comments_open = excluded.is_comments_open,
        is_reblogged = excluded.is_reblogged,
        featured_image = excluded.featured_image,
        featured_video = excluded.featured_video,
        is_videopress = excluded.is_videopress,
        fetched_at = excluded.fetched_at
"#;

/// Feeds mix sites in different UTC offsets, so order by instant, not text
fn published_timestamp(published: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(published)
        .ok()
        .map(|date| date.timestamp())
}

const SELECT_POST: &str = r#"
    SELECT
        blog_id, post_id, title, url, blog_url, published,
        num_likes, num_replies, is_liked, is_followed, is_comments_open, is_reblogged,
        featured_image, featured_video, is_videopress
    FROM posts
"#;

/// Cache operations for posts
pub struct PostCache<'a> {
    db: &'a CacheDb,
}

impl<'a> PostCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    /// Store a single post (upserts)
    pub fn store(&self, post: &Post) -> Result<(), CacheError> {
        let conn = self.db.conn();
        Self::upsert(&conn, post, CacheDb::now())
    }

    /// Store multiple posts in a transaction, optionally recording them as
    /// members of `feed_key`
    pub fn store_batch(&self, feed_key: Option<&str>, posts: &[Post]) -> Result<(), CacheError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        let now = CacheDb::now();

        for post in posts {
            Self::upsert(&tx, post, now)?;

            if let Some(feed_key) = feed_key {
                tx.execute(
                    r#"
                    INSERT INTO feed_posts (feed_key, blog_id, post_id, published, published_ts, fetched_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(feed_key, blog_id, post_id) DO UPDATE SET
                        published = excluded.published,
                        published_ts = excluded.published_ts,
                        fetched_at = excluded.fetched_at
                    "#,
                    params![
                        feed_key,
                        post.blog_id,
                        post.post_id,
                        post.published,
                        published_timestamp(&post.published),
                        now
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get post by key
    pub fn get(&self, blog_id: i64, post_id: i64) -> Result<Option<Post>, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!("{} WHERE blog_id = ?1 AND post_id = ?2", SELECT_POST))?;

        let post = stmt
            .query_row(params![blog_id, post_id], Self::row_to_post)
            .optional()?;

        Ok(post)
    }

    /// Get all cached posts in a blog, newest first
    pub fn get_for_blog(&self, blog_id: i64) -> Result<Vec<Post>, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE blog_id = ?1 ORDER BY published DESC",
            SELECT_POST
        ))?;

        let posts = stmt
            .query_map([blog_id], Self::row_to_post)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    /// Set the follow flag on every cached post from a blog
    pub fn set_follow_status_for_blog(&self, blog_id: i64, followed: bool) -> Result<(), CacheError> {
        let conn = self.db.conn();
        conn.execute(
            "UPDATE posts SET is_followed = ?1 WHERE blog_id = ?2",
            params![followed, blog_id],
        )?;
        Ok(())
    }

    pub fn set_reblogged(&self, blog_id: i64, post_id: i64, reblogged: bool) -> Result<(), CacheError> {
        let conn = self.db.conn();
        conn.execute(
            "UPDATE posts SET is_reblogged = ?1 WHERE blog_id = ?2 AND post_id = ?3",
            params![reblogged, blog_id, post_id],
        )?;
        Ok(())
    }

    fn upsert(conn: &Connection, post: &Post, now: i64) -> Result<(), CacheError> {
        conn.execute(
            UPSERT_POST,
            params![
                post.blog_id,
                post.post_id,
                post.title,
                post.url,
                post.blog_url,
                post.published,
                post.num_likes,
                post.num_replies,
                post.is_liked_by_current_user,
                post.is_followed_by_current_user,
                post.is_comments_open,
                post.is_reblogged,
                post.featured_image,
                post.featured_video,
                post.is_videopress,
                now,
            ],
        )?;
        Ok(())
    }

    /// Convert a database row to a Post
    fn row_to_post(row: &rusqlite::Row) -> Result<Post, rusqlite::Error> {
        Ok(Post {
            blog_id: row.get(0)?,
            post_id: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            blog_url: row.get(4)?,
            published: row.get(5)?,
            num_likes: row.get(6)?,
            num_replies: row.get(7)?,
            is_liked_by_current_user: row.get(8)?,
            is_followed_by_current_user: row.get(9)?,
            is_comments_open: row.get(10)?,
            is_reblogged: row.get(11)?,
            featured_image: row.get(12)?,
            featured_video: row.get(13)?,
            is_videopress: row.get(14)?,
        })
    }
}
