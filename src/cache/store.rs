// SPDX-License-Identifier: MPL-2.0

use crate::api::{Post, ReaderTag, ReaderUser};
use crate::cache::{CacheDb, CacheError, FeedCache, PostCache, SyncCursor, UserCache};

/// Everything the reader actions need from local storage.
///
/// Implementations must tolerate concurrent readers and writers; the actions
/// themselves take no locks.
pub trait LocalStore: Send + Sync {
    fn get_post(&self, blog_id: i64, post_id: i64) -> Result<Option<Post>, CacheError>;

    fn upsert_post(&self, post: &Post) -> Result<(), CacheError>;

    /// Upsert a batch, recording feed membership when `feed_key` is given
    fn upsert_posts(&self, feed_key: Option<&str>, posts: &[Post]) -> Result<(), CacheError>;

    fn set_follow_status_for_blog(&self, blog_id: i64, followed: bool) -> Result<(), CacheError>;

    fn set_blog_url_followed(&self, blog_url: &str, followed: bool) -> Result<(), CacheError>;

    fn set_current_user_likes_post(
        &self,
        blog_id: i64,
        post_id: i64,
        user_id: i64,
        liked: bool,
    ) -> Result<(), CacheError>;

    fn set_likes_for_post(
        &self,
        blog_id: i64,
        post_id: i64,
        user_ids: &[i64],
    ) -> Result<(), CacheError>;

    fn upsert_users(&self, users: &[ReaderUser]) -> Result<(), CacheError>;

    fn set_post_reblogged(&self, blog_id: i64, post_id: i64, reblogged: bool)
    -> Result<(), CacheError>;

    fn get_tag(&self, name: &str) -> Result<Option<ReaderTag>, CacheError>;

    fn upsert_tag(&self, tag: &ReaderTag) -> Result<(), CacheError>;

    fn get_cursor(&self, feed_key: &str) -> Result<Option<SyncCursor>, CacheError>;

    fn set_newest(&self, feed_key: &str, date: &str) -> Result<(), CacheError>;

    fn set_oldest(&self, feed_key: &str, date: &str) -> Result<(), CacheError>;

    fn set_last_updated(&self, feed_key: &str, date: &str) -> Result<(), CacheError>;

    fn has_posts_in_feed(&self, feed_key: &str) -> Result<bool, CacheError>;

    /// Publish date of the oldest cached post in the feed
    fn oldest_local_timestamp(&self, feed_key: &str) -> Result<Option<String>, CacheError>;

    /// Number of `posts` not yet recorded in the feed
    fn count_unseen(&self, feed_key: &str, posts: &[Post]) -> Result<usize, CacheError>;
}

impl LocalStore for CacheDb {
    fn get_post(&self, blog_id: i64, post_id: i64) -> Result<Option<Post>, CacheError> {
        PostCache::new(self).get(blog_id, post_id)
    }

    fn upsert_post(&self, post: &Post) -> Result<(), CacheError> {
        PostCache::new(self).store(post)
    }

    fn upsert_posts(&self, feed_key: Option<&str>, posts: &[Post]) -> Result<(), CacheError> {
        PostCache::new(self).store_batch(feed_key, posts)
    }

    fn set_follow_status_for_blog(&self, blog_id: i64, followed: bool) -> Result<(), CacheError> {
        PostCache::new(self).set_follow_status_for_blog(blog_id, followed)
    }

    fn set_blog_url_followed(&self, blog_url: &str, followed: bool) -> Result<(), CacheError> {
        UserCache::new(self).set_blog_url_followed(blog_url, followed)
    }

    fn set_current_user_likes_post(
        &self,
        blog_id: i64,
        post_id: i64,
        user_id: i64,
        liked: bool,
    ) -> Result<(), CacheError> {
        UserCache::new(self).set_user_likes_post(blog_id, post_id, user_id, liked)
    }

    fn set_likes_for_post(
        &self,
        blog_id: i64,
        post_id: i64,
        user_ids: &[i64],
    ) -> Result<(), CacheError> {
        UserCache::new(self).set_likes_for_post(blog_id, post_id, user_ids)
    }

    fn upsert_users(&self, users: &[ReaderUser]) -> Result<(), CacheError> {
        UserCache::new(self).store_batch(users)
    }

    fn set_post_reblogged(
        &self,
        blog_id: i64,
        post_id: i64,
        reblogged: bool,
    ) -> Result<(), CacheError> {
        PostCache::new(self).set_reblogged(blog_id, post_id, reblogged)
    }

    fn get_tag(&self, name: &str) -> Result<Option<ReaderTag>, CacheError> {
        FeedCache::new(self).get_tag(name)
    }

    fn upsert_tag(&self, tag: &ReaderTag) -> Result<(), CacheError> {
        FeedCache::new(self).store_tag(tag)
    }

    fn get_cursor(&self, feed_key: &str) -> Result<Option<SyncCursor>, CacheError> {
        FeedCache::new(self).get_cursor(feed_key)
    }

    fn set_newest(&self, feed_key: &str, date: &str) -> Result<(), CacheError> {
        FeedCache::new(self).set_newest(feed_key, date)
    }

    fn set_oldest(&self, feed_key: &str, date: &str) -> Result<(), CacheError> {
        FeedCache::new(self).set_oldest(feed_key, date)
    }

    fn set_last_updated(&self, feed_key: &str, date: &str) -> Result<(), CacheError> {
        FeedCache::new(self).set_last_updated(feed_key, date)
    }

    fn has_posts_in_feed(&self, feed_key: &str) -> Result<bool, CacheError> {
        FeedCache::new(self).has_posts(feed_key)
    }

    fn oldest_local_timestamp(&self, feed_key: &str) -> Result<Option<String>, CacheError> {
        FeedCache::new(self).oldest_published(feed_key)
    }

    fn count_unseen(&self, feed_key: &str, posts: &[Post]) -> Result<usize, CacheError> {
        FeedCache::new(self).count_unseen(feed_key, posts)
    }
}
