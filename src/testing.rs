// SPDX-License-Identifier: MPL-2.0

//! Scripted [`RemoteClient`] and a fault-injecting [`LocalStore`] for tests.

use crate::api::{Post, ReaderTag, ReaderUser, RemoteClient, RemoteError};
use crate::cache::{CacheDb, CacheError, LocalStore, SyncCursor};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

enum Reply {
    Ready(Result<Value, RemoteError>),
    Gated(oneshot::Receiver<Result<Value, RemoteError>>),
}

/// Replies are consumed in order, one per request. A reply scripted for a
/// path only answers requests to that path. Unscripted requests fail with a
/// network error.
#[derive(Default)]
pub struct MockRemote {
    replies: Mutex<VecDeque<(Option<String>, Reply)>>,
    calls: Mutex<Vec<Call>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_ok(&self, body: Value) {
        self.push(Reply::Ready(Ok(body)));
    }

    pub fn reply_err(&self) {
        self.push(Reply::Ready(Err(RemoteError::Network(
            "connection reset".to_string(),
        ))));
    }

    /// The next request waits until the returned sender fires
    pub fn reply_later(&self) -> oneshot::Sender<Result<Value, RemoteError>> {
        let (tx, rx) = oneshot::channel();
        self.push(Reply::Gated(rx));
        tx
    }

    /// Like [`reply_later`](Self::reply_later) but only for requests to `path`
    pub fn reply_later_for(&self, path: &str) -> oneshot::Sender<Result<Value, RemoteError>> {
        let (tx, rx) = oneshot::channel();
        self.replies
            .lock()
            .unwrap()
            .push_back((Some(path.to_string()), Reply::Gated(rx)));
        tx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back((None, reply));
    }

    fn next(&self, method: &'static str, path: &str, params: &[(String, String)]) -> Reply {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            params: params.to_vec(),
        });
        let mut replies = self.replies.lock().unwrap();
        let matching = replies
            .iter()
            .position(|(only, _)| only.as_deref().is_none_or(|p| p == path));
        matching
            .and_then(|i| replies.remove(i))
            .map(|(_, reply)| reply)
            .unwrap_or_else(|| Reply::Ready(Err(RemoteError::Network("no scripted reply".into()))))
    }

    async fn resolve(reply: Reply) -> Result<Value, RemoteError> {
        match reply {
            Reply::Ready(result) => result,
            Reply::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(RemoteError::Network("reply dropped".into()))),
        }
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, RemoteError> {
        let reply = self.next("GET", path, query);
        Self::resolve(reply).await
    }

    async fn post(&self, path: &str, params: &[(String, String)]) -> Result<Value, RemoteError> {
        let reply = self.next("POST", path, params);
        Self::resolve(reply).await
    }
}

/// Wraps a [`CacheDb`] and fails batch post writes while `fail_upserts` is set
pub struct FlakyStore {
    pub db: CacheDb,
    fail_upserts: AtomicBool,
}

impl FlakyStore {
    pub fn new(db: CacheDb) -> Self {
        Self {
            db,
            fail_upserts: AtomicBool::new(false),
        }
    }

    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }
}

impl LocalStore for FlakyStore {
    fn get_post(&self, blog_id: i64, post_id: i64) -> Result<Option<Post>, CacheError> {
        self.db.get_post(blog_id, post_id)
    }

    fn upsert_post(&self, post: &Post) -> Result<(), CacheError> {
        self.db.upsert_post(post)
    }

    fn upsert_posts(&self, feed_key: Option<&str>, posts: &[Post]) -> Result<(), CacheError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(CacheError::Database(rusqlite::Error::InvalidQuery));
        }
        self.db.upsert_posts(feed_key, posts)
    }

    fn set_follow_status_for_blog(&self, blog_id: i64, followed: bool) -> Result<(), CacheError> {
        self.db.set_follow_status_for_blog(blog_id, followed)
    }

    fn set_blog_url_followed(&self, blog_url: &str, followed: bool) -> Result<(), CacheError> {
        self.db.set_blog_url_followed(blog_url, followed)
    }

    fn set_current_user_likes_post(
        &self,
        blog_id: i64,
        post_id: i64,
        user_id: i64,
        liked: bool,
    ) -> Result<(), CacheError> {
        self.db
            .set_current_user_likes_post(blog_id, post_id, user_id, liked)
    }

    fn set_likes_for_post(
        &self,
        blog_id: i64,
        post_id: i64,
        user_ids: &[i64],
    ) -> Result<(), CacheError> {
        self.db.set_likes_for_post(blog_id, post_id, user_ids)
    }

    fn upsert_users(&self, users: &[ReaderUser]) -> Result<(), CacheError> {
        self.db.upsert_users(users)
    }

    fn set_post_reblogged(
        &self,
        blog_id: i64,
        post_id: i64,
        reblogged: bool,
    ) -> Result<(), CacheError> {
        self.db.set_post_reblogged(blog_id, post_id, reblogged)
    }

    fn get_tag(&self, name: &str) -> Result<Option<ReaderTag>, CacheError> {
        self.db.get_tag(name)
    }

    fn upsert_tag(&self, tag: &ReaderTag) -> Result<(), CacheError> {
        self.db.upsert_tag(tag)
    }

    fn get_cursor(&self, feed_key: &str) -> Result<Option<SyncCursor>, CacheError> {
        self.db.get_cursor(feed_key)
    }

    fn set_newest(&self, feed_key: &str, date: &str) -> Result<(), CacheError> {
        self.db.set_newest(feed_key, date)
    }

    fn set_oldest(&self, feed_key: &str, date: &str) -> Result<(), CacheError> {
        self.db.set_oldest(feed_key, date)
    }

    fn set_last_updated(&self, feed_key: &str, date: &str) -> Result<(), CacheError> {
        self.db.set_last_updated(feed_key, date)
    }

    fn has_posts_in_feed(&self, feed_key: &str) -> Result<bool, CacheError> {
        self.db.has_posts_in_feed(feed_key)
    }

    fn oldest_local_timestamp(&self, feed_key: &str) -> Result<Option<String>, CacheError> {
        self.db.oldest_local_timestamp(feed_key)
    }

    fn count_unseen(&self, feed_key: &str, posts: &[Post]) -> Result<usize, CacheError> {
        self.db.count_unseen(feed_key, posts)
    }
}
