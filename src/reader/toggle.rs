// SPDX-License-Identifier: MPL-2.0

use crate::api::{Post, RemoteClient, RemoteError};
use crate::cache::{CacheError, LocalStore};
use crate::runtime::{self, StoreWorker};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How a background confirmation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Confirmed,
    /// The server refused or could not be reached; local state was restored
    Reverted,
    /// The confirmation task died before finishing. Local state may still
    /// hold the optimistic change.
    Abandoned,
}

/// Result of a like/follow request.
///
/// `accepted` is known immediately. The confirmation runs in the background
/// whether or not the caller keeps the handle.
pub struct Toggle {
    pub accepted: bool,
    pub confirmation: Option<JoinHandle<ToggleOutcome>>,
}

impl Toggle {
    fn unchanged() -> Self {
        Self {
            accepted: true,
            confirmation: None,
        }
    }

    fn rejected() -> Self {
        Self {
            accepted: false,
            confirmation: None,
        }
    }

    /// Wait for the server's answer. `None` when no request was sent.
    pub async fn outcome(self) -> Option<ToggleOutcome> {
        let handle = self.confirmation?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "toggle confirmation did not finish");
                Some(ToggleOutcome::Abandoned)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToggleKind {
    Like,
    Follow,
}

impl ToggleKind {
    fn is_on(self, post: &Post) -> bool {
        match self {
            ToggleKind::Like => post.is_liked_by_current_user,
            ToggleKind::Follow => post.is_followed_by_current_user,
        }
    }

    fn action_name(self, on: bool) -> &'static str {
        match (self, on) {
            (ToggleKind::Like, true) => "like",
            (ToggleKind::Like, false) => "unlike",
            (ToggleKind::Follow, true) => "follow",
            (ToggleKind::Follow, false) => "unfollow",
        }
    }

    fn path(self, post: &Post, on: bool) -> String {
        let suffix = if on { "new" } else { "mine/delete" };
        match self {
            ToggleKind::Like => format!(
                "sites/{}/posts/{}/likes/{}",
                post.blog_id, post.post_id, suffix
            ),
            ToggleKind::Follow => format!("sites/{}/follows/{}", post.blog_id, suffix),
        }
    }
}

/// Pre-toggle state of a post, held until the server answers
struct PendingToggle {
    kind: ToggleKind,
    snapshot: Post,
}

impl PendingToggle {
    fn revert(&self, store: &dyn LocalStore, current_user_id: Option<i64>) -> Result<(), CacheError> {
        let post = &self.snapshot;
        store.upsert_post(post)?;

        match self.kind {
            ToggleKind::Like => {
                if let Some(user_id) = current_user_id {
                    store.set_current_user_likes_post(
                        post.blog_id,
                        post.post_id,
                        user_id,
                        post.is_liked_by_current_user,
                    )?;
                }
            }
            ToggleKind::Follow => {
                store.set_follow_status_for_blog(post.blog_id, post.is_followed_by_current_user)?;
                if let Some(blog_url) = post.blog_url.as_deref().filter(|u| !u.is_empty()) {
                    store.set_blog_url_followed(blog_url, post.is_followed_by_current_user)?;
                }
            }
        }

        Ok(())
    }
}

/// Like/unlike posts and follow/unfollow blogs with immediate local effect.
///
/// The local write happens before the request goes out. If the request
/// fails, the post is restored to the state read just before this toggle,
/// so with overlapping toggles on one post the last snapshot wins.
pub struct PostToggler {
    remote: Arc<dyn RemoteClient>,
    store: Arc<dyn LocalStore>,
    worker: StoreWorker,
    current_user_id: Option<i64>,
}

impl PostToggler {
    pub fn new(remote: Arc<dyn RemoteClient>, store: Arc<dyn LocalStore>, worker: StoreWorker) -> Self {
        Self {
            remote,
            store,
            worker,
            current_user_id: None,
        }
    }

    /// Also track the signed-in user in each post's liker list
    pub fn with_current_user(mut self, user_id: Option<i64>) -> Self {
        self.current_user_id = user_id;
        self
    }

    pub fn like_post(&self, post: &Post, like: bool) -> Toggle {
        self.apply(ToggleKind::Like, post, like)
    }

    /// Follow or unfollow the blog `post` belongs to
    pub fn follow_blog(&self, post: &Post, follow: bool) -> Toggle {
        self.apply(ToggleKind::Follow, post, follow)
    }

    fn apply(&self, kind: ToggleKind, post: &Post, on: bool) -> Toggle {
        let action = kind.action_name(on);

        let persisted = match self.store.get_post(post.blog_id, post.post_id) {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(error = %e, "post {} skipped: cannot read cached post", action);
                return Toggle::rejected();
            }
        };

        if let Some(existing) = &persisted
            && kind.is_on(existing) == on
        {
            return Toggle::unchanged();
        }

        let pending = PendingToggle {
            kind,
            snapshot: persisted.unwrap_or_else(|| post.clone()),
        };

        let mut updated = post.clone();
        match kind {
            ToggleKind::Like => updated.set_liked(on),
            ToggleKind::Follow => updated.is_followed_by_current_user = on,
        }

        if let Err(e) = self.write_local(kind, &updated, on) {
            warn!(error = %e, "post {} skipped: local write failed", action);
            if let Err(e) = pending.revert(self.store.as_ref(), self.current_user_id) {
                warn!(error = %e, "post {}: restoring cached post failed", action);
            }
            return Toggle::rejected();
        }

        let path = kind.path(&updated, on);
        let remote = self.remote.clone();
        let store = self.store.clone();
        let worker = self.worker.clone();
        let current_user_id = self.current_user_id;

        let confirmation = runtime::spawn(async move {
            let result = remote.post(&path, &[]).await.and_then(check_success);
            match result {
                Ok(_) => {
                    debug!("post {} succeeded", action);
                    ToggleOutcome::Confirmed
                }
                Err(e) => {
                    warn!(error = %e, "post {} failed", action);
                    let reverted = worker
                        .run(move || pending.revert(store.as_ref(), current_user_id))
                        .await;
                    match reverted {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(error = %e, "post {}: revert failed", action),
                        Err(e) => warn!(error = %e, "post {}: revert not applied", action),
                    }
                    ToggleOutcome::Reverted
                }
            }
        });

        Toggle {
            accepted: true,
            confirmation: Some(confirmation),
        }
    }

    fn write_local(&self, kind: ToggleKind, post: &Post, on: bool) -> Result<(), CacheError> {
        self.store.upsert_post(post)?;

        match kind {
            ToggleKind::Like => {
                if let Some(user_id) = self.current_user_id {
                    self.store
                        .set_current_user_likes_post(post.blog_id, post.post_id, user_id, on)?;
                }
            }
            ToggleKind::Follow => {
                self.store.set_follow_status_for_blog(post.blog_id, on)?;
                if post.has_blog_url()
                    && let Some(blog_url) = &post.blog_url
                {
                    self.store.set_blog_url_followed(blog_url, on)?;
                }
            }
        }

        Ok(())
    }
}

/// An explicit `"success": false` counts as a failed confirmation
fn check_success(body: Value) -> Result<Value, RemoteError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(RemoteError::InvalidResponse(
            "server reported success: false".to_string(),
        ));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheDb, PostCache, UserCache};
    use crate::testing::MockRemote;
    use serde_json::json;

    fn setup() -> (Arc<MockRemote>, Arc<CacheDb>, PostToggler) {
        let remote = Arc::new(MockRemote::new());
        let db = Arc::new(CacheDb::open_in_memory().unwrap());
        let toggler = PostToggler::new(remote.clone(), db.clone(), StoreWorker::start());
        (remote, db, toggler)
    }

    fn post(likes: u32, liked: bool) -> Post {
        Post {
            blog_id: 1,
            post_id: 100,
            title: "hello".into(),
            blog_url: Some("https://one.blog".into()),
            published: "2016-05-01T00:00:00+00:00".into(),
            num_likes: likes,
            is_liked_by_current_user: liked,
            ..Default::default()
        }
    }

    fn cached(db: &CacheDb) -> Post {
        PostCache::new(db).get(1, 100).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_same_state_sends_nothing() {
        let (remote, db, toggler) = setup();
        db.upsert_post(&post(3, true)).unwrap();

        let toggle = toggler.like_post(&post(3, true), true);

        assert!(toggle.accepted);
        assert!(toggle.confirmation.is_none());
        assert!(remote.calls().is_empty());
        assert_eq!(cached(&db).num_likes, 3);
    }

    #[tokio::test]
    async fn test_like_is_written_before_confirmation() {
        let (remote, db, toggler) = setup();
        db.upsert_post(&post(3, false)).unwrap();
        let gate = remote.reply_later();

        let toggle = toggler.like_post(&post(3, false), true);
        assert!(toggle.accepted);

        let local = cached(&db);
        assert!(local.is_liked_by_current_user);
        assert_eq!(local.num_likes, 4);

        gate.send(Ok(json!({ "success": true, "i_like": true }))).unwrap();
        assert_eq!(toggle.outcome().await, Some(ToggleOutcome::Confirmed));
        assert_eq!(cached(&db).num_likes, 4);

        let calls = remote.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].path, "sites/1/posts/100/likes/new");
    }

    #[tokio::test]
    async fn test_failed_like_reverts() {
        let (remote, db, toggler) = setup();
        db.upsert_post(&post(3, false)).unwrap();
        remote.reply_err();

        let toggle = toggler.like_post(&post(3, false), true);
        assert!(toggle.accepted);
        assert_eq!(toggle.outcome().await, Some(ToggleOutcome::Reverted));

        let local = cached(&db);
        assert!(!local.is_liked_by_current_user);
        assert_eq!(local.num_likes, 3);
    }

    #[tokio::test]
    async fn test_success_false_payload_reverts() {
        let (remote, db, toggler) = setup();
        db.upsert_post(&post(3, true)).unwrap();
        remote.reply_ok(json!({ "success": false }));

        let toggle = toggler.like_post(&post(3, true), false);
        assert_eq!(toggle.outcome().await, Some(ToggleOutcome::Reverted));
        assert_eq!(remote.calls()[0].path, "sites/1/posts/100/likes/mine/delete");

        let local = cached(&db);
        assert!(local.is_liked_by_current_user);
        assert_eq!(local.num_likes, 3);
    }

    #[tokio::test]
    async fn test_unlike_at_zero_stays_at_zero() {
        let (remote, db, toggler) = setup();
        db.upsert_post(&post(0, true)).unwrap();
        let gate = remote.reply_later();

        let toggle = toggler.like_post(&post(0, true), false);
        assert_eq!(cached(&db).num_likes, 0);

        gate.send(Ok(json!({ "success": true }))).unwrap();
        assert_eq!(toggle.outcome().await, Some(ToggleOutcome::Confirmed));
        assert_eq!(cached(&db).num_likes, 0);
    }

    #[tokio::test]
    async fn test_overlapping_toggles_revert_to_latest_snapshot() {
        let (remote, db, toggler) = setup();
        db.upsert_post(&post(3, false)).unwrap();
        let first_gate = remote.reply_later_for("sites/1/posts/100/likes/new");
        let second_gate = remote.reply_later_for("sites/1/posts/100/likes/mine/delete");

        let like = toggler.like_post(&post(3, false), true);
        // The caller re-reads the post after the optimistic like
        let unlike = toggler.like_post(&cached(&db), false);
        assert_eq!(cached(&db).num_likes, 3);

        second_gate
            .send(Err(RemoteError::Network("timeout".into())))
            .unwrap();
        assert_eq!(unlike.outcome().await, Some(ToggleOutcome::Reverted));

        // Back to what the first toggle established, not the original state
        let local = cached(&db);
        assert!(local.is_liked_by_current_user);
        assert_eq!(local.num_likes, 4);

        first_gate.send(Ok(json!({ "success": true }))).unwrap();
        assert_eq!(like.outcome().await, Some(ToggleOutcome::Confirmed));
        assert_eq!(cached(&db).num_likes, 4);
    }

    #[tokio::test]
    async fn test_uncached_post_reverts_to_callers_copy() {
        let (remote, db, toggler) = setup();
        remote.reply_err();

        let toggle = toggler.like_post(&post(7, false), true);
        assert_eq!(toggle.outcome().await, Some(ToggleOutcome::Reverted));

        let local = cached(&db);
        assert!(!local.is_liked_by_current_user);
        assert_eq!(local.num_likes, 7);
    }

    #[tokio::test]
    async fn test_like_tracks_current_user_as_liker() {
        let remote = Arc::new(MockRemote::new());
        let db = Arc::new(CacheDb::open_in_memory().unwrap());
        let toggler = PostToggler::new(remote.clone(), db.clone(), StoreWorker::start())
            .with_current_user(Some(42));
        db.upsert_post(&post(0, false)).unwrap();
        let gate = remote.reply_later();

        let toggle = toggler.like_post(&post(0, false), true);
        assert_eq!(UserCache::new(&db).liking_user_ids(1, 100).unwrap(), vec![42]);

        gate.send(Err(RemoteError::Network("offline".into()))).unwrap();
        assert_eq!(toggle.outcome().await, Some(ToggleOutcome::Reverted));
        assert!(UserCache::new(&db).liking_user_ids(1, 100).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dead_confirmation_is_not_reported_as_revert() {
        let handle = runtime::spawn(std::future::pending::<ToggleOutcome>());
        handle.abort();

        let toggle = Toggle {
            accepted: true,
            confirmation: Some(handle),
        };
        assert_eq!(toggle.outcome().await, Some(ToggleOutcome::Abandoned));
    }

    #[tokio::test]
    async fn test_follow_updates_blog_and_reverts() {
        let (remote, db, toggler) = setup();
        let mut sibling = post(0, false);
        sibling.post_id = 101;
        db.upsert_posts(None, &[post(0, false), sibling]).unwrap();
        let gate = remote.reply_later();

        let toggle = toggler.follow_blog(&post(0, false), true);
        assert!(PostCache::new(&db)
            .get_for_blog(1)
            .unwrap()
            .iter()
            .all(|p| p.is_followed_by_current_user));
        assert_eq!(
            UserCache::new(&db).is_blog_url_followed("https://one.blog").unwrap(),
            Some(true)
        );

        gate.send(Err(RemoteError::Network("offline".into()))).unwrap();
        assert_eq!(toggle.outcome().await, Some(ToggleOutcome::Reverted));

        assert_eq!(remote.calls()[0].path, "sites/1/follows/new");
        assert!(PostCache::new(&db)
            .get_for_blog(1)
            .unwrap()
            .iter()
            .all(|p| !p.is_followed_by_current_user));
        assert_eq!(
            UserCache::new(&db).is_blog_url_followed("https://one.blog").unwrap(),
            Some(false)
        );
    }
}
