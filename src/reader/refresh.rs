// SPDX-License-Identifier: MPL-2.0

use crate::api::{Post, ReaderUser, RemoteClient};
use crate::cache::{CacheError, LocalStore};
use crate::error::ActionError;
use crate::reader::{UpdateResult, meta_query, post_path};
use crate::runtime::StoreWorker;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Single-post requests: refresh a cached post, fetch a missing one, reblog.
pub struct PostRefresher {
    remote: Arc<dyn RemoteClient>,
    store: Arc<dyn LocalStore>,
    worker: StoreWorker,
}

impl PostRefresher {
    pub fn new(remote: Arc<dyn RemoteClient>, store: Arc<dyn LocalStore>, worker: StoreWorker) -> Self {
        Self {
            remote,
            store,
            worker,
        }
    }

    /// Fetch the latest version of `post`. It only counts as changed if the
    /// reply or like counts, comment status, or the current user's like or
    /// follow status differ.
    pub async fn update_post(&self, post: &Post) -> UpdateResult {
        match self.try_update(post).await {
            Ok(true) => UpdateResult::Changed,
            Ok(false) => UpdateResult::Unchanged,
            Err(e) => {
                warn!(blog_id = post.blog_id, post_id = post.post_id, error = %e, "post update failed");
                UpdateResult::Failed
            }
        }
    }

    async fn try_update(&self, post: &Post) -> Result<bool, ActionError> {
        debug!(blog_id = post.blog_id, post_id = post.post_id, "updating post");
        let response = self
            .remote
            .get(&post_path(post.blog_id, post.post_id), &meta_query())
            .await?;

        let original = post.clone();
        let store = self.store.clone();
        self.worker
            .run(move || reconcile(store.as_ref(), &original, &response))
            .await?
    }

    /// Fetch a post that isn't cached yet. Returns whether it was stored.
    pub async fn request_post(&self, blog_id: i64, post_id: i64) -> bool {
        match self.try_request(blog_id, post_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(blog_id, post_id, error = %e, "post request failed");
                false
            }
        }
    }

    async fn try_request(&self, blog_id: i64, post_id: i64) -> Result<(), ActionError> {
        debug!(blog_id, post_id, "requesting post");
        let response = self
            .remote
            .get(&post_path(blog_id, post_id), &meta_query())
            .await?;

        let mut post = Post::from_json(&response)
            .ok_or_else(|| ActionError::MalformedResponse("post has no ID".into()))?;
        // Jetpack sites report site_ID = 1, so keep the id we asked for
        post.blog_id = blog_id;

        let store = self.store.clone();
        self.worker
            .run(move || -> Result<(), ActionError> {
                store.upsert_post(&post)?;
                store_liking_users(store.as_ref(), &post, &response)?;
                Ok(())
            })
            .await?
    }

    /// Reblog `post` to `destination_blog_id` with an optional note.
    /// Returns whether the server reports the post as reblogged.
    pub async fn reblog_post(&self, post: &Post, destination_blog_id: i64, note: Option<&str>) -> bool {
        let mut params = vec![(
            "destination_site_id".to_string(),
            destination_blog_id.to_string(),
        )];
        if let Some(note) = note.filter(|n| !n.is_empty()) {
            params.push(("note".to_string(), note.to_string()));
        }

        let path = format!("sites/{}/posts/{}/reblogs/new", post.blog_id, post.post_id);
        let response = match self.remote.post(&path, &params).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "reblog failed");
                return false;
            }
        };

        let reblogged = response
            .get("is_reblogged")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if reblogged {
            let store = self.store.clone();
            let (blog_id, post_id) = (post.blog_id, post.post_id);
            match self
                .worker
                .run(move || store.set_post_reblogged(blog_id, post_id, true))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "failed to mark post reblogged"),
                Err(e) => warn!(error = %e, "failed to mark post reblogged"),
            }
        }

        reblogged
    }
}

fn reconcile(store: &dyn LocalStore, original: &Post, response: &Value) -> Result<bool, ActionError> {
    let mut updated = Post::from_json(response)
        .ok_or_else(|| ActionError::MalformedResponse("post has no ID".into()))?;
    updated.blog_id = original.blog_id;

    let changed = updated.differs_from(original);
    if changed {
        debug!(blog_id = original.blog_id, post_id = original.post_id, "post updated");
        // The single-post endpoint doesn't report featured media, and what we
        // have was most likely derived locally from the content
        if original.has_featured_image() {
            updated.featured_image = original.featured_image.clone();
        }
        if original.has_featured_video() {
            updated.featured_video = original.featured_video.clone();
            updated.is_videopress = original.is_videopress;
        }
        store.upsert_post(&updated)?;
    }

    // Liking users aren't part of the change check, so always store them
    store_liking_users(store, &updated, response)?;

    Ok(changed)
}

/// Store the users in the post's `meta/data/likes` section, if present
fn store_liking_users(store: &dyn LocalStore, post: &Post, response: &Value) -> Result<(), CacheError> {
    let Some(likes) = response.pointer("/meta/data/likes") else {
        return Ok(());
    };

    let users = ReaderUser::list_from_likes(likes);
    store.upsert_users(&users)?;

    let user_ids: Vec<i64> = users.iter().map(|u| u.user_id).collect();
    store.set_likes_for_post(post.blog_id, post.post_id, &user_ids)
}
