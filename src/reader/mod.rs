// SPDX-License-Identifier: MPL-2.0

//! Reader post actions: optimistic like/follow toggles, incremental feed
//! sync, and single-post refresh.

mod refresh;
mod sync;
mod toggle;

pub use refresh::PostRefresher;
pub use sync::{Feed, FeedSync, SyncOutcome};
pub use toggle::{PostToggler, Toggle, ToggleOutcome};

use crate::api::Params;

/// Result of a request that may have updated local data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    Changed,
    Unchanged,
    Failed,
}

/// Which side of the cached window a feed request extends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDataAction {
    LoadNewer,
    LoadOlder,
}

pub(crate) fn post_path(blog_id: i64, post_id: i64) -> String {
    format!("sites/{}/posts/{}/", blog_id, post_id)
}

/// Ask for site and liking-user metadata alongside posts
pub(crate) fn meta_query() -> Params {
    vec![("meta".to_string(), "site,likes".to_string())]
}
