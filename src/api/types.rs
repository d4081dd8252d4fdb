// SPDX-License-Identifier: MPL-2.0

use serde_json::Value;

/// Decoupled from the REST payload so we own the boundary. Parsing is lenient:
/// ids may arrive as numbers or strings and missing counters read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Post {
    pub blog_id: i64,
    pub post_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub blog_url: Option<String>,
    /// RFC 3339 publish date
    pub published: String,
    pub num_likes: u32,
    pub num_replies: u32,
    pub is_liked_by_current_user: bool,
    pub is_followed_by_current_user: bool,
    pub is_comments_open: bool,
    pub is_reblogged: bool,
    pub featured_image: Option<String>,
    pub featured_video: Option<String>,
    pub is_videopress: bool,
}

impl Post {
    pub fn from_json(json: &Value) -> Option<Post> {
        let post_id = int_field(json, "ID")?;
        let blog_id = int_field(json, "site_ID").unwrap_or(0);

        let discussion = json.get("discussion");
        let num_replies = discussion
            .and_then(|d| int_field(d, "comment_count"))
            .or_else(|| int_field(json, "comment_count"))
            .unwrap_or(0);
        let is_comments_open = discussion
            .and_then(|d| bool_field(d, "comments_open"))
            .or_else(|| bool_field(json, "comments_open"))
            .unwrap_or(false);

        let blog_url = json
            .pointer("/meta/data/site/URL")
            .and_then(Value::as_str)
            .map(String::from);

        // Only video media counts as a featured video; images go through featured_image
        let featured_video = json
            .get("featured_media")
            .filter(|m| str_field(m, "type").as_deref() == Some("video"))
            .and_then(|m| str_field(m, "uri"));

        Some(Post {
            blog_id,
            post_id,
            title: str_field(json, "title").unwrap_or_default(),
            url: str_field(json, "URL"),
            blog_url,
            published: str_field(json, "date").unwrap_or_default(),
            num_likes: to_count(int_field(json, "like_count")),
            num_replies: to_count(Some(num_replies)),
            is_liked_by_current_user: bool_field(json, "i_like").unwrap_or(false),
            is_followed_by_current_user: bool_field(json, "is_following").unwrap_or(false),
            is_comments_open,
            is_reblogged: bool_field(json, "is_reblogged").unwrap_or(false),
            featured_image: str_field(json, "featured_image"),
            featured_video,
            is_videopress: bool_field(json, "is_videopress").unwrap_or(false),
        })
    }

    /// Parse the `posts` array of a feed response. Entries without an id are skipped.
    pub fn list_from_json(json: &Value) -> Option<Vec<Post>> {
        let posts = json.get("posts")?.as_array()?;
        Some(posts.iter().filter_map(Post::from_json).collect())
    }

    pub fn has_featured_image(&self) -> bool {
        self.featured_image.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_featured_video(&self) -> bool {
        self.featured_video.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_blog_url(&self) -> bool {
        self.blog_url.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Set the like flag and move the counter with it. Unliking never drops below zero.
    pub fn set_liked(&mut self, liked: bool) {
        self.is_liked_by_current_user = liked;
        self.num_likes = if liked {
            self.num_likes.saturating_add(1)
        } else {
            self.num_likes.saturating_sub(1)
        };
    }

    /// Whether any of the fields a single-post refresh tracks differ.
    pub fn differs_from(&self, other: &Post) -> bool {
        self.num_replies != other.num_replies
            || self.num_likes != other.num_likes
            || self.is_comments_open != other.is_comments_open
            || self.is_liked_by_current_user != other.is_liked_by_current_user
            || self.is_followed_by_current_user != other.is_followed_by_current_user
    }
}

/// The `date_range` object of a feed response. Some endpoints report
/// `before`/`after`, others `newest`/`oldest`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub newest: Option<String>,
    pub oldest: Option<String>,
}

impl DateRange {
    pub fn from_response(json: &Value) -> Option<DateRange> {
        let range = json.get("date_range")?.as_object()?;

        let pick = |primary: &str, fallback: &str| {
            let key = if range.contains_key(primary) {
                primary
            } else {
                fallback
            };
            range
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        Some(DateRange {
            newest: pick("before", "newest"),
            oldest: pick("after", "oldest"),
        })
    }
}

/// A named feed filter and the endpoint that serves it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderTag {
    pub name: String,
    pub endpoint: String,
}

impl ReaderTag {
    /// Tag using the standard tag-posts endpoint
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: format!("read/tags/{}/posts", name),
        }
    }
}

/// A user who liked a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderUser {
    pub user_id: i64,
    pub login: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub url: Option<String>,
}

impl ReaderUser {
    pub fn from_json(json: &Value) -> Option<ReaderUser> {
        Some(ReaderUser {
            user_id: int_field(json, "ID")?,
            login: str_field(json, "login").unwrap_or_default(),
            display_name: str_field(json, "name"),
            avatar_url: str_field(json, "avatar_URL"),
            url: str_field(json, "URL"),
        })
    }

    /// Parse the `likes` list out of a post's `meta/data/likes` section
    pub fn list_from_likes(likes: &Value) -> Vec<ReaderUser> {
        likes
            .get("likes")
            .and_then(Value::as_array)
            .map(|users| users.iter().filter_map(ReaderUser::from_json).collect())
            .unwrap_or_default()
    }
}

/// A member of a site, as returned by the users endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub person_id: i64,
    pub blog_id: String,
    pub local_blog_id: i64,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
}

impl Person {
    pub fn from_json(json: &Value, blog_id: &str, local_blog_id: i64) -> Option<Person> {
        let person_id = int_field(json, "ID")?;
        let username = str_field(json, "login")?;
        let role = json
            .get("roles")
            .and_then(Value::as_array)
            .and_then(|roles| roles.first())
            .and_then(Value::as_str)
            .map(String::from);

        Some(Person {
            person_id,
            blog_id: blog_id.to_string(),
            local_blog_id,
            display_name: str_field(json, "name").unwrap_or_else(|| username.clone()),
            username,
            avatar_url: str_field(json, "avatar_URL"),
            role,
        })
    }
}

fn int_field(json: &Value, key: &str) -> Option<i64> {
    match json.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn str_field(json: &Value, key: &str) -> Option<String> {
    json.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn bool_field(json: &Value, key: &str) -> Option<bool> {
    match json.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_count(value: Option<i64>) -> u32 {
    value
        .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX))
        .unwrap_or(0)
}
