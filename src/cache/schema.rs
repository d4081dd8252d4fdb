// SPDX-License-Identifier: MPL-2.0

/// SQL schema for the cache database
pub const SCHEMA: &str = r#"
-- Database version for migrations
PRAGMA user_version = 2;

-- posts: keyed by (blog, post); counters and viewer flags are overwritten on every merge
CREATE TABLE IF NOT EXISTS posts (
    blog_id INTEGER NOT NULL,
    post_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    url TEXT,
    blog_url TEXT,
    published TEXT NOT NULL,
    num_likes INTEGER NOT NULL DEFAULT 0,
    num_replies INTEGER NOT NULL DEFAULT 0,
    is_liked INTEGER NOT NULL DEFAULT 0,
    is_followed INTEGER NOT NULL DEFAULT 0,
    is_comments_open INTEGER NOT NULL DEFAULT 0,
    is_reblogged INTEGER NOT NULL DEFAULT 0,
    featured_image TEXT,
    featured_video TEXT,
    is_videopress INTEGER NOT NULL DEFAULT 0,
    fetched_at INTEGER NOT NULL,
    PRIMARY KEY (blog_id, post_id)
);

CREATE INDEX IF NOT EXISTS idx_posts_blog ON posts(blog_id);
CREATE INDEX IF NOT EXISTS idx_posts_published ON posts(published DESC);

-- feed_posts: which posts a feed (tag or blog) has retrieved
CREATE TABLE IF NOT EXISTS feed_posts (
    feed_key TEXT NOT NULL,
    blog_id INTEGER NOT NULL,
    post_id INTEGER NOT NULL,
    published TEXT NOT NULL,
    -- published as unix seconds (UTC); NULL when the date doesn't parse
    published_ts INTEGER,
    fetched_at INTEGER NOT NULL,
    PRIMARY KEY (feed_key, blog_id, post_id)
);

CREATE INDEX IF NOT EXISTS idx_feed_posts_published_ts ON feed_posts(feed_key, published_ts);

-- feed_state: date cursors per feed
CREATE TABLE IF NOT EXISTS feed_state (
    feed_key TEXT PRIMARY KEY,
    newest_date TEXT,
    oldest_date TEXT,
    last_updated TEXT
);

-- tags: feed filters the user follows
CREATE TABLE IF NOT EXISTS tags (
    name TEXT PRIMARY KEY,
    endpoint TEXT NOT NULL
);

-- users: people who liked cached posts
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    login TEXT NOT NULL,
    display_name TEXT,
    avatar_url TEXT,
    url TEXT,
    fetched_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS post_likes (
    blog_id INTEGER NOT NULL,
    post_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    PRIMARY KEY (blog_id, post_id, user_id)
);

-- followed_blogs: follow status by blog URL
CREATE TABLE IF NOT EXISTS followed_blogs (
    blog_url TEXT PRIMARY KEY,
    is_followed INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;
