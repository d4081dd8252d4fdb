// SPDX-License-Identifier: MPL-2.0

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reader_sync::ActionError;
use reader_sync::api::{Post, ReaderTag, RemoteClient, RestClient};
use reader_sync::cache::{CacheDb, FeedCache, LocalStore, PostCache};
use reader_sync::logging;
use reader_sync::people::PeopleClient;
use reader_sync::reader::{
    Feed, FeedSync, PostRefresher, PostToggler, RequestDataAction, ToggleOutcome,
};
use reader_sync::runtime::{self, StoreWorker};
use reader_sync::state::ReaderSettings;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "reader-sync")]
#[command(about = "Sync reader feeds into a local cache", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// OAuth bearer token, overrides the saved one
    #[arg(long, env = "READER_ACCESS_TOKEN")]
    token: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "READER_LOG")]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a tag locally so its feed can be synced
    AddTag { name: String },
    /// Fetch newer (or, with --older, older) posts for a tag
    SyncTag {
        name: String,
        #[arg(long)]
        older: bool,
    },
    /// Fetch newer (or, with --older, older) posts for a blog
    SyncBlog {
        blog_id: i64,
        #[arg(long)]
        older: bool,
    },
    /// Like a post
    Like { blog_id: i64, post_id: i64 },
    /// Remove a like
    Unlike { blog_id: i64, post_id: i64 },
    /// Follow (or, with --unfollow, stop following) a post's blog
    Follow {
        blog_id: i64,
        post_id: i64,
        #[arg(long)]
        unfollow: bool,
    },
    /// Refresh a cached post, fetching it if it isn't cached
    Refresh { blog_id: i64, post_id: i64 },
    /// Reblog a post to another site
    Reblog {
        blog_id: i64,
        post_id: i64,
        #[arg(long)]
        to: i64,
        #[arg(long)]
        note: Option<String>,
    },
    /// List a site's users
    Users { site: String },
    /// Check usernames before inviting them to a site
    Validate {
        site: String,
        #[arg(required = true)]
        usernames: Vec<String>,
    },
    /// Drop stale feed entries from the cache
    Cleanup,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = ReaderSettings::load();
    if let Some(token) = cli.token {
        settings.access_token = Some(token);
    }

    logging::init(cli.log.as_deref().unwrap_or(&settings.log_filter));
    info!("starting reader-sync v{}", env!("CARGO_PKG_VERSION"));

    let db = Arc::new(CacheDb::open().context("opening cache")?);
    let remote: Arc<dyn RemoteClient> = Arc::new(
        RestClient::new(&settings.api_base, settings.access_token.clone())
            .context("building REST client")?,
    );
    let app = App {
        settings,
        db,
        remote,
        worker: StoreWorker::start(),
    };

    runtime::block_on(run(cli.command, &app))
}

struct App {
    settings: ReaderSettings,
    db: Arc<CacheDb>,
    remote: Arc<dyn RemoteClient>,
    worker: StoreWorker,
}

impl App {
    fn store(&self) -> Arc<dyn LocalStore> {
        self.db.clone()
    }

    fn feed_sync(&self) -> FeedSync {
        FeedSync::new(self.remote.clone(), self.store(), self.worker.clone())
            .with_page_size(self.settings.effective_page_size())
    }

    fn refresher(&self) -> PostRefresher {
        PostRefresher::new(self.remote.clone(), self.store(), self.worker.clone())
    }

    fn toggler(&self) -> PostToggler {
        PostToggler::new(self.remote.clone(), self.store(), self.worker.clone())
            .with_current_user(self.settings.user_id)
    }

    /// Cached post, requesting it first if needed
    async fn post(&self, blog_id: i64, post_id: i64) -> Result<Post> {
        if let Some(post) = PostCache::new(&self.db).get(blog_id, post_id)? {
            return Ok(post);
        }
        if !self.refresher().request_post(blog_id, post_id).await {
            bail!("could not fetch post {post_id} on blog {blog_id}");
        }
        PostCache::new(&self.db)
            .get(blog_id, post_id)?
            .context("post missing after request")
    }
}

async fn run(command: Commands, ctx: &App) -> Result<()> {
    match command {
        Commands::AddTag { name } => {
            FeedCache::new(&ctx.db).store_tag(&ReaderTag::new(&name))?;
            println!("added tag {name}");
        }
        Commands::SyncTag { name, older } => sync(ctx, Feed::Tag(name), older).await,
        Commands::SyncBlog { blog_id, older } => sync(ctx, Feed::Blog(blog_id), older).await,
        Commands::Like { blog_id, post_id } => toggle_like(ctx, blog_id, post_id, true).await?,
        Commands::Unlike { blog_id, post_id } => toggle_like(ctx, blog_id, post_id, false).await?,
        Commands::Follow {
            blog_id,
            post_id,
            unfollow,
        } => {
            let post = ctx.post(blog_id, post_id).await?;
            let toggle = ctx.toggler().follow_blog(&post, !unfollow);
            report_toggle(toggle.accepted, toggle.outcome().await);
        }
        Commands::Refresh { blog_id, post_id } => {
            match PostCache::new(&ctx.db).get(blog_id, post_id)? {
                Some(post) => {
                    let result = ctx.refresher().update_post(&post).await;
                    println!("{result:?}");
                }
                None => {
                    let stored = ctx.refresher().request_post(blog_id, post_id).await;
                    println!("{}", if stored { "Changed" } else { "Failed" });
                }
            }
        }
        Commands::Reblog {
            blog_id,
            post_id,
            to,
            note,
        } => {
            let post = ctx.post(blog_id, post_id).await?;
            if !ctx.refresher().reblog_post(&post, to, note.as_deref()).await {
                bail!("reblog was not accepted");
            }
            println!("reblogged to {to}");
        }
        Commands::Users { site } => {
            let people = PeopleClient::new(ctx.remote.clone());
            for person in people.fetch_users(&site, 0).await? {
                println!(
                    "{}\t{}\t{}",
                    person.person_id,
                    person.username,
                    person.role.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Validate { site, usernames } => {
            let people = PeopleClient::new(ctx.remote.clone());
            match people.validate_usernames(&usernames, &site).await {
                Ok(results) => {
                    for v in results {
                        println!("{}\t{:?}", v.username, v.result);
                    }
                }
                Err(ActionError::PartialValidation { results, expected }) => {
                    for v in &results {
                        println!("{}\t{:?}", v.username, v.result);
                    }
                    bail!("server accounted for {} of {expected} usernames", results.len());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Cleanup => {
            ctx.db.cleanup_stale()?;
            println!("cache cleaned");
        }
    }
    Ok(())
}

async fn sync(ctx: &App, feed: Feed, older: bool) {
    let action = if older {
        RequestDataAction::LoadOlder
    } else {
        RequestDataAction::LoadNewer
    };
    let outcome = ctx.feed_sync().sync(&feed, action).await;
    println!("{feed}: {:?}, {} new", outcome.result, outcome.new_posts);
}

async fn toggle_like(ctx: &App, blog_id: i64, post_id: i64, like: bool) -> Result<()> {
    let post = ctx.post(blog_id, post_id).await?;
    let toggle = ctx.toggler().like_post(&post, like);
    report_toggle(toggle.accepted, toggle.outcome().await);
    Ok(())
}

fn report_toggle(accepted: bool, outcome: Option<ToggleOutcome>) {
    match outcome {
        Some(outcome) => println!("{outcome:?}"),
        None if accepted => println!("already in that state"),
        None => println!("could not update the local cache"),
    }
}
