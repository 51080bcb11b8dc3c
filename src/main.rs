//! failfeed -- command-line client for the failure-stories feed.
//!
//! Loads configuration, restores any persisted session, runs one command and
//! exits.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use failfeed::FeedClient;
use failfeed::config::Config;
use failfeed::models::{NewPost, Reaction};
use failfeed::net::Attachment;

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Command {
    Login { email: String, remember: bool },
    Logout,
    Whoami,
    Feed { page: u32 },
    Comments { post_id: String, page: u32 },
    Post {
        title: String,
        content: String,
        tags: Vec<String>,
        media: Option<PathBuf>,
    },
    React { post_id: String, reaction: Reaction },
}

#[derive(Debug)]
struct CliArgs {
    config_path: PathBuf,
    command: Command,
}

fn parse_args() -> CliArgs {
    match parse_from(std::env::args().skip(1)) {
        Ok(Some(cli)) => cli,
        Ok(None) => {
            print_usage();
            std::process::exit(0);
        }
        Err(message) => {
            eprintln!("Error: {message}");
            eprintln!("Run with --help for usage information.");
            std::process::exit(1);
        }
    }
}

/// `Ok(None)` means help was requested.
fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Option<CliArgs>, String> {
    let mut args = args.into_iter();
    let mut config_path = PathBuf::from("failfeed.toml");
    let mut positional = Vec::new();
    let mut remember = false;
    let mut tags = Vec::new();
    let mut media = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config requires a path argument")?;
                config_path = PathBuf::from(path);
            }
            "--remember" | "-r" => remember = true,
            "--tag" | "-t" => tags.push(args.next().ok_or("--tag requires a value")?),
            "--media" | "-m" => {
                media = Some(PathBuf::from(args.next().ok_or("--media requires a path")?));
            }
            "--help" | "-h" => return Ok(None),
            "--version" | "-V" => {
                println!("failfeed {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => return Err(format!("Unknown argument: {flag}")),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let name = positional.next().ok_or("missing command")?;
    let mut next = |what: &str| positional.next().ok_or(format!("{name} requires <{what}>"));

    let command = match name.as_str() {
        "login" => Command::Login {
            email: next("email")?,
            remember,
        },
        "logout" => Command::Logout,
        "whoami" => Command::Whoami,
        "feed" => Command::Feed {
            page: parse_page(next("page").ok())?,
        },
        "comments" => Command::Comments {
            post_id: next("post-id")?,
            page: parse_page(next("page").ok())?,
        },
        "post" => Command::Post {
            title: next("title")?,
            content: next("content")?,
            tags,
            media,
        },
        "react" => Command::React {
            post_id: next("post-id")?,
            reaction: next("like|hug|relate")?.parse()?,
        },
        other => return Err(format!("Unknown command: {other}")),
    };

    Ok(Some(CliArgs {
        config_path,
        command,
    }))
}

fn parse_page(raw: Option<String>) -> Result<u32, String> {
    match raw {
        None => Ok(1),
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or(format!("invalid page '{raw}'")),
    }
}

fn print_usage() {
    println!(
        "\
failfeed {version} -- failure-stories feed client

USAGE:
    failfeed [OPTIONS] <COMMAND>

COMMANDS:
    login <email> [--remember]      Sign in (password from FAILFEED_PASSWORD or stdin)
    logout                          Sign out and forget stored tokens
    whoami                          Show the signed-in user
    feed [page]                     List posts
    comments <post-id> [page]       List comments on a post
    post <title> <content>          Publish a story [--tag <name>]... [--media <path>]
    react <post-id> <like|hug|relate>

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: failfeed.toml]
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=debug)
    FAILFEED_CONFIG        Alternative to --config flag
    FAILFEED_PASSWORD      Password for `login`
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?
        .block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let cli = parse_args();

    let config_path = std::env::var("FAILFEED_CONFIG")
        .map(PathBuf::from)
        .unwrap_or(cli.config_path);
    let config = Config::load(&config_path)?;
    init_tracing(&config);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "Starting failfeed"
    );

    let client = FeedClient::new(config)?;
    client.initialize().await?;
    run(&client, cli.command).await
}

async fn run(client: &FeedClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, remember } => {
            let password = read_password()?;
            let user = client.auth().login(&email, &password, remember).await?;
            println!("Signed in as {} <{}>", user.username, user.email);
            if !remember {
                println!("Session tokens are kept for this process only; use --remember to stay signed in.");
            }
        }
        Command::Logout => {
            client.logout();
            println!("Signed out");
        }
        Command::Whoami => match client.auth().user() {
            Some(user) => {
                println!("{} <{}>", user.username, user.email);
                if let Some(bio) = user.bio.filter(|b| !b.is_empty()) {
                    println!("{bio}");
                }
                println!("avatar: {}", client.media_url(user.profile_picture.as_deref()));
            }
            None => println!("Not signed in"),
        },
        Command::Feed { page } => {
            let posts = client.posts().list(page).await?;
            for post in &posts.results {
                let tags = post
                    .tags
                    .iter()
                    .map(|t| format!("#{}", t.name))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!(
                    "[{}] {} -- {} (like {} / hug {} / relate {}) {}",
                    post.id,
                    post.title,
                    post.author.username,
                    post.like_count,
                    post.hug_count,
                    post.relate_count,
                    tags
                );
            }
            println!("page {page}, {} posts total", posts.count);
        }
        Command::Comments { post_id, page } => {
            let comments = client.comments().list(&post_id, page).await?;
            for comment in &comments.results {
                println!("[{}] {}: {}", comment.id, comment.user.username, comment.content);
                for reply in &comment.replies {
                    println!("    [{}] {}: {}", reply.id, reply.user.username, reply.content);
                }
            }
            println!("page {page}, {} comments total", comments.count);
        }
        Command::Post {
            title,
            content,
            tags,
            media,
        } => {
            let media = match media {
                Some(path) => Some(Attachment::from_path("media", &path).await?),
                None => None,
            };
            let post = client
                .posts()
                .create(&NewPost {
                    title,
                    content,
                    tag_names: tags,
                    media,
                })
                .await?;
            println!("Published post {}", post.id);
        }
        Command::React { post_id, reaction } => {
            let status = client.posts().react(&post_id, reaction).await?;
            println!("{reaction}: {}", status.status.unwrap_or_else(|| "ok".into()));
        }
    }
    Ok(())
}

fn read_password() -> anyhow::Result<String> {
    if let Ok(password) = std::env::var("FAILFEED_PASSWORD") {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    anyhow::ensure!(!password.is_empty(), "empty password");
    Ok(password)
}

// ---------------------------------------------------------------------------
// Tracing initialization
// ---------------------------------------------------------------------------

/// Set up the tracing subscriber based on configuration.
fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("failfeed={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<CliArgs>, String> {
        parse_from(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_print_usage_does_not_panic() {
        print_usage();
    }

    #[test]
    fn test_parse_login() {
        let cli = parse(&["-c", "x.toml", "login", "a@b.c", "--remember"]).unwrap().unwrap();
        assert_eq!(cli.config_path, PathBuf::from("x.toml"));
        assert_eq!(
            cli.command,
            Command::Login {
                email: "a@b.c".into(),
                remember: true
            }
        );
    }

    #[test]
    fn test_parse_feed_default_page() {
        let cli = parse(&["feed"]).unwrap().unwrap();
        assert_eq!(cli.command, Command::Feed { page: 1 });
        assert!(parse(&["feed", "0"]).is_err());
    }

    #[test]
    fn test_parse_post_with_tags() {
        let cli = parse(&["post", "Title", "Body", "--tag", "deploys", "-t", "friday"])
            .unwrap()
            .unwrap();
        assert_eq!(
            cli.command,
            Command::Post {
                title: "Title".into(),
                content: "Body".into(),
                tags: vec!["deploys".into(), "friday".into()],
                media: None,
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["comments"]).is_err());
        assert!(parse(&["react", "1", "roast"]).is_err());
        assert!(parse(&["dance"]).is_err());
        assert!(parse(&["--bogus", "feed"]).is_err());
        assert!(parse(&["--help"]).unwrap().is_none());
    }
}
