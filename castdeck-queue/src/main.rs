//! castdeck-queue - Manage scheduled posts
//!
//! Lists, cancels and counts posts in the Castdeck queue.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use libcastdeck::logging::{LogFormat, LoggingConfig};
use libcastdeck::{CastdeckError, CastdeckService, Config, PostStatus, Result, ScheduledPost};

#[derive(Parser, Debug)]
#[command(name = "castdeck-queue")]
#[command(version)]
#[command(about = "Manage scheduled posts")]
#[command(long_about = "\
castdeck-queue - Manage scheduled posts

DESCRIPTION:
    castdeck-queue inspects and manages the Castdeck post queue. Use it to
    list pending posts, cancel a post before it goes out, or count posts
    per status.

COMMANDS:
    list        List scheduled posts
    cancel      Cancel a scheduled post
    stats       Show post counts per status

USAGE EXAMPLES:
    # List pending posts
    castdeck-queue list

    # Posts of one account, any status, as JSON
    castdeck-queue list --account <ACCOUNT_ID> --status all --format json

    # Cancel a specific post
    castdeck-queue cancel <POST_ID>

    # View queue statistics
    castdeck-queue stats

CONFIGURATION:
    Configuration file: ~/.config/castdeck/config.toml
    Database location: ~/.local/share/castdeck/castdeck.db

    Override with environment variables:
        CASTDECK_CONFIG    - Path to config file
        CASTDECK_DB_PATH   - Path to database file

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Database or configuration error
    3 - Invalid input (unknown post ID, post not cancellable, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List posts in the queue
    List {
        /// Only posts of this account
        #[arg(short, long)]
        account: Option<String>,

        /// Status to show, or "all"
        #[arg(short, long, default_value = "scheduled")]
        status: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Cancel a scheduled post
    Cancel {
        /// Post ID to cancel
        post_id: String,
    },

    /// Show post counts per status
    Stats {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries the listing; keep stderr quiet unless asked
    let level = if cli.verbose { "debug" } else { "error" };
    LoggingConfig::new(LogFormat::Text, level).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default()?;
    let service = CastdeckService::from_config(config).await?;

    match cli.command {
        Commands::List {
            account,
            status,
            format,
        } => cmd_list(&service, account.as_deref(), &status, format).await?,
        Commands::Cancel { post_id } => cmd_cancel(&service, &post_id).await?,
        Commands::Stats { format } => cmd_stats(&service, format).await?,
    }

    service.database().close().await;
    Ok(())
}

fn parse_status_filter(status: &str) -> Result<Option<PostStatus>> {
    if status.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    status
        .parse::<PostStatus>()
        .map(Some)
        .map_err(|_| {
            CastdeckError::InvalidArgument(format!(
                "Invalid status '{}'. Must be one of: scheduled, published, failed, cancelled, all",
                status
            ))
        })
}

/// List posts
async fn cmd_list(
    service: &CastdeckService,
    account: Option<&str>,
    status: &str,
    format: OutputFormat,
) -> Result<()> {
    let status = parse_status_filter(status)?;

    if let Some(account_id) = account {
        // Unknown accounts are an error, not an empty list
        service.accounts().get(account_id).await?;
    }

    let posts = service.scheduler().list_all(status, account).await?;

    match format {
        OutputFormat::Json => output_list_json(&posts)?,
        OutputFormat::Text => output_list_text(&posts, Utc::now()),
    }

    Ok(())
}

fn output_list_json(posts: &[ScheduledPost]) -> Result<()> {
    let json = serde_json::to_string_pretty(posts).map_err(|e| {
        CastdeckError::InvalidArgument(format!("Failed to encode posts: {}", e))
    })?;
    println!("{}", json);
    Ok(())
}

fn output_list_text(posts: &[ScheduledPost], now: DateTime<Utc>) {
    for post in posts {
        let when = if post.status == PostStatus::Scheduled {
            format_time_until(now, post.scheduled_at)
        } else {
            post.status.to_string()
        };

        println!(
            "{} | {} | {} | {}",
            post.id,
            post.scheduled_at.format("%Y-%m-%d %H:%M:%S UTC"),
            when,
            truncate_content(&post.content, 50)
        );
    }
}

/// Truncate content to `max_chars` characters with an ellipsis
fn truncate_content(content: &str, max_chars: usize) -> String {
    let single_line = content.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let head: String = single_line.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

/// Human-readable distance from `now` to `scheduled_at`
fn format_time_until(now: DateTime<Utc>, scheduled_at: DateTime<Utc>) -> String {
    let diff = (scheduled_at - now).num_seconds();

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}

/// Cancel one post
async fn cmd_cancel(service: &CastdeckService, post_id: &str) -> Result<()> {
    if service.scheduler().cancel(post_id).await? {
        println!("Cancelled post {}", post_id);
        return Ok(());
    }

    // Explain why nothing changed
    let post = service.scheduler().get(post_id).await?;
    if post.status == PostStatus::Scheduled {
        Err(CastdeckError::Conflict(format!(
            "Post {} is being published and can no longer be cancelled",
            post_id
        )))
    } else {
        Err(CastdeckError::InvalidArgument(format!(
            "Post {} is already {} and cannot be cancelled",
            post_id, post.status
        )))
    }
}

/// Post counts per status
async fn cmd_stats(service: &CastdeckService, format: OutputFormat) -> Result<()> {
    let counts = service.scheduler().stats().await?;
    let total: i64 = counts.values().sum();

    match format {
        OutputFormat::Json => {
            let mut json = serde_json::Map::new();
            for status in PostStatus::ALL {
                let count = counts.get(&status).copied().unwrap_or(0);
                json.insert(status.as_str().to_string(), count.into());
            }
            json.insert("total".to_string(), total.into());
            println!("{}", serde_json::Value::Object(json));
        }
        OutputFormat::Text => {
            for status in PostStatus::ALL {
                let count = counts.get(&status).copied().unwrap_or(0);
                println!("{:<10} {}", format!("{}:", status), count);
            }
            println!("{:<10} {}", "total:", total);
        }
    }

    Ok(())
}
