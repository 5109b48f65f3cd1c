use std::sync::Arc;

use futures::future::join_all;
use url::Url;
use ycnotice::{HttpClient, StateStore, Watcher};
use ycnotice_discord::{
    DiscordClient, DiscordPublisher, format,
    model::CreateMessage,
    role::{self, ensure_role_message},
};

use crate::config::{ConfigArgs, ConfigError};

/// Watches every configured board until interrupted.
pub async fn run(config: &ConfigArgs) -> eyre::Result<()> {
    let run = config.run_config()?;
    let http = HttpClient::new()?;
    let discord = DiscordClient::new(run.token.clone())?;

    if let Some(roles) = &run.roles {
        let store = StateStore::new(&roles.state_file);
        if let Err(e) = ensure_role_message(&discord, &store, roles.channel_id).await {
            tracing::error!(channel = roles.channel_id, error = %e, "failed to set up role message");
        }
    }

    let source = Arc::new(http.clone());
    let publisher = Arc::new(DiscordPublisher::new(discord, http));
    let state = Arc::new(StateStore::new(&run.state_file));

    let tasks: Vec<_> = run
        .feeds
        .into_iter()
        .map(|feed| {
            tracing::info!(feed = %feed.state_key, url = %feed.list_url, channel = feed.channel_id, "watching board");
            let watcher = Watcher::new(feed, source.clone(), publisher.clone(), state.clone());
            let interval = run.interval;
            tokio::spawn(async move { watcher.run(interval).await })
        })
        .collect();

    tokio::select! {
        results = join_all(tasks) => {
            for result in results {
                result?;
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("interrupted, shutting down");
        }
    }
    Ok(())
}

/// Prints the newest notices of a board as JSON.
pub async fn list(config: &ConfigArgs, url: Option<&str>) -> eyre::Result<()> {
    let list_url = match url {
        Some(url) => Url::parse(url)?,
        None => config.school_list_url()?,
    };
    let http = HttpClient::new()?;
    let notices = ycnotice::fetch_list(&http, &list_url, config.notice_limit).await?;
    println!("{}", serde_json::to_string_pretty(&notices)?);
    Ok(())
}

/// Fetches one notice and prints its body, or posts it to `channel`.
pub async fn show(
    config: &ConfigArgs,
    url: &str,
    channel: Option<u64>,
    json: bool,
) -> eyre::Result<()> {
    let http = HttpClient::new()?;
    let detail = ycnotice::fetch_detail(&http, url).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let preview = format::body_preview(url, &detail);
    match channel {
        Some(channel_id) => {
            let discord = DiscordClient::new(config.token()?)?;
            let message = CreateMessage {
                content: Some(preview),
                ..Default::default()
            };
            let sent = discord.create_message(channel_id, &message, &[]).await?;
            tracing::info!(channel = channel_id, message = %sent.id, "notice body posted");
        }
        None => println!("{preview}"),
    }
    Ok(())
}

/// Creates or refreshes the grade role selection message.
pub async fn role_message(config: &ConfigArgs, channel: Option<u64>) -> eyre::Result<()> {
    let channel_id = channel
        .or(config.role_channel_id)
        .ok_or(ConfigError::Missing("ROLE_CHANNEL_ID"))?;
    let discord = DiscordClient::new(config.token()?)?;
    let store = StateStore::new(&config.role_state_file);
    let message_id = ensure_role_message(&discord, &store, channel_id).await?;
    println!("{message_id}");
    Ok(())
}

pub async fn assign_grade(
    config: &ConfigArgs,
    guild_id: u64,
    user_id: u64,
    grade: u8,
) -> eyre::Result<()> {
    let roles = config.grade_roles()?;
    let discord = DiscordClient::new(config.token()?)?;
    let change = role::assign_grade(&discord, &roles, guild_id, user_id, grade).await?;
    println!(
        "grade {grade}: removed {:?}, added {:?}",
        change.remove, change.add
    );
    Ok(())
}
