use std::{fs::File, sync::Arc};

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt as _, util::SubscriberInitExt};

use crate::config::ConfigArgs;

mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(
    name = "ycnotice",
    about = "Watches Yonam College notice boards and announces new notices on Discord.",
    version
)]
struct YcNoticeOptions {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch every configured board and announce new notices.
    Run,

    /// Print the newest notices of a board as JSON.
    List {
        /// Listing page URL. Defaults to the school board.
        url: Option<String>,
    },

    /// Fetch one notice and print its body, or post it to a channel.
    Show {
        /// Notice view page URL.
        url: String,

        /// Post the body to this channel instead of printing it.
        #[arg(long)]
        channel: Option<u64>,

        /// Print the extracted notice as JSON.
        #[arg(long, conflicts_with = "channel")]
        json: bool,
    },

    /// Create or refresh the grade role selection message.
    RoleMessage {
        /// Channel to post in. Defaults to ROLE_CHANNEL_ID.
        #[arg(long)]
        channel: Option<u64>,
    },

    /// Give a member the role of a grade and remove their other grade roles.
    AssignGrade {
        guild: u64,
        user: u64,
        #[arg(value_parser = clap::value_parser!(u8).range(1..=4))]
        grade: u8,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    setup_tracing()?;

    color_eyre::install()?;
    let options = YcNoticeOptions::parse();

    match options.command {
        Command::Run => commands::run(&options.config).await,
        Command::List { url } => commands::list(&options.config, url.as_deref()).await,
        Command::Show { url, channel, json } => {
            commands::show(&options.config, &url, channel, json).await
        }
        Command::RoleMessage { channel } => commands::role_message(&options.config, channel).await,
        Command::AssignGrade { guild, user, grade } => {
            commands::assign_grade(&options.config, guild, user, grade).await
        }
    }
}

fn setup_tracing() -> eyre::Result<()> {
    std::fs::create_dir_all("reports").or_else(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            Ok(())
        } else {
            Err(e)
        }
    })?;
    let stdout_log = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_level(true)
        .with_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        );

    let published_report_file = File::create("reports/published.json")
        .map_err(|e| eyre::eyre!("Failed to create log file: {e}"))?;
    let published_report_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(false)
        .with_writer(Arc::new(published_report_file))
        .with_filter(filter::filter_fn(|metadata| {
            metadata.target() == "notice_published"
        }));

    let error_report_file = File::create("reports/error_report.json")
        .map_err(|e| eyre::eyre!("Failed to create error log file: {e}"))?;
    let error_report_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(Arc::new(error_report_file))
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(published_report_layer)
        .with(error_report_layer)
        .init();
    Ok(())
}
