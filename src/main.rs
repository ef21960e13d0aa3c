use anyhow::{Context, Result};
use background_service::BackgroundService;
use clap::{Parser, Subcommand};
use database::Database;
use discord_client::DiscordClient;
use llm_interface::{provider_from_config, OpenAiProvider, ResponseGenerator, VoiceAssistant};
use netia_core::{
    AppConfig, BotStore, ConfigError, CoreError, ErrorReporter, LlmProviderKind,
    NewVoiceInteraction, Platform, PlatformClient, RequestThrottle, Scope,
};
use reddit_client::{RedditClient, RedditOAuth2Config};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "netia", version, about = "Keyword-triggered reply bot for Reddit and Discord")]
struct Cli {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long, env = "NETIA_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll Reddit and answer matching posts and comments
    Reddit,
    /// Poll Discord channels and answer matching messages
    Discord,
    /// Answer a recorded voice clip with synthesized speech
    Voice {
        file: PathBuf,
        #[arg(long, default_value = "netia-reply.mp3")]
        out: PathBuf,
        /// Conversation context passed to the assistant
        #[arg(long, default_value = "")]
        context: String,
        #[arg(long)]
        post_id: Option<String>,
        #[arg(long)]
        comment_id: Option<String>,
        #[arg(long, default_value = "cli")]
        scope: String,
    },
    /// Print activity statistics as JSON
    Stats {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("netia=info,background_service=info,reddit_client=info,discord_client=info,llm_interface=info,database=info")
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    let result = match cli.command {
        Command::Reddit => run_bot(Platform::Reddit, &config).await,
        Command::Discord => run_bot(Platform::Discord, &config).await,
        Command::Voice {
            file,
            out,
            context,
            post_id,
            comment_id,
            scope,
        } => {
            let target = VoiceTarget {
                post_id,
                comment_id,
                scope,
            };
            run_voice(&config, file, out, &context, target).await
        }
        Command::Stats { days } => print_stats(&config, days).await,
    };

    if let Err(e) = &result {
        if let Some(core) = e.downcast_ref::<CoreError>() {
            ErrorReporter::new().report_error(core);
        }
    }
    result
}

async fn open_database(url: &str) -> Result<Arc<Database>, CoreError> {
    let mut db = Database::new(url.to_string());
    db.connect().await?;
    db.run_migrations().await?;
    Ok(Arc::new(db))
}

async fn run_bot(platform: Platform, config: &AppConfig) -> Result<()> {
    config.validate_for(platform).map_err(CoreError::from)?;

    let db = open_database(&config.database_url).await?;
    if db.seed_business_profile(&config.business).await? {
        info!("Stored business profile '{}' from configuration", config.business.name);
    }

    let throttle = Arc::new(RequestThrottle::new(config.bot.request_delay()));
    let (client, defaults): (Arc<dyn PlatformClient>, Vec<Scope>) = match platform {
        Platform::Reddit => (
            Arc::new(RedditClient::new(
                RedditOAuth2Config::from_app_config(&config.reddit),
                throttle,
            )?) as Arc<dyn PlatformClient>,
            config.bot.default_subreddit_scopes(),
        ),
        Platform::Discord => (
            Arc::new(DiscordClient::from_config(&config.discord, throttle)?) as Arc<dyn PlatformClient>,
            config.discord.channel_scopes(),
        ),
    };
    if defaults.is_empty() {
        warn!("No default {} scopes configured; only scoped rules will be polled", platform);
    }

    let generator =
        ResponseGenerator::new(provider_from_config(&config.llm)?).with_voice(config.bot.voice_enabled);
    let service = Arc::new(
        BackgroundService::new(client, db, generator, config.bot.poll_interval(platform))
            .with_default_scopes(defaults)
            .with_fetch_limit(config.bot.fetch_limit(platform)),
    );

    let runner = service.clone();
    let mut task = tokio::spawn(async move { runner.start().await });

    tokio::select! {
        joined = &mut task => {
            joined.context("bot task panicked")??;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping {} bot", platform);
            service.stop().await;
            task.await.context("bot task panicked")??;
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

struct VoiceTarget {
    post_id: Option<String>,
    comment_id: Option<String>,
    scope: String,
}

async fn run_voice(
    config: &AppConfig,
    file: PathBuf,
    out: PathBuf,
    context: &str,
    target: VoiceTarget,
) -> Result<()> {
    if config.llm.provider != LlmProviderKind::OpenAi {
        return Err(CoreError::from(ConfigError::InvalidValue {
            field: "llm.provider".to_string(),
            value: "claude (voice replies need openai)".to_string(),
        })
        .into());
    }
    if config.llm.api_key.trim().is_empty() {
        return Err(CoreError::from(ConfigError::MissingField {
            field: "llm.api_key".to_string(),
        })
        .into());
    }

    let audio = tokio::fs::read(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("audio.mp3")
        .to_string();

    let db = open_database(&config.database_url).await?;
    let speech = Arc::new(OpenAiProvider::from_config(&config.llm)?);
    let assistant =
        VoiceAssistant::new(provider_from_config(&config.llm)?, speech).with_voice(&config.llm.voice);

    let outcome = assistant.process_voice_message(audio, &file_name, context).await;
    let mut interaction = NewVoiceInteraction {
        post_id: target.post_id,
        comment_id: target.comment_id,
        scope: target.scope,
        transcription: None,
        ai_response: None,
        success: false,
    };

    match outcome {
        Ok(reply) => {
            tokio::fs::write(&out, &reply.audio)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            interaction.transcription = Some(reply.transcription.clone());
            interaction.ai_response = Some(reply.text.clone());
            interaction.success = true;
            db.record_voice_interaction(&interaction).await?;
            db.close().await;

            println!("Heard: {}", reply.transcription);
            println!("Reply: {}", reply.text);
            info!("Wrote {} bytes of audio to {}", reply.audio.len(), out.display());
            Ok(())
        }
        Err(failure) => {
            interaction.transcription = failure.transcription;
            if let Err(log_err) = db.record_voice_interaction(&interaction).await {
                warn!("Failed to record voice interaction: {}", log_err);
            }
            db.close().await;
            Err(failure.error.into())
        }
    }
}

async fn print_stats(config: &AppConfig, days: u32) -> Result<()> {
    let db = open_database(&config.database_url).await?;
    let window = db.activity_stats(days).await?;
    let reddit = db.activity_counts(Platform::Reddit).await?;
    let discord = db.activity_counts(Platform::Discord).await?;
    let active_keywords = db.count_active_rules().await?;
    db.close().await;

    let report = json!({
        "window": window,
        "platforms": {
            "reddit": reddit,
            "discord": discord,
        },
        "active_keywords": active_keywords,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
