use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::ai::{find_model, DraftGenerator, LlmClient, MODELS};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::{FeedIngester, HttpFeedSource};
use crate::models::{Frequency, NewTopic, RunResult};
use crate::pipeline::{is_due, Pipeline, PipelineOptions, RunRequest};

/// Generate essay drafts from the news feeds of subscribed topics.
#[derive(Parser)]
#[command(name = "auto-draft", version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the pipeline for every due topic, or for one topic.
    Run {
        /// Only process this topic.
        #[arg(long)]
        topic: Option<i64>,

        /// Ignore topic schedules.
        #[arg(long)]
        force: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List topic subscriptions.
    Topics,

    /// Subscribe to a new topic.
    AddTopic {
        #[arg(long)]
        name: String,

        /// Feed URL (repeatable).
        #[arg(long = "feed", required = true)]
        feeds: Vec<String>,

        /// Keyword (repeatable).
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        /// manual, daily or weekly.
        #[arg(long, default_value = "daily")]
        frequency: Frequency,

        /// Drafts generated per run at most.
        #[arg(long, default_value_t = 3)]
        max_per_period: u32,

        /// Angle the essays should take.
        #[arg(long)]
        focus: Option<String>,

        /// Only keep articles that mention a keyword.
        #[arg(long)]
        keyword_filter: bool,
    },

    /// Delete a topic and its ingestion history.
    RemoveTopic { id: i64 },

    /// Stop scheduling a topic.
    PauseTopic { id: i64 },

    /// Resume scheduling a topic.
    ResumeTopic { id: i64 },

    /// Turn auto-drafting on.
    Enable,

    /// Turn auto-drafting off.
    Disable,

    /// Set the default generation model.
    SetModel {
        /// Catalog id, e.g. claude-sonnet.
        model: String,
    },
}

pub async fn execute(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let repository = Arc::new(Repository::new(&config.db_path).await?);

    match cli.command {
        Command::Run { topic, force, json } => run(&config, repository, topic, force, json).await,
        Command::Topics => list_topics(&repository).await,
        Command::AddTopic {
            name,
            feeds,
            keywords,
            frequency,
            max_per_period,
            focus,
            keyword_filter,
        } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(anyhow::anyhow!("Topic name must not be empty").into());
            }
            if max_per_period == 0 {
                return Err(anyhow::anyhow!("--max-per-period must be at least 1").into());
            }
            let id = repository
                .insert_topic(NewTopic {
                    name: name.clone(),
                    keywords,
                    rss_feeds: feeds,
                    frequency,
                    max_per_period,
                    essay_focus: focus.filter(|f| !f.trim().is_empty()),
                    use_keyword_filter: keyword_filter,
                })
                .await?;
            println!("Added topic {} ({})", id, name);
            Ok(())
        }
        Command::RemoveTopic { id } => {
            ensure_found(repository.delete_topic(id).await?, id)?;
            println!("Removed topic {}", id);
            Ok(())
        }
        Command::PauseTopic { id } => {
            ensure_found(repository.set_topic_active(id, false).await?, id)?;
            println!("Paused topic {}", id);
            Ok(())
        }
        Command::ResumeTopic { id } => {
            ensure_found(repository.set_topic_active(id, true).await?, id)?;
            println!("Resumed topic {}", id);
            Ok(())
        }
        Command::Enable => {
            repository.set_auto_draft_enabled(true).await?;
            println!("Auto-draft enabled");
            Ok(())
        }
        Command::Disable => {
            repository.set_auto_draft_enabled(false).await?;
            println!("Auto-draft disabled");
            Ok(())
        }
        Command::SetModel { model } => {
            let Some(descriptor) = find_model(model.trim()) else {
                let known: Vec<&str> = MODELS.iter().map(|m| m.id).collect();
                return Err(anyhow::anyhow!(
                    "Unknown model '{}' (expected one of: {})",
                    model,
                    known.join(", ")
                )
                .into());
            };
            repository
                .set_default_model(Some(descriptor.id.to_string()))
                .await?;
            println!("Default model set to {} ({})", descriptor.id, descriptor.name);
            Ok(())
        }
    }
}

async fn run(
    config: &Config,
    repository: Arc<Repository>,
    topic_id: Option<i64>,
    force: bool,
    json: bool,
) -> Result<()> {
    let settings = repository.get_settings().await?;

    let source = HttpFeedSource::new(&config.user_agent, config.feed_timeout())?;
    let ingester = FeedIngester::new(Arc::new(source), config.feed_timeout())
        .with_concurrency(config.feed_concurrency);

    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.openai_api_key.clone(),
        config.generation_timeout(),
    )?;
    let generator = DraftGenerator::new(
        Arc::new(llm),
        repository.clone(),
        config.max_output_tokens,
        config.generation_timeout(),
    )
    .with_model_override(config.model.clone());

    let pipeline = Pipeline::new(
        repository,
        ingester,
        generator,
        PipelineOptions {
            mark_failed_ingestions: config.mark_failed_ingestions,
            lease_ttl: config.topic_lease(),
        },
    );

    let results = pipeline
        .run(RunRequest {
            enabled: settings.auto_draft_enabled,
            topic_id,
            force,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results, settings.auto_draft_enabled);
    }
    Ok(())
}

fn print_results(results: &[RunResult], enabled: bool) {
    if !enabled {
        println!("Auto-draft is disabled (run `auto-draft enable` to turn it on)");
        return;
    }
    if results.is_empty() {
        println!("No topics were due");
        return;
    }
    for result in results {
        println!(
            "  {}: generated {}, skipped {}",
            result.topic_name, result.generated, result.skipped
        );
    }
    let generated: usize = results.iter().map(|r| r.generated).sum();
    let skipped: usize = results.iter().map(|r| r.skipped).sum();
    println!(
        "Generated {} drafts across {} topics ({} skipped)",
        generated,
        results.len(),
        skipped
    );
}

async fn list_topics(repository: &Repository) -> Result<()> {
    let topics = repository.get_all_topics().await?;
    if topics.is_empty() {
        println!("No topics yet (add one with `auto-draft add-topic`)");
        return Ok(());
    }

    let now = Utc::now();
    for topic in topics {
        let state = if !topic.is_active {
            "paused"
        } else if is_due(&topic, now) {
            "due"
        } else {
            "waiting"
        };
        let last_run = topic
            .last_run_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        let ingested = repository.get_ingestions(topic.id).await?.len();
        let drafts = repository.get_posts_for_topic(topic.id).await?.len();
        println!(
            "{:>4}  {:<24} {:<7} {:<7} max {:<3} last run {}  ({} feeds, {} keywords{}; {} ingested, {} drafts)",
            topic.id,
            topic.name,
            topic.frequency,
            state,
            topic.max_per_period,
            last_run,
            topic.rss_feeds.len(),
            topic.keywords.len(),
            if topic.use_keyword_filter { ", filtered" } else { "" },
            ingested,
            drafts
        );
    }
    Ok(())
}

fn ensure_found(changed: bool, id: i64) -> Result<()> {
    if changed {
        Ok(())
    } else {
        Err(AppError::Other(anyhow::anyhow!("No topic with id {}", id)))
    }
}
