mod cli;
mod config;
mod core;
mod error;

use crate::cli::{CacheAction, Cli, Commands, DataArgs};
use crate::config::{Config, DEFAULT_CACHE_DIR, default_data_path};
use crate::core::{
    ContentPlanner, FileStore, MetricSpec, OpenAiAnalyst, Pipeline, RunMode, channel_id,
    write_performance_summary,
};
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "tubelens=info";
const VERBOSE_LOG_FILTER: &str = "tubelens=debug";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let fallback = if cli.verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match &cli.command {
        Commands::Analyze {
            data,
            videos,
            patterns,
            metric,
            count,
            delay_secs,
        } => {
            let mut config = build_config(&cli, data)?;
            config.metric = metric.parse::<MetricSpec>()?;
            config.top_count = *count;
            config.call_delay = Duration::from_secs(*delay_secs);

            let mode = if *videos {
                RunMode::VideosOnly
            } else if *patterns {
                RunMode::PatternsOnly
            } else {
                RunMode::Full
            };
            run_cli_analyze(config, mode).await?;
        }
        Commands::Plan { data, count, ideas } => {
            let config = build_config(&cli, data)?;
            run_cli_plan(config, *count, *ideas).await?;
        }
        Commands::Summary { data } => {
            let config = build_config(&cli, data)?;
            let (path, report) = write_performance_summary(&config).await?;
            println!("{report}");
            println!();
            println!("Summary saved to: {path:?}");
        }
        Commands::Cache { action } => {
            run_cli_cache(cache_dir(&cli), action).await?;
        }
    }

    Ok(())
}

fn cache_dir(cli: &Cli) -> PathBuf {
    cli.cache_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
}

fn build_config(cli: &Cli, data: &DataArgs) -> Result<Config> {
    let channel = data.channel.as_deref().map(channel_id).transpose()?;
    let data_path = data
        .data
        .clone()
        .unwrap_or_else(|| default_data_path(channel.as_deref()));

    let mut config = Config {
        data_path,
        channel_id: channel,
        output_dir: data.out.clone(),
        cache_dir: cache_dir(cli),
        ..Config::default()
    };
    if let Some(model) = &cli.model {
        config.text_model = model.clone();
    }
    if let Some(model) = &cli.vision_model {
        config.vision_model = model.clone();
    }
    Ok(config)
}

async fn run_cli_analyze(config: Config, mode: RunMode) -> Result<()> {
    println!("Analyzing channel data from: {:?}", config.data_path);

    let analyst = OpenAiAnalyst::new(&config);
    let store = FileStore::new(&config.cache_dir);
    let mut pipeline = Pipeline::new(config, analyst, store);
    let summary = pipeline.run(mode).await?;

    if summary.resumed {
        println!("Resumed from saved per-video analyses.");
    }
    println!("Videos analysed: {}", summary.analysed);

    if mode == RunMode::VideosOnly {
        println!("Per-video analysis saved. Run with --patterns to build the report.");
        return Ok(());
    }

    if !summary.patterns_generated {
        println!("Pattern report could not be generated; per-video results were kept for a retry.");
    }
    for path in &summary.artifacts {
        println!("Saved: {path:?}");
    }

    Ok(())
}

async fn run_cli_plan(config: Config, video_count: usize, idea_count: usize) -> Result<()> {
    println!("Planning content from: {:?}", config.data_path);

    let analyst = OpenAiAnalyst::new(&config);
    let store = FileStore::new(&config.cache_dir);
    let planner = ContentPlanner::new(config, analyst, store);
    let outcome = planner.run(video_count, idea_count).await?;

    match outcome.plan_path {
        Some(path) => {
            println!("Generated {} ideas.", outcome.ideas.len());
            println!("Content plan saved to: {path:?}");
        }
        None => println!("No content ideas were generated, so no plan was saved."),
    }

    Ok(())
}

async fn run_cli_cache(cache_dir: PathBuf, action: &CacheAction) -> Result<()> {
    let store = FileStore::new(&cache_dir);

    match action {
        CacheAction::List => {
            let counts = store.entry_counts().await?;
            if counts.is_empty() {
                println!("Cache at {cache_dir:?} is empty.");
                return Ok(());
            }
            println!("Cache at {cache_dir:?}:");
            for (namespace, count) in counts {
                println!("  {namespace:<20} {count} entries");
            }
        }
        CacheAction::Clear { namespace } => {
            let removed = store.clear(namespace.as_deref()).await?;
            println!("Removed {removed} cached entries.");
        }
    }

    Ok(())
}
