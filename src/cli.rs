use crate::core::planner::{DEFAULT_IDEAS, DEFAULT_PLAN_VIDEOS};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tubelens")]
#[command(about = "YouTube channel performance analyzer and content planner")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding cached service responses
    #[arg(long, global = true, env = "TUBELENS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Model used for text analysis
    #[arg(long, global = true, env = "TUBELENS_MODEL")]
    pub model: Option<String>,

    /// Model used for thumbnail analysis
    #[arg(long, global = true, env = "TUBELENS_VISION_MODEL")]
    pub vision_model: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Where the channel data lives and where outputs go.
#[derive(Args, Clone)]
pub struct DataArgs {
    /// Channel data file (defaults to youtube_video_data[_<channel>].json)
    #[arg(long, env = "TUBELENS_DATA")]
    pub data: Option<PathBuf>,

    /// Channel id, @handle or channel URL; suffixes every output file name
    #[arg(long, env = "TUBELENS_CHANNEL")]
    pub channel: Option<String>,

    /// Output directory
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank videos, analyse titles and thumbnails, and write the pattern report
    Analyze {
        #[command(flatten)]
        data: DataArgs,

        /// Only run the per-video phase and keep the checkpoint
        #[arg(long, conflicts_with = "patterns")]
        videos: bool,

        /// Only build the pattern report from an existing checkpoint
        #[arg(long)]
        patterns: bool,

        /// Ranking metric: a field name, or weighted fields such as retention_rate=0.6,shares=0.4
        #[arg(long, default_value = "views")]
        metric: String,

        /// Number of top videos to analyse
        #[arg(short, long, default_value_t = 10)]
        count: usize,

        /// Seconds to wait between videos
        #[arg(long, default_value_t = 2)]
        delay_secs: u64,
    },

    /// Generate a Purple Cow content plan from the channel's best videos
    Plan {
        #[command(flatten)]
        data: DataArgs,

        /// Number of top videos to draw topics from
        #[arg(short, long, default_value_t = DEFAULT_PLAN_VIDEOS)]
        count: usize,

        /// Number of ideas to request
        #[arg(long, default_value_t = DEFAULT_IDEAS)]
        ideas: usize,
    },

    /// Write a quick performance overview without calling any service
    Summary {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Inspect or clear cached responses
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show entry counts per namespace
    List,

    /// Remove cached entries
    Clear {
        /// Only clear this namespace (title_analysis, thumbnail_analysis, patterns, topics)
        #[arg(long)]
        namespace: Option<String>,
    },
}
