use crate::core::MetricSpec;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TEXT_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_VISION_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_CACHE_DIR: &str = "analysis_cache";
const DATA_FILE_STEM: &str = "youtube_video_data";

/// Everything a run needs, resolved once from the command line and environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: PathBuf,
    pub channel_id: Option<String>,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub text_model: String,
    pub vision_model: String,
    /// Pause between consecutive per-video service calls.
    pub call_delay: Duration,
    pub top_count: usize,
    pub metric: MetricSpec,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: default_data_path(None),
            channel_id: None,
            output_dir: PathBuf::from("."),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            call_delay: Duration::from_secs(2),
            top_count: 10,
            metric: MetricSpec::default(),
        }
    }
}

impl Config {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_path("youtube_analysis_intermediate", "json")
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_path("youtube_analysis_results", "json")
    }

    pub fn ui_path(&self) -> PathBuf {
        self.output_path("youtube_analysis_ui", "json")
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_path("youtube_analysis_report", "md")
    }

    pub fn plan_path(&self) -> PathBuf {
        self.output_path("content_plan", "md")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_path("video_performance_analysis", "txt")
    }

    /// `<output_dir>/<stem>[_<channel>].<ext>`
    fn output_path(&self, stem: &str, ext: &str) -> PathBuf {
        let name = match &self.channel_id {
            Some(channel) => format!("{stem}_{channel}.{ext}"),
            None => format!("{stem}.{ext}"),
        };
        self.output_dir.join(name)
    }
}

/// Data file written by the fetch step for the given channel.
pub fn default_data_path(channel_id: Option<&str>) -> PathBuf {
    match channel_id {
        Some(channel) => PathBuf::from(format!("{DATA_FILE_STEM}_{channel}.json")),
        None => PathBuf::from(format!("{DATA_FILE_STEM}.json")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_carry_channel_suffix() {
        let config = Config {
            channel_id: Some("UC123".into()),
            output_dir: PathBuf::from("out"),
            ..Config::default()
        };

        assert_eq!(
            config.results_path(),
            PathBuf::from("out/youtube_analysis_results_UC123.json")
        );
        assert_eq!(
            config.report_path(),
            PathBuf::from("out/youtube_analysis_report_UC123.md")
        );
    }

    #[test]
    fn data_path_follows_channel() {
        assert_eq!(default_data_path(None), PathBuf::from("youtube_video_data.json"));
        assert_eq!(
            default_data_path(Some("UC9")),
            PathBuf::from("youtube_video_data_UC9.json")
        );
    }
}
