use crate::config::Config;
use crate::core::model::{VideoRecord, display_metric};
use crate::core::storage::{StorageService, write_text};
use crate::error::Result;
use std::path::PathBuf;

const TOP_N: usize = 5;

fn ranked_by<'a>(videos: &'a [VideoRecord], metric: impl Fn(&VideoRecord) -> Option<f64>) -> Vec<(&'a VideoRecord, f64)> {
    let mut ranked: Vec<_> = videos
        .iter()
        .filter_map(|v| metric(v).map(|m| (v, m)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(TOP_N);
    ranked
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Plain-text report: leaders by views, engagement and retention, channel averages
/// and title length. Videos without retention data are left out of the retention figures.
pub fn performance_summary(videos: &[VideoRecord]) -> String {
    if videos.is_empty() {
        return "No video data available for analysis.".to_string();
    }

    let views = |v: &VideoRecord| Some(v.views.unwrap_or(0.0));
    let engagement = |v: &VideoRecord| Some(v.engagement_rate.unwrap_or(0.0));

    let mut out = String::from("VIDEO PERFORMANCE ANALYSIS\n");
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");

    out.push_str("TOP PERFORMING VIDEOS BY VIEWS:\n");
    for (idx, (video, value)) in ranked_by(videos, views).into_iter().enumerate() {
        out.push_str(&format!(
            "{}. \"{}\" - {} views\n",
            idx + 1,
            video.title,
            display_metric(Some(value))
        ));
    }

    out.push_str("\nTOP PERFORMING VIDEOS BY ENGAGEMENT RATE:\n");
    for (idx, (video, value)) in ranked_by(videos, engagement).into_iter().enumerate() {
        out.push_str(&format!(
            "{}. \"{}\" - {}% engagement\n",
            idx + 1,
            video.title,
            display_metric(Some(value))
        ));
    }

    let by_retention = ranked_by(videos, |v| v.retention_rate);
    if !by_retention.is_empty() {
        out.push_str("\nTOP PERFORMING VIDEOS BY VIEWER RETENTION:\n");
        for (idx, (video, value)) in by_retention.into_iter().enumerate() {
            out.push_str(&format!(
                "{}. \"{}\" - {}% retention\n",
                idx + 1,
                video.title,
                display_metric(Some(value))
            ));
        }
    }

    let avg_views = mean(videos.iter().filter_map(views)).unwrap_or(0.0);
    let avg_engagement = mean(videos.iter().filter_map(engagement)).unwrap_or(0.0);

    out.push_str("\n\nCONTENT PATTERNS:\n");
    out.push_str(&format!("Average views per video: {}\n", avg_views.trunc() as i64));
    out.push_str(&format!("Average engagement rate: {avg_engagement:.2}%\n"));
    if let Some(avg_retention) = mean(videos.iter().filter_map(|v| v.retention_rate)) {
        out.push_str(&format!("Average retention rate: {avg_retention:.2}%\n"));
    }

    let avg_chars = mean(videos.iter().map(|v| v.title.chars().count() as f64)).unwrap_or(0.0);
    let avg_words =
        mean(videos.iter().map(|v| v.title.split_whitespace().count() as f64)).unwrap_or(0.0);
    out.push_str(&format!(
        "\nAverage title length: {avg_chars:.1} characters, {avg_words:.1} words\n"
    ));

    out.push_str(
        "\nNOTE: This is a basic analysis. For deeper insights, run `tubelens analyze` \
         to have the top videos reviewed title by title and thumbnail by thumbnail.\n",
    );

    out
}

/// Builds the summary from the configured data file and writes it next to the other outputs.
pub async fn write_performance_summary(config: &Config) -> Result<(PathBuf, String)> {
    let data = StorageService::load_channel_data(&config.data_path).await?;
    let report = performance_summary(&data.videos);

    let path = config.summary_path();
    write_text(&path, &report).await?;
    tracing::info!(path = %path.display(), videos = data.videos.len(), "performance summary written");

    Ok((path, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn videos() -> Vec<VideoRecord> {
        serde_json::from_value(json!([
            {"video_id": "a", "title": "Build a Bench", "views": 100, "engagement_rate": 5.5, "retention_rate": 40},
            {"video_id": "b", "title": "Table", "views": "300", "engagement_rate": 2.0, "retention_rate": null},
            {"video_id": "c", "title": "Oil or Wax?", "views": 201, "engagement_rate": 7.25, "retention_rate": 55.5}
        ]))
        .unwrap()
    }

    #[test]
    fn lists_leaders_and_averages() {
        let report = performance_summary(&videos());

        assert!(report.starts_with("VIDEO PERFORMANCE ANALYSIS\n"));
        assert!(report.contains("BY VIEWS:\n1. \"Table\" - 300 views\n2. \"Oil or Wax?\" - 201 views\n3. \"Build a Bench\" - 100 views\n"));
        assert!(report.contains("1. \"Oil or Wax?\" - 7.25% engagement"));
        assert!(report.contains("RETENTION:\n1. \"Oil or Wax?\" - 55.50% retention\n2. \"Build a Bench\" - 40% retention\n"));
        assert!(report.contains("Average views per video: 200\n"));
        assert!(report.contains("Average engagement rate: 4.92%\n"));
        assert!(report.contains("Average retention rate: 47.75%\n"));
        assert!(report.contains("Average title length: 9.7 characters, 2.3 words\n"));
    }

    #[test]
    fn retention_section_needs_retention_data() {
        let mut videos = videos();
        for v in &mut videos {
            v.retention_rate = None;
        }
        let report = performance_summary(&videos);

        assert!(!report.contains("VIEWER RETENTION"));
        assert!(!report.contains("Average retention rate"));
    }

    #[test]
    fn empty_input() {
        assert_eq!(performance_summary(&[]), "No video data available for analysis.");
    }

    #[tokio::test]
    async fn writes_summary_file() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("youtube_video_data.json");
        let doc = json!({"channel": {"name": "Woodshop"}, "videos": serde_json::to_value(videos()).unwrap()});
        std::fs::write(&data_path, doc.to_string()).unwrap();
        let config = Config {
            data_path,
            output_dir: dir.path().to_path_buf(),
            ..Config::default()
        };

        let (path, report) = write_performance_summary(&config).await.unwrap();
        assert_eq!(path, config.summary_path());
        assert_eq!(std::fs::read_to_string(path).unwrap(), report);
    }
}
