use crate::core::model::{AnalysisRecord, Checkpoint, VideoRecord, analyses_by_video, display_metric, display_value, lenient};
use crate::core::sections::{Region, StructuredAnalysis, parse_analysis};
use serde::Serialize;
use serde::ser::SerializeMap;
use serde_json::Value;

/// Raw results, shaped like the checkpoint so older consumers keep working.
#[derive(Debug, Serialize)]
pub struct RawResults<'a> {
    pub channel_name: &'a str,
    pub channel_subscribers: &'a Value,
    #[serde(with = "analyses_by_video")]
    pub video_analyses: &'a [AnalysisRecord],
    pub patterns_report: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TopVideoEntry {
    pub rank: usize,
    pub title: String,
    #[serde(with = "lenient::metric")]
    pub views: Option<f64>,
    pub video_id: String,
}

#[derive(Debug, Serialize)]
pub struct UiAnalysis {
    pub title: String,
    #[serde(with = "lenient::metric")]
    pub views: Option<f64>,
    pub structured_analysis: StructuredAnalysis,
}

/// Parsed results for the dashboard.
#[derive(Debug, Serialize)]
pub struct UiResults<'a> {
    pub channel_name: &'a str,
    pub channel_subscribers: &'a Value,
    pub top_videos: Vec<TopVideoEntry>,
    pub video_analyses: UiAnalyses,
    pub patterns_report: Region,
}

/// Analyses keyed by video id, in ranked order.
#[derive(Debug)]
pub struct UiAnalyses(pub Vec<(String, UiAnalysis)>);

impl Serialize for UiAnalyses {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (video_id, analysis) in &self.0 {
            map.serialize_entry(video_id, analysis)?;
        }
        map.end()
    }
}

pub fn raw_results<'a>(checkpoint: &'a Checkpoint, patterns_report: &'a str) -> RawResults<'a> {
    RawResults {
        channel_name: &checkpoint.channel_name,
        channel_subscribers: &checkpoint.channel_subscribers,
        video_analyses: &checkpoint.video_analyses,
        patterns_report,
    }
}

pub fn ui_results<'a>(checkpoint: &'a Checkpoint, patterns_report: &str) -> UiResults<'a> {
    let top_videos = ranked_videos(checkpoint)
        .into_iter()
        .enumerate()
        .map(|(idx, (video_id, title, views))| TopVideoEntry {
            rank: idx + 1,
            title,
            views,
            video_id,
        })
        .collect();

    let analyses = checkpoint
        .video_analyses
        .iter()
        .map(|record| {
            (
                record.video_id.clone(),
                UiAnalysis {
                    title: record.title.clone(),
                    views: record.views,
                    structured_analysis: parse_analysis(&record.analysis),
                },
            )
        })
        .collect();

    UiResults {
        channel_name: &checkpoint.channel_name,
        channel_subscribers: &checkpoint.channel_subscribers,
        top_videos,
        video_analyses: UiAnalyses(analyses),
        patterns_report: Region::parse(patterns_report),
    }
}

/// `(video_id, title, views)` in ranked order. Checkpoints without a stored
/// selection fall back to the analysed videos ordered by views.
fn ranked_videos(checkpoint: &Checkpoint) -> Vec<(String, String, Option<f64>)> {
    if !checkpoint.top_videos.is_empty() {
        return checkpoint
            .top_videos
            .iter()
            .map(|v: &VideoRecord| (v.video_id.clone(), v.title.clone(), v.views))
            .collect();
    }

    let mut records: Vec<&AnalysisRecord> = checkpoint.video_analyses.iter().collect();
    records.sort_by(|a, b| {
        let a = a.views.unwrap_or(f64::NEG_INFINITY);
        let b = b.views.unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });
    records
        .into_iter()
        .map(|r| (r.video_id.clone(), r.title.clone(), r.views))
        .collect()
}

pub fn markdown_report(checkpoint: &Checkpoint, patterns_report: &str) -> String {
    let ranked = ranked_videos(checkpoint);
    let mut out = String::new();

    out.push_str(&format!(
        "# YouTube Content Analysis for {}\n\n",
        checkpoint.channel_name
    ));
    out.push_str(&format!(
        "Channel Subscribers: {}\n\n",
        display_value(&checkpoint.channel_subscribers)
    ));

    out.push_str(&format!("## Top {} Videos\n\n", ranked.len()));
    for (idx, (_, title, views)) in ranked.iter().enumerate() {
        out.push_str(&format!(
            "{}. **{}** - {} views\n",
            idx + 1,
            title,
            display_metric(*views)
        ));
    }

    out.push_str("\n## Video Analyses\n\n");
    for record in &checkpoint.video_analyses {
        out.push_str(&format!(
            "### {} ({} views)\n\n",
            record.title,
            display_metric(record.views)
        ));
        out.push_str(record.analysis.replace("===", "").trim());
        out.push_str("\n\n---\n\n");
    }

    out.push_str("## Patterns & Recommendations\n\n");
    out.push_str(patterns_report.trim());
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::STEP_VIDEO_ANALYSIS;

    fn record(id: &str, views: Option<f64>) -> AnalysisRecord {
        AnalysisRecord {
            video_id: id.to_string(),
            title: format!("Title {id}"),
            views,
            analysis: format!(
                "=== ANALYSIS FOR VIDEO: Title {id} ===\n\nTITLE ANALYSIS:\n1. Hook\nGood hook.\n\nVIDEO URL: https://www.youtube.com/watch?v={id}\n"
            ),
        }
    }

    fn checkpoint() -> Checkpoint {
        Checkpoint {
            channel_name: "Woodshop".into(),
            channel_subscribers: Value::String("1200".into()),
            video_analyses: vec![record("b", Some(50.0)), record("a", Some(200.0))],
            analysis_step: STEP_VIDEO_ANALYSIS.into(),
            top_videos: Vec::new(),
        }
    }

    #[test]
    fn ui_results_rank_by_views_without_selection() {
        let cp = checkpoint();
        let ui = serde_json::to_value(ui_results(&cp, "### Patterns\nConsistency wins.")).unwrap();

        assert_eq!(ui["top_videos"][0]["video_id"], "a");
        assert_eq!(ui["top_videos"][0]["rank"], 1);
        assert_eq!(ui["top_videos"][1]["views"], 50);
        assert_eq!(
            ui["video_analyses"]["b"]["structured_analysis"]["title_analysis"]["sections"]["hook"],
            "Good hook."
        );
        assert_eq!(ui["patterns_report"]["sections"]["patterns"], "Consistency wins.");
    }

    #[test]
    fn raw_results_keep_raw_strings() {
        let cp = checkpoint();
        let raw = serde_json::to_string_pretty(&raw_results(&cp, "report")).unwrap();

        assert!(raw.find("\"b\"").unwrap() < raw.find("\"a\"").unwrap());
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["patterns_report"], "report");
        assert_eq!(value["video_analyses"]["a"]["analysis"], cp.video_analyses[1].analysis);
    }

    #[test]
    fn markdown_lists_videos_and_patterns() {
        let md = markdown_report(&checkpoint(), "Post weekly.");

        assert!(md.starts_with("# YouTube Content Analysis for Woodshop\n"));
        assert!(md.contains("Channel Subscribers: 1200"));
        assert!(md.contains("1. **Title a** - 200 views"));
        assert!(md.contains("2. **Title b** - 50 views"));
        assert!(md.contains("### Title b (50 views)"));
        assert!(!md.contains("==="));
        assert!(md.trim_end().ends_with("Post weekly."));
    }
}
