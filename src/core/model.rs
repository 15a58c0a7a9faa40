use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Step marker written into the checkpoint while per-video analysis is in progress.
pub const STEP_VIDEO_ANALYSIS: &str = "video_analysis";

/// Input document produced by the data-fetch step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelData {
    pub channel: ChannelInfo,
    #[serde(default)]
    pub videos: Vec<VideoRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Kept exactly as fetched; the analytics API reports it as a string.
    #[serde(default)]
    pub subscribers: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default, with = "lenient::metric")]
    pub views: Option<f64>,
    #[serde(default, with = "lenient::metric")]
    pub likes: Option<f64>,
    #[serde(default, with = "lenient::metric")]
    pub comments: Option<f64>,
    #[serde(default, with = "lenient::metric")]
    pub engagement_rate: Option<f64>,
    #[serde(default, with = "lenient::text")]
    pub avg_view_duration: Option<String>,
    #[serde(default, with = "lenient::metric")]
    pub retention_rate: Option<f64>,
    #[serde(default, with = "lenient::metric")]
    pub shares: Option<f64>,
    /// Any other fetched field, addressable as a metric by name.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl VideoRecord {
    /// Numeric value of a named metric. Missing, null and non-numeric values are `None`.
    pub fn metric(&self, field: &str) -> Option<f64> {
        match field {
            "views" => self.views,
            "likes" => self.likes,
            "comments" => self.comments,
            "engagement_rate" => self.engagement_rate,
            "retention_rate" => self.retention_rate,
            "shares" => self.shares,
            other => self.extra.get(other).and_then(lenient::coerce),
        }
    }

    pub fn url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// A video with the scores it was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredVideo {
    pub video: VideoRecord,
    pub sub_scores: BTreeMap<String, f64>,
    pub score: f64,
}

/// Combined title/thumbnail/metrics analysis for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub video_id: String,
    pub title: String,
    pub views: Option<f64>,
    pub analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub channel_name: String,
    #[serde(default)]
    pub channel_subscribers: Value,
    #[serde(with = "analyses_by_video")]
    pub video_analyses: Vec<AnalysisRecord>,
    pub analysis_step: String,
    #[serde(default)]
    pub top_videos: Vec<VideoRecord>,
}

impl Checkpoint {
    pub fn is_resumable(&self) -> bool {
        self.analysis_step == STEP_VIDEO_ANALYSIS && !self.video_analyses.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAnalysis {
    pub primary_topic: String,
    #[serde(default)]
    pub secondary_topics: Vec<String>,
    pub overall_theme: String,
    pub content_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
}

impl TopicAnalysis {
    pub const ERROR_TOPIC: &'static str = "Error in extraction";

    pub fn extraction_error() -> Self {
        Self {
            primary_topic: Self::ERROR_TOPIC.to_string(),
            secondary_topics: Vec::new(),
            overall_theme: "Could not determine theme due to error.".to_string(),
            content_category: "Unknown".to_string(),
            original_title: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.primary_topic == Self::ERROR_TOPIC
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentIdea {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Render an optional metric for humans: integral values without a fraction, absent as `N/A`.
pub fn display_metric(value: Option<f64>) -> String {
    match value {
        Some(v) if lenient::is_integral(v) => format!("{}", v as i64),
        Some(v) => format!("{v:.2}"),
        None => "N/A".to_string(),
    }
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn coerce(value: &Value) -> Option<f64> {
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        number.filter(|v| v.is_finite())
    }

    pub fn is_integral(v: f64) -> bool {
        v.fract() == 0.0 && v.abs() < 9.0e15
    }

    pub mod metric {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
            match *value {
                Some(v) if is_integral(v) => s.serialize_i64(v as i64),
                Some(v) => s.serialize_f64(v),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
            let value = Value::deserialize(d)?;
            Ok(coerce(&value))
        }
    }

    pub mod text {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_str(v),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
            Ok(match Value::deserialize(d)? {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            })
        }
    }
}

/// Serializes analyses as a JSON object keyed by video id, preserving ranked order.
pub(crate) mod analyses_by_video {
    use super::*;

    #[derive(Serialize)]
    struct EntryRef<'a> {
        title: &'a str,
        #[serde(with = "lenient::metric")]
        views: Option<f64>,
        analysis: &'a str,
    }

    #[derive(Deserialize)]
    struct Entry {
        title: String,
        #[serde(default, with = "lenient::metric")]
        views: Option<f64>,
        analysis: String,
    }

    pub fn serialize<S: Serializer>(records: &[AnalysisRecord], s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(records.len()))?;
        for record in records {
            map.serialize_entry(
                &record.video_id,
                &EntryRef {
                    title: &record.title,
                    views: record.views,
                    analysis: &record.analysis,
                },
            )?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<AnalysisRecord>, D::Error> {
        d.deserialize_map(OrderedVisitor)
    }

    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<AnalysisRecord>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an object of video analyses keyed by video id")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut records = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((video_id, entry)) = access.next_entry::<String, Entry>()? {
                records.push(AnalysisRecord {
                    video_id,
                    title: entry.title,
                    views: entry.views,
                    analysis: entry.analysis,
                });
            }
            Ok(records)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_are_coerced_leniently() {
        let video: VideoRecord = serde_json::from_value(serde_json::json!({
            "video_id": "abc",
            "title": "T",
            "views": "1200",
            "likes": 10,
            "retention_rate": null,
            "shares": "lots",
            "subscribers_gained": 4
        }))
        .expect("valid record");

        assert_eq!(video.metric("views"), Some(1200.0));
        assert_eq!(video.metric("likes"), Some(10.0));
        assert_eq!(video.metric("retention_rate"), None);
        assert_eq!(video.metric("shares"), None);
        assert_eq!(video.metric("comments"), None);
        assert_eq!(video.metric("subscribers_gained"), Some(4.0));
    }

    #[test]
    fn integral_metrics_serialize_as_integers() {
        let video: VideoRecord = serde_json::from_value(serde_json::json!({
            "video_id": "abc",
            "title": "T",
            "views": 100,
            "engagement_rate": 4.25
        }))
        .expect("valid record");

        let json = serde_json::to_value(&video).expect("serializable");
        assert_eq!(json["views"], serde_json::json!(100));
        assert_eq!(json["engagement_rate"], serde_json::json!(4.25));
        assert_eq!(json["shares"], Value::Null);
    }

    #[test]
    fn checkpoint_keeps_analysis_order() {
        let checkpoint = Checkpoint {
            channel_name: "Chan".into(),
            channel_subscribers: Value::String("1000".into()),
            video_analyses: vec![
                AnalysisRecord {
                    video_id: "zzz".into(),
                    title: "Last alphabetically".into(),
                    views: Some(300.0),
                    analysis: "a".into(),
                },
                AnalysisRecord {
                    video_id: "aaa".into(),
                    title: "First alphabetically".into(),
                    views: None,
                    analysis: "b".into(),
                },
            ],
            analysis_step: STEP_VIDEO_ANALYSIS.into(),
            top_videos: Vec::new(),
        };

        let text = serde_json::to_string_pretty(&checkpoint).expect("serializable");
        assert!(text.find("\"zzz\"").unwrap() < text.find("\"aaa\"").unwrap());

        let restored: Checkpoint = serde_json::from_str(&text).expect("round trip");
        assert_eq!(restored, checkpoint);
        assert!(restored.is_resumable());
    }

    #[test]
    fn display_metric_formats() {
        assert_eq!(display_metric(Some(1500.0)), "1500");
        assert_eq!(display_metric(Some(3.14159)), "3.14");
        assert_eq!(display_metric(None), "N/A");
    }
}
