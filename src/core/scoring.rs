use crate::core::model::{ScoredVideo, VideoRecord};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedField {
    pub field: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricSpec {
    Single(String),
    Composite(Vec<WeightedField>),
}

impl MetricSpec {
    /// Retention-heavy blend used by the content planner.
    pub fn retention_and_shares() -> Self {
        Self::Composite(vec![
            WeightedField {
                field: "retention_rate".to_string(),
                weight: 0.6,
            },
            WeightedField {
                field: "shares".to_string(),
                weight: 0.4,
            },
        ])
    }
}

impl Default for MetricSpec {
    fn default() -> Self {
        Self::Single("views".to_string())
    }
}

/// Accepts `views` or `retention_rate=0.6,shares=0.4`.
impl FromStr for MetricSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::custom("Metric specification cannot be empty"));
        }

        if !trimmed.contains('=') {
            return Ok(Self::Single(trimmed.to_string()));
        }

        let mut fields = Vec::new();
        for part in trimmed.split(',') {
            let (field, weight) = part
                .split_once('=')
                .ok_or_else(|| Error::custom(format!("Expected field=weight, got '{part}'")))?;
            let field = field.trim();
            if field.is_empty() {
                return Err(Error::custom(format!("Missing field name in '{part}'")));
            }
            let weight = weight
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|w| w.is_finite())
                .ok_or_else(|| Error::custom(format!("Invalid weight in '{part}'")))?;
            fields.push(WeightedField {
                field: field.to_string(),
                weight,
            });
        }

        Ok(Self::Composite(fields))
    }
}

impl fmt::Display for MetricSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(field) => f.write_str(field),
            Self::Composite(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|wf| format!("{}={}", wf.field, wf.weight))
                    .collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

pub struct ScoringEngine {
    spec: MetricSpec,
}

impl ScoringEngine {
    pub fn new(spec: MetricSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &MetricSpec {
        &self.spec
    }

    /// Scores every record, then returns the best `k` in descending order.
    /// Equal scores keep their input order.
    pub fn top_k(&self, videos: &[VideoRecord], k: usize) -> Vec<ScoredVideo> {
        let mut scored = self.score_all(videos);
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    pub fn score_all(&self, videos: &[VideoRecord]) -> Vec<ScoredVideo> {
        match &self.spec {
            MetricSpec::Single(field) => videos
                .iter()
                .map(|video| {
                    // Missing values rank below everything else.
                    let score = video.metric(field).unwrap_or(f64::NEG_INFINITY);
                    ScoredVideo {
                        video: video.clone(),
                        sub_scores: BTreeMap::from([(field.clone(), score)]),
                        score,
                    }
                })
                .collect(),
            MetricSpec::Composite(fields) => {
                let normalized: Vec<(&WeightedField, Vec<f64>)> = fields
                    .iter()
                    .map(|wf| {
                        let values: Vec<f64> = videos
                            .iter()
                            .map(|v| v.metric(&wf.field).unwrap_or(0.0))
                            .collect();
                        (wf, min_max_normalize(&values))
                    })
                    .collect();

                videos
                    .iter()
                    .enumerate()
                    .map(|(idx, video)| {
                        let mut sub_scores = BTreeMap::new();
                        let mut score = 0.0;
                        for (wf, values) in &normalized {
                            sub_scores.insert(wf.field.clone(), values[idx]);
                            score += wf.weight * values[idx];
                        }
                        ScoredVideo {
                            video: video.clone(),
                            sub_scores,
                            score,
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Scales values into `[0, 1]`. A constant column maps to all zeros.
fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if values.is_empty() || range <= 0.0 {
        return vec![0.0; values.len()];
    }

    values.iter().map(|v| (v - min) / range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, views: Option<f64>, retention: Option<f64>, shares: Option<f64>) -> VideoRecord {
        VideoRecord {
            video_id: id.to_string(),
            title: format!("Video {id}"),
            description: None,
            published_at: None,
            thumbnail_url: None,
            views,
            likes: None,
            comments: None,
            engagement_rate: None,
            avg_view_duration: None,
            retention_rate: retention,
            shares,
            extra: BTreeMap::new(),
        }
    }

    fn ids(scored: &[ScoredVideo]) -> Vec<&str> {
        scored.iter().map(|s| s.video.video_id.as_str()).collect()
    }

    #[test]
    fn ranks_by_single_metric() {
        let videos = vec![
            video("video1", Some(100.0), None, None),
            video("video2", Some(50.0), None, None),
            video("video3", Some(200.0), None, None),
        ];

        let engine = ScoringEngine::new(MetricSpec::Single("views".into()));
        let top = engine.top_k(&videos, 10);

        assert_eq!(ids(&top), vec!["video3", "video1", "video2"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let videos = vec![
            video("a", Some(10.0), None, None),
            video("b", Some(20.0), None, None),
            video("c", Some(10.0), None, None),
            video("d", Some(20.0), None, None),
        ];

        let engine = ScoringEngine::new(MetricSpec::default());
        assert_eq!(ids(&engine.top_k(&videos, 4)), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn missing_values_rank_last() {
        let videos = vec![
            video("none", None, None, None),
            video("zero", Some(0.0), None, None),
            video("some", Some(5.0), None, None),
        ];

        let engine = ScoringEngine::new(MetricSpec::default());
        assert_eq!(ids(&engine.top_k(&videos, 3)), vec!["some", "zero", "none"]);
    }

    #[test]
    fn unknown_field_never_panics() {
        let videos = vec![video("a", Some(1.0), None, None), video("b", None, None, None)];
        let engine = ScoringEngine::new(MetricSpec::Single("nonexistent".into()));
        assert_eq!(ids(&engine.top_k(&videos, 5)), vec!["a", "b"]);
    }

    #[test]
    fn empty_input_and_oversized_k() {
        let engine = ScoringEngine::new(MetricSpec::default());
        assert!(engine.top_k(&[], 10).is_empty());

        let videos = vec![video("a", Some(1.0), None, None)];
        assert_eq!(engine.top_k(&videos, 50).len(), 1);
    }

    #[test]
    fn composite_weights_normalized_fields() {
        let videos = vec![
            video("low", None, Some(10.0), Some(0.0)),
            video("high_retention", None, Some(50.0), Some(5.0)),
            video("high_shares", None, Some(30.0), Some(10.0)),
        ];

        let engine = ScoringEngine::new(MetricSpec::retention_and_shares());
        let top = engine.top_k(&videos, 3);

        assert_eq!(ids(&top), vec!["high_retention", "high_shares", "low"]);
        assert!((top[0].score - (0.6 * 1.0 + 0.4 * 0.5)).abs() < 1e-9);
        assert!((top[1].score - (0.6 * 0.5 + 0.4 * 1.0)).abs() < 1e-9);
        assert_eq!(top[2].score, 0.0);
    }

    #[test]
    fn constant_field_contributes_zero() {
        let videos = vec![
            video("a", None, Some(40.0), Some(3.0)),
            video("b", None, Some(40.0), Some(7.0)),
        ];

        let engine = ScoringEngine::new(MetricSpec::retention_and_shares());
        for scored in engine.score_all(&videos) {
            assert_eq!(scored.sub_scores["retention_rate"], 0.0);
            assert!(scored.score.is_finite());
        }
    }

    #[test]
    fn composite_treats_missing_as_zero() {
        let videos = vec![
            video("missing", None, None, Some(1.0)),
            video("present", None, Some(20.0), Some(1.0)),
        ];

        let engine = ScoringEngine::new(MetricSpec::retention_and_shares());
        assert_eq!(ids(&engine.top_k(&videos, 2)), vec!["present", "missing"]);
    }

    #[test]
    fn parses_metric_specs() {
        assert_eq!(
            "views".parse::<MetricSpec>().unwrap(),
            MetricSpec::Single("views".into())
        );
        assert_eq!(
            "retention_rate=0.6, shares=0.4".parse::<MetricSpec>().unwrap(),
            MetricSpec::retention_and_shares()
        );
        assert!("shares=abc".parse::<MetricSpec>().is_err());
        assert!("".parse::<MetricSpec>().is_err());
    }
}
