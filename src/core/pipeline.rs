use crate::config::Config;
use crate::core::analyst::Analyst;
use crate::core::cache::{CacheStore, NS_PATTERNS, NS_THUMBNAIL, NS_TITLE, ResponseCache};
use crate::core::model::{AnalysisRecord, Checkpoint, STEP_VIDEO_ANALYSIS, VideoRecord};
use crate::core::report::{markdown_report, raw_results, ui_results};
use crate::core::scoring::ScoringEngine;
use crate::core::sections::compose_analysis;
use crate::core::storage::{StorageService, write_json, write_text};
use crate::core::video::thumbnail_cache_id;
use crate::error::{Error, Result};
use std::path::PathBuf;

pub const TITLE_ERROR: &str = "Error analyzing title";
pub const THUMBNAIL_ERROR: &str = "Error analyzing thumbnail";
pub const PATTERNS_ERROR: &str = "Error generating patterns report";
pub const NO_THUMBNAIL: &str = "No thumbnail available";
const NO_ANALYSES: &str = "No video analyses available for pattern analysis.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Resume from a checkpoint when possible, otherwise analyse from scratch, then report.
    Full,
    /// Analyse videos and keep the checkpoint; no report.
    VideosOnly,
    /// Report from an existing checkpoint only.
    PatternsOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Start,
    Selecting,
    Analyzing(usize),
    Aggregating,
    Reporting,
    Done,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub resumed: bool,
    pub analysed: usize,
    pub patterns_generated: bool,
    pub artifacts: Vec<PathBuf>,
}

struct Patterns {
    text: String,
    generated: bool,
}

pub struct Pipeline<A, S> {
    config: Config,
    analyst: A,
    cache: ResponseCache<S>,
    storage: StorageService,
    state: RunState,
}

impl<A: Analyst, S: CacheStore> Pipeline<A, S> {
    pub fn new(config: Config, analyst: A, store: S) -> Self {
        let storage = StorageService::new(&config);
        Self {
            config,
            analyst,
            cache: ResponseCache::new(store),
            storage,
            state: RunState::Start,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "pipeline transition");
        self.state = next;
    }

    pub async fn run(&mut self, mode: RunMode) -> Result<RunSummary> {
        self.transition(RunState::Start);
        let result = self.execute(mode).await;
        match &result {
            Ok(_) => self.transition(RunState::Done),
            Err(e) => {
                tracing::error!(error = %e, "run failed");
                self.transition(RunState::Failed(e.to_string()));
            }
        }
        result
    }

    async fn execute(&mut self, mode: RunMode) -> Result<RunSummary> {
        let (checkpoint, resumed) = match mode {
            RunMode::VideosOnly => {
                let checkpoint = self.analyze_from_scratch().await?;
                return Ok(RunSummary {
                    resumed: false,
                    analysed: checkpoint.video_analyses.len(),
                    patterns_generated: false,
                    artifacts: Vec::new(),
                });
            }
            RunMode::PatternsOnly => {
                let checkpoint = self
                    .storage
                    .load_checkpoint()
                    .await
                    .filter(Checkpoint::is_resumable)
                    .ok_or_else(|| {
                        Error::custom(
                            "No intermediate video analysis results found. Run the per-video phase first.",
                        )
                    })?;
                (checkpoint, true)
            }
            RunMode::Full => match self.storage.load_checkpoint().await {
                Some(checkpoint) if checkpoint.is_resumable() => {
                    tracing::info!(
                        analysed = checkpoint.video_analyses.len(),
                        "resuming from checkpoint, skipping per-video analysis"
                    );
                    (checkpoint, true)
                }
                _ => (self.analyze_from_scratch().await?, false),
            },
        };

        let patterns = self.aggregate(&checkpoint).await;
        let artifacts = self.write_reports(&checkpoint, &patterns).await?;

        if patterns.generated {
            self.storage.remove_checkpoint().await?;
        } else {
            tracing::warn!("patterns report unavailable, keeping checkpoint for a later retry");
        }

        Ok(RunSummary {
            resumed,
            analysed: checkpoint.video_analyses.len(),
            patterns_generated: patterns.generated,
            artifacts,
        })
    }

    async fn analyze_from_scratch(&mut self) -> Result<Checkpoint> {
        let data = StorageService::load_channel_data(&self.config.data_path).await?;

        self.transition(RunState::Selecting);
        let engine = ScoringEngine::new(self.config.metric.clone());
        let selected = engine.top_k(&data.videos, self.config.top_count);
        tracing::info!(
            selected = selected.len(),
            metric = %engine.spec(),
            "selected top videos"
        );

        let mut checkpoint = Checkpoint {
            channel_name: data.channel.name.clone(),
            channel_subscribers: data.channel.subscribers.clone(),
            video_analyses: Vec::with_capacity(selected.len()),
            analysis_step: STEP_VIDEO_ANALYSIS.to_string(),
            top_videos: selected.iter().map(|s| s.video.clone()).collect(),
        };

        for (idx, scored) in selected.iter().enumerate() {
            if idx > 0 && !self.config.call_delay.is_zero() {
                tokio::time::sleep(self.config.call_delay).await;
            }

            self.transition(RunState::Analyzing(idx));
            tracing::info!(
                video_id = %scored.video.video_id,
                position = idx + 1,
                total = selected.len(),
                "analysing video"
            );

            let record = self.analyze_video(&scored.video).await;
            checkpoint.video_analyses.push(record);
            self.storage.save_checkpoint(&checkpoint).await?;
        }

        Ok(checkpoint)
    }

    /// Never fails: a service error becomes a sentinel for that sub-analysis only.
    async fn analyze_video(&self, video: &VideoRecord) -> AnalysisRecord {
        let analyst = &self.analyst;

        let title_analysis = self
            .cache
            .get_or_compute(NS_TITLE, &[video.title.as_str()], || analyst.analyze_title(&video.title))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(video_id = %video.video_id, error = %e, "title analysis failed");
                TITLE_ERROR.to_string()
            });

        let thumbnail_analysis = match video.thumbnail_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                let thumb_id = thumbnail_cache_id(url);
                self.cache
                    .get_or_compute(NS_THUMBNAIL, &[thumb_id.as_str()], || analyst.analyze_thumbnail(url))
                    .await
                    .unwrap_or_else(|e| {
                        tracing::warn!(video_id = %video.video_id, error = %e, "thumbnail analysis failed");
                        THUMBNAIL_ERROR.to_string()
                    })
            }
            None => NO_THUMBNAIL.to_string(),
        };

        AnalysisRecord {
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            views: video.views,
            analysis: compose_analysis(video, &title_analysis, &thumbnail_analysis),
        }
    }

    async fn aggregate(&mut self, checkpoint: &Checkpoint) -> Patterns {
        self.transition(RunState::Aggregating);

        if checkpoint.video_analyses.is_empty() {
            tracing::warn!("no analysed videos to aggregate");
            return Patterns {
                text: NO_ANALYSES.to_string(),
                generated: false,
            };
        }

        let all_analyses = checkpoint
            .video_analyses
            .iter()
            .map(|r| r.analysis.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let analyst = &self.analyst;
        match self
            .cache
            .get_or_compute(NS_PATTERNS, &[all_analyses.as_str()], || {
                analyst.generate_patterns(&all_analyses)
            })
            .await
        {
            Ok(text) => Patterns {
                text,
                generated: true,
            },
            Err(e) => {
                tracing::warn!(error = %e, "patterns report failed");
                Patterns {
                    text: PATTERNS_ERROR.to_string(),
                    generated: false,
                }
            }
        }
    }

    /// Writes every artifact it can; any failure fails the run without touching
    /// artifacts already written.
    async fn write_reports(&mut self, checkpoint: &Checkpoint, patterns: &Patterns) -> Result<Vec<PathBuf>> {
        self.transition(RunState::Reporting);

        let results_path = self.config.results_path();
        let ui_path = self.config.ui_path();
        let report_path = self.config.report_path();

        let outcomes = [
            (
                results_path.clone(),
                write_json(&results_path, &raw_results(checkpoint, &patterns.text)).await,
            ),
            (
                ui_path.clone(),
                write_json(&ui_path, &ui_results(checkpoint, &patterns.text)).await,
            ),
            (
                report_path.clone(),
                write_text(&report_path, &markdown_report(checkpoint, &patterns.text)).await,
            ),
        ];

        let mut written = Vec::new();
        let mut failures = Vec::new();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "artifact written");
                    written.push(path);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to write artifact");
                    failures.push(format!("{}: {e}", path.display()));
                }
            }
        }

        if failures.is_empty() {
            Ok(written)
        } else {
            Err(Error::custom(format!(
                "Failed to write {}",
                failures.join("; ")
            )))
        }
    }
}
