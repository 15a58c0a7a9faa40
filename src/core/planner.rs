use crate::config::Config;
use crate::core::analyst::{Analyst, strip_code_fences};
use crate::core::cache::{CacheStore, NS_TOPICS, ResponseCache};
use crate::core::model::{ContentIdea, TopicAnalysis, VideoRecord};
use crate::core::scoring::{MetricSpec, ScoringEngine};
use crate::core::storage::{StorageService, write_text};
use crate::error::{Error, Result};
use std::path::PathBuf;

pub const DEFAULT_PLAN_VIDEOS: usize = 5;
pub const DEFAULT_IDEAS: usize = 7;
const MAX_EXAMPLE_TITLES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub topics: Vec<TopicAnalysis>,
    pub ideas: Vec<ContentIdea>,
    /// `None` when no ideas came back and nothing was written.
    pub plan_path: Option<PathBuf>,
}

pub struct ContentPlanner<A, S> {
    config: Config,
    analyst: A,
    cache: ResponseCache<S>,
    engine: ScoringEngine,
}

impl<A: Analyst, S: CacheStore> ContentPlanner<A, S> {
    pub fn new(config: Config, analyst: A, store: S) -> Self {
        Self {
            config,
            analyst,
            cache: ResponseCache::new(store),
            engine: ScoringEngine::new(MetricSpec::retention_and_shares()),
        }
    }

    pub async fn run(&self, video_count: usize, idea_count: usize) -> Result<PlanOutcome> {
        let data = StorageService::load_channel_data(&self.config.data_path).await?;

        let selected = self.engine.top_k(&data.videos, video_count);
        if selected.is_empty() {
            return Err(Error::custom(
                "No top videos selected; the data file has no videos to plan from",
            ));
        }
        tracing::info!(selected = selected.len(), metric = %self.engine.spec(), "selected videos for planning");

        let mut topics = Vec::with_capacity(selected.len());
        for scored in &selected {
            topics.push(self.topics_for(&scored.video).await);
        }

        let summary = channel_summary(&topics);
        tracing::debug!(summary = %summary, "channel summary");

        let ideas = self.ideas(&summary, idea_count).await;
        if ideas.is_empty() {
            tracing::warn!("no content ideas generated, plan not written");
            return Ok(PlanOutcome {
                topics,
                ideas,
                plan_path: None,
            });
        }

        let path = self.config.plan_path();
        write_text(&path, &render_plan(&topics, &ideas)).await?;
        tracing::info!(path = %path.display(), ideas = ideas.len(), "content plan written");

        Ok(PlanOutcome {
            topics,
            ideas,
            plan_path: Some(path),
        })
    }

    /// Only answers that parse as a topic object are cached.
    async fn topics_for(&self, video: &VideoRecord) -> TopicAnalysis {
        let description = video.description.as_deref().unwrap_or_default();
        let analyst = &self.analyst;

        let answer = self
            .cache
            .get_or_compute(NS_TOPICS, &[video.title.as_str(), description], || async move {
                let raw = analyst.extract_topics(&video.title, description).await?;
                let cleaned = strip_code_fences(&raw);
                serde_json::from_str::<TopicAnalysis>(&cleaned)?;
                Ok::<_, Error>(cleaned)
            })
            .await
            .and_then(|text| Ok(serde_json::from_str::<TopicAnalysis>(&text)?));

        let mut topics = answer.unwrap_or_else(|e| {
            tracing::warn!(video_id = %video.video_id, error = %e, "topic extraction failed");
            TopicAnalysis::extraction_error()
        });
        topics.original_title = Some(video.title.clone());
        topics
    }

    async fn ideas(&self, summary: &str, count: usize) -> Vec<ContentIdea> {
        let parsed = match self.analyst.generate_ideas(summary, count).await {
            Ok(raw) => serde_json::from_str::<Vec<ContentIdea>>(&strip_code_fences(&raw))
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(ideas) => ideas,
            Err(e) => {
                tracing::warn!(error = %e, "idea generation failed");
                Vec::new()
            }
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// One paragraph describing what already works on the channel.
pub fn channel_summary(topics: &[TopicAnalysis]) -> String {
    let mut primary = Vec::new();
    let mut categories = Vec::new();
    let mut examples = Vec::new();

    for t in topics {
        if !t.is_error() && t.primary_topic != "N/A" {
            push_unique(&mut primary, &t.primary_topic);
        }
        if t.content_category != "Unknown" && t.content_category != "N/A" {
            push_unique(&mut categories, &t.content_category);
        }
        if !t.is_error()
            && let Some(title) = &t.original_title
            && examples.len() < MAX_EXAMPLE_TITLES
        {
            examples.push(title.clone());
        }
    }

    let primary = if primary.is_empty() {
        "various topics".to_string()
    } else {
        primary.join(", ")
    };
    let categories = if categories.is_empty() {
        "diverse".to_string()
    } else {
        categories.join(", ")
    };
    let examples = if examples.is_empty() {
        String::new()
    } else {
        format!(
            " achieving high engagement with content like \"{}\".",
            examples.join("; ")
        )
    };

    format!(
        "This channel has found success with videos primarily about [{primary}] in the [{categories}] category{examples}"
    )
}

pub fn render_plan(topics: &[TopicAnalysis], ideas: &[ContentIdea]) -> String {
    let mut out = String::from("# YouTube Content Strategy: The Purple Cow Plan\n\n");

    out.push_str("## Analysis of Top Performing Content (Inspiration)\n\n");
    if topics.is_empty() {
        out.push_str("No top video analyses were available to summarize.\n\n");
    }
    for t in topics {
        out.push_str(&format!(
            "### Top Video: \"{}\"\n",
            t.original_title.as_deref().unwrap_or("Unknown Title")
        ));
        out.push_str(&format!("- **Primary Topic:** {}\n", t.primary_topic));
        out.push_str(&format!("- **Overall Theme:** {}\n", t.overall_theme));
        out.push_str(&format!("- **Content Category:** {}\n\n", t.content_category));
    }

    out.push_str("## Generated 'Purple Cow' Video Ideas\n\n");
    if ideas.is_empty() {
        out.push_str("No content ideas were generated.\n");
    }
    for (idx, idea) in ideas.iter().enumerate() {
        let title = if idea.title.is_empty() {
            "No Title Provided"
        } else {
            &idea.title
        };
        let description = if idea.description.is_empty() {
            "No description provided."
        } else {
            &idea.description
        };
        out.push_str(&format!("### Idea {}: {title}\n{description}\n\n", idx + 1));
    }

    out
}
