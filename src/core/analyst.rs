use crate::config::Config;
use crate::error::{Error, Result};
use async_openai::{
    self,
    types::responses::{
        CreateResponseArgs, EasyInputContent, EasyInputMessageArgs, ImageDetail, InputContent,
        InputImageContent, InputItem, InputParam, InputTextContent, OutputItem,
        OutputMessageContent, ReasoningArgs, ReasoningEffort, Role,
    },
};
use std::env;
use std::future::Future;

const OPENAI_OPT_IN_ENV: &str = "TUBELENS_ALLOW_OPENAI";
const MAX_OUTPUT_TOKENS: u32 = 16_000;

const STRATEGIST_PROMPT: &str = "You are an expert in YouTube content strategy and SEO.";
const THUMBNAIL_PROMPT: &str = "You are an expert in YouTube thumbnail analysis. Examine this thumbnail and identify key elements that make it effective. Focus on composition, colors, text usage, emotional triggers, and clickability factors.";
const PLANNER_PROMPT: &str = "You are an expert YouTube content strategist specializing in creating viral 'Purple Cow' content.";

const PURPLE_COW_CONTEXT: &str = r#"The "Purple Cow" concept, coined by Seth Godin, emphasizes creating content that is truly remarkable.
A Purple Cow stands out from the herd of brown cows: it is exceptional, new and exciting, something people can't help but notice and talk about.
On YouTube, a Purple Cow video isn't just good. It is different, counter-intuitive, surprising or outrageous in a way that grabs attention and sparks conversation.

Key principles:
1. Be remarkable. Don't be boring; create content worth talking about.
2. Niche down, then dominate. Become the go-to, unique voice for a specific audience.
3. Challenge norms. Question assumptions when doing so creates value or intrigue.
4. Solve problems uniquely, or address problems no one else is addressing.
5. Embrace controversy carefully; well-handled contrarian views can be remarkable.
6. Offer exceptional value or entertainment, significantly better or different than the alternatives.
7. Target a specific audience that will get excited and share.
8. Iterate on what works without letting a Purple Cow turn into another brown cow.

The goal is not to appeal to everyone but to create something a specific group will love and share passionately:
irresistible titles, thumbnails that demand clicks, and content that delivers on the promise in an unforgettable way."#;

/// The text/vision service the pipeline asks for qualitative analysis.
///
/// Every operation returns free text. Failures are transient from the
/// pipeline's point of view and are never cached.
pub trait Analyst {
    fn analyze_title(&self, title: &str) -> impl Future<Output = Result<String>> + Send;

    fn analyze_thumbnail(&self, thumbnail_url: &str)
    -> impl Future<Output = Result<String>> + Send;

    fn generate_patterns(&self, all_analyses: &str) -> impl Future<Output = Result<String>> + Send;

    /// Expected to answer with a JSON object of topics for one video.
    fn extract_topics(
        &self,
        title: &str,
        description: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Expected to answer with a JSON list of `{title, description}` ideas.
    fn generate_ideas(
        &self,
        channel_summary: &str,
        count: usize,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Clone)]
pub struct OpenAiAnalyst {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    text_model: String,
    vision_model: String,
}

impl OpenAiAnalyst {
    pub fn new(config: &Config) -> Self {
        Self {
            client: async_openai::Client::new(),
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
        }
    }

    async fn respond(
        &self,
        model: &str,
        system: &str,
        content: impl Into<EasyInputContent>,
    ) -> Result<String> {
        enforce_openai_opt_in()?;

        let request = CreateResponseArgs::default()
            .max_output_tokens(MAX_OUTPUT_TOKENS)
            .model(model)
            .reasoning(ReasoningArgs::default().effort(ReasoningEffort::Low).build()?)
            .input(InputParam::Items(vec![
                InputItem::EasyMessage(
                    EasyInputMessageArgs::default()
                        .role(Role::System)
                        .content(system)
                        .build()?,
                ),
                InputItem::EasyMessage(
                    EasyInputMessageArgs::default()
                        .role(Role::User)
                        .content(content)
                        .build()?,
                ),
            ]))
            .build()?;

        let response = self.client.responses().create(request).await?;

        let mut text = String::new();
        for output in response.output {
            if let OutputItem::Message(out) = output {
                for c in out.content {
                    match c {
                        OutputMessageContent::OutputText(t) => text.push_str(&t.text),
                        other => tracing::debug!(content = ?other, "skipping non-text output"),
                    }
                }
            }
        }

        if text.trim().is_empty() {
            return Err(Error::custom(format!("{model} returned an empty response")));
        }

        Ok(text)
    }
}

impl Analyst for OpenAiAnalyst {
    async fn analyze_title(&self, title: &str) -> Result<String> {
        tracing::info!(title, "requesting title analysis");
        let prompt = format!(
            "Analyze this video title and identify key patterns and elements that make it effective. \
             Focus on psychological triggers, keywords, structure, emotion, and clarity. \
             Use numbered headers such as \"1. Psychological Triggers:\" for each aspect.\n\n\
             Title: \"{title}\""
        );
        self.respond(&self.text_model, STRATEGIST_PROMPT, prompt).await
    }

    async fn analyze_thumbnail(&self, thumbnail_url: &str) -> Result<String> {
        tracing::info!(thumbnail_url, "requesting thumbnail analysis");
        let content = EasyInputContent::ContentList(vec![
            InputContent::InputText(InputTextContent {
                text: "Analyze this YouTube thumbnail and explain why it's effective. \
                       Use bold headers such as **Composition** for each aspect."
                    .to_string(),
            }),
            InputContent::InputImage(InputImageContent {
                detail: ImageDetail::Auto,
                file_id: None,
                image_url: Some(thumbnail_url.to_string()),
            }),
        ]);
        self.respond(&self.vision_model, THUMBNAIL_PROMPT, content).await
    }

    async fn generate_patterns(&self, all_analyses: &str) -> Result<String> {
        tracing::info!(chars = all_analyses.len(), "requesting patterns report");
        let prompt = format!(
            "Based on the analyses of multiple top-performing videos, identify common patterns, \
             success factors, and actionable recommendations. Be specific and detailed. \
             Start every section with a markdown heading (###).\n\n{all_analyses}"
        );
        self.respond(&self.text_model, STRATEGIST_PROMPT, prompt).await
    }

    async fn extract_topics(&self, title: &str, description: &str) -> Result<String> {
        tracing::info!(title, "requesting topic extraction");
        let description = if description.trim().is_empty() {
            "No description provided."
        } else {
            description
        };
        let prompt = format!(
            r#"Analyze the following YouTube video title and description to identify its core content.
Provide the output as a JSON object with the following keys:
- "primary_topic": A concise phrase for the main subject.
- "secondary_topics": A list of 2-4 secondary subjects or keywords.
- "overall_theme": A short sentence describing the overarching theme or message.
- "content_category": A broad content category (e.g. "Educational", "Entertainment", "Review", "Tutorial", "Vlog").

Title: "{title}"
Description: "{description}"

Return ONLY the JSON object. Ensure the JSON is valid."#
        );
        self.respond(&self.text_model, STRATEGIST_PROMPT, prompt).await
    }

    async fn generate_ideas(&self, channel_summary: &str, count: usize) -> Result<String> {
        tracing::info!(count, "requesting content ideas");
        let prompt = format!(
            r#"Generate {count} new, unique, and remarkable video ideas for a YouTube channel.

First, understand the "Purple Cow" concept:
{PURPLE_COW_CONTEXT}

Now, consider the channel's existing successful content:
{channel_summary}

Each idea must embody the Purple Cow principles. For each idea provide:
- "title": A catchy, attention-grabbing title.
- "description": 1-3 sentences explaining the concept and what makes it remarkable.

Return the ideas as a JSON list of objects with "title" and "description" keys, for example:
[
  {{ "title": "Idea 1 Title", "description": "Description for Idea 1..." }}
]
Ensure the JSON is valid. The ideas should be distinct from one another."#
        );
        self.respond(&self.text_model, PLANNER_PROMPT, prompt).await
    }
}

fn enforce_openai_opt_in() -> Result<()> {
    match env::var(OPENAI_OPT_IN_ENV) {
        Ok(val)
            if matches!(
                val.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            ) =>
        {
            Ok(())
        }
        _ => Err(Error::custom(format!(
            "Analysis requires explicit opt-in. Set {OPENAI_OPT_IN_ENV}=1 to enable uploads to OpenAI."
        ))),
    }
}

/// Removes markdown code fences models like to wrap JSON answers in.
pub fn strip_code_fences(text: &str) -> String {
    text.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::strip_code_fences;

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  [1, 2]  "), "[1, 2]");
    }
}
