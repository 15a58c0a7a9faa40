use crate::core::model::{VideoRecord, display_metric};
use serde::Serialize;
use serde::ser::SerializeMap;

pub const MARKER_VIDEO: &str = "=== ANALYSIS FOR VIDEO: ";
pub const MARKER_METRICS: &str = "VIDEO METRICS:";
pub const MARKER_TITLE: &str = "TITLE ANALYSIS:";
pub const MARKER_THUMBNAIL: &str = "THUMBNAIL ANALYSIS:";
pub const MARKER_URL: &str = "VIDEO URL:";
pub const RULE: &str = "==========================================================";

const TITLE_OPEN: &str = "ANALYSIS FOR VIDEO: ";
const TITLE_CLOSE: &str = " ===";
const KNOWN_MARKERS: &[&str] = &[MARKER_METRICS, MARKER_TITLE, MARKER_THUMBNAIL, MARKER_URL];
const MAX_NUMBER_DIGITS: usize = 2;
const MIN_CAPS_HEADER_LEN: usize = 6;

/// Insertion-ordered name → text map, serialized as a JSON object in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sections(Vec<(String, String)>);

impl Sections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a section; an existing name keeps its position and takes the new text.
    pub fn insert(&mut self, name: String, text: String) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = text,
            None => self.0.push((name, text)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, text)| text.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, t)| (n.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Sections {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, text) in &self.0 {
            map.serialize_entry(name, text)?;
        }
        map.end()
    }
}

/// A delimited region of a response together with the sections found inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Region {
    pub full_text: String,
    pub sections: Sections,
}

impl Region {
    pub fn parse(text: &str) -> Self {
        Self {
            full_text: text.to_string(),
            sections: parse_sections(text),
        }
    }
}

/// Structured view of one combined per-video analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuredAnalysis {
    pub title: String,
    pub metrics: Sections,
    pub title_analysis: Region,
    pub thumbnail_analysis: Region,
    pub video_url: String,
}

enum Line<'a> {
    Blank,
    Header(String),
    Content(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if line.is_empty() {
        return Line::Blank;
    }

    let is_header = KNOWN_MARKERS.iter().any(|m| line.starts_with(m))
        || is_markdown_heading(line)
        || numbered_rest(line).is_some()
        || (line.len() >= 4 && line.starts_with("**") && line.ends_with("**"))
        || is_caps_line(line);

    if is_header {
        return Line::Header(header_name(line));
    }

    Line::Content(line)
}

/// Text after an `N.` prefix, where N has at most two digits and is followed by
/// whitespace, markup or the end of the line (so `1.5 million` is not a header).
fn numbered_rest(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > MAX_NUMBER_DIGITS {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == '*' => Some(rest),
        Some(_) => None,
    }
}

fn is_markdown_heading(line: &str) -> bool {
    line.starts_with('#') && line.trim_start_matches('#').starts_with(' ')
}

fn is_caps_line(line: &str) -> bool {
    line.chars().count() >= MIN_CAPS_HEADER_LEN
        && line.chars().any(char::is_uppercase)
        && !line.chars().any(char::is_lowercase)
}

/// Header text without numbering or markup, lower-cased, cut at the first colon.
fn header_name(line: &str) -> String {
    let mut name = line.trim_start_matches('#').trim();
    if let Some(rest) = numbered_rest(name) {
        name = rest;
    }
    let name = name.replace("**", "").to_lowercase();
    let name = match name.split_once(':') {
        Some((head, _)) => head,
        None => name.as_str(),
    };
    name.trim().to_string()
}

/// Scans `text` line by line, opening a section at every header.
///
/// Lines before the first header are dropped, blank lines are skipped and a
/// header with no content under it produces no section. A header whose name is
/// empty (a bare `2.`) closes the open section and drops what follows it.
pub fn parse_sections(text: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for raw in text.lines() {
        match classify(raw.trim()) {
            Line::Blank => {}
            Line::Header(name) => {
                close_section(&mut sections, current.take(), &mut buffer);
                current = (!name.is_empty()).then_some(name);
            }
            Line::Content(line) => {
                if current.is_some() {
                    buffer.push(line);
                }
            }
        }
    }
    close_section(&mut sections, current, &mut buffer);

    sections
}

fn close_section(sections: &mut Sections, name: Option<String>, buffer: &mut Vec<&str>) {
    if let Some(name) = name
        && !buffer.is_empty()
    {
        sections.insert(name, buffer.join("\n"));
    }
    buffer.clear();
}

/// Text following `open`, cut at the earliest of `closers` (or the end).
fn region<'a>(text: &'a str, open: &str, closers: &[&str]) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let rest = &text[start..];
    let end = closers
        .iter()
        .filter_map(|c| rest.find(c))
        .min()
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn parse_metrics(block: &str) -> Sections {
    let mut metrics = Sections::new();
    for line in block.lines().map(str::trim) {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.replace('-', "").trim().to_lowercase().replace(' ', "_");
            if !key.is_empty() {
                metrics.insert(key, value.trim().to_string());
            }
        }
    }
    metrics
}

/// Splits a combined analysis on its literal markers, then scans the title
/// and thumbnail regions for sections. Absent markers yield empty fields.
pub fn parse_analysis(text: &str) -> StructuredAnalysis {
    let title = region(text, TITLE_OPEN, &[TITLE_CLOSE, "\n"]).unwrap_or_default();
    let metrics = region(text, MARKER_METRICS, &[MARKER_TITLE]).unwrap_or_default();
    let title_block =
        region(text, MARKER_TITLE, &[MARKER_THUMBNAIL, MARKER_URL]).unwrap_or_default();
    let thumbnail_block = region(text, MARKER_THUMBNAIL, &[MARKER_URL]).unwrap_or_default();
    let url = region(text, MARKER_URL, &[RULE]).unwrap_or_default();

    StructuredAnalysis {
        title: title.trim().to_string(),
        metrics: parse_metrics(metrics),
        title_analysis: Region::parse(title_block.trim()),
        thumbnail_analysis: Region::parse(thumbnail_block.trim()),
        video_url: url.trim().to_string(),
    }
}

/// Assembles the per-video blob that [`parse_analysis`] reads back.
pub fn compose_analysis(video: &VideoRecord, title_analysis: &str, thumbnail_analysis: &str) -> String {
    let published = video
        .published_at
        .as_deref()
        .map(format_published)
        .unwrap_or_else(|| "N/A".to_string());
    let avg_duration = video.avg_view_duration.as_deref().unwrap_or("N/A");
    let engagement = display_metric(video.engagement_rate);
    let retention = display_metric(video.retention_rate);

    format!(
        "{MARKER_VIDEO}{title} ===\n\
         \n\
         {MARKER_METRICS}\n\
         - Views: {views}\n\
         - Likes: {likes}\n\
         - Comments: {comments}\n\
         - Shares: {shares}\n\
         - Engagement Rate: {engagement}{engagement_unit}\n\
         - Avg View Duration: {avg_duration} ({retention}{retention_unit} retention)\n\
         - Published: {published}\n\
         \n\
         {MARKER_TITLE}\n\
         {title_analysis}\n\
         \n\
         {MARKER_THUMBNAIL}\n\
         {thumbnail_analysis}\n\
         \n\
         {MARKER_URL} {url}\n\
         {RULE}\n",
        title = video.title,
        views = display_metric(video.views),
        likes = display_metric(video.likes),
        comments = display_metric(video.comments),
        shares = display_metric(video.shares),
        engagement_unit = if video.engagement_rate.is_some() { "%" } else { "" },
        retention_unit = if video.retention_rate.is_some() { "%" } else { "" },
        title_analysis = title_analysis.trim(),
        thumbnail_analysis = thumbnail_analysis.trim(),
        url = video.url(),
    )
}

fn format_published(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
