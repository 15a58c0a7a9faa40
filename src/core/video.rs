use crate::error::{Error, Result};

const MAX_ID_LEN: usize = 128;

const CHANNEL_HOSTS: [&str; 3] = ["youtube.com", "www.youtube.com", "m.youtube.com"];

/// Channel id used to suffix output file names.
///
/// Accepts a bare id (`UC...`), a handle (`@name`), or a channel page URL such as
/// `https://www.youtube.com/channel/<id>` or `youtube.com/@name/videos`.
/// Handles keep their name without the `@`.
pub fn channel_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let candidate = channel_from_url(trimmed).unwrap_or(trimmed);
    let candidate = candidate.strip_prefix('@').unwrap_or(candidate);

    if candidate.is_empty() {
        return Err(Error::custom("Channel id cannot be empty"));
    }

    if candidate.len() > MAX_ID_LEN {
        return Err(Error::custom("Channel id is unexpectedly long"));
    }

    if !candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        || candidate.starts_with('.')
    {
        return Err(Error::custom(format!(
            "Channel id '{candidate}' contains unsupported characters; expected letters, numbers, '-', '_' or '.'"
        )));
    }

    Ok(candidate.to_string())
}

fn channel_from_url(raw: &str) -> Option<&str> {
    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);

    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let host = segments.next()?;
    if !CHANNEL_HOSTS.contains(&host.to_ascii_lowercase().as_str()) {
        return None;
    }

    match segments.next()? {
        "channel" | "c" | "user" => segments.next(),
        handle if handle.starts_with('@') => Some(handle),
        _ => None,
    }
}

/// Identifier a thumbnail analysis is cached under.
///
/// YouTube thumbnails live at `.../vi/<video_id>/<variant>.jpg`, so the path
/// segment after `vi` names the video. Other URLs fall back to their file stem.
pub fn thumbnail_cache_id(thumbnail_url: &str) -> String {
    let path = thumbnail_url
        .split(['?', '#'])
        .next()
        .unwrap_or(thumbnail_url);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(pos) = segments.iter().position(|s| *s == "vi" || *s == "vi_webp")
        && let Some(id) = segments.get(pos + 1)
    {
        return (*id).to_string();
    }

    let file = segments.last().copied().unwrap_or(path);
    file.split('.').next().unwrap_or(file).to_string()
}
