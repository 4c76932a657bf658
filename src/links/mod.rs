use anyhow::Result;
use regex::Regex;
use url::Url;

/// Facebook and Instagram video links the extraction API understands
pub const VIDEO_LINK_PATTERN: &str = r"(?i)https?://(?:www\.)?(facebook\.com/(?:watch/\?v=|username/videos/|video\.php\?v=|share/(?:r|v)/|videos/\w+|[\d]+/videos/[\d]+(?:\?__so__=permalink)?)|instagram\.com/(?:reel/|p/|USERNAME/media/))([\w-]+)";

/// How a link reached the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Explicit command with the URL as its argument; a bad argument gets a reply
    Command,
    /// Any chat message; messages without a video link are ignored
    PassiveScan,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Command => write!(f, "command"),
            Trigger::PassiveScan => write!(f, "scan"),
        }
    }
}

/// Recognises supported video links in user input
#[derive(Debug, Clone)]
pub struct LinkMatcher {
    pattern: Regex,
}

impl LinkMatcher {
    pub fn new() -> Result<Self> {
        Self::with_pattern(VIDEO_LINK_PATTERN)
    }

    pub fn with_pattern(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn is_supported(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Return the normalised video URL carried by `text`, if any.
    ///
    /// A command argument must itself be the link; a scanned message may contain the link
    /// anywhere, and the first one wins.
    pub fn classify(&self, trigger: Trigger, text: &str) -> Option<String> {
        match trigger {
            Trigger::Command => {
                let candidate = strip_wrapping(text.trim());
                if candidate.contains(char::is_whitespace) || !self.is_supported(candidate) {
                    return None;
                }
                normalize(candidate)
            }
            Trigger::PassiveScan => text
                .split_whitespace()
                .map(strip_wrapping)
                .filter(|token| self.is_supported(token))
                .find_map(|token| {
                    // Only the matched link, not punctuation glued to it
                    let start = self.pattern.find(token)?.start();
                    normalize(&token[start..])
                }),
        }
    }
}

/// Chat clients wrap links in `<...>` to suppress previews
fn strip_wrapping(token: &str) -> &str {
    token
        .trim_start_matches('<')
        .trim_end_matches(|c| matches!(c, '>' | ',' | '.' | ')' | '!'))
}

fn normalize(candidate: &str) -> Option<String> {
    let parsed = Url::parse(candidate).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    Some(parsed.to_string())
}
