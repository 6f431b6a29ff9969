/// One timed subtitle entry; times are in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl SubtitleCue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    /// Non-speech cues such as `[door slams]`, `(laughs)` or `♪ ... ♪`.
    pub fn is_sound_effect(&self) -> bool {
        let text = self.text.trim();
        if text.is_empty() {
            return false;
        }
        let enclosed = |open: char, close: char| {
            text.starts_with(open) && text.ends_with(close) && text.len() > 1
        };
        if enclosed('[', ']') || enclosed('(', ')') {
            return true;
        }
        text.chars()
            .filter(|c| !c.is_whitespace())
            .all(|c| c == '♪' || c == '♫' || c == '#')
            || (text.starts_with('♪') && text.ends_with('♪'))
    }
}
