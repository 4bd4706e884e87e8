//! Speech fluency signals derived from word-level timings.
//!
//! Two independent signals come out of a candidate's speech: timing gaps
//! between consecutive words (long pauses) and textual disfluency markers
//! ("um", "uh", ...). They measure different things and are reported
//! separately, never summed into one score.

use serde::{Deserialize, Serialize};

/// Disfluency markers counted in the transcript text, word-boundary matched.
pub const HESITATION_MARKERS: [&str; 7] = ["um", "uh", "er", "ah", "hmm", "like", "you know"];

/// An inter-word gap longer than this counts as a long pause.
pub const LONG_PAUSE_SECONDS: f64 = 2.0;

/// One recognized word with its timing, in seconds from recording start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FluencyReport {
    pub words_per_minute: u32,
    pub long_pauses: usize,
    pub hesitations: usize,
    pub average_word_duration: f64,
    pub speech_variability: f64,
}

/// Analyze one speaker's speech. `words` must be in time order; the timing
/// metrics are zero when no word timings are available, the hesitation count
/// comes from the text alone.
pub fn analyze(transcript: &str, words: &[TimedWord]) -> FluencyReport {
    let hesitations = count_hesitations(transcript);

    if words.is_empty() {
        return FluencyReport {
            hesitations,
            ..Default::default()
        };
    }

    let span_minutes = (words[words.len() - 1].end - words[0].start) / 60.0;
    let words_per_minute = if span_minutes > 0.0 {
        (words.len() as f64 / span_minutes).round() as u32
    } else {
        0
    };

    let long_pauses = words
        .windows(2)
        .filter(|pair| pair[1].start - pair[0].end > LONG_PAUSE_SECONDS)
        .count();

    let durations: Vec<f64> = words.iter().map(|w| w.end - w.start).collect();
    let average_word_duration = durations.iter().sum::<f64>() / durations.len() as f64;
    let variance = durations
        .iter()
        .map(|d| (d - average_word_duration).powi(2))
        .sum::<f64>()
        / durations.len() as f64;

    FluencyReport {
        words_per_minute,
        long_pauses,
        hesitations,
        average_word_duration,
        speech_variability: variance.sqrt(),
    }
}

fn count_hesitations(transcript: &str) -> usize {
    let text = transcript.to_lowercase();
    HESITATION_MARKERS
        .iter()
        .map(|marker| count_boundary_matches(&text, marker))
        .sum()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Occurrences of `needle` in `text` delimited by non-word characters on
/// both sides. `needle` is lowercase ASCII and may contain a space.
fn count_boundary_matches(text: &str, needle: &str) -> usize {
    let mut count = 0;
    let mut search_from = 0;
    while let Some(pos) = text[search_from..].find(needle) {
        let begin = search_from + pos;
        let end = begin + needle.len();
        let boundary_before = text[..begin].chars().next_back().is_none_or(|c| !is_word_char(c));
        let boundary_after = text[end..].chars().next().is_none_or(|c| !is_word_char(c));
        if boundary_before && boundary_after {
            count += 1;
        }
        search_from = begin + 1;
    }
    count
}
