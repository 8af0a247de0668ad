//! Shared SRT cue-building rules (design doc §4.6 "SRT construction rules",
//! reused for re-timing in §4.7). A single source of truth so transcription
//! and translation never drift on cue-splitting behavior.

use serde::{Deserialize, Serialize};

pub const MAX_CHARS: usize = 40;
pub const MAX_DURATION: f64 = 5.0;

/// A word with absolute start/end offsets in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// One subtitle cue (design doc GLOSSARY: "Cue").
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// Build cues from an ordered word list (§4.6 rules): start a new cue with
/// the first word; close the current cue and start a new one when the next
/// word would exceed `MAX_CHARS` or make `(word.start - cue.start) >
/// MAX_DURATION`. A single long word can still force one bound past the
/// other (P6).
pub fn build_cues(words: &[Word]) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut current: Option<(f64, f64, String)> = None;

    for word in words {
        match &mut current {
            None => {
                current = Some((word.start_seconds, word.end_seconds, word.text.clone()));
            }
            Some((cue_start, cue_end, text)) => {
                let candidate_len = text.len() + 1 + word.text.len();
                let candidate_duration = word.start_seconds - *cue_start;

                if candidate_len > MAX_CHARS || candidate_duration > MAX_DURATION {
                    cues.push(Cue {
                        index: cues.len() + 1,
                        start_seconds: *cue_start,
                        end_seconds: *cue_end,
                        text: text.clone(),
                    });
                    current = Some((word.start_seconds, word.end_seconds, word.text.clone()));
                } else {
                    text.push(' ');
                    text.push_str(&word.text);
                    *cue_end = word.end_seconds;
                }
            }
        }
    }

    if let Some((start, end, text)) = current {
        cues.push(Cue {
            index: cues.len() + 1,
            start_seconds: start,
            end_seconds: end,
            text,
        });
    }

    cues
}

/// Render cues as an SRT document (§6: blocks separated by a single blank
/// line, `index\nHH:MM:SS,mmm --> HH:MM:SS,mmm\ntext`).
pub fn render_srt(cues: &[Cue]) -> String {
    cues.iter()
        .map(|cue| {
            format!(
                "{}\n{} --> {}\n{}\n",
                cue.index,
                format_timestamp(cue.start_seconds),
                format_timestamp(cue.end_seconds),
                cue.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// Parsed cue read back from an already-produced `.orig.srt` file, used by
/// the translation engine's re-timing step (§4.7 step 10).
#[derive(Debug, Clone)]
pub struct ParsedCue {
    pub index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

pub fn parse_srt(contents: &str) -> Vec<ParsedCue> {
    let mut cues = Vec::new();
    for block in contents.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let mut lines = block.lines();
        let Some(index_line) = lines.next() else { continue };
        let Ok(index) = index_line.trim().parse::<usize>() else { continue };
        let Some(time_line) = lines.next() else { continue };
        let Some((start, end)) = time_line.split_once("-->") else { continue };
        let Some(start_seconds) = parse_timestamp(start.trim()) else { continue };
        let Some(end_seconds) = parse_timestamp(end.trim()) else { continue };
        let text = lines.collect::<Vec<_>>().join("\n");
        cues.push(ParsedCue {
            index,
            start_seconds,
            end_seconds,
            text,
        });
    }
    cues
}

fn parse_timestamp(s: &str) -> Option<f64> {
    let (hms, ms) = s.split_once(',')?;
    let mut parts = hms.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    let millis: f64 = ms.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds + millis / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64) -> Word {
        Word {
            text: text.to_string(),
            start_seconds: start,
            end_seconds: end,
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1.5), "00:00:01,500");
        assert_eq!(format_timestamp(3661.123), "01:01:01,123");
    }

    #[test]
    fn test_build_cues_empty_words_yields_no_cues() {
        assert!(build_cues(&[]).is_empty());
    }

    #[test]
    fn test_build_cues_splits_on_max_chars() {
        let words = vec![
            word("this", 0.0, 0.5),
            word("sentence", 0.5, 1.0),
            word("keeps", 1.0, 1.5),
            word("going", 1.5, 2.0),
            word("and", 2.0, 2.2),
            word("going", 2.2, 2.5),
            word("past", 2.5, 2.8),
            word("forty", 2.8, 3.1),
            word("characters", 3.1, 3.6),
        ];
        let cues = build_cues(&words);
        assert!(cues.len() > 1);
        for cue in &cues {
            assert!(cue.text.len() <= MAX_CHARS || cue.text.split(' ').count() == 1);
        }
    }

    #[test]
    fn test_build_cues_splits_on_max_duration() {
        let words = vec![word("a", 0.0, 0.1), word("b", 6.0, 6.1)];
        let cues = build_cues(&words);
        assert_eq!(cues.len(), 2);
    }

    #[test]
    fn test_cue_indices_are_contiguous() {
        let words = vec![
            word("one", 0.0, 0.5),
            word("two", 6.0, 6.5),
            word("three", 12.0, 12.5),
        ];
        let cues = build_cues(&words);
        for (i, cue) in cues.iter().enumerate() {
            assert_eq!(cue.index, i + 1);
        }
    }

    #[test]
    fn test_render_and_parse_srt_roundtrip() {
        let words = vec![word("hello", 1.5, 2.0), word("world", 2.1, 2.6)];
        let cues = build_cues(&words);
        let srt = render_srt(&cues);
        assert!(srt.starts_with("1\n00:00:01,500 --> 00:00:02,600\nhello world\n"));

        let parsed = parse_srt(&srt);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text, "hello world");
        assert!((parsed[0].start_seconds - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_render_srt_exact_two_cue_output() {
        use pretty_assertions::assert_eq;

        let words = vec![
            word("hello", 1.5, 2.0),
            word("world", 2.1, 2.6),
            word("again", 10.0, 10.5),
        ];
        let cues = build_cues(&words);
        let srt = render_srt(&cues);

        let expected = "1\n00:00:01,500 --> 00:00:02,600\nhello world\n\n\
2\n00:00:10,000 --> 00:00:10,500\nagain\n";
        assert_eq!(srt, expected);
    }

    proptest::proptest! {
        #[test]
        fn prop_cue_indices_always_contiguous(
            starts in proptest::collection::vec(0.0f64..1000.0, 0..30)
        ) {
            let mut sorted = starts;
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let words: Vec<Word> = sorted
                .iter()
                .enumerate()
                .map(|(i, s)| word(&format!("w{i}"), *s, s + 0.2))
                .collect();
            let cues = build_cues(&words);
            for (i, cue) in cues.iter().enumerate() {
                proptest::prop_assert_eq!(cue.index, i + 1);
                proptest::prop_assert!(cue.end_seconds >= cue.start_seconds);
            }
        }
    }
}
