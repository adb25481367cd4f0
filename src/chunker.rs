//! Sliding word-window chunking for extracted document text.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default window size in words.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default number of words shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Validated window parameters. Construct through [`ChunkConfig::new`];
/// deserialization goes through the same checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkConfig")]
pub struct ChunkConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkConfig {
    /// Builds a chunk configuration, rejecting windows that would not advance.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::Zero("chunk size"));
        }
        if overlap >= chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Window size in words.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Words shared between consecutive windows.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance in words between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

#[derive(Deserialize)]
struct RawChunkConfig {
    chunk_size: usize,
    overlap: usize,
}

impl TryFrom<RawChunkConfig> for ChunkConfig {
    type Error = ConfigError;

    fn try_from(raw: RawChunkConfig) -> Result<Self, Self::Error> {
        Self::new(raw.chunk_size, raw.overlap)
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// One window of a document, with the word offset it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    /// Index of the first word of the window within the document.
    pub word_offset: usize,
    /// Window words joined by single spaces.
    pub text: String,
}

/// Splits `text` into overlapping word windows.
///
/// A window starts at every multiple of `config.step()` below the word count,
/// so the tail of a document is covered by progressively shorter windows.
pub fn chunk_windows(text: &str, config: &ChunkConfig) -> Vec<TextWindow> {
    let words: Vec<&str> = text.split_whitespace().collect();
    (0..words.len())
        .step_by(config.step())
        .filter_map(|start| {
            let end = (start + config.chunk_size).min(words.len());
            let joined = words[start..end].join(" ");
            if joined.trim().is_empty() {
                return None;
            }
            Some(TextWindow {
                word_offset: start,
                text: joined,
            })
        })
        .collect()
}

/// Convenience wrapper around [`chunk_windows`] that drops offsets.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    chunk_windows(text, config)
        .into_iter()
        .map(|window| window.text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|i| format!("w{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert_eq!(
            ChunkConfig::new(100, 100),
            Err(ConfigError::OverlapTooLarge {
                chunk_size: 100,
                overlap: 100
            })
        );
        assert!(ChunkConfig::new(100, 250).is_err());
        assert_eq!(ChunkConfig::new(0, 0), Err(ConfigError::Zero("chunk size")));
    }

    #[test]
    fn deserialized_config_is_validated() {
        let err = serde_json::from_str::<ChunkConfig>(r#"{"chunk_size":100,"overlap":100}"#)
            .unwrap_err();
        assert!(err.to_string().contains("must be smaller"));
        assert!(serde_json::from_str::<ChunkConfig>(r#"{"chunk_size":10,"overlap":20}"#).is_err());

        let config: ChunkConfig =
            serde_json::from_str(r#"{"chunk_size":4,"overlap":1}"#).unwrap();
        assert_eq!(config.step(), 3);
        assert_eq!(chunk_text("a b c d e", &config), vec!["a b c d", "d e"]);
    }

    #[test]
    fn short_document_yields_single_chunk() {
        let config = ChunkConfig::default();
        let chunks = chunk_text(&numbered_words(300), &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].split_whitespace().count(), 300);
    }

    #[test]
    fn long_document_steps_by_size_minus_overlap() {
        let config = ChunkConfig::default();
        let windows = chunk_windows(&numbered_words(1200), &config);
        let offsets: Vec<usize> = windows.iter().map(|w| w.word_offset).collect();
        assert_eq!(offsets, vec![0, 400, 800]);
        assert!(windows[0].text.starts_with("w0 w1"));
        assert!(windows[1].text.starts_with("w400 "));
        assert!(windows[2].text.ends_with("w1199"));
    }

    #[test]
    fn consecutive_chunks_share_overlap_words() {
        let config = ChunkConfig::new(10, 3).expect("valid config");
        let chunks = chunk_text(&numbered_words(40), &config);
        for pair in chunks.windows(2) {
            let left: Vec<&str> = pair[0].split_whitespace().collect();
            let right: Vec<&str> = pair[1].split_whitespace().collect();
            if left.len() < config.chunk_size() {
                continue;
            }
            assert_eq!(&left[left.len() - 3..], &right[..3]);
        }
    }

    #[test]
    fn every_word_is_covered_and_windows_are_bounded() {
        let config = ChunkConfig::new(7, 2).expect("valid config");
        let text = numbered_words(53);
        let chunks = chunk_text(&text, &config);
        assert!(chunks
            .iter()
            .all(|chunk| chunk.split_whitespace().count() <= config.chunk_size()));
        for word in text.split_whitespace() {
            assert!(
                chunks
                    .iter()
                    .any(|chunk| chunk.split_whitespace().any(|w| w == word)),
                "word {word} missing from chunks"
            );
        }
    }

    #[test]
    fn whitespace_is_collapsed_and_empty_text_dropped() {
        let config = ChunkConfig::new(4, 1).expect("valid config");
        assert!(chunk_text("  \n\t  ", &config).is_empty());
        assert_eq!(
            chunk_text("alpha\n\nbeta\tgamma", &config),
            vec!["alpha beta gamma".to_string()]
        );
    }

    #[test]
    fn zero_overlap_produces_disjoint_windows() {
        let config = ChunkConfig::new(5, 0).expect("valid config");
        let chunks = chunk_text(&numbered_words(12), &config);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "w10 w11");
    }
}
