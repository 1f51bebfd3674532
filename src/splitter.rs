use std::collections::VecDeque;

use thiserror::Error;
use tracing::warn;

use crate::loader::Document;

pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitterError {
    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("Chunk overlap ({chunk_overlap}) is larger than chunk size ({chunk_size})")]
    OverlapTooLarge {
        chunk_size: usize,
        chunk_overlap: usize,
    },
}

/// Splits text on the coarsest separator that yields small enough pieces, falling back to
/// finer ones for pieces that are still too long. Sizes are counted in characters.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        if chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        if chunk_overlap > chunk_size {
            return Err(SplitterError::OverlapTooLarge {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_owned()).collect(),
        })
    }

    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    /// Split every document, copying its metadata and numbering the chunks.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        documents
            .iter()
            .flat_map(|document| {
                self.split_text(&document.content)
                    .into_iter()
                    .enumerate()
                    .map(|(index, chunk)| Document {
                        content: chunk,
                        metadata: document.metadata.clone(),
                    }
                    .with_metadata("chunk", index.to_string()))
            })
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let Some(separator) = separators.get(position) else {
            return vec![text.to_owned()];
        };
        let finer = &separators[position + 1..];

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator.as_str())
                .filter(|piece| !piece.is_empty())
                .collect()
        };

        let mut chunks = Vec::new();
        let mut small = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small, separator));
                small.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_owned());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small, separator));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, carrying up to `chunk_overlap` characters of the
    /// previous chunk into the next one.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            let joined_len = |current: &VecDeque<&str>, total: usize| {
                total + len + if current.is_empty() { 0 } else { separator_len }
            };

            if joined_len(&current, total) > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        size = total,
                        chunk_size = self.chunk_size,
                        "created a chunk longer than the chunk size"
                    );
                }
                if !current.is_empty() {
                    chunks.extend(join(&current, separator));
                    while total > self.chunk_overlap
                        || (total > 0 && joined_len(&current, total) > self.chunk_size)
                    {
                        let Some(first) = current.pop_front() else {
                            break;
                        };
                        total -= char_len(first) + if current.is_empty() { 0 } else { separator_len };
                    }
                }
            }

            total += len + if current.is_empty() { 0 } else { separator_len };
            current.push_back(piece);
        }
        chunks.extend(join(&current, separator));
        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join(pieces: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_words_without_overlap() {
        let splitter = RecursiveCharacterTextSplitter::new(9, 0).unwrap();
        assert_eq!(splitter.split_text("aaaa bbbb cccc"), vec!["aaaa bbbb", "cccc"]);
    }

    #[test]
    fn carries_overlap() {
        let splitter = RecursiveCharacterTextSplitter::new(9, 4).unwrap();
        assert_eq!(
            splitter.split_text("aaaa bbbb cccc"),
            vec!["aaaa bbbb", "bbbb cccc"]
        );
    }

    #[test]
    fn prefers_paragraphs() {
        let splitter = RecursiveCharacterTextSplitter::new(12, 0).unwrap();
        assert_eq!(
            splitter.split_text("para one.\n\npara two."),
            vec!["para one.", "para two."]
        );
    }

    #[test]
    fn falls_back_to_characters() {
        let splitter = RecursiveCharacterTextSplitter::new(4, 0).unwrap();
        assert_eq!(splitter.split_text("abcdefghij"), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn chunks_respect_size() {
        let text = "Large language models can act as the brain of an agent.\n\n\
                    Planning breaks a task into subgoals. Memory keeps context over time.\n\
                    Tools extend what the model can do beyond its weights.";
        let splitter = RecursiveCharacterTextSplitter::new(40, 10).unwrap();
        let chunks = splitter.split_text(text);
        assert!(chunks.len() > 3);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 40));
        assert!(chunks.iter().all(|chunk| !chunk.starts_with(' ')));
    }

    #[test]
    fn rejects_bad_settings() {
        assert_eq!(
            RecursiveCharacterTextSplitter::new(0, 0).err(),
            Some(SplitterError::ZeroChunkSize)
        );
        assert_eq!(
            RecursiveCharacterTextSplitter::new(10, 11).err(),
            Some(SplitterError::OverlapTooLarge {
                chunk_size: 10,
                chunk_overlap: 11
            })
        );
    }

    #[test]
    fn documents_keep_metadata() {
        let splitter = RecursiveCharacterTextSplitter::new(9, 0).unwrap();
        let document = Document::new("aaaa bbbb cccc").with_metadata("source", "notes.txt");
        let chunks = splitter.split_documents(&[document]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].metadata["source"], "notes.txt");
        assert_eq!(chunks[1].metadata["chunk"], "1");
    }
}
