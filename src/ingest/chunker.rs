//! Overlapping character chunker.
//!
//! Splits each page of a document into fixed-size passages with a shared
//! overlap between neighbors. The split is deterministic and covers every
//! character of the source text, so re-running ingestion on identical input
//! yields identical chunks.

use serde::{Deserialize, Serialize};

use super::PageText;

/// A bounded passage of document text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub source_path: String,
    /// 0-based page the chunk starts on. Rendered 1-indexed in citations.
    pub page_number: usize,
    /// 0-based position of the chunk within its document.
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split a document, page by page, into overlapping chunks.
    ///
    /// `chunk_index` is global across the document; `page_number` is carried
    /// from the page each chunk starts on. A page shorter than the chunk
    /// size yields exactly one chunk with no overlap applied.
    pub fn chunk_document(&self, pages: &[PageText], source_path: &str) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();
        let mut chunk_index = 0;

        for page in pages {
            for text in self.split_page(&page.text) {
                chunks.push(DocumentChunk {
                    text,
                    source_path: source_path.to_string(),
                    page_number: page.page_number,
                    chunk_index,
                });
                chunk_index += 1;
            }
        }

        chunks
    }

    fn split_page(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        if total == 0 {
            return Vec::new();
        }

        let size = self.config.chunk_size.max(1);
        let step = size.saturating_sub(self.config.chunk_overlap).max(1);

        let mut out = Vec::new();
        let mut start = 0;
        while start < total {
            let end = (start + size).min(total);
            out.push(chars[start..end].iter().collect());
            if end == total {
                break;
            }
            start += step;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(text: &str) -> Vec<PageText> {
        vec![PageText {
            page_number: 0,
            text: text.to_string(),
        }]
    }

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
    }

    #[test]
    fn short_document_yields_single_chunk() {
        let chunks = chunker(1000, 100).chunk_document(&pages("hello world"), "doc.txt");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].page_number, 0);
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "abcdefghij".repeat(50);
        let first = chunker(100, 10).chunk_document(&pages(&text), "doc.txt");
        let second = chunker(100, 10).chunk_document(&pages(&text), "doc.txt");
        assert_eq!(first, second);
    }

    #[test]
    fn every_character_is_covered() {
        let text: String = ('a'..='z').cycle().take(437).collect();
        let chunks = chunker(100, 10).chunk_document(&pages(&text), "doc.txt");

        let chars: Vec<char> = text.chars().collect();
        let step = 90;
        let mut covered = vec![false; chars.len()];
        for (i, chunk) in chunks.iter().enumerate() {
            let start = i * step;
            for (offset, c) in chunk.text.chars().enumerate() {
                assert_eq!(c, chars[start + offset]);
                covered[start + offset] = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn adjacent_chunks_share_overlap() {
        let text: String = ('0'..='9').cycle().take(250).collect();
        let chunks = chunker(100, 20).chunk_document(&pages(&text), "doc.txt");
        assert!(chunks.len() >= 2);

        let tail: String = chunks[0].text.chars().skip(80).collect();
        let head: String = chunks[1].text.chars().take(20).collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn chunk_index_is_global_across_pages() {
        let pages = vec![
            PageText {
                page_number: 0,
                text: "x".repeat(150),
            },
            PageText {
                page_number: 1,
                text: "y".repeat(40),
            },
        ];
        let chunks = chunker(100, 10).chunk_document(&pages, "doc.txt");

        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
        assert_eq!(chunks.last().unwrap().page_number, 1);
    }

    #[test]
    fn empty_page_yields_no_chunks() {
        let chunks = chunker(100, 10).chunk_document(&pages(""), "doc.txt");
        assert!(chunks.is_empty());
    }
}
