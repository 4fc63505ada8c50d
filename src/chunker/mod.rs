// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sliding-window text chunking for document ingestion.
//!
//! Splits source text into fixed-size overlapping windows so that context
//! spanning a chunk boundary is still captured by at least one chunk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkerError {
    /// The window configuration would never advance (or is empty).
    #[error("Invalid chunk window: size {size}, overlap {overlap} (overlap must be < size, size > 0)")]
    InvalidWindow { size: usize, overlap: usize },
}

/// A bounded, possibly overlapping substring of a source document.
///
/// `source_offset` is the start position in the source text, counted in
/// characters (not bytes) so multi-byte input never splits a code point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub source_offset: usize,
}

/// Splits text into overlapping fixed-size windows.
#[derive(Debug, Clone)]
pub struct TextChunker {
    size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker. Rejects `overlap >= size` and `size == 0` up front;
    /// a window that never advances would loop forever in `chunk`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        if size == 0 || overlap >= size {
            return Err(ChunkerError::InvalidWindow { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Emit windows of `size` characters, advancing `size - overlap` each
    /// step, until the window start passes the end of the text. The final
    /// window is clipped at end-of-text; empty input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<DocumentChunk> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = usize::min(start + self.size, chars.len());
            chunks.push(DocumentChunk {
                text: chars[start..end].iter().collect(),
                source_offset: start,
            });
            start += step;
        }

        chunks
    }
}
