// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chunker contract tests: window sizing, overlap reconstruction, and
//! configuration rejection.

use rag_chat_node::TextChunker;

#[test]
fn test_invalid_windows_rejected_before_chunking() {
    assert!(TextChunker::new(50, 50).is_err());
    assert!(TextChunker::new(50, 60).is_err());
    assert!(TextChunker::new(0, 0).is_err());
}

#[test]
fn test_every_chunk_but_last_has_window_size() {
    let text: String = std::iter::repeat("abcdefg ").take(40).collect();
    let chunker = TextChunker::new(50, 10).unwrap();
    let chunks = chunker.chunk(&text);

    assert!(chunks.len() > 1);
    for chunk in &chunks[..chunks.len() - 1] {
        assert_eq!(chunk.text.chars().count(), 50);
    }
    assert!(chunks.last().unwrap().text.chars().count() <= 50);
}

#[test]
fn test_overlap_trimmed_concatenation_reconstructs_source() {
    let cases = [
        ("the quick brown fox jumps over the lazy dog", 8, 3),
        ("short", 500, 50),
        ("", 10, 2),
        ("0123456789", 4, 1),
        ("exactly-ten", 11, 5),
    ];

    for (text, size, overlap) in cases {
        let chunker = TextChunker::new(size, overlap).unwrap();
        let chunks = chunker.chunk(text);

        let mut rebuilt = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                rebuilt.push_str(&chunk.text);
            } else {
                rebuilt.extend(chunk.text.chars().skip(overlap));
            }
        }
        assert_eq!(rebuilt, text, "size={} overlap={}", size, overlap);
    }
}

#[test]
fn test_offsets_advance_by_stride() {
    let text: String = "x".repeat(100);
    let chunker = TextChunker::new(30, 10).unwrap();
    let chunks = chunker.chunk(&text);

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.source_offset, i * 20);
    }
}
