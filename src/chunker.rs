//! Splits page text into passage-sized chunks.
//!
//! Fixed-size character windows with overlap; when a window would cut a
//! sentence, the cut is pulled back to the nearest sentence ending in the
//! window's tail.

use crate::core::config::settings::ChunkerSettings;

/// A text chunk with position metadata relative to its source page.
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub text: String,
    /// Character offset in the original page text.
    pub start_offset: usize,
    /// Chunk position within the page.
    pub chunk_index: usize,
}

#[derive(Clone)]
pub struct Chunker {
    settings: ChunkerSettings,
}

impl Chunker {
    pub fn new(settings: ChunkerSettings) -> Self {
        Self { settings }
    }

    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let chunk_size = self.settings.chunk_size.max(1);
        let overlap = self.settings.chunk_overlap;
        let max_chunks = self.settings.max_chunks_per_page;

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        let mut chunks = Vec::new();
        if total_chars == 0 {
            return chunks;
        }

        let step = chunk_size.saturating_sub(overlap).max(1);
        let mut start = 0;
        let mut chunk_index = 0;

        while start < total_chars && chunks.len() < max_chunks {
            let end = (start + chunk_size).min(total_chars);
            let window: String = chars[start..end].iter().collect();

            let final_text = if end < total_chars {
                truncate_at_sentence(&window)
            } else {
                window
            };

            let trimmed = final_text.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    start_offset: start,
                    chunk_index,
                });
                chunk_index += 1;
            }

            start += step;
        }

        chunks
    }
}

/// Cut the window at the last sentence ending in its final fifth, if any.
fn truncate_at_sentence(window: &str) -> String {
    let endings = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

    let char_count = window.chars().count();
    let tail_chars = char_count * 4 / 5;
    let tail_start = window
        .char_indices()
        .nth(tail_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let tail = &window[tail_start..];

    for ending in endings.iter() {
        if let Some(pos) = tail.rfind(ending) {
            return window[..tail_start + pos + ending.len()].to_string();
        }
    }

    window.to_string()
}
