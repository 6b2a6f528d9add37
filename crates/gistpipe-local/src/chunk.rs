//! Overlapping fixed-size windows over long text.

use gistpipe_core::Chunk;

/// Split `text` into windows of at most `max_chars` chars.
///
/// Each window after the first starts `overlap_chars` before the previous window's end, so
/// context cut at a boundary appears in both neighbours. The last window always ends at the
/// end of the text. Offsets count chars.
///
/// `max_chars == 0` is treated as 1 and `overlap_chars` is clamped below `max_chars` so the
/// window always advances.
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let overlap = overlap_chars.min(max_chars - 1);

    // Byte offset of every char boundary, plus the end.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = bounds.len() - 1;

    if n <= max_chars {
        return vec![Chunk {
            start_offset: 0,
            end_offset: n,
            content: text.to_string(),
        }];
    }

    let mut out = Vec::with_capacity(n / (max_chars - overlap) + 1);
    let mut start = 0usize;
    loop {
        let end = (start + max_chars).min(n);
        out.push(Chunk {
            start_offset: start,
            end_offset: end,
            content: text[bounds[start]..bounds[end]].to_string(),
        });
        if end == n {
            break;
        }
        start = end.saturating_sub(overlap);
    }
    out
}
