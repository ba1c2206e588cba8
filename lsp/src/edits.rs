//! Applying server-returned text edits to a document buffer.
//!
//! Edits arrive as line/character ranges against the document the server
//! was given. All offsets are resolved against a [`LineIndex`] built from
//! the original buffer, then the edits are spliced in descending start
//! order so that already-resolved offsets stay valid as the buffer length
//! changes.
//!
//! Offset policy: `character` is treated as a raw byte offset from the
//! line start. LSP nominally counts UTF-16 code units; the two agree for
//! the ASCII markup lemminx formats, and no surrogate re-mapping is done.

use crate::protocol::{Position, TextEdit};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    /// The server referenced a line past the end of the document. This is
    /// a protocol-contract violation; clamping it could corrupt unrelated
    /// text, so it propagates as a hard error.
    #[error("position {line}:{character} is beyond the last line ({line_count} lines in document)")]
    LineOutOfRange {
        line: u32,
        character: u32,
        line_count: usize,
    },

    /// A resolved offset ran past the end of the buffer or fell inside a
    /// multi-byte character.
    #[error("offset {offset} does not land on a character boundary of the document")]
    InvalidOffset { offset: usize },

    /// A single edit whose start sorts after its end.
    #[error("edit range is inverted: start offset {start} > end offset {end}")]
    InvertedRange { start: usize, end: usize },

    /// Two edits claim overlapping spans. The result would depend on
    /// application order, so the batch is rejected outright.
    #[error("edits overlap: {first_start}..{first_end} collides with {second_start}..{second_end}")]
    OverlappingEdits {
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },
}

/// Byte offsets of line starts, built by one scan over the buffer.
///
/// Line 0 starts at offset 0; every `\n` opens a new line. A trailing
/// newline therefore yields a final empty line, matching how servers
/// address the end of a document.
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|&(_, byte)| byte == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    /// Number of lines the index knows about.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Absolute byte offset of a position: line start plus raw character
    /// offset. Errs if the line does not exist. A `character` larger than
    /// its own line is not caught here — it resolves past the terminator
    /// into the following line, matching the raw pass-through policy.
    pub fn offset_of(&self, position: Position) -> Result<usize, EditError> {
        let Some(line_start) = self.line_starts.get(position.line as usize) else {
            return Err(EditError::LineOutOfRange {
                line: position.line,
                character: position.character,
                line_count: self.line_starts.len(),
            });
        };
        Ok(line_start + position.character as usize)
    }
}

fn checked_offset(index: &LineIndex, text: &str, position: Position) -> Result<usize, EditError> {
    let offset = index.offset_of(position)?;
    if offset > text.len() || !text.is_char_boundary(offset) {
        return Err(EditError::InvalidOffset { offset });
    }
    Ok(offset)
}

/// Apply a batch of formatting edits to `text`, returning the new buffer.
///
/// The input is never mutated. An empty batch returns the buffer as-is.
/// Edits may arrive in any order; overlapping edits are rejected rather
/// than applied with an arbitrary precedence.
pub fn apply_text_edits(text: &str, edits: &[TextEdit]) -> Result<String, EditError> {
    if edits.is_empty() {
        return Ok(text.to_owned());
    }

    let index = LineIndex::new(text);
    let mut spans: Vec<(usize, usize, &str)> = Vec::with_capacity(edits.len());
    for edit in edits {
        let start = checked_offset(&index, text, edit.range.start)?;
        let end = checked_offset(&index, text, edit.range.end)?;
        if start > end {
            return Err(EditError::InvertedRange { start, end });
        }
        spans.push((start, end, edit.new_text.as_str()));
    }

    reject_overlaps(&spans)?;

    // Splice back-to-front: earlier spans are spliced last, so their
    // offsets are never shifted by a prior splice. Ascending stable sort
    // walked in reverse also applies same-position inserts last-to-first,
    // which leaves their text in array order as LSP requires.
    spans.sort_by_key(|&(start, _, _)| start);

    let mut buffer = text.to_owned();
    for &(start, end, new_text) in spans.iter().rev() {
        buffer.replace_range(start..end, new_text);
    }
    Ok(buffer)
}

fn reject_overlaps(spans: &[(usize, usize, &str)]) -> Result<(), EditError> {
    let mut ordered: Vec<(usize, usize)> = spans.iter().map(|&(s, e, _)| (s, e)).collect();
    ordered.sort_unstable();

    for pair in ordered.windows(2) {
        let (first_start, first_end) = pair[0];
        let (second_start, second_end) = pair[1];
        if first_end > second_start {
            return Err(EditError::OverlappingEdits {
                first_start,
                first_end,
                second_start,
                second_end,
            });
        }
    }
    Ok(())
}
