//! Capped line reader
//!
//! Splits a byte stream into lines without ever buffering more than
//! `max_line_length + 1` bytes of a single line.

use std::io;

use contracts::truncate_message;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// One complete line read from a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Content without the terminator, at most `max_line_length` bytes
    pub message: String,
    /// The original line was longer than the cap
    pub truncated: bool,
    /// File offset just past this line's terminator
    pub end_offset: u64,
}

/// Lines read in one pass over a file
#[derive(Debug, Default)]
pub struct ReadBatch {
    pub lines: Vec<Line>,
    /// Failure that stopped the pass early; `lines` holds what came before it
    pub error: Option<io::Error>,
}

/// Read up to `max_lines` complete lines starting at `start_offset`
///
/// A trailing line without a terminator is left unread.
pub async fn read_batch<R>(
    reader: &mut R,
    start_offset: u64,
    max_lines: usize,
    max_line_length: usize,
) -> ReadBatch
where
    R: AsyncBufRead + Unpin,
{
    let mut batch = ReadBatch::default();
    let mut offset = start_offset;

    while batch.lines.len() < max_lines {
        match read_line_capped(reader, max_line_length).await {
            Ok(Some(raw)) => {
                offset += raw.consumed;
                batch.lines.push(raw.into_line(max_line_length, offset));
            }
            Ok(None) => break,
            Err(e) => {
                batch.error = Some(e);
                break;
            }
        }
    }

    batch
}

struct RawLine {
    bytes: Vec<u8>,
    consumed: u64,
    overflow: bool,
}

impl RawLine {
    fn into_line(mut self, max_line_length: usize, end_offset: u64) -> Line {
        // A lone carriage return would make the entry unrepresentable
        for byte in self.bytes.iter_mut().filter(|b| **b == b'\r') {
            *byte = b' ';
        }
        let mut message = String::from_utf8_lossy(&self.bytes).into_owned();
        let cut = truncate_message(&mut message, max_line_length);
        Line {
            message,
            truncated: self.overflow || cut,
            end_offset,
        }
    }
}

/// Read one `\n` terminated line, keeping at most `max_line_length + 1` bytes
///
/// Returns `None` at end of input, including when only a partial line is left.
async fn read_line_capped<R>(reader: &mut R, max_line_length: usize) -> io::Result<Option<RawLine>>
where
    R: AsyncBufRead + Unpin,
{
    // One spare byte so a `\r` right at the cap can still be stripped
    let keep = max_line_length.saturating_add(1);
    let mut bytes = Vec::new();
    let mut consumed = 0u64;
    let mut overflow = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(None);
        }

        let newline = available.iter().position(|b| *b == b'\n');
        let content = match newline {
            Some(i) => &available[..i],
            None => available,
        };

        let room = keep.saturating_sub(bytes.len());
        let take = content.len().min(room);
        bytes.extend_from_slice(&content[..take]);
        if take < content.len() {
            overflow = true;
        }

        let used = newline.map_or(content.len(), |i| i + 1);
        reader.consume(used);
        consumed += used as u64;

        if newline.is_some() {
            break;
        }
    }

    if !overflow && bytes.last() == Some(&b'\r') {
        bytes.pop();
    }

    Ok(Some(RawLine {
        bytes,
        consumed,
        overflow,
    }))
}
