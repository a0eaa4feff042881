/// Zero-based line and UTF-16 column, the coordinate system language servers speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineColumn {
    pub line: u32,
    /// UTF-16 code unit offset within the line.
    pub character: u32,
}

/// Byte spans `(start, end)` of every line, excluding the `\n` / `\r\n` terminator.
pub fn compute_line_spans(content: &str) -> Vec<(usize, usize)> {
    let bytes = content.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0usize;
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            let mut end = i;
            if end > start && bytes[end - 1] == b'\r' {
                end -= 1;
            }
            spans.push((start, end));
            start = i + 1;
        }
    }
    if start <= content.len() {
        let mut end = content.len();
        if end > start && bytes[end - 1] == b'\r' {
            end -= 1;
        }
        spans.push((start, end));
    }
    spans
}

pub fn utf16_len(text: &str) -> u32 {
    text.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Convert a byte offset into `content` to a line/UTF-16 column pair.
///
/// Offsets past the end clamp to the end of the last line; offsets that fall inside a
/// multi-byte character snap back to the start of that character.
pub fn line_column_at(content: &str, byte_offset: usize) -> LineColumn {
    let offset = byte_offset.min(content.len());
    let spans = compute_line_spans(content);

    let line = spans
        .iter()
        .rposition(|(start, _)| *start <= offset)
        .unwrap_or(0);
    let (start, end) = spans[line];
    let in_line = offset.min(end).saturating_sub(start);
    let line_text = &content[start..end];

    LineColumn {
        line: line as u32,
        character: utf16_units_for_byte_offset(line_text, in_line),
    }
}

fn utf16_units_for_byte_offset(text: &str, byte_offset: usize) -> u32 {
    let byte_offset = byte_offset.min(text.len());
    if byte_offset == text.len() {
        return utf16_len(text);
    }

    let mut boundary = 0usize;
    for (idx, _) in text.char_indices() {
        if idx <= byte_offset {
            boundary = idx;
        } else {
            break;
        }
    }

    utf16_len(&text[..boundary])
}
