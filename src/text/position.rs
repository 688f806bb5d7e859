/// Compute line start offsets for efficient line lookup
pub fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut line_starts = vec![0];

    for (offset, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            line_starts.push(offset + 1);
        }
    }

    line_starts
}

/// Find the line containing a byte offset.
///
/// Offsets past the end of the text map to the last line.
pub fn line_at_offset(line_starts: &[usize], offset: usize) -> usize {
    match line_starts.binary_search(&offset) {
        Ok(line) => line,
        Err(line) => line.saturating_sub(1),
    }
}

/// End of a line's content, excluding its line break (`\n` or `\r\n`).
pub fn line_content_end(text: &str, line_starts: &[usize], line: usize) -> Option<usize> {
    let start = *line_starts.get(line)?;
    let end = match line_starts.get(line + 1) {
        Some(next) => next - 1,
        None => return Some(text.len()),
    };
    if end > start && text.as_bytes().get(end - 1) == Some(&b'\r') {
        Some(end - 1)
    } else {
        Some(end)
    }
}
