use crate::model::AnchorOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorError {
    ZeroMatches,
    MultipleMatches,
    AnchorCrossesBinary,
}

impl AnchorError {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorError::ZeroMatches => "zeroMatches",
            AnchorError::MultipleMatches => "multipleMatches",
            AnchorError::AnchorCrossesBinary => "anchorCrossesBinary",
        }
    }
}

struct Span {
    before_start: usize,
    before_end: usize,
    after_end: usize,
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, w)| *w == needle)
        .map(|(i, _)| i)
        .collect()
}

/// Finds every occurrence of `before` that is followed, with zero or more
/// bytes in between, by an occurrence of `after`. Each `before` occurrence
/// pairs with the nearest qualifying `after` match.
fn candidate_spans(bytes: &[u8], before: &str, after: &str) -> Vec<Span> {
    let before_bytes = before.as_bytes();
    let after_bytes = after.as_bytes();
    let before_starts = find_all(bytes, before_bytes);
    let after_starts = find_all(bytes, after_bytes);

    let mut spans = Vec::new();
    for before_start in before_starts {
        let before_end = before_start + before_bytes.len();
        if after_bytes.is_empty() {
            spans.push(Span { before_start, before_end, after_end: before_end });
            continue;
        }
        if let Some(&after_start) = after_starts.iter().find(|&&s| s >= before_end) {
            spans.push(Span { before_start, before_end, after_end: after_start + after_bytes.len() });
        }
    }
    spans
}

fn contains_nul(bytes: &[u8], start: usize, end: usize) -> bool {
    bytes[start..end].contains(&0)
}

/// Locates the unique anchor span and applies `op`, returning the new file
/// bytes. Binary content (a NUL byte inside the matched span) is rejected
/// rather than silently mangled.
pub fn apply_anchor(bytes: &[u8], before: &str, after: &str, op: AnchorOp, content: &str) -> Result<Vec<u8>, AnchorError> {
    let spans = candidate_spans(bytes, before, after);
    match spans.len() {
        0 => return Err(AnchorError::ZeroMatches),
        1 => {}
        _ => return Err(AnchorError::MultipleMatches),
    }
    let span = &spans[0];
    if contains_nul(bytes, span.before_start, span.after_end) {
        return Err(AnchorError::AnchorCrossesBinary);
    }

    let mut out = Vec::with_capacity(bytes.len() + content.len());
    match op {
        AnchorOp::Replace => {
            out.extend_from_slice(&bytes[..span.before_start]);
            out.extend_from_slice(content.as_bytes());
            out.extend_from_slice(&bytes[span.after_end..]);
        }
        AnchorOp::InsertBefore => {
            out.extend_from_slice(&bytes[..span.before_start]);
            out.extend_from_slice(content.as_bytes());
            out.extend_from_slice(&bytes[span.before_start..]);
        }
        AnchorOp::InsertAfter => {
            out.extend_from_slice(&bytes[..span.after_end]);
            out.extend_from_slice(content.as_bytes());
            out.extend_from_slice(&bytes[span.after_end..]);
        }
        AnchorOp::Delete => {
            out.extend_from_slice(&bytes[..span.before_start]);
            out.extend_from_slice(&bytes[span.after_end..]);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_substitutes_span_between_anchors() {
        let bytes = b"hello\nworld\n";
        let out = apply_anchor(bytes, "hello\n", "world\n", AnchorOp::Replace, "HELLO\n").unwrap();
        assert_eq!(out, b"HELLO\nworld\n");
    }

    #[test]
    fn delete_rejects_multiple_occurrences() {
        let bytes = b"x\nx\n";
        let err = apply_anchor(bytes, "x\n", "", AnchorOp::Delete, "").unwrap_err();
        assert_eq!(err, AnchorError::MultipleMatches);
    }

    #[test]
    fn zero_matches_when_before_absent() {
        let bytes = b"abc";
        let err = apply_anchor(bytes, "zzz", "", AnchorOp::Replace, "q").unwrap_err();
        assert_eq!(err, AnchorError::ZeroMatches);
    }

    #[test]
    fn insert_before_and_after_splice_adjacent() {
        let bytes = b"one two three";
        let before = apply_anchor(bytes, "two", "", AnchorOp::InsertBefore, "[").unwrap();
        assert_eq!(before, b"one [two three");
        let after = apply_anchor(bytes, "two", "", AnchorOp::InsertAfter, "]").unwrap();
        assert_eq!(after, b"one two] three");
    }

    #[test]
    fn binary_span_is_rejected() {
        let mut bytes = b"aaa".to_vec();
        bytes.extend_from_slice(b"\0");
        bytes.extend_from_slice(b"bbb");
        let err = apply_anchor(&bytes, "aaa", "bbb", AnchorOp::Replace, "x").unwrap_err();
        assert_eq!(err, AnchorError::AnchorCrossesBinary);
    }
}
