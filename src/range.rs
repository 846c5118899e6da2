//! HTTP Range handling and download header helpers.
//!
//! Only single byte-ranges are honored.  Multi-range requests fall back
//! to a full-content response; any other malformed or unsatisfiable
//! `Range` header yields 416 with `Content-Range: bytes */<size>`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Parsed byte range from a Range header.
#[derive(Debug, Clone, PartialEq)]
enum ByteRange {
    /// bytes=start-end (inclusive both ends)
    StartEnd(u64, u64),
    /// bytes=start-  (from start to end of blob)
    StartOpen(u64),
    /// bytes=-N  (last N bytes)
    Suffix(u64),
}

/// What the gateway should serve for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDirective {
    /// Serve the whole blob with 200.
    Full,
    /// Serve bytes `[start, end]` with 206.
    Partial { start: u64, end: u64 },
    /// Answer 416 with `Content-Range: bytes */size`.
    NotSatisfiable,
}

/// Interpret an optional `Range` header against a blob of `size` bytes.
pub fn interpret(header: Option<&str>, size: u64) -> RangeDirective {
    let Some(header) = header else {
        return RangeDirective::Full;
    };

    let spec = header.trim();
    let Some(spec) = spec.strip_prefix("bytes=") else {
        return RangeDirective::NotSatisfiable;
    };

    // Multi-range requests are not supported; serve the full content.
    if spec.contains(',') {
        return RangeDirective::Full;
    }

    let Some(range) = parse_single(spec) else {
        return RangeDirective::NotSatisfiable;
    };
    match resolve(&range, size) {
        Some((start, end)) => RangeDirective::Partial { start, end },
        None => RangeDirective::NotSatisfiable,
    }
}

/// Parse a single range spec like "0-4", "5-", "-3".
fn parse_single(spec: &str) -> Option<ByteRange> {
    if let Some(suffix) = spec.strip_prefix('-') {
        // -N (suffix range); -0 addresses nothing and is invalid
        let n: u64 = suffix.parse().ok()?;
        if n == 0 {
            return None;
        }
        Some(ByteRange::Suffix(n))
    } else if let Some(stripped) = spec.strip_suffix('-') {
        // N- (open-ended range)
        let start: u64 = stripped.parse().ok()?;
        Some(ByteRange::StartOpen(start))
    } else if let Some((start_s, end_s)) = spec.split_once('-') {
        // start-end
        let start: u64 = start_s.parse().ok()?;
        let end: u64 = end_s.parse().ok()?;
        if start > end {
            return None;
        }
        Some(ByteRange::StartEnd(start, end))
    } else {
        None
    }
}

/// Resolve a ByteRange against the blob size.
/// Returns (start, end), both inclusive, or None if unsatisfiable.
fn resolve(range: &ByteRange, size: u64) -> Option<(u64, u64)> {
    if size == 0 {
        return None;
    }
    match range {
        ByteRange::StartEnd(start, end) => {
            if *start >= size {
                return None;
            }
            Some((*start, std::cmp::min(*end, size - 1)))
        }
        ByteRange::StartOpen(start) => {
            if *start >= size {
                return None;
            }
            Some((*start, size - 1))
        }
        ByteRange::Suffix(n) => {
            if *n >= size {
                Some((0, size - 1))
            } else {
                Some((size - n, size - 1))
            }
        }
    }
}

// -- Content-Disposition ------------------------------------------------------

/// RFC 5987 attr-char set: everything outside it gets percent-encoded.
const RFC5987_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Build a `Content-Disposition` header value for a download.
///
/// Carries both a plain ASCII fallback filename and the RFC 5987
/// `filename*` form for non-ASCII names.
pub fn content_disposition(filename: &str, as_attachment: bool) -> String {
    let kind = if as_attachment { "attachment" } else { "inline" };

    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    let encoded = utf8_percent_encode(filename, RFC5987_ENCODE);
    format!("{kind}; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_header_serves_full() {
        assert_eq!(interpret(None, 7), RangeDirective::Full);
        assert_eq!(interpret(None, 0), RangeDirective::Full);
    }

    #[test]
    fn start_end_form() {
        assert_eq!(
            interpret(Some("bytes=1-3"), 7),
            RangeDirective::Partial { start: 1, end: 3 }
        );
        assert_eq!(
            interpret(Some("bytes=0-0"), 7),
            RangeDirective::Partial { start: 0, end: 0 }
        );
    }

    #[test]
    fn open_ended_form() {
        assert_eq!(
            interpret(Some("bytes=0-"), 7),
            RangeDirective::Partial { start: 0, end: 6 }
        );
        assert_eq!(
            interpret(Some("bytes=5-"), 7),
            RangeDirective::Partial { start: 5, end: 6 }
        );
    }

    #[test]
    fn suffix_form_takes_last_n_bytes() {
        assert_eq!(
            interpret(Some("bytes=-3"), 7),
            RangeDirective::Partial { start: 4, end: 6 }
        );
        // A suffix longer than the blob clamps to the whole blob.
        assert_eq!(
            interpret(Some("bytes=-7"), 7),
            RangeDirective::Partial { start: 0, end: 6 }
        );
        assert_eq!(
            interpret(Some("bytes=-100"), 7),
            RangeDirective::Partial { start: 0, end: 6 }
        );
    }

    #[test]
    fn end_clamps_to_size() {
        assert_eq!(
            interpret(Some("bytes=2-9999"), 7),
            RangeDirective::Partial { start: 2, end: 6 }
        );
    }

    #[test]
    fn start_past_end_of_blob_is_unsatisfiable() {
        assert_eq!(interpret(Some("bytes=7-"), 7), RangeDirective::NotSatisfiable);
        assert_eq!(
            interpret(Some("bytes=7-9"), 7),
            RangeDirective::NotSatisfiable
        );
    }

    #[test]
    fn malformed_headers_are_unsatisfiable() {
        for header in [
            "bits=0-3",
            "bytes=",
            "bytes=a-b",
            "bytes=3-1",
            "bytes=-0",
            "bytes=--5",
            "bytes=5",
        ] {
            assert_eq!(
                interpret(Some(header), 7),
                RangeDirective::NotSatisfiable,
                "header {header:?}"
            );
        }
    }

    #[test]
    fn multi_range_falls_back_to_full() {
        assert_eq!(interpret(Some("bytes=0-1,3-4"), 7), RangeDirective::Full);
    }

    #[test]
    fn any_range_on_empty_blob_is_unsatisfiable() {
        assert_eq!(interpret(Some("bytes=0-"), 0), RangeDirective::NotSatisfiable);
        assert_eq!(interpret(Some("bytes=-1"), 0), RangeDirective::NotSatisfiable);
    }

    #[test]
    fn disposition_ascii_filename() {
        let value = content_disposition("report.pdf", true);
        assert_eq!(
            value,
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
    }

    #[test]
    fn disposition_inline_mode() {
        let value = content_disposition("img.png", false);
        assert!(value.starts_with("inline; "));
    }

    #[test]
    fn disposition_encodes_non_ascii() {
        let value = content_disposition("r\u{00e9}sum\u{00e9}.pdf", true);
        assert!(value.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
        // The plain fallback drops the non-ASCII characters.
        assert!(value.contains("filename=\"rsum.pdf\""));
    }

    #[test]
    fn disposition_survives_hostile_names() {
        let value = content_disposition("a\"b;c\\d", true);
        assert!(value.contains("filename=\"abcd\""));
    }
}
