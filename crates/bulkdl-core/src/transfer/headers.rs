//! Response header parsing for the transfer handler.

/// Status code from the most recent `HTTP/x y` status line.
pub(crate) fn parse_http_status(lines: &[String]) -> Option<u32> {
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("HTTP/"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
}

/// First byte offset of `Content-Range: bytes START-END/TOTAL`.
pub(crate) fn parse_content_range_start(lines: &[String]) -> Option<u64> {
    header_value(lines, "content-range")
        .and_then(|v| v.strip_prefix("bytes "))
        .and_then(|v| v.split_once('-'))
        .and_then(|(start, _)| start.trim().parse().ok())
}

/// Declared `Content-Length` of the response body.
pub(crate) fn parse_content_length(lines: &[String]) -> Option<u64> {
    header_value(lines, "content-length").and_then(|v| v.parse().ok())
}

fn header_value<'a>(lines: &'a [String], name: &str) -> Option<&'a str> {
    lines.iter().find_map(|line| {
        let (n, v) = line.split_once(':')?;
        n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}
