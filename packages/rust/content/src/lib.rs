//! Content segmentation: raw captured text → ordered typed segments.
//!
//! Captured clips are prose with inline `![alt](url)` image markers. The
//! segmenter isolates each marker as an image segment and splits the
//! remaining text into one segment per line, preserving source order.
//! Line-level granularity keeps every text block under the destination
//! service's per-block size limit without a real layout parser.
//!
//! This module is pure and synchronous; it never touches the network.

use std::sync::LazyLock;

use regex::Regex;

/// Inline image marker: `![alt](url)`. The single capture group is the URL.
static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^)]+)\)").expect("valid regex"));

/// One ordered unit of captured content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A single line of prose.
    Text(String),
    /// An inline image reference to fetch and re-upload.
    Image { url: String },
}

impl Segment {
    pub fn is_image(&self) -> bool {
        matches!(self, Segment::Image { .. })
    }
}

/// Split captured content into ordered segments.
///
/// Image markers become [`Segment::Image`]; the text between them is split
/// on line breaks, one [`Segment::Text`] per non-empty line. Order equals
/// left-to-right, top-to-bottom occurrence in the source.
pub fn segment(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in IMAGE_RE.captures_iter(content) {
        let marker = caps.get(0).expect("whole match");
        push_text_lines(&mut segments, &content[last..marker.start()]);
        segments.push(Segment::Image {
            url: caps[1].trim().to_string(),
        });
        last = marker.end();
    }
    push_text_lines(&mut segments, &content[last..]);

    segments
}

/// Append one text segment per non-empty line of `chunk`.
fn push_text_lines(segments: &mut Vec<Segment>, chunk: &str) {
    for line in chunk.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if !line.is_empty() {
            segments.push(Segment::Text(line.to_string()));
        }
    }
}
