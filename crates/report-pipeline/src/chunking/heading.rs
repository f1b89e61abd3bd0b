//! One chunk per markdown heading section

use pulldown_cmark::{Event, Parser, Tag};

/// Split at every heading of any level
///
/// Text before the first heading becomes its own chunk. Headings inside fenced
/// code are plain text to the parser and never start a section.
pub fn split_by_headings(markdown: &str) -> Vec<String> {
    let mut boundaries: Vec<usize> = Parser::new(markdown)
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::Heading { .. }) => Some(range.start),
            _ => None,
        })
        .collect();

    boundaries.insert(0, 0);
    boundaries.push(markdown.len());
    boundaries.dedup();

    boundaries
        .windows(2)
        .map(|w| markdown[w[0]..w[1]].trim())
        .filter(|section| !section.is_empty())
        .map(str::to_string)
        .collect()
}
