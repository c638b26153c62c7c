//! Topic extraction
//!
//! A document is split at its level-1 headings. Each heading starts a topic
//! segment that runs up to the next level-1 heading (or the end of the
//! document). Content before the first heading is the untitled preamble.

use std::collections::BTreeMap;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use super::metrics::{analyze_content, Metrics};

/// Sentinel key for content that does not belong to any heading
pub const NO_TOPIC: &str = "(no topic)";

/// Ordered mapping from topic name to segment text
///
/// Keys keep the order in which they were first inserted. Inserting a key that
/// already exists replaces its text in place: a document with two headings of
/// the same text ends up with only the later segment under that key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicMap {
    entries: Vec<(String, String)>,
}

impl TopicMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a segment, returning the text it replaced (if any)
    pub fn insert(&mut self, topic: impl Into<String>, text: impl Into<String>) -> Option<String> {
        let topic = topic.into();
        let text = text.into();

        match self.entries.iter_mut().find(|(key, _)| *key == topic) {
            Some((_, existing)) => Some(std::mem::replace(existing, text)),
            None => {
                self.entries.push((topic, text));
                None
            }
        }
    }

    pub fn get(&self, topic: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == topic)
            .map(|(_, text)| text.as_str())
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.get(topic).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(topic, text)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(topic, text)| (topic.as_str(), text.as_str()))
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(topic, _)| topic.as_str())
    }
}

impl IntoIterator for TopicMap {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A level-1 heading found in the document
struct Heading {
    line: usize,
    text: String,
}

/// Split a Markdown document into topic segments keyed by heading text
///
/// Segments are slices of the original text that keep their line terminators,
/// so concatenating them in order gives back the document. A blank preamble is
/// dropped; a preamble with any non-whitespace content is kept under
/// [`NO_TOPIC`].
///
/// Duplicate heading texts collide: the later segment overwrites the earlier one.
///
/// ```rust
/// use docflow_domain::analytics::{extract_topics, NO_TOPIC};
///
/// let topics = extract_topics("intro\n# A\nbody\n");
/// assert_eq!(topics.get(NO_TOPIC), Some("intro\n"));
/// assert_eq!(topics.get("A"), Some("# A\nbody\n"));
/// ```
pub fn extract_topics(content: &str) -> TopicMap {
    let mut result = TopicMap::new();
    let headings = find_headings(content);

    let Some(first) = headings.first() else {
        if !content.trim().is_empty() {
            result.insert(NO_TOPIC, content);
        }
        return result;
    };

    let line_starts = line_starts(content);
    let offset_of = |line: usize| line_starts.get(line).copied().unwrap_or(content.len());

    let preamble = &content[..offset_of(first.line)];
    if !preamble.trim().is_empty() {
        result.insert(NO_TOPIC, preamble);
    }

    for (index, heading) in headings.iter().enumerate() {
        let start = offset_of(heading.line);
        let end = headings
            .get(index + 1)
            .map(|next| offset_of(next.line))
            .unwrap_or(content.len());

        result.insert(heading.text.clone(), &content[start..end]);
    }

    result
}

/// Per-topic metrics for a whole document
///
/// When `topics_of_interest` is given, only topics matching one of its entries
/// (case-insensitively) are kept.
pub fn topic_metrics(
    content: &str,
    topics_of_interest: Option<&[String]>,
) -> BTreeMap<String, Metrics> {
    let wanted: Option<Vec<String>> =
        topics_of_interest.map(|topics| topics.iter().map(|t| t.to_lowercase()).collect());

    extract_topics(content)
        .into_iter()
        .filter(|(topic, _)| match &wanted {
            Some(wanted) => wanted.contains(&topic.to_lowercase()),
            None => true,
        })
        .map(|(topic, text)| {
            let metrics = analyze_content(&text);
            (topic, metrics)
        })
        .collect()
}

/// Level-1 headings in document order
///
/// The key is built from the heading's inline events, each taken as its raw
/// source text. Container markers (`>` of a blockquote, list indentation) and
/// the ATX closing sequence never reach the key; inline markup such as
/// `*emphasis*` stays as written.
fn find_headings(content: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut current: Option<Heading> = None;
    // nesting of inline tags inside the current heading
    let mut depth = 0usize;

    for (event, range) in Parser::new_ext(content, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => {
                current = Some(Heading {
                    line: line_of(content, range.start),
                    text: String::new(),
                });
                depth = 0;
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                if let Some(mut heading) = current.take() {
                    heading.text = heading.text.trim().to_string();
                    headings.push(heading);
                }
            }
            event => {
                let Some(heading) = current.as_mut() else {
                    continue;
                };
                match event {
                    Event::Start(_) => {
                        if depth == 0 {
                            heading.text.push_str(&content[range]);
                        }
                        depth += 1;
                    }
                    Event::End(_) => depth = depth.saturating_sub(1),
                    Event::SoftBreak | Event::HardBreak if depth == 0 => {
                        heading.text.push('\n')
                    }
                    _ if depth == 0 => heading.text.push_str(&content[range]),
                    _ => {}
                }
            }
        }
    }

    headings
}

/// Zero-based line number of a byte offset
fn line_of(content: &str, offset: usize) -> usize {
    content.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
}

/// Byte offset at which every line starts
fn line_starts(content: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(content.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}
