//! Plain-text projection of serialized markup.
//!
//! The scanner only splits markup into tags, comments and text runs; it never
//! rewrites markup. Each projected character remembers the byte range it came
//! from so callers can map a text match back onto the markup.

use std::collections::HashMap;
use std::ops::Range;

use once_cell::sync::Lazy;

pub const TITLE_MAX_CHARS: usize = 50;

static NAMED_ENTITIES: Lazy<HashMap<&'static str, char>> = Lazy::new(|| {
    HashMap::from([
        ("amp", '&'),
        ("lt", '<'),
        ("gt", '>'),
        ("quot", '"'),
        ("apos", '\''),
        ("nbsp", '\u{a0}'),
        ("copy", '\u{a9}'),
        ("reg", '\u{ae}'),
        ("trade", '\u{2122}'),
        ("hellip", '\u{2026}'),
        ("mdash", '\u{2014}'),
        ("ndash", '\u{2013}'),
        ("lsquo", '\u{2018}'),
        ("rsquo", '\u{2019}'),
        ("ldquo", '\u{201c}'),
        ("rdquo", '\u{201d}'),
        ("bull", '\u{2022}'),
        ("middot", '\u{b7}'),
        ("deg", '\u{b0}'),
        ("euro", '\u{20ac}'),
    ])
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(Range<usize>),
    Tag {
        name: String,
        closing: bool,
        range: Range<usize>,
    },
    Comment,
}

fn tokenize(markup: &str) -> Vec<Token> {
    let bytes = markup.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' || !starts_markup(bytes.get(pos + 1).copied()) {
            pos += 1;
            continue;
        }
        if text_start < pos {
            tokens.push(Token::Text(text_start..pos));
        }

        if markup[pos..].starts_with("<!--") {
            let end = markup[pos + 4..]
                .find("-->")
                .map_or(bytes.len(), |offset| pos + 4 + offset + 3);
            tokens.push(Token::Comment);
            pos = end;
        } else {
            let end = markup[pos..]
                .find('>')
                .map_or(bytes.len(), |offset| pos + offset + 1);
            let inner = &markup[pos + 1..end.min(bytes.len())];
            let closing = inner.starts_with('/');
            let name: String = inner
                .trim_start_matches('/')
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect();
            tokens.push(Token::Tag {
                name,
                closing,
                range: pos..end,
            });
            pos = end;
        }
        text_start = pos;
    }

    if text_start < bytes.len() {
        tokens.push(Token::Text(text_start..bytes.len()));
    }
    tokens
}

fn starts_markup(next: Option<u8>) -> bool {
    matches!(next, Some(b) if b.is_ascii_alphabetic() || b == b'/' || b == b'!' || b == b'?')
}

/// A contiguous run of text between two tags, entity-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    text: String,
    spans: Vec<Range<usize>>,
    char_offset: usize,
}

impl TextRun {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Offset of the run's first character within the whole projection.
    pub fn char_offset(&self) -> usize {
        self.char_offset
    }

    pub fn char_len(&self) -> usize {
        self.spans.len()
    }

    /// Markup byte range covering run characters `chars`.
    pub fn markup_range(&self, chars: Range<usize>) -> Option<Range<usize>> {
        if chars.is_empty() || chars.end > self.spans.len() {
            return None;
        }
        Some(self.spans[chars.start].start..self.spans[chars.end - 1].end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    runs: Vec<TextRun>,
}

impl Projection {
    pub fn of(markup: &str) -> Self {
        let mut runs = Vec::new();
        let mut char_offset = 0;
        for token in tokenize(markup) {
            if let Token::Text(range) = token {
                let run = decode_run(markup, range, char_offset);
                char_offset += run.char_len();
                runs.push(run);
            }
        }
        Self { runs }
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(TextRun::text).collect()
    }
}

fn decode_run(markup: &str, range: Range<usize>, char_offset: usize) -> TextRun {
    let source = &markup[range.clone()];
    let mut text = String::with_capacity(source.len());
    let mut spans = Vec::new();
    let mut iter = source.char_indices().peekable();

    while let Some((idx, ch)) = iter.next() {
        let start = range.start + idx;
        if ch == '&' {
            if let Some((decoded, consumed)) = decode_entity(&source[idx..]) {
                text.push(decoded);
                spans.push(start..start + consumed);
                while iter.peek().is_some_and(|(next, _)| *next < idx + consumed) {
                    iter.next();
                }
                continue;
            }
        }
        text.push(ch);
        spans.push(start..start + ch.len_utf8());
    }

    TextRun {
        text,
        spans,
        char_offset,
    }
}

/// Decodes an entity at the start of `input`, returning the character and the
/// number of bytes consumed including `&` and `;`.
fn decode_entity(input: &str) -> Option<(char, usize)> {
    let end = input[1..].find(';')? + 1;
    if end > 12 {
        return None;
    }
    let body = &input[1..end];
    let decoded = if let Some(numeric) = body.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        char::from_u32(code)?
    } else {
        *NAMED_ENTITIES.get(body)?
    };
    Some((decoded, end + 1))
}

/// The text content of `markup`, as a browser's `textContent` would report it.
pub fn plain_text(markup: &str) -> String {
    Projection::of(markup).text()
}

/// Escapes text for use in element content or quoted attribute values.
pub fn escape_html(text: &str) -> String {
    v_htmlescape::escape(text)
        .to_string()
        .replace('\u{a0}', "&nbsp;")
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Counts UTF-16 code units, so characters outside the Basic Multilingual
/// Plane count twice.
pub fn character_count(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Derives a document title: the first heading's text, else the first
/// paragraph's, else the whole text. Paragraph and whole-text titles longer
/// than [`TITLE_MAX_CHARS`] are cut and suffixed with `...`.
pub fn extract_title(markup: &str) -> String {
    let tokens = tokenize(markup);

    if let Some(inner) = first_element_inner(&tokens, markup.len(), is_heading) {
        return plain_text(&markup[inner]).trim().to_string();
    }
    if let Some(inner) = first_element_inner(&tokens, markup.len(), |name| name == "p") {
        return truncate_title(plain_text(&markup[inner]).trim());
    }
    truncate_title(plain_text(markup).trim())
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn first_element_inner(
    tokens: &[Token],
    markup_len: usize,
    matches_name: impl Fn(&str) -> bool,
) -> Option<Range<usize>> {
    let (open_idx, name, open_end) = tokens.iter().enumerate().find_map(|(idx, token)| match token {
        Token::Tag {
            name,
            closing: false,
            range,
        } if matches_name(name.as_str()) => Some((idx, name.as_str(), range.end)),
        _ => None,
    })?;

    let close_start = tokens[open_idx + 1..]
        .iter()
        .find_map(|token| match token {
            Token::Tag {
                name: close_name,
                closing: true,
                range,
            } if close_name == name => Some(range.start),
            _ => None,
        })
        .unwrap_or(markup_len);
    Some(open_end..close_start.max(open_end))
}

fn truncate_title(text: &str) -> String {
    if character_count(text) <= TITLE_MAX_CHARS {
        return text.to_string();
    }
    let mut units = 0;
    let mut truncated: String = text
        .chars()
        .take_while(|ch| {
            units += ch.len_utf16();
            units <= TITLE_MAX_CHARS
        })
        .collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_strips_tags_and_comments() {
        let markup = "<p>Hello <b>world</b></p><!-- note --><p>again</p>";
        assert_eq!(plain_text(markup), "Hello worldagain");
    }

    #[test]
    fn plain_text_decodes_entities() {
        assert_eq!(plain_text("a &amp; b&nbsp;&lt;c&gt; &#65;&#x42;"), "a & b\u{a0}<c> AB");
    }

    #[test]
    fn unknown_entities_and_bare_angles_stay_literal() {
        assert_eq!(plain_text("1 < 2 &bogus; & 3"), "1 < 2 &bogus; & 3");
    }

    #[test]
    fn runs_map_characters_back_to_markup() {
        let markup = "<p>x &amp; cat</p>";
        let projection = Projection::of(markup);
        let run = &projection.runs()[0];
        assert_eq!(run.text(), "x & cat");
        let range = run.markup_range(4..7).unwrap();
        assert_eq!(&markup[range], "cat");
        let amp = run.markup_range(2..3).unwrap();
        assert_eq!(&markup[amp], "&amp;");
    }

    #[test]
    fn run_offsets_accumulate_across_tags() {
        let projection = Projection::of("<p>ab</p><p>cde</p>");
        let offsets: Vec<_> = projection.runs().iter().map(TextRun::char_offset).collect();
        assert_eq!(offsets, vec![0, 2]);
    }

    #[test]
    fn title_prefers_first_heading() {
        assert_eq!(extract_title("<h2>My Title</h2><p>body</p>"), "My Title");
        assert_eq!(extract_title("<p>intro</p><h3> Later </h3>"), "Later");
    }

    #[test]
    fn heading_title_is_not_truncated() {
        let long = "H".repeat(70);
        assert_eq!(extract_title(&format!("<h1>{long}</h1>")), long);
    }

    #[test]
    fn title_truncates_long_paragraph() {
        let paragraph = "abcdefghij".repeat(6);
        let title = extract_title(&format!("<p>{paragraph}</p>"));
        assert_eq!(title, format!("{}...", &paragraph[..50]));
    }

    #[test]
    fn title_ignores_tags_sharing_a_prefix_with_p() {
        assert_eq!(extract_title("<pre>code</pre><p>para</p>"), "para");
    }

    #[test]
    fn title_falls_back_to_whole_text() {
        assert_eq!(extract_title("just text"), "just text");
        assert_eq!(extract_title("<div>  </div>"), "");
    }

    #[test]
    fn counts_follow_whitespace_splitting() {
        let text = plain_text("<p>one two</p><p>three&nbsp;four</p>");
        assert_eq!(word_count(&text), 3);
        assert_eq!(word_count("   "), 0);
        assert_eq!(character_count("héllo"), 5);
        assert_eq!(character_count("hi 👋"), 5);
    }

    #[test]
    fn title_cut_counts_utf16_units_without_splitting_characters() {
        let paragraph = format!("{}👋tail", "a".repeat(49));
        let title = extract_title(&format!("<p>{paragraph}</p>"));
        assert_eq!(title, format!("{}...", "a".repeat(49)));
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(escape_html("<a & b>"), "&lt;a &amp; b&gt;");
        assert_eq!(escape_html("say \"hi\""), "say &quot;hi&quot;");
        assert_eq!(escape_html("a\u{a0}b"), "a&nbsp;b");
        assert_eq!(plain_text(&escape_html("it's a/b")), "it's a/b");
    }
}
