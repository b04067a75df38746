//! The editing surface the session drives.
//!
//! Rendering and selection handling belong to whatever implements
//! [`FormattingSurface`]. The session only hands it command names and reads or
//! replaces serialized markup.

use crate::markup::escape_html;

pub trait FormattingSurface: Send {
    /// Applies a named formatting command at the caret. Returns false when the
    /// command is unsupported or could not be applied.
    fn apply_command(&mut self, name: &str, value: Option<&str>) -> bool;
    fn query_state(&self, name: &str) -> bool;
    fn content(&self) -> String;
    fn set_content(&mut self, content: &str);
}

const INLINE_STYLES: [(&str, &str); 4] = [
    ("bold", "b"),
    ("italic", "i"),
    ("underline", "u"),
    ("strikeThrough", "s"),
];

/// In-memory surface with a collapsed caret.
///
/// The caret sits inside the last block after any content replacement. Inline
/// style commands toggle the style applied to subsequently inserted text, and
/// block insertions (rules, lists, paragraphs) are appended at the end.
#[derive(Debug, Clone, Default)]
pub struct MarkupBuffer {
    content: String,
    caret: usize,
    active_styles: Vec<&'static str>,
}

impl MarkupBuffer {
    pub fn new(content: &str) -> Self {
        let mut buffer = Self::default();
        buffer.set_content(content);
        buffer
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    fn insert_at_caret(&mut self, markup: &str) {
        self.content.insert_str(self.caret, markup);
        self.caret += markup.len();
    }

    fn append_block(&mut self, markup: &str) {
        self.content.push_str(markup);
        self.caret = end_of_last_block(&self.content);
    }

    fn insert_text(&mut self, text: &str) {
        let mut markup = String::new();
        for (_, tag) in INLINE_STYLES.iter().filter(|(name, _)| self.active_styles.contains(name)) {
            markup.push_str(&format!("<{tag}>"));
        }
        markup.push_str(&escape_html(text));
        for (_, tag) in INLINE_STYLES
            .iter()
            .rev()
            .filter(|(name, _)| self.active_styles.contains(name))
        {
            markup.push_str(&format!("</{tag}>"));
        }
        self.insert_at_caret(&markup);
    }

    fn toggle_style(&mut self, name: &str) -> bool {
        let Some((style, _)) = INLINE_STYLES.iter().find(|(style, _)| *style == name) else {
            return false;
        };
        if let Some(idx) = self.active_styles.iter().position(|active| active == style) {
            self.active_styles.remove(idx);
        } else {
            self.active_styles.push(*style);
        }
        true
    }
}

impl FormattingSurface for MarkupBuffer {
    fn apply_command(&mut self, name: &str, value: Option<&str>) -> bool {
        match (name, value) {
            ("insertText", Some(text)) => {
                self.insert_text(text);
                true
            }
            ("insertHTML", Some(markup)) => {
                self.insert_at_caret(markup);
                true
            }
            ("insertParagraph", _) => {
                self.append_block("<p></p>");
                true
            }
            ("insertHorizontalRule", _) => {
                self.append_block("<hr>");
                true
            }
            ("insertUnorderedList", _) => {
                self.append_block("<ul><li></li></ul>");
                true
            }
            ("insertOrderedList", _) => {
                self.append_block("<ol><li></li></ol>");
                true
            }
            (style, _) => self.toggle_style(style),
        }
    }

    fn query_state(&self, name: &str) -> bool {
        self.active_styles.iter().any(|active| *active == name)
    }

    fn content(&self) -> String {
        self.content.clone()
    }

    fn set_content(&mut self, content: &str) {
        self.content = content.to_string();
        self.caret = end_of_last_block(&self.content);
    }
}

/// Byte offset just before the run of closing tags that ends `markup`.
fn end_of_last_block(markup: &str) -> usize {
    let mut end = markup.len();
    while markup[..end].ends_with('>') {
        match markup[..end].rfind("</") {
            Some(start) if !markup[start + 2..end - 1].contains(['<', '>']) => end = start,
            _ => break,
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_text_lands_inside_last_paragraph() {
        let mut buffer = MarkupBuffer::new("<p>Hello</p>");
        assert!(buffer.apply_command("insertText", Some(" world")));
        assert_eq!(buffer.content(), "<p>Hello world</p>");
    }

    #[test]
    fn caret_skips_nested_closing_tags() {
        let buffer = MarkupBuffer::new("<ul><li>a</li></ul>");
        assert_eq!(buffer.caret(), "<ul><li>a".len());
    }

    #[test]
    fn typed_text_is_escaped() {
        let mut buffer = MarkupBuffer::new("");
        buffer.apply_command("insertText", Some("a < b"));
        assert_eq!(buffer.content(), "a &lt; b");
    }

    #[test]
    fn style_toggle_wraps_following_text() {
        let mut buffer = MarkupBuffer::new("<p></p>");
        assert!(buffer.apply_command("bold", None));
        assert!(buffer.query_state("bold"));
        buffer.apply_command("insertText", Some("loud"));
        assert!(buffer.apply_command("bold", None));
        assert!(!buffer.query_state("bold"));
        buffer.apply_command("insertText", Some(" quiet"));
        assert_eq!(buffer.content(), "<p><b>loud</b> quiet</p>");
    }

    #[test]
    fn block_commands_append_and_move_caret() {
        let mut buffer = MarkupBuffer::new("<p>a</p>");
        buffer.apply_command("insertHorizontalRule", None);
        buffer.apply_command("insertUnorderedList", None);
        buffer.apply_command("insertText", Some("item"));
        assert_eq!(buffer.content(), "<p>a</p><hr><ul><li>item</li></ul>");
    }

    #[test]
    fn unknown_command_reports_failure() {
        let mut buffer = MarkupBuffer::new("<p>a</p>");
        assert!(!buffer.apply_command("fontName", Some("Georgia")));
        assert!(!buffer.apply_command("insertText", None));
        assert_eq!(buffer.content(), "<p>a</p>");
    }
}
