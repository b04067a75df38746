//! Line-oriented front end for a [`Session`]: maps input lines to editor
//! commands and renders the status line.

use std::io::{self, Write};

use rte_core::{Command, Insertion, SearchState, Session, SessionEvent, TableSpec, UNTITLED};
use rte_export::ExportFormat;
use thiserror::Error;
use tracing::debug;

/// Ends a multi-line paste started with `:paste`.
pub const PASTE_TERMINATOR: &str = ".";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command :{0} (try :help)")]
    UnknownCommand(String),
    #[error(":{command} needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("invalid value for :{command}: {value}")]
    InvalidArgument { command: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    Export {
        format: ExportFormat,
        output: Option<String>,
    },
    ListDocuments,
    DeleteDocument { id: String },
    DiscardAutosave,
    PrintContent,
    ShowStatus,
    BeginPaste,
    Help,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Paste,
}

#[derive(Debug, Default)]
pub struct LineMapper {
    mode: InputMode,
    paste_buffer: Vec<String>,
}

impl LineMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.paste_buffer.clear();
            self.mode = mode;
        }
    }

    pub fn map_line(&mut self, line: &str) -> Result<UiEvent, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        match self.mode {
            InputMode::Normal => self.map_line_normal(line),
            InputMode::Paste => Ok(self.map_line_paste(line)),
        }
    }

    fn map_line_paste(&mut self, line: &str) -> UiEvent {
        if line != PASTE_TERMINATOR {
            self.paste_buffer.push(line.to_string());
            return UiEvent::None;
        }
        let text = self.paste_buffer.join("\n");
        self.set_mode(InputMode::Normal);
        if text.is_empty() {
            UiEvent::None
        } else {
            UiEvent::Command(Command::Insert(Insertion::PasteText(text)))
        }
    }

    fn map_line_normal(&mut self, line: &str) -> Result<UiEvent, ParseError> {
        if line.is_empty() {
            return Ok(format_command("insertParagraph", None));
        }
        // `::text` types a literal line starting with a colon.
        if let Some(literal) = line.strip_prefix("::") {
            return Ok(UiEvent::Command(Command::Type {
                text: format!(":{literal}"),
            }));
        }
        let Some(input) = line.strip_prefix(':') else {
            return Ok(UiEvent::Command(Command::Type {
                text: line.to_string(),
            }));
        };

        // Search and replacement text keep their surrounding spaces.
        let (name, raw) = input.split_once(' ').unwrap_or((input, ""));
        let rest = raw.trim();
        debug!(command = name, "mapping shell command");

        let event = match name {
            "q" | "quit" => UiEvent::Quit,
            "help" | "h" => UiEvent::Help,
            "status" => UiEvent::ShowStatus,
            "print" | "p" => UiEvent::PrintContent,
            "list" | "ls" => UiEvent::ListDocuments,
            "undo" | "u" => UiEvent::Command(Command::Undo),
            "redo" | "r" => UiEvent::Command(Command::Redo),
            "blur" => UiEvent::Command(Command::Blur),
            "save" | "w" => UiEvent::Command(Command::Save),
            "autosave" => UiEvent::Command(Command::AutoSave),
            "new" => UiEvent::Command(Command::NewDocument),
            "recover" => UiEvent::Command(Command::RecoverAutosave),
            "discard-autosave" => UiEvent::DiscardAutosave,
            "theme" => UiEvent::Command(Command::ToggleTheme),
            "open" => UiEvent::Command(Command::Open {
                id: required(rest, "open", "a document id")?.to_string(),
            }),
            "delete" => UiEvent::DeleteDocument {
                id: required(rest, "delete", "a document id")?.to_string(),
            },
            "find" | "f" => UiEvent::Command(Command::Find {
                term: raw.to_string(),
            }),
            "next" | "n" => UiEvent::Command(Command::FindNext),
            "prev" | "N" => UiEvent::Command(Command::FindPrev),
            "replace" => UiEvent::Command(Command::ReplaceCurrent {
                replacement: raw.to_string(),
            }),
            "replace-all" => UiEvent::Command(Command::ReplaceAll {
                replacement: raw.to_string(),
            }),
            "bold" | "b" => format_command("bold", None),
            "italic" | "i" => format_command("italic", None),
            "underline" => format_command("underline", None),
            "strike" => format_command("strikeThrough", None),
            "para" => format_command("insertParagraph", None),
            "ul" => format_command("insertUnorderedList", None),
            "ol" => format_command("insertOrderedList", None),
            "format" => {
                let (command, value) = match rest.split_once(' ') {
                    Some((command, value)) => (command, Some(value.trim().to_string())),
                    None => (required(rest, "format", "a command name")?, None),
                };
                format_command(command, value)
            }
            "hr" => insert(Insertion::HorizontalRule),
            "tab" => insert(Insertion::Tab),
            "link" => {
                let (url, text) = split_first(required(rest, "link", "a URL")?);
                insert(Insertion::Link { url, text })
            }
            "image" => {
                let (url, alt) = split_first(required(rest, "image", "a URL")?);
                insert(Insertion::Image { url, alt })
            }
            "table" => insert(Insertion::Table(parse_table(rest)?)),
            "html" => insert(Insertion::PasteHtml(
                required(rest, "html", "markup")?.to_string(),
            )),
            "paste" => {
                self.set_mode(InputMode::Paste);
                UiEvent::BeginPaste
            }
            "export" => {
                let (format, output) = split_first(required(rest, "export", "a format")?);
                let format = format
                    .parse::<ExportFormat>()
                    .map_err(|_| ParseError::InvalidArgument {
                        command: "export",
                        value: format.clone(),
                    })?;
                UiEvent::Export { format, output }
            }
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        };
        Ok(event)
    }

    /// Input buffered but not yet turned into an event.
    pub fn pending_input(&self) -> Option<String> {
        match self.mode {
            InputMode::Paste => Some(format!("paste ({} lines)", self.paste_buffer.len())),
            InputMode::Normal => None,
        }
    }
}

fn format_command(name: &str, value: Option<String>) -> UiEvent {
    UiEvent::Command(Command::Format {
        name: name.to_string(),
        value,
    })
}

fn insert(insertion: Insertion) -> UiEvent {
    UiEvent::Command(Command::Insert(insertion))
}

fn required<'a>(
    rest: &'a str,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, ParseError> {
    if rest.is_empty() {
        Err(ParseError::MissingArgument { command, argument })
    } else {
        Ok(rest)
    }
}

fn split_first(rest: &str) -> (String, Option<String>) {
    match rest.split_once(' ') {
        Some((first, tail)) if !tail.trim().is_empty() => {
            (first.to_string(), Some(tail.trim().to_string()))
        }
        Some((first, _)) => (first.to_string(), None),
        None => (rest.to_string(), None),
    }
}

/// Accepts `ROWSxCOLS`, `ROWS COLS`, or nothing for the default table.
fn parse_table(rest: &str) -> Result<TableSpec, ParseError> {
    if rest.is_empty() {
        return Ok(TableSpec::default());
    }
    let invalid = || ParseError::InvalidArgument {
        command: "table",
        value: rest.to_string(),
    };
    let (rows, columns) = rest
        .split_once(['x', ' '])
        .ok_or_else(invalid)?;
    let rows: usize = rows.trim().parse().map_err(|_| invalid())?;
    let columns: usize = columns.trim().parse().map_err(|_| invalid())?;
    if rows == 0
        || columns == 0
        || rows > TableSpec::MAX_ROWS
        || columns > TableSpec::MAX_COLUMNS
    {
        return Err(invalid());
    }
    Ok(TableSpec::new(rows, columns))
}

pub fn format_status(session: &Session) -> String {
    let title = session
        .current_document()
        .map(|doc| doc.title.as_str())
        .unwrap_or(UNTITLED);
    let marker = if session.is_modified() { "*" } else { "" };
    let stats = session.stats();
    let mut status = format!(
        "{title}{marker} | {} words | {} characters | {}",
        stats.words,
        stats.characters,
        session.theme()
    );
    if session.search_state() != SearchState::Idle {
        let count = session.match_count();
        status.push_str(&format!(
            " | find \"{}\": {} of {}",
            session.search_term(),
            count.current,
            count.total
        ));
    }
    status
}

/// Status message for a queued session event, if it warrants one.
pub fn describe_event(event: &SessionEvent) -> Option<String> {
    let message = match event {
        SessionEvent::Saved(id) => format!("Document saved ({id})"),
        SessionEvent::SaveFailed(reason) => format!("Save failed: {reason}"),
        SessionEvent::AutoSaved => "Auto-saved".to_string(),
        SessionEvent::AutoSaveFailed(reason) => format!("Auto-save failed: {reason}"),
        SessionEvent::DocumentOpened(id) => format!("Opened {id}"),
        SessionEvent::Recovered => "Recovered auto-saved content".to_string(),
        SessionEvent::NewDocument => "New document".to_string(),
        SessionEvent::ThemeChanged(theme) => format!("Theme: {theme}"),
        SessionEvent::ContentReplaced | SessionEvent::HistoryChanged { .. } => return None,
    };
    Some(message)
}

pub const HELP: &str = "\
Lines are typed into the document; an empty line starts a new paragraph.
Commands:
  :undo :redo :save :autosave :new :open ID :blur
  :recover :discard-autosave
  :find TERM :next :prev :replace TEXT :replace-all TEXT
  :bold :italic :underline :strike :para :ul :ol :format NAME [VALUE]
  :link URL [TEXT] :image URL [ALT] :table [ROWSxCOLS] :hr :tab
  :html MARKUP :paste (end with a single '.')
  :export html|text|json [PATH] :list :delete ID
  :print :status :theme :help :quit
  ::text types a line that starts with ':'";

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    writeln!(writer, "{}", label)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rte_core::{EditorConfig, LocalDocumentStore, MarkupBuffer, Theme};
    use std::sync::Arc;

    fn session() -> Session {
        Session::new(
            Box::new(MarkupBuffer::default()),
            Arc::new(LocalDocumentStore::in_memory()),
            EditorConfig {
                theme: Some(Theme::Light),
                ..EditorConfig::default()
            },
        )
    }

    #[test]
    fn plain_line_is_typed_text() {
        let mut mapper = LineMapper::new();
        match mapper.map_line("hello world").unwrap() {
            UiEvent::Command(Command::Type { ref text }) => assert_eq!(text, "hello world"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn double_colon_escapes_command_prefix() {
        let mut mapper = LineMapper::new();
        match mapper.map_line("::not a command").unwrap() {
            UiEvent::Command(Command::Type { ref text }) => assert_eq!(text, ":not a command"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn empty_line_starts_paragraph() {
        let mut mapper = LineMapper::new();
        match mapper.map_line("").unwrap() {
            UiEvent::Command(Command::Format { ref name, .. }) => {
                assert_eq!(name, "insertParagraph")
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn history_and_lifecycle_commands() {
        let mut mapper = LineMapper::new();
        assert!(matches!(
            mapper.map_line(":undo").unwrap(),
            UiEvent::Command(Command::Undo)
        ));
        assert!(matches!(
            mapper.map_line(":r").unwrap(),
            UiEvent::Command(Command::Redo)
        ));
        assert!(matches!(
            mapper.map_line(":w").unwrap(),
            UiEvent::Command(Command::Save)
        ));
        assert!(matches!(mapper.map_line(":q").unwrap(), UiEvent::Quit));
        assert!(matches!(
            mapper.map_line(":discard-autosave").unwrap(),
            UiEvent::DiscardAutosave
        ));
        match mapper.map_line(":open abc-123").unwrap() {
            UiEvent::Command(Command::Open { ref id }) => assert_eq!(id, "abc-123"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn find_keeps_spaces_in_term() {
        let mut mapper = LineMapper::new();
        match mapper.map_line(":find the cat").unwrap() {
            UiEvent::Command(Command::Find { ref term }) => assert_eq!(term, "the cat"),
            other => panic!("unexpected event: {:?}", other),
        }
        match mapper.map_line(":replace-all big dog").unwrap() {
            UiEvent::Command(Command::ReplaceAll { ref replacement }) => {
                assert_eq!(replacement, "big dog")
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn search_and_replacement_text_keep_surrounding_spaces() {
        let mut mapper = LineMapper::new();
        match mapper.map_line(":find  cat ").unwrap() {
            UiEvent::Command(Command::Find { ref term }) => assert_eq!(term, " cat "),
            other => panic!("unexpected event: {:?}", other),
        }
        match mapper.map_line(":replace-all  dog ").unwrap() {
            UiEvent::Command(Command::ReplaceAll { ref replacement }) => {
                assert_eq!(replacement, " dog ")
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match mapper.map_line(":open  abc ").unwrap() {
            UiEvent::Command(Command::Open { ref id }) => assert_eq!(id, "abc"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn format_command_passes_value() {
        let mut mapper = LineMapper::new();
        match mapper.map_line(":format foreColor #ff0000").unwrap() {
            UiEvent::Command(Command::Format {
                ref name,
                ref value,
            }) => {
                assert_eq!(name, "foreColor");
                assert_eq!(value.as_deref(), Some("#ff0000"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn link_text_is_optional() {
        let mut mapper = LineMapper::new();
        match mapper.map_line(":link https://example.com Example site").unwrap() {
            UiEvent::Command(Command::Insert(Insertion::Link { ref url, ref text })) => {
                assert_eq!(url, "https://example.com");
                assert_eq!(text.as_deref(), Some("Example site"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match mapper.map_line(":link https://example.com").unwrap() {
            UiEvent::Command(Command::Insert(Insertion::Link { ref text, .. })) => {
                assert!(text.is_none())
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn table_dimensions_are_parsed_and_bounded() {
        let mut mapper = LineMapper::new();
        match mapper.map_line(":table 2x4").unwrap() {
            UiEvent::Command(Command::Insert(Insertion::Table(spec))) => {
                assert_eq!((spec.rows, spec.columns), (2, 4))
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match mapper.map_line(":table").unwrap() {
            UiEvent::Command(Command::Insert(Insertion::Table(spec))) => {
                assert_eq!(spec, TableSpec::default())
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(
            mapper.map_line(":table 30x2").unwrap_err(),
            ParseError::InvalidArgument {
                command: "table",
                value: "30x2".to_string()
            }
        );
    }

    #[test]
    fn missing_and_unknown_arguments_are_errors() {
        let mut mapper = LineMapper::new();
        assert_eq!(
            mapper.map_line(":open").unwrap_err(),
            ParseError::MissingArgument {
                command: "open",
                argument: "a document id"
            }
        );
        assert_eq!(
            mapper.map_line(":frobnicate").unwrap_err(),
            ParseError::UnknownCommand("frobnicate".to_string())
        );
        assert!(matches!(
            mapper.map_line(":export pdf").unwrap_err(),
            ParseError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn export_takes_format_and_optional_path() {
        let mut mapper = LineMapper::new();
        match mapper.map_line(":export json out/doc.json").unwrap() {
            UiEvent::Export { format, ref output } => {
                assert_eq!(format, ExportFormat::Json);
                assert_eq!(output.as_deref(), Some("out/doc.json"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn paste_mode_collects_until_terminator() {
        let mut mapper = LineMapper::new();
        assert!(matches!(
            mapper.map_line(":paste").unwrap(),
            UiEvent::BeginPaste
        ));
        assert_eq!(mapper.mode(), InputMode::Paste);
        assert!(matches!(mapper.map_line(":undo").unwrap(), UiEvent::None));
        assert!(matches!(mapper.map_line("<b>").unwrap(), UiEvent::None));
        assert_eq!(mapper.pending_input().as_deref(), Some("paste (2 lines)"));

        match mapper.map_line(".").unwrap() {
            UiEvent::Command(Command::Insert(Insertion::PasteText(ref text))) => {
                assert_eq!(text, ":undo\n<b>")
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mapper.mode(), InputMode::Normal);
        assert!(mapper.pending_input().is_none());
    }

    #[test]
    fn empty_paste_is_dropped() {
        let mut mapper = LineMapper::new();
        mapper.map_line(":paste").unwrap();
        assert!(matches!(mapper.map_line(".").unwrap(), UiEvent::None));
        assert_eq!(mapper.mode(), InputMode::Normal);
    }

    #[test]
    fn status_reports_counts_and_search() {
        let mut session = session();
        session.set_content("<p>the cat sat</p>");
        assert_eq!(
            format_status(&session),
            "Untitled Document | 3 words | 11 characters | light"
        );

        session.type_text(" down");
        session.set_search_term("cat");
        assert_eq!(
            format_status(&session),
            "Untitled Document* | 4 words | 16 characters | light | find \"cat\": 1 of 1"
        );
    }

    #[test]
    fn status_uses_saved_title() {
        let mut session = session();
        session.set_content("<h1>Notes</h1>");
        session.save().unwrap();
        assert!(format_status(&session).starts_with("Notes | 1 words"));
    }

    #[test]
    fn events_describe_status_messages() {
        assert_eq!(
            describe_event(&SessionEvent::AutoSaved).as_deref(),
            Some("Auto-saved")
        );
        assert_eq!(describe_event(&SessionEvent::ContentReplaced), None);
    }

    #[test]
    fn write_status_line_ends_with_newline() {
        let mut out = Vec::new();
        write_status_line(&mut out, "Ready").unwrap();
        assert_eq!(out, b"Ready\n");
    }
}
