use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{EditorConfig, Theme};
use crate::error::SessionError;
use crate::history::HistoryStack;
use crate::insert::Insertion;
use crate::markup::{character_count, extract_title, plain_text, word_count};
use crate::search::{MatchCount, MatchLocation, MatchTracker, SearchState};
use crate::store::{AutosavePayload, DocumentId, DocumentRecord, DocumentStore};
use crate::surface::FormattingSurface;
use crate::timer::{Clock, SystemClock, Timer};

pub const UNTITLED: &str = "Untitled Document";

#[derive(Debug, Clone)]
pub enum Command {
    Type { text: String },
    Format { name: String, value: Option<String> },
    Insert(Insertion),
    Undo,
    Redo,
    Blur,
    Save,
    AutoSave,
    NewDocument,
    Open { id: DocumentId },
    RecoverAutosave,
    Find { term: String },
    FindNext,
    FindPrev,
    ReplaceCurrent { replacement: String },
    ReplaceAll { replacement: String },
    ToggleTheme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ContentReplaced,
    HistoryChanged { can_undo: bool, can_redo: bool },
    Saved(DocumentId),
    SaveFailed(String),
    AutoSaved,
    AutoSaveFailed(String),
    DocumentOpened(DocumentId),
    Recovered,
    NewDocument,
    ThemeChanged(Theme),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentStats {
    pub words: usize,
    pub characters: usize,
}

/// One editor instance: the live surface, its undo history, modification
/// tracking, autosave scheduling and find/replace state.
///
/// The session is single threaded. Deferred work (the edit debounce and the
/// autosave interval) runs only when the host calls [`Session::poll_timers`].
pub struct Session {
    surface: Box<dyn FormattingSurface>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: EditorConfig,
    history: HistoryStack,
    tracker: MatchTracker,
    current_document: Option<DocumentRecord>,
    modified: bool,
    theme: Theme,
    debounce: Timer,
    autosave: Timer,
    closed: bool,
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl Session {
    pub fn new(
        surface: Box<dyn FormattingSurface>,
        store: Arc<dyn DocumentStore>,
        config: EditorConfig,
    ) -> Self {
        Self::with_clock(surface, store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        mut surface: Box<dyn FormattingSurface>,
        store: Arc<dyn DocumentStore>,
        config: EditorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let theme = match config.theme {
            Some(theme) => theme,
            None => match store.read_theme() {
                Ok(stored) => stored.unwrap_or_default(),
                Err(err) => {
                    warn!(?err, "failed to read theme preference");
                    Theme::default()
                }
            },
        };

        let now = clock.now();
        let placeholder = config.placeholder_markup();
        surface.set_content(&placeholder);
        let mut history = HistoryStack::new(config.max_history);
        history.push(placeholder, now);

        let mut autosave = Timer::periodic(config.auto_save_interval());
        if config.auto_save {
            autosave.schedule(now);
        }

        Self {
            surface,
            store,
            clock,
            debounce: Timer::once(config.snapshot_debounce()),
            autosave,
            config,
            history,
            tracker: MatchTracker::new(),
            current_document: None,
            modified: false,
            theme,
            closed: false,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Arc<Mutex<Vec<SessionEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn drain_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn emit(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }

    fn emit_history(&self) {
        self.emit(SessionEvent::HistoryChanged {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        });
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn content(&self) -> String {
        self.surface.content()
    }

    pub fn plain_text(&self) -> String {
        plain_text(&self.surface.content())
    }

    pub fn stats(&self) -> DocumentStats {
        let text = self.plain_text();
        DocumentStats {
            words: word_count(&text),
            characters: character_count(&text),
        }
    }

    pub fn current_document(&self) -> Option<&DocumentRecord> {
        self.current_document.as_ref()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Whether discarding the document would lose work. Callers confirm with
    /// the user before [`Session::new_document`] when this is true.
    pub fn has_unsaved_changes(&self) -> bool {
        self.modified
    }

    pub fn query_state(&self, name: &str) -> bool {
        self.surface.query_state(name)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Content differs from the snapshot under the history cursor and a
    /// debounced snapshot is still pending.
    fn has_uncommitted_edit(&self) -> bool {
        self.debounce.is_pending()
            && self
                .history
                .current()
                .map_or(true, |snapshot| snapshot.content() != self.surface.content())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo() || (self.has_uncommitted_edit() && !self.history.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo() && !self.has_uncommitted_edit()
    }

    /// Pushes the live content unless it already is the current snapshot.
    fn commit_snapshot(&mut self) -> bool {
        let content = self.surface.content();
        if self
            .history
            .current()
            .is_some_and(|snapshot| snapshot.content() == content)
        {
            return false;
        }
        self.history.push(content, self.clock.now());
        true
    }

    fn flush_pending_snapshot(&mut self) {
        if self.debounce.is_pending() {
            self.debounce.cancel();
            self.commit_snapshot();
        }
    }

    fn reset_history(&mut self, content: &str) {
        self.debounce.cancel();
        self.history.clear();
        self.history.push(content, self.clock.now());
        self.emit_history();
    }

    fn after_content_replaced(&mut self) {
        self.tracker.refresh(&self.surface.content());
        self.emit(SessionEvent::ContentReplaced);
    }

    /// Records that the live content changed through user input. The history
    /// snapshot is deferred until the debounce window passes without edits.
    pub fn record_edit(&mut self) {
        if self.closed {
            return;
        }
        self.modified = true;
        self.debounce.schedule(self.clock.now());
    }

    /// Snapshots the live content ahead of a command so the pre-command state
    /// is always recoverable. Any pending debounced snapshot is folded in.
    pub fn before_mutating_command(&mut self) {
        self.debounce.cancel();
        self.commit_snapshot();
    }

    pub fn type_text(&mut self, text: &str) {
        if self.surface.apply_command("insertText", Some(text)) {
            self.record_edit();
            self.tracker.refresh(&self.surface.content());
        }
    }

    /// Applies a formatting command as one undoable step.
    pub fn exec_command(&mut self, name: &str, value: Option<&str>) -> bool {
        self.before_mutating_command();
        let before = self.surface.content();
        if !self.surface.apply_command(name, value) {
            warn!(command = name, "formatting command failed");
            return false;
        }
        if self.surface.content() != before {
            self.modified = true;
            self.commit_snapshot();
            self.tracker.refresh(&self.surface.content());
        }
        self.emit_history();
        true
    }

    pub fn insert(&mut self, insertion: &Insertion) -> bool {
        self.exec_command("insertHTML", Some(&insertion.to_markup()))
    }

    /// Replaces the whole content and snapshots the result.
    pub fn set_content(&mut self, markup: &str) {
        self.debounce.cancel();
        self.surface.set_content(markup);
        self.commit_snapshot();
        self.after_content_replaced();
        self.emit_history();
    }

    /// The editing surface lost focus; pending edits become a snapshot.
    pub fn blur(&mut self) {
        self.debounce.cancel();
        if self.commit_snapshot() {
            self.emit_history();
        }
    }

    pub fn undo(&mut self) -> Option<String> {
        self.flush_pending_snapshot();
        let content = self.history.undo()?.to_string();
        self.surface.set_content(&content);
        self.after_content_replaced();
        self.emit_history();
        Some(content)
    }

    pub fn redo(&mut self) -> Option<String> {
        self.flush_pending_snapshot();
        let content = self.history.redo()?.to_string();
        self.surface.set_content(&content);
        self.after_content_replaced();
        self.emit_history();
        Some(content)
    }

    #[instrument(skip(self))]
    pub fn save(&mut self) -> Result<DocumentRecord, SessionError> {
        let content = self.surface.content();
        let text = plain_text(&content);
        let title = match extract_title(&content) {
            title if title.is_empty() => UNTITLED.to_string(),
            title => title,
        };
        let now = self.clock.now();
        let (id, created_at) = match &self.current_document {
            Some(existing) => (existing.id.clone(), existing.created_at),
            None => (Uuid::new_v4().to_string(), now),
        };
        let record = DocumentRecord {
            id,
            title,
            created_at,
            modified_at: now,
            word_count: word_count(&text),
            character_count: character_count(&text),
            content,
        };

        if let Err(err) = self.store.upsert_document(&record) {
            warn!(?err, id = %record.id, "failed to save document");
            self.emit(SessionEvent::SaveFailed(err.to_string()));
            return Err(err.into());
        }

        info!(id = %record.id, title = %record.title, "document saved");
        self.current_document = Some(record.clone());
        self.modified = false;
        self.emit(SessionEvent::Saved(record.id.clone()));
        Ok(record)
    }

    /// Writes the crash-recovery slot. Returns whether anything was written;
    /// an unmodified session has nothing to protect.
    #[instrument(skip(self))]
    pub fn auto_save(&mut self) -> Result<bool, SessionError> {
        if !self.modified {
            return Ok(false);
        }
        let payload = AutosavePayload {
            content: self.surface.content(),
            timestamp: self.clock.now(),
            current_document: self.current_document.clone(),
        };
        if let Err(err) = self.store.write_autosave(&payload) {
            warn!(?err, "autosave failed");
            self.emit(SessionEvent::AutoSaveFailed(err.to_string()));
            return Err(err.into());
        }
        debug!(timestamp = payload.timestamp, "autosaved");
        self.emit(SessionEvent::AutoSaved);
        Ok(true)
    }

    /// Starts a fresh document. Does not ask for confirmation; see
    /// [`Session::has_unsaved_changes`].
    pub fn new_document(&mut self) {
        let placeholder = self.config.placeholder_markup();
        self.current_document = None;
        self.modified = false;
        self.surface.set_content(&placeholder);
        self.reset_history(&placeholder);
        self.after_content_replaced();
        self.emit(SessionEvent::NewDocument);
    }

    #[instrument(skip(self))]
    pub fn open(&mut self, id: &str) -> Result<DocumentRecord, SessionError> {
        let record = self
            .store
            .get_document(id)?
            .ok_or_else(|| SessionError::UnknownDocument(id.to_string()))?;
        self.surface.set_content(&record.content);
        self.reset_history(&record.content);
        self.current_document = Some(record.clone());
        self.modified = false;
        self.after_content_replaced();
        info!(id = %record.id, "document opened");
        self.emit(SessionEvent::DocumentOpened(record.id.clone()));
        Ok(record)
    }

    /// Restores the autosave slot. The recovered content counts as unsaved.
    #[instrument(skip(self))]
    pub fn recover_autosave(&mut self) -> Result<AutosavePayload, SessionError> {
        let payload = self
            .store
            .read_autosave()?
            .ok_or(SessionError::NothingToRecover)?;
        self.surface.set_content(&payload.content);
        self.reset_history(&payload.content);
        self.current_document = payload.current_document.clone();
        self.modified = true;
        self.after_content_replaced();
        info!(timestamp = payload.timestamp, "recovered autosaved content");
        self.emit(SessionEvent::Recovered);
        Ok(payload)
    }

    pub fn set_search_term(&mut self, term: &str) -> MatchCount {
        self.tracker.set_search_term(term, &self.surface.content());
        self.tracker.count()
    }

    pub fn find_next(&mut self) -> Option<MatchLocation> {
        self.tracker.next().cloned()
    }

    pub fn find_prev(&mut self) -> Option<MatchLocation> {
        self.tracker.prev().cloned()
    }

    pub fn current_match(&self) -> Option<&MatchLocation> {
        self.tracker.current()
    }

    pub fn match_count(&self) -> MatchCount {
        self.tracker.count()
    }

    pub fn search_state(&self) -> SearchState {
        self.tracker.state()
    }

    pub fn search_term(&self) -> &str {
        self.tracker.term()
    }

    pub fn replace_current(&mut self, replacement: &str) -> bool {
        if self.search_state() != SearchState::HasMatches {
            return false;
        }
        self.before_mutating_command();
        let content = self.surface.content();
        match self.tracker.replace_current(replacement, &content) {
            Some(updated) => {
                self.apply_replacement(&updated);
                true
            }
            None => false,
        }
    }

    pub fn replace_all(&mut self, replacement: &str) -> usize {
        if self.search_state() != SearchState::HasMatches {
            return 0;
        }
        self.before_mutating_command();
        let content = self.surface.content();
        let replaced = self.tracker.matches().len();
        match self.tracker.replace_all(replacement, &content) {
            Some(updated) => {
                self.apply_replacement(&updated);
                replaced
            }
            None => 0,
        }
    }

    fn apply_replacement(&mut self, updated: &str) {
        self.surface.set_content(updated);
        self.modified = true;
        self.commit_snapshot();
        self.emit(SessionEvent::ContentReplaced);
        self.emit_history();
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Flips the theme. The new theme applies even when persisting it fails.
    pub fn toggle_theme(&mut self) -> Result<Theme, SessionError> {
        self.theme = self.theme.toggled();
        self.emit(SessionEvent::ThemeChanged(self.theme));
        self.store.write_theme(self.theme)?;
        Ok(self.theme)
    }

    /// Fires whichever timers are due: first the edit debounce, then autosave.
    pub fn poll_timers(&mut self) {
        if self.closed {
            return;
        }
        let now = self.clock.now();
        if self.debounce.fire_if_due(now) {
            debug!("edit debounce elapsed");
            if self.commit_snapshot() {
                self.emit_history();
            }
        }
        if self.autosave.fire_if_due(now) {
            // Failures are already logged and queued as events.
            let _ = self.auto_save();
        }
    }

    /// Tears the session down: cancels both timers and writes a last autosave.
    pub fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.debounce.cancel();
        self.autosave.cancel();
        self.closed = true;
        self.auto_save().map(|_| ())
    }

    pub fn apply(&mut self, command: Command) -> Result<(), SessionError> {
        match command {
            Command::Type { text } => self.type_text(&text),
            Command::Format { name, value } => {
                self.exec_command(&name, value.as_deref());
            }
            Command::Insert(insertion) => {
                self.insert(&insertion);
            }
            Command::Undo => {
                self.undo();
            }
            Command::Redo => {
                self.redo();
            }
            Command::Blur => self.blur(),
            Command::Save => {
                self.save()?;
            }
            Command::AutoSave => {
                self.auto_save()?;
            }
            Command::NewDocument => self.new_document(),
            Command::Open { id } => {
                self.open(&id)?;
            }
            Command::RecoverAutosave => {
                self.recover_autosave()?;
            }
            Command::Find { term } => {
                self.set_search_term(&term);
            }
            Command::FindNext => {
                self.find_next();
            }
            Command::FindPrev => {
                self.find_prev();
            }
            Command::ReplaceCurrent { replacement } => {
                self.replace_current(&replacement);
            }
            Command::ReplaceAll { replacement } => {
                self.replace_all(&replacement);
            }
            Command::ToggleTheme => {
                self.toggle_theme()?;
            }
        }
        Ok(())
    }
}
