//! Editing core for a rich-text document editor: undo history, the document
//! session with autosave, persistence and find/replace.

pub mod config;
pub mod error;
pub mod history;
pub mod insert;
pub mod markup;
pub mod search;
pub mod session;
pub mod store;
pub mod surface;
pub mod timer;

pub use config::{EditorConfig, Theme};
pub use error::{SessionError, StoreError};
pub use history::{HistoryStack, Snapshot, MAX_HISTORY};
pub use insert::{Insertion, TableSpec, TableWidth};
pub use search::{MatchCount, MatchLocation, MatchTracker, SearchState};
pub use session::{Command, DocumentStats, Session, SessionEvent, UNTITLED};
pub use store::{
    AutosavePayload, DocumentId, DocumentRecord, DocumentStore, FileKeyValueStore,
    KeyValueStore, LocalDocumentStore, MemoryKeyValueStore,
};
pub use surface::{FormattingSurface, MarkupBuffer};
pub use timer::{Clock, ManualClock, SystemClock, Timer, Timestamp};
