use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use rte_core::{
    Clock, Command, DocumentStore, EditorConfig, FileKeyValueStore, LocalDocumentStore,
    MarkupBuffer, Session, SystemClock,
};
use rte_export::{export, ExportFormat};
use rte_shell::{describe_event, format_status, write_status_line, LineMapper, UiEvent, HELP};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Parser)]
#[command(
    name = "rte",
    version,
    about = "Rich-text document editor with undo history, autosave and find/replace"
)]
struct Args {
    /// Directory for stored documents, autosave data and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Editor configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Edit interactively, reading lines from stdin (the default)
    Edit {
        /// Stored document to open
        #[arg(long)]
        open: Option<String>,

        /// Restore the auto-saved draft
        #[arg(long, conflicts_with = "open")]
        recover: bool,
    },
    /// List stored documents, most recently modified first
    List,
    /// Print a stored document's markup
    Show { id: String },
    /// Export a stored document
    Export {
        id: String,

        /// html, text or json
        #[arg(short, long, default_value = "html")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a stored document
    Delete { id: String },
}

struct Paths {
    data_dir: PathBuf,
    config_file: PathBuf,
}

impl Paths {
    fn resolve(args: &Args) -> Result<Self> {
        let (data_dir, default_config) = match &args.data_dir {
            Some(dir) => (dir.clone(), dir.join("config.toml")),
            None => {
                let project_dirs = ProjectDirs::from("org", "rte", "rte")
                    .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
                (
                    project_dirs.data_local_dir().to_path_buf(),
                    project_dirs.config_dir().join("config.toml"),
                )
            }
        };
        Ok(Self {
            data_dir,
            config_file: args.config.clone().unwrap_or(default_config),
        })
    }
}

enum LoopAction {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let paths = Paths::resolve(&args)?;
    let _log_guard = init_logging(&paths.data_dir)?;

    let config = EditorConfig::load_or_default(&paths.config_file)?;
    let kv = FileKeyValueStore::new(paths.data_dir.join("state"))?;
    let store: Arc<dyn DocumentStore> = Arc::new(LocalDocumentStore::new(Arc::new(kv)));
    let mut stdout = io::stdout();

    match args.command.unwrap_or(CliCommand::Edit {
        open: None,
        recover: false,
    }) {
        CliCommand::Edit { open, recover } => {
            let mut session = Session::new(Box::new(MarkupBuffer::default()), store.clone(), config);
            if let Some(id) = open {
                session
                    .open(&id)
                    .with_context(|| format!("failed to open document {id}"))?;
            } else if recover {
                session
                    .recover_autosave()
                    .context("failed to recover auto-saved content")?;
            } else if store.read_autosave()?.is_some() {
                writeln!(stdout, "Auto-saved content found; :recover restores it")?;
            }
            run_editor(&mut session, &store, &mut stdout).await?;
        }
        CliCommand::List => {
            let documents = store.list_documents()?;
            if documents.is_empty() {
                writeln!(stdout, "no stored documents")?;
            }
            for doc in documents {
                writeln!(
                    stdout,
                    "{}\t{}\t{} words\t{}",
                    doc.id, doc.title, doc.word_count, doc.modified_at
                )?;
            }
        }
        CliCommand::Show { id } => {
            let doc = store
                .get_document(&id)?
                .ok_or_else(|| anyhow!("no stored document with id {id}"))?;
            writeln!(stdout, "{}", doc.content)?;
        }
        CliCommand::Export { id, format, output } => {
            let format: ExportFormat = format.parse()?;
            let doc = store
                .get_document(&id)?
                .ok_or_else(|| anyhow!("no stored document with id {id}"))?;
            export_content(&doc.content, format, output.as_deref(), &mut stdout)?;
        }
        CliCommand::Delete { id } => {
            if !store.remove_document(&id)? {
                return Err(anyhow!("no stored document with id {id}"));
            }
            info!(%id, "document deleted");
            writeln!(stdout, "deleted {id}")?;
        }
    }

    Ok(())
}

async fn run_editor(
    session: &mut Session,
    store: &Arc<dyn DocumentStore>,
    out: &mut impl Write,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut mapper = LineMapper::new();

    write_status_line(out, &format_status(session))?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                let action = match mapper.map_line(&line) {
                    Ok(event) => match handle_event(event, session, store, out) {
                        Ok(action) => action,
                        Err(err) => {
                            warn!(error = %err, "shell command failed");
                            writeln!(out, "error: {err:#}")?;
                            LoopAction::Continue
                        }
                    },
                    Err(err) => {
                        writeln!(out, "error: {err}")?;
                        LoopAction::Continue
                    }
                };
                report_events(session, out)?;
                if let LoopAction::Quit = action {
                    break;
                }
            }
            _ = ticker.tick() => {
                session.poll_timers();
                report_events(session, out)?;
            }
        }
    }

    if let Some(pending) = mapper.pending_input() {
        warn!(pending = %pending, "input ended with unfinished paste");
    }
    if let Err(err) = session.close() {
        writeln!(out, "error: {err}")?;
    }
    report_events(session, out)?;
    Ok(())
}

fn handle_event(
    event: UiEvent,
    session: &mut Session,
    store: &Arc<dyn DocumentStore>,
    out: &mut impl Write,
) -> Result<LoopAction> {
    match event {
        UiEvent::Command(cmd) => {
            let show_status = matches!(
                cmd,
                Command::Find { .. }
                    | Command::FindNext
                    | Command::FindPrev
                    | Command::ReplaceCurrent { .. }
                    | Command::ReplaceAll { .. }
                    | Command::Undo
                    | Command::Redo
            );
            if let Err(err) = session.apply(cmd) {
                writeln!(out, "error: {err}")?;
            } else if show_status {
                write_status_line(out, &format_status(session))?;
            }
        }
        UiEvent::Export { format, output } => {
            let output = output.map(PathBuf::from);
            export_content(&session.content(), format, output.as_deref(), out)?;
        }
        UiEvent::ListDocuments => {
            for doc in store.list_documents()? {
                writeln!(out, "{}\t{}", doc.id, doc.title)?;
            }
        }
        UiEvent::DeleteDocument { id } => {
            if store.remove_document(&id)? {
                writeln!(out, "deleted {id}")?;
            } else {
                writeln!(out, "error: no stored document with id {id}")?;
            }
        }
        UiEvent::DiscardAutosave => {
            store.clear_autosave()?;
            writeln!(out, "auto-saved content discarded")?;
        }
        UiEvent::PrintContent => writeln!(out, "{}", session.content())?,
        UiEvent::ShowStatus => write_status_line(out, &format_status(session))?,
        UiEvent::BeginPaste => writeln!(out, "pasting; finish with a line containing only '.'")?,
        UiEvent::Help => writeln!(out, "{HELP}")?,
        UiEvent::Quit => return Ok(LoopAction::Quit),
        UiEvent::None => {}
    }
    Ok(LoopAction::Continue)
}

fn report_events(session: &Session, out: &mut impl Write) -> Result<()> {
    for event in session.drain_events() {
        if let Some(message) = describe_event(&event) {
            write_status_line(out, &message)?;
        }
    }
    Ok(())
}

fn export_content(
    content: &str,
    format: ExportFormat,
    output: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    let exported = export(content, format, SystemClock.now())?;
    match output {
        Some(path) => {
            fs::write(path, &exported.body)
                .with_context(|| format!("failed to write export to {:?}", path))?;
            writeln!(
                out,
                "exported {} ({}) to {}",
                exported.file_name,
                exported.mime_type,
                path.display()
            )?;
        }
        None => writeln!(out, "{}", exported.body)?,
    }
    Ok(())
}

fn init_logging(data_dir: &Path) -> Result<WorkerGuard> {
    let log_dir = data_dir.join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "rte.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    // stdout carries the editing transcript.
    let console_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
