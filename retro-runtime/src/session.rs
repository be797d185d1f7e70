//! Line-oriented interactive session over an [`Orchestrator`].
//!
//! `restore` runs in a spawned task, so `list`, `add` and `remove` keep
//! working while requests are in flight. On a current-thread runtime this is
//! the same cooperative interleaving a single UI thread would see.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use chrono::{DateTime, Utc};
use retro_core::{HandleId, ImagePayload, ItemId, ItemSnapshot, ItemStore};

use crate::download::{save_all, save_item};
use crate::error::{io_err, RuntimeError};
use crate::orchestrator::{DispatchOutcome, Orchestrator};

const HELP: &str = "\
commands:
  add <path>...                 add image files
  list                          show items and their status
  remove <id>                   remove an item (id prefix accepted)
  show <id>                     preview and result details for one item
  restore [<id>]                restore all pending items, or one item
  wait                          wait for running restores to finish
  download [<id>] [--out DIR]   save restored images
  stats                         per-status counts
  help                          this text
  quit                          wait for running restores and exit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Add(Vec<PathBuf>),
    List,
    Remove(String),
    Show(String),
    Restore(Option<String>),
    Wait,
    Download {
        target: Option<String>,
        out: Option<PathBuf>,
    },
    Stats,
    Help,
    Quit,
}

/// Parse one input line. Blank lines are an error; the loop skips them first.
pub fn parse_command(line: &str) -> Result<SessionCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    let no_args = |cmd: SessionCommand| {
        if args.is_empty() {
            Ok(cmd)
        } else {
            Err(format!("`{verb}` takes no arguments"))
        }
    };

    match verb {
        "add" => {
            if args.is_empty() {
                return Err("usage: add <path>...".to_string());
            }
            Ok(SessionCommand::Add(args.iter().map(PathBuf::from).collect()))
        }
        "list" | "ls" => no_args(SessionCommand::List),
        "remove" | "rm" => match args.as_slice() {
            [id] => Ok(SessionCommand::Remove(id.to_string())),
            _ => Err("usage: remove <id>".to_string()),
        },
        "show" => match args.as_slice() {
            [id] => Ok(SessionCommand::Show(id.to_string())),
            _ => Err("usage: show <id>".to_string()),
        },
        "restore" => match args.as_slice() {
            [] => Ok(SessionCommand::Restore(None)),
            [id] => Ok(SessionCommand::Restore(Some(id.to_string()))),
            _ => Err("usage: restore [<id>]".to_string()),
        },
        "wait" => no_args(SessionCommand::Wait),
        "download" => parse_download(&args),
        "stats" => no_args(SessionCommand::Stats),
        "help" | "?" => no_args(SessionCommand::Help),
        "quit" | "exit" => no_args(SessionCommand::Quit),
        other => Err(format!("unknown command `{other}` (try `help`)")),
    }
}

fn parse_download(args: &[&str]) -> Result<SessionCommand, String> {
    const USAGE: &str = "usage: download [<id>] [--out DIR]";
    let mut target = None;
    let mut out = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match *arg {
            "--out" => match iter.next() {
                Some(dir) => out = Some(PathBuf::from(dir)),
                None => return Err(USAGE.to_string()),
            },
            id if target.is_none() && !id.starts_with("--") => target = Some(id.to_string()),
            _ => return Err(USAGE.to_string()),
        }
    }
    Ok(SessionCommand::Download { target, out })
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

struct Session<W> {
    orch: Orchestrator,
    writer: W,
    out_dir: PathBuf,
    jobs: Vec<JoinHandle<Result<String, RuntimeError>>>,
}

/// Read commands from `reader` until `quit` or end of input.
///
/// Running restores are awaited before returning, then every image handle is
/// released.
pub async fn run_session<R, W>(
    orch: Orchestrator,
    reader: R,
    writer: W,
    out_dir: &Path,
) -> Result<(), RuntimeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = Session {
        orch,
        writer,
        out_dir: out_dir.to_path_buf(),
        jobs: Vec::new(),
    };
    let mut lines = reader.lines();

    session.say("type `help` for commands").await?;
    while let Some(line) = lines.next_line().await.map_err(|e| io_err("<input>", e))? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_command(line) {
            Ok(SessionCommand::Quit) => break,
            Ok(cmd) => session.handle(cmd).await?,
            Err(msg) => session.say(&msg).await?,
        }
    }

    session.wait().await?;
    session.orch.shutdown().await;
    session.writer.flush().await.map_err(|e| io_err("<output>", e))?;
    Ok(())
}

impl<W: AsyncWrite + Unpin> Session<W> {
    async fn say(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.writer
            .write_all(format!("{text}\n").as_bytes())
            .await
            .map_err(|e| io_err("<output>", e))
    }

    async fn handle(&mut self, cmd: SessionCommand) -> Result<(), RuntimeError> {
        match cmd {
            SessionCommand::Add(paths) => {
                let report = self.orch.add_paths(&paths).await;
                for (path, reason) in &report.rejected {
                    self.say(&format!("skipped {}: {reason}", path.display())).await?;
                }
                self.say(&format!("added {} item(s)", report.added.len())).await?;
            }
            SessionCommand::List => {
                let items = self.orch.snapshot().await;
                if items.is_empty() {
                    self.say("no items").await?;
                }
                for item in &items {
                    self.say(&list_line(item)).await?;
                }
                if self.orch.is_batch_running() {
                    self.say("(batch running)").await?;
                }
            }
            SessionCommand::Remove(prefix) => {
                let Some(id) = self.resolve(&prefix).await? else {
                    return Ok(());
                };
                self.orch.remove(&id).await?;
                self.say(&format!("removed {}", id.short())).await?;
            }
            SessionCommand::Show(prefix) => {
                let Some(id) = self.resolve(&prefix).await? else {
                    return Ok(());
                };
                let lines = {
                    let store = self.orch.store();
                    let store = store.lock().await;
                    show_lines(&store, &id)
                };
                for line in lines {
                    self.say(&line).await?;
                }
            }
            SessionCommand::Restore(target) => self.restore(target).await?,
            SessionCommand::Wait => self.wait().await?,
            SessionCommand::Download { target, out } => {
                let out_dir = out.unwrap_or_else(|| self.out_dir.clone());
                self.download(target, &out_dir).await?;
            }
            SessionCommand::Stats => {
                let s = self.orch.stats().await;
                self.say(&format!(
                    "total {}  idle {}  processing {}  completed {}  error {}",
                    s.total, s.idle, s.processing, s.completed, s.error
                ))
                .await?;
            }
            SessionCommand::Help => self.say(HELP.trim_end()).await?,
            SessionCommand::Quit => {}
        }
        Ok(())
    }

    async fn resolve(&mut self, prefix: &str) -> Result<Option<ItemId>, RuntimeError> {
        let id = self.orch.resolve(prefix).await;
        if id.is_none() {
            self.say(&format!("no single item matches `{prefix}`")).await?;
        }
        Ok(id)
    }

    async fn restore(&mut self, target: Option<String>) -> Result<(), RuntimeError> {
        match self.orch.ensure_credential().await {
            Ok(()) => {}
            Err(RuntimeError::CredentialMissing) => {
                return self
                    .say("cannot restore: no API key (set GEMINI_API_KEY or run `retrorestore key set`)")
                    .await;
            }
            Err(err) => return self.say(&format!("cannot restore: {err}")).await,
        }

        let orch = self.orch.clone();
        let job = match target {
            None => {
                let pending = self.orch.stats().await;
                self.say(&format!(
                    "restoring {} item(s) in the background",
                    pending.idle + pending.error
                ))
                .await?;
                tokio::spawn(async move {
                    let report = orch.restore_all().await?;
                    Ok::<_, RuntimeError>(format!(
                        "batch done: {} completed, {} failed",
                        report.completed, report.failed
                    ))
                })
            }
            Some(prefix) => {
                let Some(id) = self.resolve(&prefix).await? else {
                    return Ok(());
                };
                self.say(&format!("restoring {} in the background", id.short())).await?;
                tokio::spawn(async move {
                    let outcome = orch.dispatch(&id).await;
                    Ok::<_, RuntimeError>(format!("{}: {}", id.short(), outcome_text(&outcome)))
                })
            }
        };
        self.jobs.push(job);
        Ok(())
    }

    async fn wait(&mut self) -> Result<(), RuntimeError> {
        for job in std::mem::take(&mut self.jobs) {
            let line = match job.await {
                Ok(Ok(line)) => line,
                Ok(Err(err)) => format!("restore failed: {err}"),
                Err(err) => return Err(RuntimeError::Join(err.to_string())),
            };
            self.say(&line).await?;
        }
        Ok(())
    }

    async fn download(&mut self, target: Option<String>, out_dir: &Path) -> Result<(), RuntimeError> {
        match target {
            None => {
                let written = save_all(&self.orch, out_dir).await?;
                self.say(&format!("saved {} file(s) to {}", written.len(), out_dir.display()))
                    .await
            }
            Some(prefix) => {
                let Some(id) = self.resolve(&prefix).await? else {
                    return Ok(());
                };
                match save_item(&self.orch, &id, out_dir).await {
                    Ok(path) => self.say(&format!("saved {}", path.display())).await,
                    Err(RuntimeError::NotCompleted { .. }) => {
                        self.say(&format!("{} has no restored image yet", id.short())).await
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }
}

fn list_line(item: &ItemSnapshot) -> String {
    let mut line = format!("{}  {:<10}  {}", item.id.short(), item.status.to_string(), item.name);
    if let Some(dims) = item.dimensions {
        line.push_str(&format!("  {}x{}", dims.width, dims.height));
    }
    if let Some(err) = &item.error {
        line.push_str(&format!("  ({err})"));
    }
    line.push_str(&format!("  {} ago", format_age(item.updated_at)));
    line
}

fn show_lines(store: &ItemStore, id: &ItemId) -> Vec<String> {
    let Some(item) = store.get(id) else {
        return vec![format!("{} is gone", id.short())];
    };
    let describe = |label: &str, handle: HandleId, payload: Option<&ImagePayload>| match payload {
        Some(p) => format!("{label}: {handle}  {}  {} bytes", p.media_type(), p.len()),
        None => format!("{label}: {handle}  (released)"),
    };
    let mut lines = vec![
        format!("{}  {}  {}", item.id(), item.status(), item.name()),
        format!("added {} ago", format_age(item.created_at())),
        describe("preview", item.preview(), store.preview_payload(id)),
    ];
    if let Some(handle) = item.result() {
        lines.push(describe("result", handle, store.result_payload(id)));
    }
    lines
}

fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now().signed_duration_since(timestamp).num_seconds().max(0);
    match seconds {
        s if s < 60 => format!("{s}s"),
        s if s < 60 * 60 => format!("{}m", s / 60),
        s if s < 60 * 60 * 24 => format!("{}h", s / (60 * 60)),
        s => format!("{}d", s / (60 * 60 * 24)),
    }
}

fn outcome_text(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Completed => "completed".to_string(),
        DispatchOutcome::Failed(msg) => format!("failed: {msg}"),
        DispatchOutcome::Skipped => "not restorable right now".to_string(),
        DispatchOutcome::Discarded => "removed before it finished".to_string(),
    }
}
