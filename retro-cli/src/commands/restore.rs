//! `retrorestore restore <PATH>...`: add, restore all, save.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use walkdir::WalkDir;

use retro_core::{ItemId, ItemSnapshot, MediaType, RestorationStatus};
use retro_runtime::{BatchReport, Download, Orchestrator};

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Image files or directories (searched recursively).
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Directory restored images are written to.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Maximum simultaneous requests (default: all at once).
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Use this API key instead of the environment or the stored key.
    #[arg(long, env = "RETRORESTORE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

struct Outcome {
    report: BatchReport,
    items: Vec<ItemSnapshot>,
    rejected: Vec<(PathBuf, String)>,
    saved: HashMap<ItemId, PathBuf>,
    out_dir: PathBuf,
}

impl RestoreArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let config = super::load_config(&home)?;
        let out_dir = self.out.clone().unwrap_or_else(|| config.output_dir_or_default());

        let files = collect_images(&self.paths);
        if files.is_empty() {
            println!("No images found.");
            return Ok(());
        }

        let credentials = super::credentials(&home, self.api_key.as_deref(), true)?;
        let orch = super::orchestrator(&config, credentials, self.max_concurrency)?;
        let outcome = super::runtime()?.block_on(restore(orch, files, out_dir))?;

        if self.json {
            print_json(outcome)
        } else {
            print_table(outcome);
            Ok(())
        }
    }
}

/// Expand directories into the image files below them, keeping argument order.
///
/// Explicit file arguments are passed through so a non-image is reported
/// rather than silently dropped.
fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let walker = WalkDir::new(path).sort_by_file_name().into_iter();
        for entry in walker.filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        }) {
            let is_image = entry.file_type().is_file()
                && MediaType::from_path(entry.path()).is_some_and(|m| m.is_image());
            if is_image {
                files.push(entry.into_path());
            }
        }
    }
    files
}

async fn restore(orch: Orchestrator, files: Vec<PathBuf>, out_dir: PathBuf) -> Result<Outcome> {
    let added = orch.add_paths(&files).await;
    let report = orch.restore_all().await.context("restoration batch did not start")?;

    let downloads = {
        let store = orch.store();
        let store = store.lock().await;
        Download::plan_all(&store)
    };
    let mut saved = HashMap::new();
    for download in downloads {
        let id = download.id.clone();
        let path = download
            .write(&out_dir)
            .await
            .with_context(|| format!("failed to save restored image for {}", id.short()))?;
        saved.insert(id, path);
    }

    let items = orch.snapshot().await;
    orch.shutdown().await;
    Ok(Outcome {
        report,
        items,
        rejected: added.rejected,
        saved,
        out_dir,
    })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RestoreJson<'a> {
    summary: &'a BatchReport,
    out_dir: String,
    items: Vec<ItemJson<'a>>,
    skipped: Vec<SkippedJson>,
}

#[derive(Serialize)]
struct ItemJson<'a> {
    #[serde(flatten)]
    item: &'a ItemSnapshot,
    saved_to: Option<String>,
}

#[derive(Serialize)]
struct SkippedJson {
    path: String,
    reason: String,
}

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "file")]
    name: String,
    #[tabled(rename = "size")]
    size: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn print_json(outcome: Outcome) -> Result<()> {
    let payload = RestoreJson {
        summary: &outcome.report,
        out_dir: outcome.out_dir.display().to_string(),
        items: outcome
            .items
            .iter()
            .map(|item| ItemJson {
                item,
                saved_to: outcome.saved.get(&item.id).map(|p| p.display().to_string()),
            })
            .collect(),
        skipped: outcome
            .rejected
            .iter()
            .map(|(path, reason)| SkippedJson {
                path: path.display().to_string(),
                reason: reason.clone(),
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize restore JSON")?
    );
    Ok(())
}

fn print_table(outcome: Outcome) {
    for (path, reason) in &outcome.rejected {
        println!("{} {}: {reason}", "skipped".yellow(), path.display());
    }

    let rows: Vec<ItemRow> = outcome
        .items
        .iter()
        .map(|item| ItemRow {
            id: item.id.short().to_string(),
            name: item.name.clone(),
            size: item
                .dimensions
                .map(|d| format!("{}x{}", d.width, d.height))
                .unwrap_or_else(|| "-".to_string()),
            status: status_label(item.status),
            detail: detail(item, outcome.saved.get(&item.id), &outcome.out_dir),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let r = &outcome.report;
    println!(
        "{} restored, {} failed in {:.1}s",
        r.completed.to_string().green().bold(),
        r.failed.to_string().red().bold(),
        r.duration_ms as f64 / 1000.0,
    );
    if r.failed > 0 {
        println!("Run the same command again to retry failed images.");
    }
}

fn status_label(status: RestorationStatus) -> String {
    let label = status.to_string();
    match status {
        RestorationStatus::Idle => label.bright_black().to_string(),
        RestorationStatus::Processing => label.cyan().to_string(),
        RestorationStatus::Completed => label.green().bold().to_string(),
        RestorationStatus::Error => label.red().bold().to_string(),
    }
}

fn detail(item: &ItemSnapshot, saved: Option<&PathBuf>, out_dir: &Path) -> String {
    if let Some(err) = &item.error {
        return err.clone();
    }
    match saved {
        Some(path) => path
            .strip_prefix(out_dir)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.display().to_string()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn collect_images_walks_directories_and_keeps_files() {
        let dir = TempDir::new().expect("tempdir");
        let nested = dir.path().join("album");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(nested.join("b.jpg"), b"b").expect("write");
        std::fs::write(nested.join("a.png"), b"a").expect("write");
        std::fs::write(nested.join("notes.txt"), b"n").expect("write");
        let explicit = dir.path().join("readme.md");

        let files = collect_images(&[dir.path().to_path_buf(), explicit.clone()]);
        assert_eq!(files, [nested.join("a.png"), nested.join("b.jpg"), explicit]);
    }
}
