// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Record composition from the command line

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use fieldcapture::catalog;
use fieldcapture::config::Config;
use fieldcapture::location::{BlockIndex, FixedLocation};
use fieldcapture::session::CaptureSession;
use fieldcapture::types::{LocationSample, PendingFile, Priority, RecordKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments for the compose command
#[derive(clap::Args)]
pub struct ComposeArgs {
    /// Block catalog (JSON)
    #[arg(long)]
    pub catalog: PathBuf,

    /// Record kind: task or observation
    #[arg(long, default_value = "task")]
    pub kind: String,

    /// Title
    #[arg(long, default_value = "")]
    pub title: String,

    /// Notes
    #[arg(long, default_value = "")]
    pub notes: String,

    /// Priority: low, medium, high, urgent
    #[arg(long, default_value = "medium")]
    pub priority: String,

    /// Due or observed date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,

    /// Latitude of the device
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of the device
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Block id chosen by hand; wins over the location
    #[arg(long)]
    pub block: Option<String>,

    /// Files to attach
    #[arg(long = "attach")]
    pub attachments: Vec<PathBuf>,
}

/// MIME type from a file extension
fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}

fn read_attachment(path: &Path) -> Result<PendingFile> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(PendingFile::new(name, mime_for(path), data))
}

/// Compose a record and print its payload
pub fn run(args: ComposeArgs, config: &Config, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    runtime.block_on(compose(args, config, json))
}

async fn compose(args: ComposeArgs, config: &Config, json: bool) -> Result<()> {
    let blocks = catalog::load_blocks(&args.catalog)?;
    let mut session = CaptureSession::open(BlockIndex::new(blocks.into()), config);

    session.set_kind(args.kind.parse::<RecordKind>().map_err(|e| anyhow!(e))?);
    session.set_priority(args.priority.parse::<Priority>().map_err(|e| anyhow!(e))?);
    session.set_title(args.title);
    session.set_notes(args.notes);
    if let Some(d) = args.date.as_deref() {
        let date = NaiveDate::parse_from_str(d, "%Y-%m-%d").with_context(|| format!("Invalid date: {d}"))?;
        session.set_date(Some(date));
    }

    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        session.request_location(Arc::new(FixedLocation(Some(LocationSample::new(lat, lon)))));
    }
    if let Some(id) = args.block.as_deref() {
        if !session.select_block(id) {
            bail!("Unknown block: {id}");
        }
    }
    session.await_location().await;

    let files = args
        .attachments
        .iter()
        .map(|p| read_attachment(p))
        .collect::<Result<Vec<_>>>()?;
    if !files.is_empty() {
        if let Err(e) = session.add_attachments(files) {
            return super::rejected(e);
        }
    }
    session.settle_previews().await;

    let payload = match session.compose() {
        Ok(p) => p,
        Err(e) => return super::rejected(e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        let block = session.draft().block.as_ref();
        println!("Session:     {}", session.id());
        println!("Kind:        {:?}", payload.kind);
        if !payload.title.is_empty() {
            println!("Title:       {}", payload.title);
        }
        if !payload.notes.is_empty() {
            println!("Notes:       {}", payload.notes);
        }
        println!("Priority:    {:?}", payload.priority);
        if let Some(date) = payload.date {
            println!("Date:        {date}");
        }
        if let Some(b) = block {
            println!("Block:       {} ({}, {:?})", b.block_name, b.block_id, payload.block_source);
        }
        for a in &payload.attachments {
            println!("Attachment:  {} [{}] {} bytes", a.name, a.mime_type, a.size);
        }
    }
    session.close();
    Ok(())
}
