//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use ferry_control_plane::{HttpControlPlane, StaticToken};
use ferry_protocol::{MediaKind, UploadProgress, UploadSession};
use ferry_session_store::FileSessionStore;
use ferry_transfer::{HttpPartTransport, SpeedCalculator, detect_content_type};
use ferry_upload::{UploadOptions, UploadOrchestrator, persisted_progress};
use tracing::{info, warn};

use crate::config::FerryConfig;

/// Arguments of `ferry upload`.
#[derive(Debug, Clone)]
pub struct UploadArgs {
    pub file: PathBuf,
    pub id: String,
    pub kind: MediaKind,
    pub content_type: Option<String>,
    pub name: Option<String>,
    pub resume: bool,
}

/// Wires the HTTP control plane, HTTP transport and file store together.
pub fn build_orchestrator(config: &FerryConfig) -> anyhow::Result<UploadOrchestrator> {
    let credentials = Arc::new(StaticToken::new(config.token().unwrap_or_default()));
    let control = HttpControlPlane::with_timeout(
        config.endpoint.clone(),
        credentials,
        config.request_timeout(),
    )?;
    let transport = HttpPartTransport::new()?;
    let store = FileSessionStore::new(config.state_dir()?);

    Ok(
        UploadOrchestrator::new(Arc::new(control), Arc::new(transport), Arc::new(store))
            .with_retry(config.retry.to_retry_config()),
    )
}

pub async fn upload(orchestrator: &UploadOrchestrator, args: UploadArgs) -> anyhow::Result<()> {
    let content_type = match args.content_type {
        Some(ct) => ct,
        None => detect_content_type(&args.file)
            .map(str::to_string)
            .with_context(|| {
                format!(
                    "cannot infer the content type of {}; pass --content-type",
                    args.file.display()
                )
            })?,
    };
    let file_name = args.name.or_else(|| {
        args.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    });

    let mut options = UploadOptions::new(args.id.clone(), args.kind, content_type);
    if let Some(name) = file_name {
        options = options.with_file_name(name);
    }

    if args.resume {
        match orchestrator.load_resumable(&args.id).await? {
            Some(session) => {
                info!(
                    record_id = %args.id,
                    completed = session.completed_count(),
                    total_parts = session.total_parts,
                    "resuming persisted session"
                );
                options = options.resume_from(session);
            }
            None => info!(record_id = %args.id, "no resumable session, starting fresh"),
        }
    }

    let speed = Arc::new(SpeedCalculator::new(None, None));
    let last_bytes = Arc::new(AtomicU64::new(0));
    options = options.with_progress(move |p| report_progress(&p, &speed, &last_bytes));

    let controller = orchestrator.start(&args.file, options);
    let cancel = controller.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling upload");
            cancel.cancel();
        }
    });

    let result = controller.result().await;
    interrupt.abort();

    match result {
        Ok(outcome) => {
            println!("{}", outcome.object_key);
            Ok(())
        }
        Err(e) => {
            if e.is_resumable() {
                warn!(record_id = %args.id, "session kept; rerun with --resume to continue");
            }
            Err(e.into())
        }
    }
}

fn report_progress(progress: &UploadProgress, speed: &SpeedCalculator, last_bytes: &AtomicU64) {
    let previous = last_bytes.swap(progress.bytes_uploaded, Ordering::Relaxed);
    speed.add_sample(progress.bytes_uploaded.saturating_sub(previous));

    let remaining = progress.total_bytes.saturating_sub(progress.bytes_uploaded);
    let eta = speed.eta(remaining);
    info!(
        part = progress.current_part,
        total_parts = progress.total_parts,
        percent = %format!("{:.1}", progress.percentage),
        rate = %format_rate(speed.bytes_per_second()),
        eta = %eta.map(format_duration).unwrap_or_else(|| "-".into()),
        "upload progress"
    );
}

pub async fn list(orchestrator: &UploadOrchestrator) -> anyhow::Result<()> {
    let sessions = orchestrator.resumable_uploads().await?;
    if sessions.is_empty() {
        println!("no resumable uploads");
        return Ok(());
    }
    let now = Utc::now();
    for (record_id, session) in &sessions {
        println!("{}", describe_session(record_id, session, now));
    }
    Ok(())
}

pub async fn status(orchestrator: &UploadOrchestrator, record_id: &str) -> anyhow::Result<()> {
    match orchestrator.load_resumable(record_id).await? {
        Some(session) => println!("{}", describe_session(record_id, &session, Utc::now())),
        None => println!("no resumable upload for {record_id}"),
    }
    Ok(())
}

pub async fn discard(orchestrator: &UploadOrchestrator, record_id: &str) -> anyhow::Result<()> {
    if orchestrator.discard(record_id).await? {
        println!("discarded {record_id}");
    } else {
        println!("no resumable upload for {record_id}");
    }
    Ok(())
}

/// One line per session: id, parts, percentage, age, source.
fn describe_session(record_id: &str, session: &UploadSession, now: DateTime<Utc>) -> String {
    let progress = persisted_progress(session);
    format!(
        "{record_id}\t{}/{} parts\t{:.1}%\t{} old\t{}",
        session.completed_count(),
        session.total_parts,
        progress.percentage,
        format_duration(session.age_at(now)),
        session.source_ref
    )
}

fn format_rate(bytes_per_second: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    if bytes_per_second >= MIB {
        format!("{:.1} MiB/s", bytes_per_second / MIB)
    } else if bytes_per_second >= KIB {
        format!("{:.1} KiB/s", bytes_per_second / KIB)
    } else {
        format!("{bytes_per_second:.0} B/s")
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
