use anyhow::{bail, Context};
use client_core::observability::init_tracing;
use menu_client::config::get_configuration;
use menu_client::models::CandidateFile;
use menu_client::services::file_policy::media_type_for;
use menu_client::MenuClient;
use std::path::Path;

const USAGE: &str = "usage: menu-upload <menu-id> <file>...";

async fn read_candidate(path: &Path) -> anyhow::Result<CandidateFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?
        .to_string();
    let media_type = media_type_for(&name).unwrap_or("application/octet-stream");
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(CandidateFile::new(name, media_type, data))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(menu_id) = args.next() else {
        bail!(USAGE);
    };
    let paths: Vec<String> = args.collect();
    if paths.is_empty() {
        bail!(USAGE);
    }

    let settings = get_configuration().context("Failed to load configuration")?;
    init_tracing(
        "menu-upload",
        &settings.logging.level,
        settings.logging.otlp_endpoint.as_deref(),
    )?;

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(read_candidate(Path::new(path)).await?);
    }

    let client = MenuClient::build(&settings.api);
    let session = client.upload_session();

    let staged = session.add_files(files);
    if let Some(error) = staged.error {
        bail!(error);
    }

    let mut updates = session.subscribe();
    let reporter = tokio::spawn(async move {
        let mut last = 0;
        while updates.changed().await.is_ok() {
            let progress = updates.borrow_and_update().progress;
            if progress > last {
                tracing::info!(progress, "Upload progress");
                last = progress;
            }
        }
    });

    let outcome = tokio::select! {
        result = session.upload(&menu_id) => result,
        _ = tokio::signal::ctrl_c() => {
            session.cancel();
            tracing::warn!("Interrupted, cancelling upload");
            bail!("Upload cancelled");
        }
    };

    drop(session);
    reporter.await.ok();

    for image in outcome? {
        println!("{}", image.url);
    }

    Ok(())
}
