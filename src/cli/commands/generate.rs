//! Biography generation command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::generator::LocalBiographyGenerator;
use crate::images::load_images;
use crate::models::TaskStatus;
use crate::orchestrator::{GenerationOptions, TaskOrchestrator};
use crate::remote::RemoteClient;
use crate::store::ContentStore;

use super::annotate::run_annotation_session;

/// Generate a biography from photos and requirements.
pub async fn cmd_generate(
    settings: &Settings,
    images: &[PathBuf],
    requirements: &str,
    template_style: String,
    language: String,
    annotate: bool,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let payloads = load_images(images)?;
    println!("{} Loaded {} photos", style("✓").green(), payloads.len());

    let store = Arc::new(ContentStore::new(settings));

    if annotate {
        run_annotation_session(&store, &payloads)?;
    }

    let remote = Arc::new(RemoteClient::new(settings)?);
    let generator = Arc::new(LocalBiographyGenerator);
    let orchestrator = TaskOrchestrator::new(remote, generator, store);

    // Subscribe before submitting so the first snapshot is not missed.
    let mut events = orchestrator.subscribe();
    let options = GenerationOptions {
        template_style,
        language,
    };
    let task_id = orchestrator.submit(payloads, requirements, options).await?;
    println!("{} Submitted task {}", style("→").cyan(), task_id);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let done = loop {
        match events.recv().await {
            Some(task) => {
                let label = task
                    .message
                    .clone()
                    .unwrap_or_else(|| task.status.as_str().to_string());
                pb.set_message(format!("[{:>3.0}%] {}", task.progress * 100.0, label));
                if task.is_terminal() {
                    break task;
                }
            }
            None => {
                pb.finish_and_clear();
                anyhow::bail!("task event stream closed before a terminal status");
            }
        }
    };
    pb.finish_and_clear();

    if done.status == TaskStatus::Completed {
        println!(
            "{} {}",
            style("✓").green(),
            done.message.as_deref().unwrap_or("Biography ready")
        );
        if let Some(ref artifact) = done.artifact_ref {
            println!("  {} Saved to {}", style("→").dim(), artifact);
        }
        println!(
            "  {} Run 'memoir list' to see stored biographies",
            style("→").dim()
        );
    } else {
        println!(
            "{} Generation failed: {}",
            style("✗").red(),
            done.error_message.as_deref().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    Ok(())
}
