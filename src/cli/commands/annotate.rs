//! Interactive photo annotation command.

use std::path::PathBuf;

use console::style;

use crate::annotations::AnnotationCollector;
use crate::config::Settings;
use crate::images::{load_images, ImagePayload};
use crate::store::ContentStore;

/// Annotate photos with time periods and activities.
pub async fn cmd_annotate(settings: &Settings, images: &[PathBuf]) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let payloads = load_images(images)?;
    let store = ContentStore::new(settings);

    run_annotation_session(&store, &payloads)?;

    println!(
        "  {} Annotations are folded into the next 'memoir generate' run",
        style("→").dim()
    );
    Ok(())
}

/// Walk the collector over `images`, prompting on stdin, and merge the
/// results into the stored session.
///
/// Returns the number of completed annotations.
pub fn run_annotation_session(
    store: &ContentStore,
    images: &[ImagePayload],
) -> anyhow::Result<usize> {
    let mut collector = AnnotationCollector::new(images);

    println!("\n{}", style("Annotation session").bold());
    println!("Describe when each photo was taken and what was happening.");
    println!("Leave the time period blank to skip a photo.");

    while let Some(prompt) = collector.current() {
        println!(
            "\n{} Photo {} of {}: {}",
            style("→").cyan(),
            prompt.index + 1,
            prompt.total,
            prompt.image_path.display()
        );

        let time_period = read_line("  Time period: ")?;
        if time_period.is_empty() {
            collector.skip();
            println!("  {} Skipped", style("!").yellow());
            continue;
        }

        let activity = read_line("  What was happening: ")?;
        if !collector.answer(&time_period, &activity) {
            println!(
                "  {} Both fields are needed; this photo will be asked again",
                style("!").yellow()
            );
        }
    }

    let annotations = collector.into_annotations();
    let completed = annotations.iter().filter(|a| a.is_completed).count();

    // The store merges by image id, so re-annotating a photo replaces
    // its earlier entry.
    store.save_annotations(&annotations)?;

    println!(
        "\n{} Annotated {} of {} photos",
        style("✓").green(),
        completed,
        images.len()
    );
    Ok(completed)
}

fn read_line(prompt: &str) -> anyhow::Result<String> {
    use std::io::{self, Write};

    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
