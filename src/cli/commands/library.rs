//! Stored biography management commands.

use std::path::Path;

use console::style;

use crate::config::Settings;
use crate::generator::compose_thumbnail;
use crate::images::load_image;
use crate::store::{ContentStore, StoreError};

use super::helpers::{format_bytes, truncate};

/// List stored biographies.
pub async fn cmd_list(settings: &Settings) -> anyhow::Result<()> {
    let store = ContentStore::new(settings);
    let biographies = store.list_biographies()?;

    if biographies.is_empty() {
        println!(
            "{} No biographies stored. Run 'memoir generate' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Biographies").bold());
    println!("{}", "-".repeat(72));
    println!("{:<22} {:<32} Created", "ID", "Title");
    println!("{}", "-".repeat(72));

    for bio in biographies {
        println!(
            "{:<22} {:<32} {}",
            truncate(&bio.id, 21),
            truncate(&bio.title, 31),
            bio.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

/// Show biography metadata and a narrative preview.
pub async fn cmd_show(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let store = ContentStore::new(settings);
    let bio = match store.get_biography(id) {
        Ok(bio) => bio,
        Err(StoreError::NotFound(_)) => {
            println!("{} Biography '{}' not found", style("✗").red(), id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("\n{}", style(&bio.title).bold());
    println!("{}", "-".repeat(60));
    println!("{:<12} {}", "Id:", bio.id);
    println!(
        "{:<12} {}",
        "Created:",
        bio.created_at.format("%Y-%m-%d %H:%M")
    );
    println!(
        "{:<12} {}",
        "Updated:",
        bio.updated_at.format("%Y-%m-%d %H:%M")
    );

    let size = std::fs::metadata(&bio.pdf_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| style("missing").red().to_string());
    println!("{:<12} {} ({})", "Document:", bio.pdf_path.display(), size);

    match &bio.thumbnail_path {
        Some(thumb) => println!("{:<12} {}", "Cover:", thumb.display()),
        None => println!("{:<12} {}", "Cover:", style("none").dim()),
    }

    println!("\n{}", style("Narrative").bold());
    for line in bio.content.lines().take(8) {
        println!("{}", line);
    }
    if bio.content.lines().nth(8).is_some() {
        println!("{}", style("...").dim());
    }

    Ok(())
}

/// Rename a stored biography.
pub async fn cmd_rename(settings: &Settings, id: &str, title: &str) -> anyhow::Result<()> {
    let store = ContentStore::new(settings);
    let old_title = match store.get_biography(id) {
        Ok(bio) => bio.title,
        Err(StoreError::NotFound(_)) => {
            println!("{} Biography '{}' not found", style("✗").red(), id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    store.rename_biography(id, title)?;

    println!(
        "{} Renamed '{}' → '{}'",
        style("✓").green(),
        style(truncate(&old_title, 40)).yellow(),
        style(truncate(title, 40)).green()
    );
    Ok(())
}

/// Replace the cover thumbnail with an image from disk.
pub async fn cmd_set_cover(settings: &Settings, id: &str, image: &Path) -> anyhow::Result<()> {
    let store = ContentStore::new(settings);
    let bio = match store.get_biography(id) {
        Ok(bio) => bio,
        Err(StoreError::NotFound(_)) => {
            println!("{} Biography '{}' not found", style("✗").red(), id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    // Compose a fresh card from the photo so replacement covers look the
    // same as generated ones.
    let payload = load_image(image)?;
    let png = compose_thumbnail(Some(&payload), &bio.title, None)?;
    let updated = store.update_cover(id, &png)?;

    println!(
        "{} Updated cover for '{}'",
        style("✓").green(),
        truncate(&updated.title, 40)
    );
    if let Some(thumb) = &updated.thumbnail_path {
        println!("  {} {}", style("→").dim(), thumb.display());
    }
    Ok(())
}

/// Delete a stored biography and its files.
pub async fn cmd_delete(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let store = ContentStore::new(settings);
    let bio = match store.get_biography(id) {
        Ok(bio) => bio,
        Err(StoreError::NotFound(_)) => {
            println!("{} Biography '{}' not found", style("✗").red(), id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    store.delete_biography(id)?;

    println!(
        "{} Deleted '{}'",
        style("✓").green(),
        truncate(&bio.title, 40)
    );
    Ok(())
}

/// Delete all stored biographies and the annotation session.
pub async fn cmd_clear(settings: &Settings, yes: bool) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let store = ContentStore::new(settings);
    let biographies = store.list_biographies()?.len();
    let annotations = store.load_annotations()?.len();

    if biographies == 0 && annotations == 0 {
        println!("{} Nothing to clear", style("!").yellow());
        return Ok(());
    }

    if !yes {
        println!(
            "{} This will delete {} biographies and {} annotations.",
            style("!").yellow(),
            biographies,
            annotations
        );
        print!("\nProceed? [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{} Cancelled", style("!").yellow());
            return Ok(());
        }
    }

    store.clear_all()?;

    println!(
        "{} Cleared {} biographies and {} annotations",
        style("✓").green(),
        biographies,
        annotations
    );
    Ok(())
}
