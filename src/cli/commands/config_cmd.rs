//! Configuration display command.

use console::style;

use crate::config::{Config, Settings};

/// Print the effective configuration after file, flag, and environment
/// overrides are applied.
pub async fn cmd_config(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    println!("\n{}", style("Effective configuration").bold());
    println!("{}", "-".repeat(60));

    match &config.source_path {
        Some(path) => println!("{:<20} {}", "Config file:", path.display()),
        None => println!("{:<20} {}", "Config file:", style("none found").dim()),
    }

    println!("{:<20} {}", "Data directory:", settings.data_dir.display());
    println!(
        "{:<20} {}",
        "Biographies:",
        settings.biographies_dir.display()
    );
    println!(
        "{:<20} {}",
        "Annotations:",
        settings.annotations_dir.display()
    );
    println!("{:<20} {}", "Remote base URL:", settings.remote_base_url);
    println!("{:<20} {}s", "Request timeout:", settings.request_timeout);
    println!("{:<20} {}", "User agent:", settings.user_agent);

    Ok(())
}
