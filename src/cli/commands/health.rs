//! Remote service health probe.

use indicatif::{ProgressBar, ProgressStyle};

use console::style;

use crate::config::Settings;
use crate::remote::{RemoteBackend, RemoteClient};

/// Check whether the remote generation service is reachable.
pub async fn cmd_health(settings: &Settings) -> anyhow::Result<()> {
    let client = RemoteClient::new(settings)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Probing {}...", settings.remote_base_url));

    let healthy = client.check_health().await;
    pb.finish_and_clear();

    if healthy {
        println!(
            "{} Remote service is reachable at {}",
            style("✓").green(),
            settings.remote_base_url
        );
    } else {
        println!(
            "{} Remote service at {} is not responding",
            style("✗").red(),
            settings.remote_base_url
        );
        println!(
            "  {} 'memoir generate' will fall back to local generation",
            style("→").dim()
        );
        std::process::exit(1);
    }

    Ok(())
}
