//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::governance::GovernanceManager;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let existed = settings.database_exists();
    let governor = GovernanceManager::from_settings(settings)?;

    if existed {
        println!(
            "{} Database already initialized ({} groups)",
            style("!").yellow(),
            governor.repository().list_groups()?.len()
        );
    }

    println!(
        "{} Initialized crawlgov in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  Database: {}", settings.database_path().display());
    println!("  Snapshots: {}", settings.files_dir.display());

    Ok(())
}
