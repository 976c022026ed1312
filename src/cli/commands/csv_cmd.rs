//! CSV regeneration command.

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::services::csv_export;
use crate::storage::ExportLayout;

/// Rebuild `csv/` from an existing export's `data/*.json`.
pub fn cmd_csv(settings: &Settings) -> anyhow::Result<()> {
    let layout = ExportLayout::new(&settings.export_dir);
    if !layout.data_dir().is_dir() {
        println!(
            "{} No data directory at {}",
            style("!").yellow(),
            layout.data_dir().display()
        );
        return Ok(());
    }

    let written = csv_export::export_all(&layout).context("CSV export failed")?;
    for path in &written {
        println!("  {} {}", style("✓").green(), path.display());
    }
    println!(
        "{} Wrote {} CSV file(s) to {}",
        style("✓").green(),
        written.len(),
        layout.csv_dir().display()
    );
    Ok(())
}
