//! Export command.

use crate::config::Settings;

/// Attach to the browser and crawl every configured section.
#[cfg(feature = "browser")]
pub async fn cmd_export(settings: Settings) -> anyhow::Result<()> {
    use anyhow::Context;
    use console::style;

    use crate::browser::{BrowserError, CdpSession};
    use crate::cli::helpers;
    use crate::scrapers::{ExportError, Exporter};

    settings.validate().map_err(anyhow::Error::msg)?;

    let exporter = Exporter::new(settings.clone()).context("Invalid pagination rules")?;

    println!(
        "{} Connecting to browser at {}",
        style("→").cyan(),
        settings.cdp_url
    );
    let mut session =
        match CdpSession::attach(&settings.cdp_url, &settings.base_url, settings.page_load_timeout).await {
            Ok(session) => session,
            Err(e @ BrowserError::Connect { .. }) => {
                helpers::print_relaunch_instructions(&settings.cdp_url);
                return Err(e.into());
            }
            Err(BrowserError::NoPages) => {
                anyhow::bail!("The browser has no open tabs. Open {} and log in first.", settings.base_url)
            }
            Err(e) => return Err(e).context("Failed to attach to browser"),
        };

    match exporter.check_session(&mut session).await {
        Ok(()) => {}
        Err(ExportError::SessionExpired { url }) => {
            anyhow::bail!(
                "The browser tab is on a login page ({}). Log in to {} in that browser, then run again.",
                url,
                settings.base_url
            )
        }
        Err(e) => return Err(e).context("Failed to read the current tab"),
    }

    println!(
        "{} Exporting {} section path(s) to {}",
        style("→").cyan(),
        settings.sections.len(),
        settings.export_dir.display()
    );

    let manifest = exporter.run(&mut session).await.context("Export failed")?;
    helpers::print_summary(&manifest);

    Ok(())
}

#[cfg(not(feature = "browser"))]
pub async fn cmd_export(_settings: Settings) -> anyhow::Result<()> {
    anyhow::bail!("Browser support not compiled. Rebuild with: cargo build --features browser")
}
