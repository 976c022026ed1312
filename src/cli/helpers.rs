//! Shared output helpers for CLI commands.

#![cfg_attr(not(feature = "browser"), allow(dead_code))]

use console::style;

use crate::models::ExportManifest;

/// How to start a browser the exporter can attach to.
pub fn print_relaunch_instructions(cdp_url: &str) {
    let port = url::Url::parse(cdp_url)
        .ok()
        .and_then(|u| u.port())
        .unwrap_or(9222);

    eprintln!(
        "{} Could not connect to a browser at {}",
        style("✗").red(),
        cdp_url
    );
    eprintln!("  Quit the browser completely, then relaunch it with remote debugging:");
    eprintln!();
    eprintln!(
        "    macOS:   /Applications/Google\\ Chrome.app/Contents/MacOS/Google\\ Chrome --remote-debugging-port={}",
        port
    );
    eprintln!("    Linux:   google-chrome --remote-debugging-port={}", port);
    eprintln!(
        "    Windows: \"C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe\" --remote-debugging-port={}",
        port
    );
    eprintln!();
    eprintln!("  Log in to the site in that window, then run the export again.");
}

fn summary_line(label: &str, value: usize) -> String {
    format!("│ {:<18}{:>10} │", label, value)
}

/// Boxed run summary plus the error list.
pub fn print_summary(manifest: &ExportManifest) {
    let stats = &manifest.stats;
    let rule = "─".repeat(30);

    println!();
    println!("┌{}┐", rule);
    println!("│ {:<28} │", style("Export complete").bold().green());
    println!("├{}┤", rule);
    println!("{}", summary_line("Sections", stats.total_sections));
    println!("{}", summary_line("Pages", stats.total_pages));
    println!("{}", summary_line("Tables", stats.total_tables));
    println!("{}", summary_line("Rows", stats.total_rows));
    println!("{}", summary_line("Files", stats.total_files));
    println!("{}", summary_line("Images", stats.total_images));
    println!("{}", summary_line("Detail pages", stats.total_details));
    println!("{}", summary_line("Errors", stats.errors.len()));
    println!("└{}┘", rule);

    for error in &stats.errors {
        println!(
            "  {} {} {}: {}",
            style("✗").red(),
            error.section,
            style(&error.path).dim(),
            error.error
        );
    }
    println!("{} Output in {}", style("→").cyan(), manifest.export_dir);
}
