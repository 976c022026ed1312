//! Section listing command.

use console::style;

use crate::config::Settings;

/// Print the resolved sections, aliases grouped under their name.
pub fn cmd_sections(settings: &Settings) -> anyhow::Result<()> {
    let mut names: Vec<&str> = Vec::new();
    for section in &settings.sections {
        if !names.contains(&section.name.as_str()) {
            names.push(&section.name);
        }
    }

    println!("{} {}", style("Sections for").bold(), settings.base_url);
    for name in &names {
        println!("  {}", style(name).cyan());
        for section in settings.sections.iter().filter(|s| s.name == *name) {
            println!("    {} {}", style("→").dim(), settings.section_url(&section.path));
        }
    }
    println!(
        "{} {} section(s), {} path(s)",
        style("✓").green(),
        names.len(),
        settings.sections.len()
    );
    Ok(())
}
