//! Output formatting utilities

use console::{style, Style};

use convoy_core::monorepo::versioning::VersionPlan;
use convoy_core::types::ReleaseReport;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("→").blue(), message);
}

/// Create a styled header
pub fn header(text: &str) -> String {
    style(text).bold().to_string()
}

/// Style for version numbers
pub fn version_style() -> Style {
    Style::new().green().bold()
}

/// Style for tags
pub fn tag_style() -> Style {
    Style::new().yellow()
}

/// Lines describing a planned release, one per package
pub fn plan_lines(plan: &VersionPlan, current: impl Fn(&str) -> Option<String>) -> Vec<String> {
    plan.packages
        .iter()
        .filter_map(|name| {
            let next = plan.version_of(name)?;
            let from = current(name).unwrap_or_else(|| "-".to_string());
            Some(format!(
                " - {}: {} => {}",
                name,
                from,
                version_style().apply_to(next)
            ))
        })
        .collect()
}

/// Print the summary of a finished release
pub fn print_report(report: &ReleaseReport) {
    println!();
    if let Some(version) = &report.global_version {
        println!("{} {}", header("Version"), version_style().apply_to(version));
    }
    for package in &report.packages {
        let note = if package.already_published {
            style(" (already published)").dim().to_string()
        } else {
            String::new()
        };
        println!(
            " - {}@{}{}",
            package.name,
            version_style().apply_to(&package.version),
            note
        );
    }
    for tag in &report.tags {
        println!("   tagged {}", tag_style().apply_to(tag));
    }
    println!();
}
