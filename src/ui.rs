use anyhow::Result;
use colored::{ColoredString, Colorize};
use provision::{Plan, Report, ReportEntry, ReportSummary, Status, Verb};
use serde::Serialize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message on stderr, under an error
pub fn hint(msg: &str) {
    eprintln!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Pretty-print any serializable value as JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn verb_symbol(verb: Verb) -> ColoredString {
    match verb {
        Verb::Create => "+".green(),
        Verb::Drop => "-".red(),
        Verb::Alter => "~".yellow(),
    }
}

fn status_symbol(entry: &ReportEntry) -> ColoredString {
    match entry.status {
        Status::Planned => verb_symbol(entry.operation),
        Status::Applied => "✓".green(),
        Status::Failed => "✗".red(),
        Status::Skipped => "⊘".dimmed(),
    }
}

/// Display a plan in execution order
pub fn display_plan(plan: &Plan) {
    if plan.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    let total = plan.len();
    for (index, operation) in plan.iter().enumerate() {
        let key = operation.key();
        println!(
            "  {} {} {:<18} {}",
            format!("[{}/{}]", index + 1, total).blue().bold(),
            verb_symbol(operation.verb()),
            key.kind().to_string(),
            key.identity()
        );
        println!("        {}", operation.display_statement().dimmed());
    }
}

/// Display every entry of a report, then its summary
pub fn display_report(report: &Report) {
    if report.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    for entry in &report.entries {
        println!(
            "  {} {:<6} {:<18} {}",
            status_symbol(entry),
            entry.operation.to_string(),
            entry.kind.to_string(),
            entry.identity
        );
        println!("           {}", entry.statement.dimmed());
        if let Some(error) = &entry.error {
            println!("           {}", error.red());
        }
    }

    print_summary(report);
}

fn print_summary(report: &Report) {
    let summary = report.summary();
    println!();
    if report.dry_run {
        info(&format!(
            "Dry run - no changes made ({})",
            summary_line(&summary)
        ));
    } else if summary.failed > 0 {
        println!(
            "  {} Provisioning stopped at the first failure ({})",
            "⚠".yellow().bold(),
            summary_line(&summary)
        );
    } else if summary.applied == 0 {
        warn(&format!("Aborted ({})", summary_line(&summary)));
    } else {
        success(&format!(
            "Cluster provisioned successfully ({})",
            summary_line(&summary)
        ));
    }
}

/// Plain-text counts, omitting statuses that did not occur
pub fn summary_line(summary: &ReportSummary) -> String {
    let parts: Vec<String> = [
        (summary.planned, "planned"),
        (summary.applied, "applied"),
        (summary.failed, "failed"),
        (summary.skipped, "skipped"),
    ]
    .iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, label)| format!("{count} {label}"))
    .collect();

    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(", ")
    }
}

// ============================================================================
// Tests
// ============================================================================
