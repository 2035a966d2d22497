//! Progress indicators for pgo.
//!
//! A spinner while the cluster is read, then a bar while statements run.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use provision::{Operation, ProgressCallback, Status};
use std::time::Duration;

/// Terminal progress for a provisioning run. Drawn on stderr, so it never
/// mixes with JSON written to stdout.
pub struct TerminalProgress {
    enabled: bool,
    total: u64,
    dry_run: bool,
    spinner: Option<ProgressBar>,
    bar: Option<ProgressBar>,
}

impl TerminalProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            total: 0,
            dry_run: false,
            spinner: None,
            bar: None,
        }
    }

    fn bar(&mut self) -> Option<&ProgressBar> {
        if !self.enabled || self.dry_run {
            return None;
        }
        let total = self.total;
        Some(self.bar.get_or_insert_with(|| {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            pb
        }))
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_inspect_start(&mut self) {
        if !self.enabled {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Reading cluster state");
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    fn on_plan(&mut self, operations: usize, dry_run: bool) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        self.total = operations as u64;
        self.dry_run = dry_run;
    }

    fn on_operation_start(&mut self, operation: &Operation, _statement: &str) {
        if let Some(pb) = self.bar() {
            pb.set_message(operation.to_string());
        }
    }

    fn on_operation_complete(&mut self, operation: &Operation, status: Status) {
        if let Some(pb) = self.bar() {
            if status == Status::Failed {
                pb.suspend(|| eprintln!("  {} {}", "✗".red(), operation));
            }
            pb.inc(1);
        }
    }

    fn on_finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

impl Drop for TerminalProgress {
    fn drop(&mut self) {
        // Runs that stop on an error never reach on_finish.
        self.on_finish();
    }
}
