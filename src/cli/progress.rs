//! Merge progress with a spinner per PR

use crate::cli::style::{Stylize, check, cross, spinner_style};
use anstream::println;
use async_trait::async_trait;
use codi_repo::merge::{FailedMerge, MergeProgress, MergedPr};
use indicatif::ProgressBar;
use std::sync::Mutex;
use std::time::Duration;

/// Prints merge progress to stdout
#[derive(Default)]
pub struct CliProgress {
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    /// Create a progress printer
    pub fn new() -> Self {
        Self::default()
    }

    fn take_spinner(&self) -> Option<ProgressBar> {
        self.spinner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }

    fn finish(&self, line: String) {
        match self.take_spinner() {
            Some(spinner) => spinner.finish_with_message(line),
            None => println!("{line}"),
        }
    }
}

#[async_trait]
impl MergeProgress for CliProgress {
    async fn on_merge_started(&self, repo_name: &str, number: u64) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.set_message(format!("Merging {} #{number}...", repo_name.accent()));
        spinner.enable_steady_tick(Duration::from_millis(80));
        *self
            .spinner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(spinner);
    }

    async fn on_merged(&self, merged: &MergedPr) {
        let sha = merged
            .sha
            .as_deref()
            .map(|s| format!(" {}", &s[..s.len().min(12)]))
            .unwrap_or_default();
        self.finish(format!(
            "{} Merged {} #{} {}{}",
            check(),
            merged.repo_name.accent(),
            merged.number,
            format!("({})", merged.method).muted(),
            sha.muted()
        ));
    }

    async fn on_failed(&self, failed: &FailedMerge) {
        self.finish(format!(
            "{} {} #{}: {}",
            cross(),
            failed.repo_name.accent(),
            failed.number,
            failed.reason.warn()
        ));
    }

    async fn on_skipped(&self, repo_name: &str, number: u64, reason: &str) {
        println!(
            "{} {} #{number} {}",
            "-".muted(),
            repo_name.accent(),
            format!("skipped: {reason}").muted()
        );
    }

    async fn on_message(&self, message: &str) {
        let line = format!("  {}", message.muted());
        let spinner = self
            .spinner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match spinner.as_ref() {
            Some(spinner) => spinner.println(line),
            None => println!("{line}"),
        }
    }
}
