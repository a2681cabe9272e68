//! Live view of a sync run for `ordersync progress --watch`.
//!
//! Two modes, picked from the terminal:
//! - Interactive mode (TTY): a progress bar over processed / total orders
//! - Logging mode (non-TTY): one structured log line per change

use std::time::Duration;

use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use ordersync::sync::ProgressSnapshot;

/// Renders successive snapshots of the same run.
pub enum ProgressWatcher {
    Interactive(ProgressBar),
    Logging { last: Option<ProgressSnapshot> },
}

impl ProgressWatcher {
    /// Create a watcher, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(120));
            Self::Interactive(bar)
        } else {
            Self::Logging { last: None }
        }
    }

    pub fn update(&mut self, snapshot: &ProgressSnapshot) {
        match self {
            Self::Interactive(bar) => {
                if let Some(total) = snapshot.total_orders
                    && bar.length() != Some(total)
                {
                    bar.set_length(total);
                    bar.set_style(counter_style());
                }
                bar.set_position(snapshot.processed_orders);
                bar.set_message(describe(snapshot));
            }
            Self::Logging { last } => {
                if last.as_ref() != Some(snapshot) {
                    tracing::info!(
                        status = %snapshot.status,
                        processed = snapshot.processed_orders,
                        total = ?snapshot.total_orders,
                        percent = ?snapshot.percent_complete,
                        skipped = snapshot.skipped_orders,
                        "Sync progress"
                    );
                    *last = Some(snapshot.clone());
                }
            }
        }
    }

    pub fn finish(&self, snapshot: &ProgressSnapshot) {
        if let Self::Interactive(bar) = self {
            bar.finish_with_message(describe(snapshot));
        }
    }
}

impl Default for ProgressWatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(snapshot: &ProgressSnapshot) -> String {
    let mut message = snapshot.status.to_string();
    if snapshot.skipped_orders > 0 {
        message.push_str(&format!(", {} skipped", snapshot.skipped_orders));
    }
    if let Some(error) = &snapshot.last_error {
        message.push_str(&format!(": {error}"));
    }
    message
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold.cyan} {spinner:.green} {pos} orders {msg}")
        .expect("Invalid template")
}

fn counter_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.green/dim}] {pos}/{len} orders {msg}")
        .expect("Invalid template")
        .progress_chars("=> ")
}
