//! Console spinner shown while the bot waits on slow model calls.
//!
//! The indicator is a guard: it starts animating on construction and is
//! stopped and cleared when dropped, so every exit path of the decorated
//! operation (success, error, early return, cancelled future) releases it.

use std::future::Future;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub struct ThinkingIndicator {
    label: String,
    spinner: Option<ProgressBar>,
    started: Instant,
}

impl ThinkingIndicator {
    /// Start animating. indicatif draws nothing when stderr is not a
    /// terminal, but the guard behaves the same either way.
    pub fn start(label: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_strings(FRAMES)
            .template("{spinner} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(label.to_string());
        // The ticker runs on its own thread and owns only the frame cursor.
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self {
            label: label.to_string(),
            spinner: Some(spinner),
            started: Instant::now(),
        }
    }

    /// Stop early. Dropping the guard does the same.
    pub fn stop(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
            debug!(
                label = %self.label,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "indicator stopped"
            );
        }
    }
}

impl Drop for ThinkingIndicator {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Run `fut` with a spinner labelled `label` for exactly its duration.
pub async fn with_indicator<F: Future>(label: &str, fut: F) -> F::Output {
    let indicator = ThinkingIndicator::start(label);
    let output = fut.await;
    indicator.stop();
    output
}
