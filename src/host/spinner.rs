use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

/// Busy indicator shown while a blocking probe runs. Cleared on drop.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("-\\|/ ")
            .template("{spinner:.cyan} [{elapsed}] {msg}")
        {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(TICK);
        Self { bar }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Awaits `fut` with a spinner on screen; the spinner is gone before this returns.
pub async fn while_running<F: Future>(message: &str, fut: F) -> F::Output {
    let _spinner = Spinner::start(message);
    fut.await
}
