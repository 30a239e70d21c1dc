use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use std::borrow::Cow;
use std::time::Duration;

/// How often should spinners be redrawn?
pub const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

lazy_static! {
    static ref WAITING_STYLE: ProgressStyle =
        ProgressStyle::with_template("{spinner} {msg} [{elapsed_precise}]")
            .expect("progress bar style template should compile");

    static ref FINISH_STYLE: ProgressStyle =
        ProgressStyle::with_template("{msg} [{elapsed_precise}]")
            .expect("progress bar style template should compile");
}

/// A spinner shown while waiting on the network.
///
/// When disabled, all operations are no-ops.
pub struct Progress {
    inner: ProgressBar,
}

impl Progress {
    pub fn new_spinner<T: Into<Cow<'static, str>>>(message: T, enabled: bool) -> Self {
        let inner = if enabled {
            let inner = ProgressBar::new_spinner()
                .with_style(WAITING_STYLE.clone())
                .with_message(message);

            inner.enable_steady_tick(PROGRESS_UPDATE_INTERVAL);

            inner
        } else {
            ProgressBar::hidden()
        };

        Progress { inner }
    }

    pub fn set_message<T: Into<Cow<'static, str>>>(&self, message: T) {
        self.inner.set_message(message);
    }

    #[inline]
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.inner.suspend(f)
    }

    pub fn finish_with_message<T: Into<Cow<'static, str>>>(&self, message: T) {
        self.inner.set_style(FINISH_STYLE.clone());
        self.inner.finish_with_message(message);
    }

    /// Remove the spinner from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if !self.inner.is_finished() {
            self.inner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disabled_spinner_is_inert() {
        let p = Progress::new_spinner("Fetching history", false);
        p.set_message("still fetching");
        assert_eq!(p.suspend(|| 7), 7);
        p.finish_with_message("done");
        assert!(p.inner.is_finished());
    }

    #[test]
    fn cleared_spinner_is_finished() {
        let p = Progress::new_spinner("Fetching history", true);
        p.finish_and_clear();
        assert!(p.inner.is_finished());
    }
}
