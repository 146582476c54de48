use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use hytra::TrAdder;
use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};

/// Sliding window over the most recent convergence measures.
///
/// While fewer than `max_size` values have been recorded the window
/// reports the initial default, which keeps an iteration loop alive until
/// a full sweep of measurements is in.
#[derive(Debug, Clone)]
pub(crate) struct Diffs {
    diffs: VecDeque<f64>,
    max_size: usize,
    def: f64,
}

impl Diffs {
    pub(crate) fn new(max_size: usize, def: f64) -> Self {
        Self {
            diffs: VecDeque::with_capacity(max_size),
            max_size,
            def,
        }
    }

    pub(crate) fn push(&mut self, x: f64) {
        if self.diffs.len() == self.max_size {
            self.diffs.pop_front();
        }
        self.diffs.push_back(x);
    }

    pub(crate) fn max(&self) -> f64 {
        if self.diffs.len() < self.max_size {
            return self.def;
        }
        self.diffs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Runs `f`, showing a progress bar once the computation has been going
/// for longer than `config.progress_min_time`. `f` reports its progress
/// through the supplied counter.
pub(crate) fn with_progress<F, T>(f: F, n_iter: u64, msg: &'static str, config: &crate::Config) -> T
where
    F: FnOnce(&TrAdder<u64>) -> T + Send,
    T: Send,
{
    let cnt: TrAdder<u64> = TrAdder::new();
    let done = AtomicBool::new(false);
    thread::scope(|s| {
        let cnt = &cnt;
        let done = &done;
        let bar_thread = config.show_progress.then(|| {
            s.spawn(move || {
                let poll = Duration::from_millis(50);
                // hold off on drawing anything for short computations
                let start = Instant::now();
                while start.elapsed() < config.progress_min_time {
                    thread::park_timeout(poll);
                    if done.load(Ordering::Acquire) {
                        return;
                    }
                }
                let pb = ProgressBar::new(n_iter)
                    .with_style(
                        ProgressStyle::default_spinner()
                            .template("{msg} [{elapsed_precise}] [{bar:40}] (ETA {eta})")
                            .unwrap(),
                    )
                    .with_finish(ProgressFinish::AndClear)
                    .with_message(msg);
                while !done.load(Ordering::Acquire) {
                    pb.set_position(cnt.get());
                    thread::park_timeout(poll);
                }
                pb.finish_and_clear();
            })
        });
        let res = f(cnt);
        done.store(true, Ordering::Release);
        // unpark pairs with park_timeout, so the bar thread wakes promptly
        if let Some(handle) = &bar_thread {
            handle.thread().unpark();
        }
        res
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diffs_window() {
        let mut diffs = Diffs::new(2, 1.0);
        assert_eq!(diffs.max(), 1.0);
        diffs.push(0.5);
        assert_eq!(diffs.max(), 1.0);
        diffs.push(0.3);
        assert_eq!(diffs.max(), 0.5);
        diffs.push(0.1);
        assert_eq!(diffs.max(), 0.3);
    }
}
