use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::NaiveTime;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::calendar::{Clock, GameCalendar};

pub type Job = Arc<dyn Fn() + Send + Sync>;

/// Runs background jobs at a time of day or on a fixed interval.
pub trait Scheduler: Send + Sync {
    fn run_daily(&self, name: &'static str, time_of_day: NaiveTime, calendar: GameCalendar, job: Job);

    fn run_repeating(&self, name: &'static str, interval: Duration, job: Job);
}

/// One sleeping thread per job; dropping or calling [`shutdown`](Self::shutdown)
/// wakes and stops all of them.
pub struct ThreadScheduler {
    clock: Arc<dyn Clock>,
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (stop_tx, stop_rx) = unbounded();
        Self {
            clock,
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn shutdown(&self) {
        self.stop_tx.lock().take();
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    fn spawn(&self, name: &'static str, next_wait: impl Fn() -> Duration + Send + 'static, job: Job) {
        let stop = self.stop_rx.clone();
        let spawned = thread::Builder::new()
            .name(format!("job-{name}"))
            .spawn(move || loop {
                let wait = next_wait();
                select! {
                    recv(stop) -> _ => break,
                    default(wait) => {
                        tracing::debug!(target: "tide_pet::scheduler", job = name, "job.started");
                        job();
                    }
                }
            });
        match spawned {
            Ok(handle) => self.handles.lock().push(handle),
            Err(err) => tracing::error!(
                target: "tide_pet::scheduler",
                job = name,
                error = %err,
                "job.spawn_failed"
            ),
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn run_daily(&self, name: &'static str, time_of_day: NaiveTime, calendar: GameCalendar, job: Job) {
        let clock = Arc::clone(&self.clock);
        self.spawn(
            name,
            move || {
                let seconds = calendar.seconds_until(clock.now(), time_of_day);
                Duration::from_secs(seconds.max(1) as u64)
            },
            job,
        );
    }

    fn run_repeating(&self, name: &'static str, interval: Duration, job: Job) {
        self.spawn(name, move || interval, job);
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
