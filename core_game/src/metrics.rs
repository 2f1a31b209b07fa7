use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct GameMetrics {
    actions: AtomicU64,
    rejections: AtomicU64,
    failures: AtomicU64,
    saves: AtomicU64,
    skipped_saves: AtomicU64,
    sweep_runs: AtomicU64,
    sweep_player_errors: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub actions: u64,
    pub rejections: u64,
    pub failures: u64,
    pub saves: u64,
    pub skipped_saves: u64,
    pub sweep_runs: u64,
    pub sweep_player_errors: u64,
}

impl GameMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_action(&self) {
        self.actions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save(&self, written: bool) {
        let counter = if written { &self.saves } else { &self.skipped_saves };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self, player_errors: u64) {
        self.sweep_runs.fetch_add(1, Ordering::Relaxed);
        self.sweep_player_errors
            .fetch_add(player_errors, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            actions: self.actions.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            skipped_saves: self.skipped_saves.load(Ordering::Relaxed),
            sweep_runs: self.sweep_runs.load(Ordering::Relaxed),
            sweep_player_errors: self.sweep_player_errors.load(Ordering::Relaxed),
        }
    }
}
