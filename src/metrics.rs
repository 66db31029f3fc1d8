//! Decision metrics
//!
//! Thread-safe counters for guard decisions, shared by every guard of a
//! service and exposed through `GET /api/metrics`.

use crate::access_control::Verdict;
use crate::guards::GuardKind;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime};

/// Decision metrics collector
pub struct DecisionMetrics {
    start_time: Instant,
    start_system_time: SystemTime,
    total_decisions: AtomicU64,
    total_lookup_failures: AtomicU64,
    data: RwLock<MetricsData>,
    max_recent_decisions: usize,
}

#[derive(Default)]
struct GuardStatsInner {
    allow: u64,
    deny: u64,
    neutral: u64,
    lookup_failures: u64,
    total_duration_us: u64,
}

impl GuardStatsInner {
    fn total(&self) -> u64 {
        self.allow + self.deny + self.neutral
    }
}

#[derive(Default)]
struct MetricsData {
    guards: HashMap<GuardKind, GuardStatsInner>,
    recent_decisions: VecDeque<DecisionRecord>,
}

/// One recorded decision
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub guard: GuardKind,
    /// Resource the decision was about, when one was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub verdict: Verdict,
    pub lookup_failed: bool,
    pub duration_us: u64,
    /// Unix timestamp (seconds)
    pub timestamp: u64,
}

/// Per-guard totals
#[derive(Debug, Clone, Serialize)]
pub struct GuardStats {
    pub guard: GuardKind,
    pub allow: u64,
    pub deny: u64,
    pub neutral: u64,
    pub lookup_failures: u64,
    pub avg_duration_us: u64,
}

/// Serializable view of all metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub start_time: u64,
    pub total_decisions: u64,
    pub total_lookup_failures: u64,
    pub guards: Vec<GuardStats>,
    pub recent_decisions: Vec<DecisionRecord>,
}

impl DecisionMetrics {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Keep at most `max_recent_decisions` entries in the recent ring
    pub fn with_capacity(max_recent_decisions: usize) -> Self {
        Self {
            start_time: Instant::now(),
            start_system_time: SystemTime::now(),
            total_decisions: AtomicU64::new(0),
            total_lookup_failures: AtomicU64::new(0),
            data: RwLock::new(MetricsData {
                guards: HashMap::new(),
                recent_decisions: VecDeque::with_capacity(max_recent_decisions),
            }),
            max_recent_decisions,
        }
    }

    fn write_data(&self) -> RwLockWriteGuard<'_, MetricsData> {
        self.data.write().unwrap_or_else(|poisoned| {
            tracing::warn!("metrics data lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn read_data(&self) -> RwLockReadGuard<'_, MetricsData> {
        self.data.read().unwrap_or_else(|poisoned| {
            tracing::warn!("metrics data lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record a single guard decision
    pub fn record(
        &self,
        guard: GuardKind,
        resource: Option<&str>,
        verdict: Verdict,
        duration: Duration,
        lookup_failed: bool,
    ) {
        let duration_us = duration.as_micros() as u64;

        self.total_decisions.fetch_add(1, Ordering::Relaxed);
        if lookup_failed {
            self.total_lookup_failures.fetch_add(1, Ordering::Relaxed);
        }

        let mut data = self.write_data();

        let stats = data.guards.entry(guard).or_default();
        match verdict {
            Verdict::Allow => stats.allow += 1,
            Verdict::Deny => stats.deny += 1,
            Verdict::Neutral => stats.neutral += 1,
        }
        if lookup_failed {
            stats.lookup_failures += 1;
        }
        stats.total_duration_us += duration_us;

        if self.max_recent_decisions == 0 {
            return;
        }
        if data.recent_decisions.len() >= self.max_recent_decisions {
            data.recent_decisions.pop_front();
        }
        data.recent_decisions.push_back(DecisionRecord {
            guard,
            resource: resource.map(String::from),
            verdict,
            lookup_failed,
            duration_us,
            timestamp: unix_secs(SystemTime::now()),
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.read_data();

        let mut guards: Vec<GuardStats> = data
            .guards
            .iter()
            .map(|(guard, s)| GuardStats {
                guard: *guard,
                allow: s.allow,
                deny: s.deny,
                neutral: s.neutral,
                lookup_failures: s.lookup_failures,
                avg_duration_us: s.total_duration_us.checked_div(s.total()).unwrap_or(0),
            })
            .collect();
        guards.sort_unstable_by_key(|g| g.guard.as_str());

        let recent_decisions: Vec<_> = data.recent_decisions.iter().cloned().collect();
        drop(data);

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            start_time: unix_secs(self.start_system_time),
            total_decisions: self.total_decisions(),
            total_lookup_failures: self.total_lookup_failures.load(Ordering::Relaxed),
            guards,
            recent_decisions,
        }
    }

    pub fn total_decisions(&self) -> u64 {
        self.total_decisions.load(Ordering::Relaxed)
    }
}

impl Default for DecisionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
