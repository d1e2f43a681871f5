use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters tracking moderation workflow outcomes.
///
/// All counters use relaxed ordering. For a point-in-time view, call
/// [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct ModerationMetrics {
    /// Photos accepted into the moderation queue.
    pub submissions: AtomicU64,
    /// Submissions refused by validation.
    pub validation_failures: AtomicU64,
    /// Submissions refused by the per-submitter rate limit.
    pub rate_limited: AtomicU64,
    /// Photos approved by a moderator.
    pub approvals: AtomicU64,
    /// Photos rejected by a moderator.
    pub rejections: AtomicU64,
    /// Deletion requests opened.
    pub deletion_requests: AtomicU64,
    /// Deletion requests approved (photo soft-deleted).
    pub deletions: AtomicU64,
    /// Soft-deleted photos brought back.
    pub recoveries: AtomicU64,
    /// Photos permanently removed by the cleanup sweep.
    pub purges: AtomicU64,
    /// Writes that lost an optimistic concurrency race.
    pub conflicts: AtomicU64,
    /// Notification emails delivered.
    pub notifications_sent: AtomicU64,
    /// Notification emails dropped after all retries.
    pub notifications_failed: AtomicU64,
    /// Thumbnails generated and stored.
    pub thumbnails_generated: AtomicU64,
    /// Thumbnail attempts that failed.
    pub thumbnails_failed: AtomicU64,
}

impl ModerationMetrics {
    pub fn increment_submissions(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_validation_failures(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_approvals(&self) {
        self.approvals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejections(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletion_requests(&self) {
        self.deletion_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletions(&self) {
        self.deletions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_recoveries(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `count` to the purges counter.
    pub fn add_purges(&self, count: u64) {
        self.purges.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_conflicts(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notifications_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notifications_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_thumbnails_generated(&self) {
        self.thumbnails_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_thumbnails_failed(&self) {
        self.thumbnails_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submissions: self.submissions.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            approvals: self.approvals.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            deletion_requests: self.deletion_requests.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            purges: self.purges.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            thumbnails_generated: self.thumbnails_generated.load(Ordering::Relaxed),
            thumbnails_failed: self.thumbnails_failed.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`ModerationMetrics`] at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub submissions: u64,
    pub validation_failures: u64,
    pub rate_limited: u64,
    pub approvals: u64,
    pub rejections: u64,
    pub deletion_requests: u64,
    pub deletions: u64,
    pub recoveries: u64,
    pub purges: u64,
    pub conflicts: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub thumbnails_generated: u64,
    pub thumbnails_failed: u64,
}
