//! In-memory cursor tracking between durable flushes.

/// Tracks the highest applied sequence number and when it needs saving.
///
/// Saving on every event would put a durable write on the hot path, so the
/// subscriber saves every `flush_every` advances and whenever a session
/// ends. After a crash, up to `flush_every - 1` events are redelivered;
/// the projection is idempotent so that only costs work.
#[derive(Debug, Clone)]
pub(crate) struct CursorTracker {
    committed: Option<i64>,
    applied: Option<i64>,
    since_flush: u32,
    flush_every: u32,
}

impl CursorTracker {
    pub(crate) fn new(flush_every: u32) -> Self {
        Self {
            committed: None,
            applied: None,
            since_flush: 0,
            flush_every: flush_every.max(1),
        }
    }

    /// Seed with the value loaded from the store.
    pub(crate) fn restore(&mut self, committed: Option<i64>) {
        self.committed = committed;
        self.applied = committed;
        self.since_flush = 0;
    }

    /// Highest sequence number fully handled, durable or not.
    pub(crate) fn high_water(&self) -> Option<i64> {
        self.applied
    }

    /// Last value known to be durable.
    pub(crate) fn committed(&self) -> Option<i64> {
        self.committed
    }

    /// Returns true if `seq` was already handled.
    pub(crate) fn is_replay(&self, seq: i64) -> bool {
        self.applied.is_some_and(|applied| seq <= applied)
    }

    /// Record `seq` as handled. Returns true when a flush is due.
    pub(crate) fn advance(&mut self, seq: i64) -> bool {
        if self.is_replay(seq) {
            return false;
        }
        self.applied = Some(seq);
        self.since_flush += 1;
        self.since_flush >= self.flush_every
    }

    /// The value to save, if anything is newer than the durable cursor.
    pub(crate) fn pending(&self) -> Option<i64> {
        match (self.applied, self.committed) {
            (Some(applied), Some(committed)) if applied <= committed => None,
            (applied, _) => applied,
        }
    }

    /// Record that `seq` is durable.
    pub(crate) fn mark_committed(&mut self, seq: i64) {
        if self.committed.is_none_or(|committed| seq > committed) {
            self.committed = Some(seq);
        }
        self.since_flush = 0;
    }
}
