//! Correlation of in-flight requests to their responses.
//!
//! The sender path registers each GET under its 16-bit request id together with
//! the send timestamp; the receiver path resolves the id when the matching
//! response arrives and computes the round-trip latency from the stored
//! timestamp.
//!
//! The id space wraps at 65536. If more than 65536 requests are outstanding a
//! reused id silently overwrites the older entry (last-write-wins) and a stale
//! response may be misattributed, acceptable because loss is assumed low
//! relative to the id space. Entries whose response never arrives are never
//! evicted; they are accounted for only in the aggregate loss count.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Mutex-guarded map from in-flight request id to send timestamp.
///
/// `register` is called only from the scheduler path, `resolve` only from the
/// receiver path. The lock covers just the insert or the lookup-and-remove,
/// never any I/O.
pub struct Correlator {
    pending: Mutex<HashMap<u16, Instant>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request as in flight. Overwrites any prior entry for the same
    /// id (wraparound reuse).
    pub fn register(&self, request_id: u16, sent_at: Instant) {
        self.pending
            .lock()
            .expect("correlator lock poisoned")
            .insert(request_id, sent_at);
    }

    /// Atomically look up and remove the send timestamp for `request_id`.
    ///
    /// Returns `None` if the id was never registered, was already resolved, or
    /// was overwritten by wraparound; all are treated as an unattributable
    /// response, not an error.
    pub fn resolve(&self, request_id: u16) -> Option<Instant> {
        self.pending
            .lock()
            .expect("correlator lock poisoned")
            .remove(&request_id)
    }

    /// Number of requests currently awaiting a response.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().expect("correlator lock poisoned").len()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}
