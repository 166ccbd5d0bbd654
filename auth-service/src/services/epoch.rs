use chrono::{TimeZone, Utc};
use std::sync::{Arc, RwLock};

/// Process-wide revocation point for user tokens, in Unix milliseconds.
///
/// A user token is valid only if it was issued at or after the epoch. The
/// epoch starts at process start, so a restart revokes every user token
/// issued before it. Service tokens are not affected.
#[derive(Clone)]
pub struct InvalidationEpoch {
    epoch_ms: Arc<RwLock<i64>>,
}

impl InvalidationEpoch {
    pub fn new() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }

    pub fn starting_at(epoch_ms: i64) -> Self {
        Self {
            epoch_ms: Arc::new(RwLock::new(epoch_ms)),
        }
    }

    pub fn current(&self) -> i64 {
        match self.epoch_ms.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Moves the epoch past every token issued so far and returns it.
    /// Strictly increasing across calls.
    pub fn invalidate_all(&self) -> i64 {
        let mut guard = match self.epoch_ms.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = (Utc::now().timestamp_millis() + 1).max(*guard + 1);
        *guard = next;
        next
    }

    /// Timestamp to stamp into a token issued now. Never earlier than the
    /// epoch, so a token minted right after an invalidation stays valid.
    pub fn issue_timestamp(&self) -> i64 {
        Utc::now().timestamp_millis().max(self.current())
    }

    pub fn is_valid(&self, issued_at_ms: i64) -> bool {
        issued_at_ms >= self.current()
    }

    pub fn current_rfc3339(&self) -> String {
        Utc.timestamp_millis_opt(self.current())
            .single()
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()
    }
}

impl Default for InvalidationEpoch {
    fn default() -> Self {
        Self::new()
    }
}
