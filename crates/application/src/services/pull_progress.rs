//! Pull progress estimation
//!
//! The runtime reports byte counters for layer transfers but only bare
//! status strings for the other steps, so progress comes from whichever is
//! available. Byte-derived progress stays below 100 until the runtime says
//! `success`, and the reported value never moves backwards.

/// Approximate progress for status lines without byte counters
const STATUS_PROGRESS: &[(&str, u8)] = &[
    ("pulling manifest", 5),
    ("verifying sha256 digest", 90),
    ("verifying digest", 90),
    ("writing manifest", 95),
    ("removing any unused layers", 98),
    ("removing unused layers", 98),
    ("success", 100),
];

/// Highest value byte counters alone may produce
pub const MAX_BYTE_PROGRESS: u8 = 99;

/// Map a status string to its approximate progress
#[must_use]
pub fn progress_for_status(status: &str) -> Option<u8> {
    let normalized = status.trim().to_lowercase();
    STATUS_PROGRESS
        .iter()
        .find(|(known, _)| *known == normalized)
        .map(|(_, progress)| *progress)
}

/// Progress derived from byte counters, capped below completion
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn progress_for_bytes(completed: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (u128::from(completed.min(total)) * 100 / u128::from(total)) as u8;
    Some(percent.min(MAX_BYTE_PROGRESS))
}

/// Running progress of a single pull
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullProgressTracker {
    current: u8,
}

impl PullProgressTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self { current: 0 }
    }

    /// Last reported progress
    #[must_use]
    pub const fn current(&self) -> u8 {
        self.current
    }

    /// Fold one progress line in and return the progress to report
    pub fn observe(&mut self, status: &str, completed: Option<u64>, total: Option<u64>) -> u8 {
        let estimate = match (completed, total) {
            (Some(done), Some(all)) => progress_for_bytes(done, all),
            _ => None,
        }
        .or_else(|| progress_for_status(status));

        if let Some(value) = estimate {
            self.current = self.current.max(value);
        }
        self.current
    }
}
