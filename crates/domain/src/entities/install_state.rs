//! Install state of the local runtime
//!
//! Mutated only by the orchestrating service; every operation that needs to
//! know whether the runtime is usable reads it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Observed installation state of the runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallState {
    /// Runtime binary is present on this machine
    pub is_installed: bool,
    /// An install flow is currently running
    pub is_installing: bool,
    /// Install progress, 0-100
    pub progress: u8,
    /// Last successful reconciliation
    pub last_sync: Option<DateTime<Utc>>,
}

impl InstallState {
    /// Enter the installing state and reset progress
    pub fn begin_install(&mut self) {
        self.is_installing = true;
        self.progress = 0;
    }

    /// Update install progress
    pub fn set_progress(&mut self, progress: u32) -> Result<(), DomainError> {
        let value = u8::try_from(progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(DomainError::InvalidProgress(progress))?;
        self.progress = value;
        Ok(())
    }

    /// Leave the installing state
    pub fn finish_install(&mut self, installed: bool) {
        self.is_installing = false;
        self.is_installed = installed;
        self.progress = if installed { 100 } else { 0 };
    }

    /// Record the outcome of a reconciliation tick
    pub fn mark_synced(&mut self, installed: bool) {
        self.is_installed = installed;
        self.last_sync = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_installed() {
        let state = InstallState::default();
        assert!(!state.is_installed);
        assert!(!state.is_installing);
        assert_eq!(state.progress, 0);
        assert!(state.last_sync.is_none());
    }

    #[test]
    fn begin_install_resets_progress() {
        let mut state = InstallState {
            progress: 40,
            ..Default::default()
        };
        state.begin_install();
        assert!(state.is_installing);
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn set_progress_rejects_out_of_range() {
        let mut state = InstallState::default();
        assert!(state.set_progress(55).is_ok());
        assert_eq!(state.progress, 55);
        assert!(matches!(
            state.set_progress(101),
            Err(DomainError::InvalidProgress(101))
        ));
        assert_eq!(state.progress, 55);
    }

    #[test]
    fn finish_install_success() {
        let mut state = InstallState::default();
        state.begin_install();
        state.finish_install(true);
        assert!(state.is_installed);
        assert!(!state.is_installing);
        assert_eq!(state.progress, 100);
    }

    #[test]
    fn finish_install_failure() {
        let mut state = InstallState::default();
        state.begin_install();
        state.finish_install(false);
        assert!(!state.is_installed);
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn mark_synced_sets_timestamp() {
        let mut state = InstallState::default();
        state.mark_synced(true);
        assert!(state.is_installed);
        assert!(state.last_sync.is_some());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&InstallState::default()).unwrap();
        assert!(json.contains("isInstalled"));
        assert!(json.contains("lastSync"));
    }
}
