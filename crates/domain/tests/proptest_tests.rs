//! Property-based tests for domain types
//!
//! These tests use proptest to verify invariants across many random inputs.

use domain::{
    InstallProgress, InstallStage, InstallState, ModelStatus, Platform, canonical_model_name,
    same_model,
};
use proptest::prelude::*;

// ============================================================================
// Model Name Property Tests
// ============================================================================

mod model_name_tests {
    use super::*;

    proptest! {
        #[test]
        fn canonical_form_is_idempotent(name in "[a-z0-9._/-]{1,24}(:[a-z0-9._-]{1,12})?") {
            let once = canonical_model_name(&name);
            prop_assert_eq!(canonical_model_name(&once), once.clone());
            prop_assert!(once.contains(':'));
        }

        #[test]
        fn bare_name_matches_latest_tag(name in "[a-z0-9._-]{1,24}") {
            let tagged = format!("{name}:latest");
            prop_assert!(same_model(&name, &tagged));
            prop_assert!(same_model(&tagged, &name));
        }

        #[test]
        fn different_tags_never_match(
            name in "[a-z0-9]{1,16}",
            a in "[a-z0-9]{1,8}",
            b in "[a-z0-9]{1,8}",
        ) {
            prop_assume!(a != b);
            let tagged_a = format!("{name}:{a}");
            let tagged_b = format!("{name}:{b}");
            prop_assert!(!same_model(&tagged_a, &tagged_b));
        }
    }
}

// ============================================================================
// Progress Property Tests
// ============================================================================

mod progress_tests {
    use super::*;

    proptest! {
        #[test]
        fn install_progress_is_clamped(value in any::<u8>()) {
            let progress = InstallProgress::new(InstallStage::Download, "downloading", value);
            prop_assert!(progress.progress <= 100);
        }

        #[test]
        fn install_state_accepts_only_percentages(value in any::<u32>()) {
            let mut state = InstallState::default();
            state.begin_install();
            let result = state.set_progress(value);
            prop_assert_eq!(result.is_ok(), value <= 100);
            prop_assert!(state.progress <= 100);
        }
    }
}

// ============================================================================
// Status and Platform Property Tests
// ============================================================================

mod status_tests {
    use super::*;

    proptest! {
        #[test]
        fn warming_always_wins(loaded in any::<bool>(), warmed in any::<bool>()) {
            prop_assert_eq!(ModelStatus::resolve(true, loaded, warmed), ModelStatus::Warming);
        }

        #[test]
        fn platform_names_ignore_case(upper in prop::collection::vec(any::<bool>(), 5)) {
            let name: String = "macos"
                .chars()
                .zip(upper)
                .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
                .collect();
            prop_assert_eq!(name.parse::<Platform>().ok(), Some(Platform::MacOs));
        }
    }
}
