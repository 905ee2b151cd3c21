use vfetch_store::{ObjectKind, StoreResult};

use crate::config::ImportConfig;

/// What happens to the waiters of one key once the store has answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// The store returned a record; every waiter gets the converted object.
    Fulfill,
    /// The store failed and fallback is off; every waiter gets the failure.
    Fail,
    /// The store failed and fallback is on; the waiters stay unresolved and
    /// are handed to the secondary import path.
    Defer,
}

/// Per-kind decision between surfacing and deferring store failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FallbackPolicy {
    kind: ObjectKind,
    enabled: bool,
}

impl FallbackPolicy {
    /// The policy `config` sets for `kind`.
    pub fn for_kind(config: &ImportConfig, kind: ObjectKind) -> Self {
        Self {
            kind,
            enabled: config.fallback_enabled(kind),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn decide<T>(&self, result: &StoreResult<T>) -> Disposition {
        match (result, self.enabled) {
            (Ok(_), _) => Disposition::Fulfill,
            (Err(_), true) => Disposition::Defer,
            (Err(_), false) => Disposition::Fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use vfetch_store::StoreError;

    use super::*;

    fn failure() -> StoreResult<()> {
        Err(StoreError::Remote("timed out".into()))
    }

    #[test]
    fn success_always_fulfills() {
        for config in [ImportConfig::default(), ImportConfig::strict()] {
            let policy = FallbackPolicy::for_kind(&config, ObjectKind::Tree);
            assert_eq!(policy.decide(&Ok(())), Disposition::Fulfill);
        }
    }

    #[test]
    fn failure_defers_when_enabled() {
        let policy = FallbackPolicy::for_kind(&ImportConfig::default(), ObjectKind::Blob);
        assert!(policy.is_enabled());
        assert_eq!(policy.decide(&failure()), Disposition::Defer);
    }

    #[test]
    fn failure_fails_when_disabled() {
        let policy = FallbackPolicy::for_kind(&ImportConfig::strict(), ObjectKind::BlobMetadata);
        assert_eq!(policy.kind(), ObjectKind::BlobMetadata);
        assert_eq!(policy.decide(&failure()), Disposition::Fail);
    }

    #[test]
    fn flags_are_per_kind() {
        let config = ImportConfig {
            tree_fetch_fallback: false,
            ..Default::default()
        };
        assert_eq!(
            FallbackPolicy::for_kind(&config, ObjectKind::Tree).decide(&failure()),
            Disposition::Fail
        );
        assert_eq!(
            FallbackPolicy::for_kind(&config, ObjectKind::Blob).decide(&failure()),
            Disposition::Defer
        );
    }
}
