/// Capability that keeps the system out of idle/low-power suspension.
///
/// Calls nest: every `lock_idle` is paired with exactly one `unlock_idle`.
pub trait PowerPolicy: Send + Sync {
    fn lock_idle(&self);
    fn unlock_idle(&self);
}

/// Policy for targets without a suspend mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPowerPolicy;

impl PowerPolicy for NoPowerPolicy {
    fn lock_idle(&self) {}
    fn unlock_idle(&self) {}
}

/// RAII lease: suspension is locked while the lease is alive.
pub struct IdleLease<'a> {
    policy: &'a dyn PowerPolicy,
}

impl<'a> IdleLease<'a> {
    pub fn acquire(policy: &'a dyn PowerPolicy) -> Self {
        policy.lock_idle();
        Self { policy }
    }
}

impl Drop for IdleLease<'_> {
    fn drop(&mut self) {
        self.policy.unlock_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Default)]
    struct Depth(AtomicI32);

    impl PowerPolicy for Depth {
        fn lock_idle(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn unlock_idle(&self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn lease_releases_on_every_path() {
        let policy = Depth::default();
        {
            let _lease = IdleLease::acquire(&policy);
            assert_eq!(policy.0.load(Ordering::SeqCst), 1);
        }
        let failing = || -> Result<(), ()> {
            let _lease = IdleLease::acquire(&policy);
            Err(())
        };
        assert!(failing().is_err());
        assert_eq!(policy.0.load(Ordering::SeqCst), 0);
    }
}
