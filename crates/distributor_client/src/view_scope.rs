use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Generation counter shared by a view and the reads it starts. Results
/// carrying a stale ticket must be dropped instead of applied.
#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    generation: Arc<AtomicU64>,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> ViewTicket {
        ViewTicket {
            generation: Arc::clone(&self.generation),
            issued: self.generation.load(Ordering::Acquire),
        }
    }

    /// Called on teardown or rebind; every outstanding ticket goes stale.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone)]
pub struct ViewTicket {
    generation: Arc<AtomicU64>,
    issued: u64,
}

impl ViewTicket {
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::Acquire) == self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidation_stales_outstanding_tickets_only() {
        let scope = ViewScope::new();
        let before = scope.ticket();
        assert!(before.is_current());

        scope.invalidate();
        let after = scope.ticket();
        assert!(!before.is_current());
        assert!(after.is_current());

        let cloned = scope.clone();
        cloned.invalidate();
        assert!(!after.is_current());
    }
}
