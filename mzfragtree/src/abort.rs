use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A signal to abort running solves. Clones share the same flag, so one clone can be handed to
/// the solving threads while another is kept to abort them. The solver only checks the signal
/// between node tables, every [`BuilderSettings::abort_check_interval`](crate::BuilderSettings::abort_check_interval) nodes.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    /// Create a new signal that is not aborted
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort all solves that use this signal
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if the signal was aborted
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::AbortSignal;

    #[test]
    fn shared() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_aborted());
        signal.abort();
        assert!(clone.is_aborted());
    }
}
