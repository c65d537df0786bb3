//! Manager configuration.

/// Tuning knobs for [`TextureManager`](crate::TextureManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Completed rebuilds applied per `process_all_pending` call.
    pub pending_budget: usize,
    /// Treat a retired texture missing from the loaded cache as a bug.
    ///
    /// The breach is logged at error level and trips a debug assertion.
    pub strict_cache: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            pending_budget: 64,
            strict_cache: true,
        }
    }
}

impl ManagerConfig {
    pub fn with_pending_budget(mut self, pending_budget: usize) -> Self {
        self.pending_budget = pending_budget;
        self
    }

    pub fn with_strict_cache(mut self, strict_cache: bool) -> Self {
        self.strict_cache = strict_cache;
        self
    }
}
