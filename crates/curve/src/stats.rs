/// Counters for one venue's window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BuilderStats {
    /// Prints that opened a new settlement window
    pub rolls: u64,
    /// Prints that replaced the quote of the newest window
    pub refinements: u64,
    /// Oldest windows dropped to stay within capacity
    pub evictions: u64,
    /// Prints rejected by the gap guard
    pub invalid: u64,
    /// Prints older than the retained window
    pub stale: u64,
    /// Prints inside the window that were not the newest settlement
    pub out_of_order: u64,
    /// Snapshots handed out
    pub emitted: u64,
}

impl BuilderStats {
    /// Total prints that were dropped for any reason.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.invalid + self.stale + self.out_of_order
    }
}
