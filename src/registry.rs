use dashmap::DashSet;

/// Urls already claimed by some traversal task. The set only ever grows;
/// it dies with the run.
#[derive(Debug, Default)]
pub struct VisitedRegistry {
    claimed: DashSet<String>,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically tests membership and inserts when absent. Returns true
    /// iff this call performed the insertion, so concurrent callers racing
    /// on the same url get exactly one winner.
    pub fn try_claim<I: AsRef<str>>(&self, url: I) -> bool {
        self.claimed.insert(url.as_ref().to_string())
    }

    pub fn contains<I: AsRef<str>>(&self, url: I) -> bool {
        self.claimed.contains(url.as_ref())
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}
