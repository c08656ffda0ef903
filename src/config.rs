use std::time::Duration;

/// Configuration for query behavior.
///
/// This controls how long fetched data is considered fresh and whether a
/// query revalidates when the host regains focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// How long data is considered fresh after a successful fetch.
    ///
    /// While fresh, non-forced fetches are skipped in favor of the cached value.
    /// `Duration::ZERO` makes every fetch go to the fetch operation.
    pub stale_time: Duration,

    /// Whether a focus event forces a refetch.
    pub refetch_on_window_focus: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_millis(5000),
            refetch_on_window_focus: true,
        }
    }
}

impl QueryConfig {
    /// Creates a new query configuration.
    #[must_use]
    pub const fn new(stale_time: Duration, refetch_on_window_focus: bool) -> Self {
        Self {
            stale_time,
            refetch_on_window_focus,
        }
    }

    /// Returns a copy with the given stale time.
    #[must_use]
    pub const fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Returns a copy with focus revalidation switched on or off.
    #[must_use]
    pub const fn with_refetch_on_window_focus(mut self, enabled: bool) -> Self {
        self.refetch_on_window_focus = enabled;
        self
    }
}
