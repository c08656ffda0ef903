//! Host focus notifications.
//!
//! The host (a GUI shell, a terminal event loop, a test) calls
//! [`FocusEvents::notify`] whenever its surface regains foreground focus.
//! Every active query with focus revalidation enabled holds a receiver and
//! forces a refetch on each notification.
//!
//! # Example
//!
//! ```
//! use stale_query::focus::FocusEvents;
//!
//! let focus = FocusEvents::new();
//! let mut rx = focus.subscribe();
//!
//! assert_eq!(focus.notify(), 1);
//! assert!(rx.try_recv().is_ok());
//! ```

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Broadcast source of "regained focus" events.
///
/// Clones share the same channel, so one clone can live in the host's event
/// loop while others are handed to queries.
#[derive(Debug, Clone)]
pub struct FocusEvents {
    sender: broadcast::Sender<()>,
}

impl FocusEvents {
    /// Creates a focus source buffering at most `capacity` undelivered events.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _rx) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Creates a focus source with the default capacity (16).
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(16)
    }

    /// Signals that the host surface regained focus.
    ///
    /// Returns the number of listeners that received the event; zero when no
    /// query is listening.
    pub fn notify(&self) -> usize {
        self.sender.send(()).unwrap_or(0)
    }

    /// Registers a new listener.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Registers a new listener as a stream.
    ///
    /// Events dropped because the listener lagged behind are skipped; a burst
    /// of focus events only needs to trigger one revalidation anyway.
    pub fn stream(&self) -> BoxStream<'static, ()> {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|result| async move { result.ok() })
            .boxed()
    }

    /// Returns the number of active listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FocusEvents {
    fn default() -> Self {
        Self::new()
    }
}
