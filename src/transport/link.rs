//! Upstream link state
//!
//! Each transport owns the only `LinkNotifier` for its link and flips it from
//! its connection callbacks. Everything else holds a read-only `LinkState`.
//!
//! Besides up/down the link carries a generation that increases on every
//! attach, so a client replacing another one is visible even though the
//! link never went down in between.

use tokio::sync::watch;

/// Snapshot of the upstream link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub connected: bool,
    /// Bumped on every attach
    pub generation: u64,
}

/// Create a notifier/state pair with the given initial state
pub fn link_channel(connected: bool) -> (LinkNotifier, LinkState) {
    let (tx, rx) = watch::channel(LinkStatus {
        connected,
        generation: u64::from(connected),
    });
    (LinkNotifier { tx }, LinkState { rx })
}

/// Write side, held by the transport
#[derive(Debug)]
pub struct LinkNotifier {
    tx: watch::Sender<LinkStatus>,
}

impl LinkNotifier {
    /// Publish the connection state; no-op if unchanged
    ///
    /// Going up from down counts as an attach.
    pub fn set_connected(&self, connected: bool) {
        self.tx.send_if_modified(|current| {
            if current.connected == connected {
                false
            } else {
                current.connected = connected;
                if connected {
                    current.generation += 1;
                }
                true
            }
        });
    }

    /// A new upstream peer took over the link, whether or not it was up
    pub fn attach(&self) {
        self.tx.send_modify(|current| {
            current.connected = true;
            current.generation += 1;
        });
    }
}

/// Read side, held by the session and the reply writer
#[derive(Debug, Clone)]
pub struct LinkState {
    rx: watch::Receiver<LinkStatus>,
}

impl LinkState {
    pub fn is_connected(&self) -> bool {
        self.rx.borrow().connected
    }

    pub fn status(&self) -> LinkStatus {
        *self.rx.borrow()
    }

    /// Wait for the next state change
    ///
    /// Returns `None` once the transport has dropped its notifier.
    pub async fn changed(&mut self) -> Option<LinkStatus> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_follows_notifier() {
        let (notifier, mut state) = link_channel(false);
        assert!(!state.is_connected());
        assert_eq!(state.status().generation, 0);

        notifier.set_connected(true);
        let status = state.changed().await.unwrap();
        assert!(status.connected);
        assert_eq!(status.generation, 1);
        assert!(state.is_connected());
    }

    #[tokio::test]
    async fn test_changed_ends_when_notifier_dropped() {
        let (notifier, mut state) = link_channel(true);
        drop(notifier);

        assert_eq!(state.changed().await, None);
        // Last value is still readable
        assert!(state.is_connected());
    }

    #[tokio::test]
    async fn test_unchanged_value_does_not_wake() {
        let (notifier, mut state) = link_channel(true);
        notifier.set_connected(true);

        let woke = tokio::time::timeout(std::time::Duration::from_millis(20), state.changed()).await;
        assert!(woke.is_err());
        drop(notifier);
    }

    #[tokio::test]
    async fn test_attach_while_up_bumps_generation() {
        let (notifier, mut state) = link_channel(true);
        assert_eq!(state.status().generation, 1);

        notifier.attach();
        let status = state.changed().await.unwrap();
        assert!(status.connected);
        assert_eq!(status.generation, 2);
    }

    #[tokio::test]
    async fn test_down_keeps_generation() {
        let (notifier, mut state) = link_channel(false);
        notifier.attach();
        notifier.set_connected(false);

        let status = state.changed().await.unwrap();
        assert!(!status.connected);
        assert_eq!(status.generation, 1);

        notifier.set_connected(true);
        assert_eq!(state.changed().await.unwrap().generation, 2);
    }
}
