//! Process-wide "ranking changed" fan-out
//!
//! One broadcast channel, no payload, no replay. Mutations call [`UpdateBroadcaster::notify`]
//! after their transaction commits; live-view subscribers re-fetch the
//! ranking when a signal arrives. Subscribers that fall behind coalesce to a
//! single refresh.

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone)]
pub struct UpdateBroadcaster {
    tx: broadcast::Sender<()>,
}

impl UpdateBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Signal every connected subscriber that ranking data changed.
    ///
    /// Never blocks and never fails: with no subscribers the signal is
    /// simply dropped.
    pub fn notify(&self) {
        match self.tx.send(()) {
            Ok(receivers) => tracing::debug!(receivers, "Broadcast ranking update"),
            Err(_) => tracing::debug!("Ranking update with no live subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

impl Default for UpdateBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
