use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};

use serde::Serialize;

use super::ChannelId;

/// Reachability of a channel's image endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelHealth {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl ChannelHealth {
    /// Sidebar icon for this state.
    pub fn icon(self) -> &'static str {
        match self {
            ChannelHealth::Unknown | ChannelHealth::Online => "mdi mdi-webcam",
            ChannelHealth::Offline => "mdi mdi-webcam-off",
        }
    }
}

/// Notification sent to subscribers when a channel's health changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthChange {
    pub channel: ChannelId,
    pub previous: ChannelHealth,
    pub current: ChannelHealth,
}

/// Channel → health map.
///
/// Writing the value a channel already has is a no-op: nothing is stored and
/// no subscriber is notified, since every notification triggers a sidebar
/// refresh.
#[derive(Debug, Default)]
pub struct ChannelHealthStore {
    entries: HashMap<ChannelId, ChannelHealth>,
    subscribers: Vec<Sender<HealthChange>>,
}

impl ChannelHealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `channel` known (as `Unknown`) without notifying anyone.
    pub fn register(&mut self, channel: &ChannelId) {
        self.entries.entry(channel.clone()).or_default();
    }

    pub fn get(&self, channel: &ChannelId) -> ChannelHealth {
        self.entries.get(channel).copied().unwrap_or_default()
    }

    /// Store `health` for `channel`. Returns true when the value changed.
    pub fn set(&mut self, channel: &ChannelId, health: ChannelHealth) -> bool {
        let previous = self.get(channel);
        if previous == health {
            return false;
        }
        self.entries.insert(channel.clone(), health);
        let change = HealthChange {
            channel: channel.clone(),
            previous,
            current: health,
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
        true
    }

    /// Receive every future health change. Dropped receivers are pruned on
    /// the next change.
    pub fn subscribe(&mut self) -> Receiver<HealthChange> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// All known channels, ordered by id.
    pub fn snapshot(&self) -> Vec<(ChannelId, ChannelHealth)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(channel, health)| (channel.clone(), *health))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_write_notifies_once() {
        let mut store = ChannelHealthStore::new();
        let rx = store.subscribe();
        let channel = ChannelId::new("north/gate");

        assert!(store.set(&channel, ChannelHealth::Offline));
        assert!(!store.set(&channel, ChannelHealth::Offline));

        let changes: Vec<HealthChange> = rx.try_iter().collect();
        assert_eq!(
            changes,
            vec![HealthChange {
                channel: channel.clone(),
                previous: ChannelHealth::Unknown,
                current: ChannelHealth::Offline,
            }]
        );
        assert_eq!(store.get(&channel), ChannelHealth::Offline);
    }

    #[test]
    fn register_does_not_notify() {
        let mut store = ChannelHealthStore::new();
        let rx = store.subscribe();
        let channel = ChannelId::new("lobby");
        store.register(&channel);
        assert!(rx.try_recv().is_err());
        assert_eq!(store.snapshot(), vec![(channel, ChannelHealth::Unknown)]);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut store = ChannelHealthStore::new();
        drop(store.subscribe());
        let kept = store.subscribe();
        store.set(&ChannelId::new("a"), ChannelHealth::Online);
        assert_eq!(store.subscribers.len(), 1);
        assert_eq!(kept.try_iter().count(), 1);
    }

    #[test]
    fn icons_follow_health() {
        assert_eq!(ChannelHealth::Online.icon(), "mdi mdi-webcam");
        assert_eq!(ChannelHealth::Offline.icon(), "mdi mdi-webcam-off");
    }
}
