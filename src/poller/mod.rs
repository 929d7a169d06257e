//! Multi-channel still-image dashboard.
//!
//! `ChannelPoller` is the per-selection state machine:
//!
//! ```text
//! Idle ──select──▶ Requesting ──ok──▶ Healthy   ──1000/fps ms──▶ Requesting
//!                             └─err─▶ Unhealthy ──backoff ms───▶ Requesting
//! ```
//!
//! Every selection bumps a generation counter. A completion carrying an
//! older generation belongs to a channel that is no longer selected and is
//! discarded without touching health or the display.
//!
//! `PollerHandle` runs the machine on a worker thread.

mod driver;
mod fetch;
mod health;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::frame::Frame;
use crate::render::{Overlay, OverlayRenderer, Surface};

pub use driver::PollerHandle;
pub use fetch::{ChannelFetcher, HttpChannelFetcher};
pub use health::{ChannelHealth, ChannelHealthStore, HealthChange};

/// Channel key, `region/channel` by convention. Also the image path under the
/// dashboard base URL.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading path segment, when the id has one.
    pub fn region(&self) -> Option<&str> {
        self.0.split_once('/').map(|(region, _)| region)
    }

    /// Channel name without its region.
    pub fn name(&self) -> &str {
        self.0
            .split_once('/')
            .map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Rescheduling policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Polls per second while the channel answers.
    pub fps_target: u32,
    /// Flat delay after a failed poll.
    pub retry_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            fps_target: 5,
            retry_backoff: Duration::from_millis(10_000),
        }
    }
}

impl PollPolicy {
    pub fn success_delay(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.fps_target.max(1)))
    }

    pub fn failure_delay(&self) -> Duration {
        self.retry_backoff
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Requesting,
    Healthy,
    Unhealthy,
}

/// Identifies one request: the channel it is for and the selection
/// generation it was issued under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollTicket {
    pub channel: ChannelId,
    pub generation: u64,
}

/// Result of feeding a fetch outcome back into the poller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The ticket's channel is no longer selected; nothing changed.
    Stale,
    /// Applied. Poll again after `delay`.
    Applied {
        state: PollState,
        delay: Duration,
        health_changed: bool,
    },
}

pub struct ChannelPoller<S: Surface> {
    policy: PollPolicy,
    selected: Option<ChannelId>,
    generation: u64,
    state: PollState,
    health: ChannelHealthStore,
    display: OverlayRenderer<S>,
}

impl<S: Surface> ChannelPoller<S> {
    pub fn new(policy: PollPolicy, display: OverlayRenderer<S>) -> Self {
        Self {
            policy,
            selected: None,
            generation: 0,
            state: PollState::Idle,
            health: ChannelHealthStore::new(),
            display,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn selected(&self) -> Option<&ChannelId> {
        self.selected.as_ref()
    }

    pub fn health(&self) -> &ChannelHealthStore {
        &self.health
    }

    pub fn health_mut(&mut self) -> &mut ChannelHealthStore {
        &mut self.health
    }

    pub fn display(&self) -> &OverlayRenderer<S> {
        &self.display
    }

    /// Switch to `channel` and issue its first request. Any request issued
    /// for the previous selection becomes stale.
    pub fn select(&mut self, channel: ChannelId) -> PollTicket {
        self.generation += 1;
        self.health.register(&channel);
        self.display.reset_clock();
        log::info!(
            "polling channel '{}' (region {:?})",
            channel,
            channel.region()
        );
        self.selected = Some(channel.clone());
        self.state = PollState::Requesting;
        PollTicket {
            channel,
            generation: self.generation,
        }
    }

    /// Drop the selection; outstanding requests become stale.
    pub fn deselect(&mut self) {
        self.generation += 1;
        self.selected = None;
        self.state = PollState::Idle;
    }

    /// Ticket for the current selection, without changing state.
    pub fn current_ticket(&self) -> Option<PollTicket> {
        self.selected.as_ref().map(|channel| PollTicket {
            channel: channel.clone(),
            generation: self.generation,
        })
    }

    fn is_current(&self, ticket: &PollTicket) -> bool {
        ticket.generation == self.generation && self.selected.as_ref() == Some(&ticket.channel)
    }

    /// A scheduled request is about to go out. Returns false when the ticket
    /// went stale while it was waiting.
    pub fn begin(&mut self, ticket: &PollTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.state = PollState::Requesting;
        true
    }

    /// Apply a finished fetch: update health and display, and say when to
    /// poll next.
    pub fn complete(
        &mut self,
        ticket: &PollTicket,
        outcome: Result<Frame, ClientError>,
    ) -> Completion {
        if !self.is_current(ticket) {
            log::debug!(
                "discarding stale result for '{}' (generation {}, current {})",
                ticket.channel,
                ticket.generation,
                self.generation
            );
            return Completion::Stale;
        }

        match outcome {
            Ok(frame) => {
                let health_changed = self.health.set(&ticket.channel, ChannelHealth::Online);
                self.display.render(&frame, &Overlay::Plain);
                self.state = PollState::Healthy;
                Completion::Applied {
                    state: self.state,
                    delay: self.policy.success_delay(),
                    health_changed,
                }
            }
            Err(err) => {
                let health_changed = self.health.set(&ticket.channel, ChannelHealth::Offline);
                if health_changed {
                    log::warn!("channel '{}' offline: {}", ticket.channel, err);
                } else {
                    log::debug!("channel '{}' still offline: {}", ticket.channel, err);
                }
                self.display.render_placeholder();
                self.state = PollState::Unhealthy;
                Completion::Applied {
                    state: self.state,
                    delay: self.policy.failure_delay(),
                    health_changed,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameMetadata;
    use crate::render::{DrawOp, RecordingSurface};

    fn poller() -> ChannelPoller<RecordingSurface> {
        ChannelPoller::new(
            PollPolicy::default(),
            OverlayRenderer::new(RecordingSurface::new(320, 180)),
        )
    }

    fn still(timestamp_ms: f64) -> Frame {
        Frame::from_rgb(2, 2, vec![10u8; 12], timestamp_ms, FrameMetadata::default()).unwrap()
    }

    fn offline() -> Result<Frame, ClientError> {
        Err(ClientError::Status(503))
    }

    #[test]
    fn channel_id_splits_region() {
        let id = ChannelId::new("north/gate-2");
        assert_eq!(id.region(), Some("north"));
        assert_eq!(id.name(), "gate-2");
        assert_eq!(ChannelId::new("lobby").region(), None);
        assert_eq!(ChannelId::new("lobby").name(), "lobby");
    }

    #[test]
    fn success_marks_online_and_uses_nominal_interval() {
        let mut poller = poller();
        let ticket = poller.select(ChannelId::new("a"));
        assert_eq!(poller.state(), PollState::Requesting);

        let completion = poller.complete(&ticket, Ok(still(0.0)));
        assert_eq!(
            completion,
            Completion::Applied {
                state: PollState::Healthy,
                delay: Duration::from_millis(200),
                health_changed: true,
            }
        );
        assert_eq!(poller.health().get(&ticket.channel), ChannelHealth::Online);
        assert_eq!(poller.display().surface().frames_drawn(), 1);
    }

    #[test]
    fn consecutive_failures_go_offline_once_with_flat_backoff() {
        let mut poller = poller();
        let notifications = poller.health_mut().subscribe();
        let mut ticket = poller.select(ChannelId::new("a"));

        let mut delays = Vec::new();
        let mut changes = Vec::new();
        for _ in 0..3 {
            assert!(poller.begin(&ticket));
            match poller.complete(&ticket, offline()) {
                Completion::Applied {
                    state,
                    delay,
                    health_changed,
                } => {
                    assert_eq!(state, PollState::Unhealthy);
                    delays.push(delay);
                    changes.push(health_changed);
                }
                Completion::Stale => panic!("ticket should be current"),
            }
            ticket = poller.current_ticket().unwrap();
        }

        assert_eq!(delays, vec![Duration::from_millis(10_000); 3]);
        assert_eq!(changes, vec![true, false, false]);
        assert_eq!(notifications.try_iter().count(), 1);
        let clears = poller
            .display()
            .surface()
            .ops()
            .iter()
            .filter(|op| **op == DrawOp::Clear)
            .count();
        assert_eq!(clears, 3);
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut poller = poller();
        let ticket_a = poller.select(ChannelId::new("a"));
        let ticket_b = poller.select(ChannelId::new("b"));

        assert_eq!(poller.complete(&ticket_a, offline()), Completion::Stale);
        assert_eq!(
            poller.health().get(&ChannelId::new("a")),
            ChannelHealth::Unknown
        );
        assert!(poller.display().surface().ops().is_empty());
        assert!(!poller.begin(&ticket_a));

        assert!(matches!(
            poller.complete(&ticket_b, Ok(still(5.0))),
            Completion::Applied { .. }
        ));
        assert_eq!(poller.health().get(&ticket_b.channel), ChannelHealth::Online);
    }

    #[test]
    fn reselecting_same_channel_invalidates_old_ticket() {
        let mut poller = poller();
        let first = poller.select(ChannelId::new("a"));
        let second = poller.select(ChannelId::new("a"));
        assert_ne!(first, second);
        assert_eq!(poller.complete(&first, Ok(still(0.0))), Completion::Stale);
    }

    #[test]
    fn switching_channel_resets_stream_clock() {
        let mut poller = poller();
        let ticket = poller.select(ChannelId::new("a"));
        poller.complete(&ticket, Ok(still(0.0)));
        assert_eq!(poller.display().stream_clock().frame_count(), 1);

        poller.select(ChannelId::new("b"));
        assert_eq!(poller.display().stream_clock().frame_count(), 0);
        assert_eq!(poller.display().stream_clock().start_time(), None);
    }

    #[test]
    fn deselect_returns_to_idle() {
        let mut poller = poller();
        let ticket = poller.select(ChannelId::new("a"));
        poller.deselect();
        assert_eq!(poller.state(), PollState::Idle);
        assert_eq!(poller.current_ticket(), None);
        assert_eq!(poller.complete(&ticket, offline()), Completion::Stale);
    }
}
