use std::sync::mpsc::Receiver;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{anyhow, Result};

use crate::render::Surface;

use super::{
    ChannelFetcher, ChannelHealth, ChannelId, ChannelPoller, Completion, HealthChange, PollTicket,
};

struct Scheduled {
    ticket: PollTicket,
    due: Instant,
}

struct Shared<S: Surface> {
    poller: ChannelPoller<S>,
    next: Option<Scheduled>,
    shutdown: bool,
}

type SharedState<S> = Arc<(Mutex<Shared<S>>, Condvar)>;

/// Runs a `ChannelPoller` on a background thread.
///
/// The worker sleeps until the next poll is due, fetches without holding the
/// lock, then feeds the outcome back. Selecting a channel while a fetch is in
/// flight schedules the new channel immediately; the in-flight result comes
/// back stale and is dropped.
pub struct PollerHandle<S: Surface + Send + 'static> {
    shared: SharedState<S>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Surface + Send + 'static> PollerHandle<S> {
    pub fn spawn(poller: ChannelPoller<S>, fetcher: Box<dyn ChannelFetcher>) -> Result<Self> {
        let shared: SharedState<S> = Arc::new((
            Mutex::new(Shared {
                poller,
                next: None,
                shutdown: false,
            }),
            Condvar::new(),
        ));
        let worker_state = shared.clone();
        let worker = std::thread::Builder::new()
            .name("channel-poller".to_string())
            .spawn(move || poll_loop(worker_state, fetcher))?;
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared<S>>> {
        self.shared
            .0
            .lock()
            .map_err(|_| anyhow!("channel poller state poisoned"))
    }

    /// Switch the dashboard to `channel`; its first poll goes out right away.
    pub fn select(&self, channel: ChannelId) -> Result<PollTicket> {
        let mut guard = self.lock()?;
        let ticket = guard.poller.select(channel);
        guard.next = Some(Scheduled {
            ticket: ticket.clone(),
            due: Instant::now(),
        });
        self.shared.1.notify_all();
        Ok(ticket)
    }

    pub fn deselect(&self) -> Result<()> {
        let mut guard = self.lock()?;
        guard.poller.deselect();
        guard.next = None;
        self.shared.1.notify_all();
        Ok(())
    }

    pub fn health(&self, channel: &ChannelId) -> Result<ChannelHealth> {
        Ok(self.lock()?.poller.health().get(channel))
    }

    pub fn health_snapshot(&self) -> Result<Vec<(ChannelId, ChannelHealth)>> {
        Ok(self.lock()?.poller.health().snapshot())
    }

    pub fn subscribe_health(&self) -> Result<Receiver<HealthChange>> {
        Ok(self.lock()?.poller.health_mut().subscribe())
    }

    /// Inspect the poller under the lock.
    pub fn with_poller<R>(&self, f: impl FnOnce(&ChannelPoller<S>) -> R) -> Result<R> {
        let guard = self.lock()?;
        Ok(f(&guard.poller))
    }

    fn signal_shutdown(&self) {
        if let Ok(mut guard) = self.shared.0.lock() {
            guard.shutdown = true;
        }
        self.shared.1.notify_all();
    }

    /// Stop the worker and wait for it. A fetch in flight finishes first.
    pub fn stop(mut self) -> Result<()> {
        self.signal_shutdown();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| anyhow!("channel poller worker panicked"))?;
        }
        Ok(())
    }
}

impl<S: Surface + Send + 'static> Drop for PollerHandle<S> {
    fn drop(&mut self) {
        self.signal_shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Block until a poll is due. `None` means shut down.
fn next_due<S: Surface>(shared: &SharedState<S>) -> Option<PollTicket> {
    let (lock, wake) = &**shared;
    let Ok(mut guard) = lock.lock() else {
        return poisoned();
    };
    loop {
        if guard.shutdown {
            return None;
        }
        let now = Instant::now();
        guard = match guard.next.as_ref().map(|scheduled| scheduled.due) {
            None => match wake.wait(guard) {
                Ok(guard) => guard,
                Err(_) => return poisoned(),
            },
            Some(due) if due > now => match wake.wait_timeout(guard, due - now) {
                Ok((guard, _)) => guard,
                Err(_) => return poisoned(),
            },
            Some(_) => {
                if let Some(scheduled) = guard.next.take() {
                    if guard.poller.begin(&scheduled.ticket) {
                        return Some(scheduled.ticket);
                    }
                }
                guard
            }
        };
    }
}

fn poisoned() -> Option<PollTicket> {
    log::error!("channel poller state poisoned; worker exiting");
    None
}

fn poll_loop<S: Surface>(shared: SharedState<S>, mut fetcher: Box<dyn ChannelFetcher>) {
    log::debug!("channel poller worker started");
    while let Some(ticket) = next_due(&shared) {
        let outcome = fetcher.fetch(&ticket.channel);

        let Ok(mut guard) = shared.0.lock() else {
            log::error!("channel poller state poisoned; worker exiting");
            return;
        };
        match guard.poller.complete(&ticket, outcome) {
            Completion::Applied { delay, .. } => {
                if guard.next.is_none() {
                    guard.next = Some(Scheduled {
                        ticket,
                        due: Instant::now() + delay,
                    });
                }
            }
            Completion::Stale => {}
        }
    }
    log::debug!("channel poller worker stopped");
}
