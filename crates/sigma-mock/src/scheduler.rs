//! Delayed state transitions.
//!
//! Accepted actions complete later. Each completion is queued in a
//! [`DelayQueue`] owned by a single task and keyed by the resource it
//! touches, so removing a resource can cancel whatever is still pending for it.

use std::collections::HashMap;
use std::future::poll_fn;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::time::delay_queue::{self, DelayQueue};
use tracing::{debug, warn};

type Apply = Box<dyn FnOnce() + Send + 'static>;

struct Pending {
    resource: String,
    apply: Apply,
}

enum Command {
    Schedule {
        resource: String,
        delay: Duration,
        apply: Apply,
    },
    Cancel {
        resource: String,
    },
    CancelAll,
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the transition task.
///
/// The task exits once every handle has been dropped; transitions still
/// queued at that point never run.
#[derive(Debug, Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schedule {
                resource, delay, ..
            } => f
                .debug_struct("Schedule")
                .field("resource", resource)
                .field("delay", delay)
                .finish_non_exhaustive(),
            Self::Cancel { resource } => {
                f.debug_struct("Cancel").field("resource", resource).finish()
            }
            Self::CancelAll => f.write_str("CancelAll"),
            Self::Count { .. } => f.write_str("Count"),
        }
    }
}

impl Scheduler {
    /// Spawn the transition task on the current tokio runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self { tx }
    }

    /// Run `apply` after `delay` unless `resource` is cancelled first.
    pub fn schedule<F>(&self, resource: impl Into<String>, delay: Duration, apply: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Command::Schedule {
            resource: resource.into(),
            delay,
            apply: Box::new(apply),
        });
    }

    /// Drop every pending transition of `resource`.
    pub fn cancel(&self, resource: &str) {
        self.send(Command::Cancel {
            resource: resource.to_string(),
        });
    }

    /// Drop every pending transition.
    pub fn cancel_all(&self) {
        self.send(Command::CancelAll);
    }

    /// Number of transitions still queued.
    pub async fn pending(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Count { reply });
        rx.await.unwrap_or(0)
    }

    fn send(&self, command: Command) {
        if let Err(err) = self.tx.send(command) {
            warn!(command = ?err.0, "transition task is gone");
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut queue: DelayQueue<Pending> = DelayQueue::new();
    let mut keys: HashMap<String, Vec<delay_queue::Key>> = HashMap::new();

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Schedule { resource, delay, apply }) => {
                    debug!(%resource, ?delay, "transition scheduled");
                    let key = queue.insert(Pending { resource: resource.clone(), apply }, delay);
                    keys.entry(resource).or_default().push(key);
                }
                Some(Command::Cancel { resource }) => {
                    if let Some(pending) = keys.remove(&resource) {
                        debug!(%resource, count = pending.len(), "transitions cancelled");
                        for key in pending {
                            queue.remove(&key);
                        }
                    }
                }
                Some(Command::CancelAll) => {
                    queue.clear();
                    keys.clear();
                }
                Some(Command::Count { reply }) => {
                    let _ = reply.send(queue.len());
                }
                None => break,
            },
            Some(expired) = poll_fn(|cx| queue.poll_expired(cx)) => {
                let key = expired.key();
                let pending = expired.into_inner();
                if let Some(list) = keys.get_mut(&pending.resource) {
                    list.retain(|k| *k != key);
                    if list.is_empty() {
                        keys.remove(&pending.resource);
                    }
                }
                debug!(resource = %pending.resource, "transition applied");
                (pending.apply)();
            }
        }
    }
}
