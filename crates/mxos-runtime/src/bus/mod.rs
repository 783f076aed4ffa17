//! Message bus between the kernel and its workers.
//!
//! Each worker gets a route: two bounded mailboxes, one per direction.
//!
//! ```text
//!                  ┌──────────── route reg-1 ────────────┐
//!  MessageBus ───► │ downlink: Mailbox<ControlMessage>   │ ───► WorkerPort
//!  (kernel side)◄─ │ uplink:   Mailbox<WorkerMessage>    │ ◄─── (worker side)
//!                  └─────────────────────────────────────┘
//! ```
//!
//! # Backpressure
//!
//! | Message | Channel full |
//! |---------|--------------|
//! | `FRAME_READY` | newest evicts the oldest pending frame (latest wins) |
//! | control / `APP_READY` / `APP_ERROR` | evict a pending frame, else wait up to `control_timeout`, then [`BusError::Saturated`] |
//!
//! [`MessageBus::poll`] never blocks and returns at most `max_batch`
//! messages, at most `max_batch_per_worker` from any one worker, starting
//! from a different worker each call.
//!
//! The bus has no business logic: it does not know lifecycle states or
//! sequence numbers.

mod error;
mod mailbox;

pub use error::BusError;
pub use mailbox::{Mailbox, MailboxClosed, PushError, PushOutcome};

use mxos_event::{ControlMessage, WorkerMessage};
use mxos_types::RegistrationId;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Bus sizing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Capacity of each worker → kernel mailbox.
    pub frame_slots: usize,
    /// Capacity of each kernel → worker mailbox.
    pub control_slots: usize,
    /// Longest a control message may wait for room.
    pub control_timeout: Duration,
    /// Maximum messages returned by one `poll`.
    pub max_batch: usize,
    /// Maximum messages taken from one worker per `poll`.
    pub max_batch_per_worker: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            frame_slots: 4,
            control_slots: 8,
            control_timeout: Duration::from_millis(20),
            max_batch: 64,
            max_batch_per_worker: 8,
        }
    }
}

/// A message from a worker, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: RegistrationId,
    pub message: WorkerMessage,
}

/// Result of one [`MessageBus::poll`].
#[derive(Debug, Default)]
pub struct PollBatch {
    pub messages: Vec<Envelope>,
    /// Frames evicted or dropped per worker since the previous poll.
    pub evicted: Vec<(RegistrationId, u64)>,
}

impl PollBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.evicted.is_empty()
    }
}

#[derive(Debug)]
struct Route {
    uplink: Arc<Mailbox<WorkerMessage>>,
    downlink: Arc<Mailbox<ControlMessage>>,
}

impl Route {
    fn is_closed(&self) -> bool {
        self.uplink.is_closed()
    }

    fn close(&self) {
        self.uplink.close();
        self.downlink.close();
    }
}

/// Kernel-side view of all worker routes.
///
/// # Example
///
/// ```
/// use mxos_event::{ControlMessage, WorkerMessage};
/// use mxos_runtime::bus::{BusConfig, MessageBus};
/// use mxos_types::RegistrationId;
/// use std::time::Duration;
///
/// let mut bus = MessageBus::new(BusConfig::default());
/// let id = RegistrationId::new(1);
/// let port = bus.open(id);
///
/// port.send(WorkerMessage::Ready).unwrap();
/// let batch = bus.poll();
/// assert_eq!(batch.messages[0].message, WorkerMessage::Ready);
///
/// bus.send(id, ControlMessage::Start).unwrap();
/// assert_eq!(port.recv(Duration::ZERO), Ok(Some(ControlMessage::Start)));
/// ```
#[derive(Debug)]
pub struct MessageBus {
    config: BusConfig,
    routes: BTreeMap<RegistrationId, Route>,
    cursor: usize,
}

impl MessageBus {
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            routes: BTreeMap::new(),
            cursor: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Opens a fresh route for `id` and returns the worker-side endpoint.
    ///
    /// An existing route for the same id is closed first, so a stale worker
    /// from a previous instance observes closure and cannot inject into the
    /// new instance's stream.
    pub fn open(&mut self, id: RegistrationId) -> WorkerPort {
        if let Some(old) = self.routes.remove(&id) {
            debug!(%id, "replacing route");
            old.close();
        }
        let route = Route {
            uplink: Arc::new(Mailbox::new(self.config.frame_slots)),
            downlink: Arc::new(Mailbox::new(self.config.control_slots)),
        };
        let port = WorkerPort {
            id,
            uplink: Arc::clone(&route.uplink),
            downlink: Arc::clone(&route.downlink),
            control_timeout: self.config.control_timeout,
        };
        self.routes.insert(id, route);
        port
    }

    /// Closes both directions of a route. Pending messages are discarded by
    /// later polls.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::UnknownWorker`] if no route exists.
    pub fn close(&mut self, id: RegistrationId) -> Result<(), BusError> {
        let route = self.routes.get(&id).ok_or(BusError::UnknownWorker(id))?;
        route.close();
        debug!(%id, "route closed");
        Ok(())
    }

    /// Closes and forgets a route. Returns `false` if there was none.
    pub fn remove(&mut self, id: RegistrationId) -> bool {
        match self.routes.remove(&id) {
            Some(route) => {
                route.close();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, id: RegistrationId) -> bool {
        self.routes.contains_key(&id)
    }

    /// Returns `true` if a route exists and is open.
    #[must_use]
    pub fn is_open(&self, id: RegistrationId) -> bool {
        self.routes.get(&id).is_some_and(|r| !r.is_closed())
    }

    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    fn open_route(&self, id: RegistrationId) -> Result<&Route, BusError> {
        let route = self.routes.get(&id).ok_or(BusError::UnknownWorker(id))?;
        if route.is_closed() {
            return Err(BusError::WorkerClosed(id));
        }
        Ok(route)
    }

    /// Sends a control message to a worker.
    ///
    /// Waits at most `control_timeout` if the worker's inbox is full.
    ///
    /// # Errors
    ///
    /// - [`BusError::UnknownWorker`] / [`BusError::WorkerClosed`]
    /// - [`BusError::Saturated`] if the worker is not draining its inbox
    pub fn send(&self, id: RegistrationId, message: ControlMessage) -> Result<(), BusError> {
        let route = self.open_route(id)?;
        let timeout = self.config.control_timeout;
        match route.downlink.push_control(message, timeout, |_| false) {
            Ok(_) => {
                trace!(%id, kind = message.kind(), "control sent");
                Ok(())
            }
            Err(PushError::Closed(_)) => Err(BusError::WorkerClosed(id)),
            Err(PushError::Timeout(_)) => Err(BusError::Saturated { id, timeout }),
        }
    }

    /// Queues a message on a worker's uplink as if the worker had sent it.
    ///
    /// Used by the sandbox to turn crashes and timeouts into `APP_ERROR`.
    ///
    /// # Errors
    ///
    /// Same as [`WorkerPort::send`].
    pub fn inject(&self, id: RegistrationId, message: WorkerMessage) -> Result<(), BusError> {
        let route = self.open_route(id)?;
        send_up(id, &route.uplink, message, self.config.control_timeout)
    }

    /// Drains pending worker messages without blocking.
    ///
    /// Closed routes are skipped. Workers are visited round-robin starting
    /// one further than the previous poll.
    pub fn poll(&mut self) -> PollBatch {
        let mut batch = PollBatch::default();
        let open: Vec<(&RegistrationId, &Route)> =
            self.routes.iter().filter(|(_, r)| !r.is_closed()).collect();
        if open.is_empty() {
            return batch;
        }

        let start = self.cursor % open.len();
        for (id, route) in open.iter().cycle().skip(start).take(open.len()) {
            let evicted = route.uplink.take_evicted();
            if evicted > 0 {
                batch.evicted.push((**id, evicted));
            }

            let room = self.config.max_batch.saturating_sub(batch.messages.len());
            if room == 0 {
                continue;
            }
            let take = room.min(self.config.max_batch_per_worker);
            batch
                .messages
                .extend(route.uplink.drain(take).into_iter().map(|message| Envelope {
                    from: **id,
                    message,
                }));
        }

        self.cursor = self.cursor.wrapping_add(1);
        batch
    }

    /// Drains pending messages from one worker, bounded by
    /// `max_batch_per_worker`.
    ///
    /// # Errors
    ///
    /// [`BusError::UnknownWorker`] or [`BusError::WorkerClosed`].
    pub fn poll_from(&self, id: RegistrationId) -> Result<Vec<WorkerMessage>, BusError> {
        let route = self.open_route(id)?;
        Ok(route.uplink.drain(self.config.max_batch_per_worker))
    }

    /// Number of messages waiting on a worker's uplink.
    #[must_use]
    pub fn pending(&self, id: RegistrationId) -> usize {
        self.routes.get(&id).map_or(0, |r| r.uplink.len())
    }
}

fn send_up(
    id: RegistrationId,
    uplink: &Mailbox<WorkerMessage>,
    message: WorkerMessage,
    timeout: Duration,
) -> Result<(), BusError> {
    let result = if message.is_frame() {
        uplink.push_latest(message, WorkerMessage::is_frame)
    } else {
        uplink.push_control(message, timeout, WorkerMessage::is_frame)
    };
    match result {
        Ok(PushOutcome::Queued) => Ok(()),
        Ok(outcome) => {
            trace!(%id, ?outcome, "uplink full");
            Ok(())
        }
        Err(PushError::Closed(_)) => Err(BusError::WorkerClosed(id)),
        Err(PushError::Timeout(_)) => Err(BusError::Saturated { id, timeout }),
    }
}

/// Worker-side endpoint of a route.
///
/// Owned by exactly one worker. [`split`](Self::split) hands the two
/// directions to separate threads (the process pumps).
#[derive(Debug)]
pub struct WorkerPort {
    id: RegistrationId,
    uplink: Arc<Mailbox<WorkerMessage>>,
    downlink: Arc<Mailbox<ControlMessage>>,
    control_timeout: Duration,
}

impl WorkerPort {
    #[must_use]
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Sends a message to the kernel. Frames never block; other messages
    /// wait at most the bus control timeout.
    ///
    /// # Errors
    ///
    /// [`BusError::WorkerClosed`] or [`BusError::Saturated`].
    pub fn send(&self, message: WorkerMessage) -> Result<(), BusError> {
        send_up(self.id, &self.uplink, message, self.control_timeout)
    }

    /// Waits up to `wait` for a control message.
    ///
    /// # Errors
    ///
    /// [`BusError::WorkerClosed`] once the route is closed and drained.
    pub fn recv(&self, wait: Duration) -> Result<Option<ControlMessage>, BusError> {
        self.downlink
            .pop_timeout(wait)
            .map_err(|MailboxClosed| BusError::WorkerClosed(self.id))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.downlink.is_closed()
    }

    /// Splits into independently owned directions.
    #[must_use]
    pub fn split(self) -> (Uplink, Downlink) {
        (
            Uplink {
                id: self.id,
                mailbox: self.uplink,
                control_timeout: self.control_timeout,
            },
            Downlink {
                id: self.id,
                mailbox: self.downlink,
            },
        )
    }
}

/// Worker → kernel half of a [`WorkerPort`].
#[derive(Debug)]
pub struct Uplink {
    id: RegistrationId,
    mailbox: Arc<Mailbox<WorkerMessage>>,
    control_timeout: Duration,
}

impl Uplink {
    /// See [`WorkerPort::send`].
    ///
    /// # Errors
    ///
    /// [`BusError::WorkerClosed`] or [`BusError::Saturated`].
    pub fn send(&self, message: WorkerMessage) -> Result<(), BusError> {
        send_up(self.id, &self.mailbox, message, self.control_timeout)
    }
}

/// Kernel → worker half of a [`WorkerPort`].
#[derive(Debug)]
pub struct Downlink {
    id: RegistrationId,
    mailbox: Arc<Mailbox<ControlMessage>>,
}

impl Downlink {
    /// See [`WorkerPort::recv`].
    ///
    /// # Errors
    ///
    /// [`BusError::WorkerClosed`] once the route is closed and drained.
    pub fn recv(&self, wait: Duration) -> Result<Option<ControlMessage>, BusError> {
        self.mailbox
            .pop_timeout(wait)
            .map_err(|MailboxClosed| BusError::WorkerClosed(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxos_types::{Dimensions, Frame, Rgb};

    fn frame(seq: u64) -> WorkerMessage {
        let mut frame = Frame::blank(Dimensions::new(2, 1));
        frame.set_pixel(0, 0, Rgb::new(seq as u8, 0, 0));
        WorkerMessage::FrameReady {
            frame,
            sequence: seq,
        }
    }

    fn sequences(batch: &PollBatch) -> Vec<u64> {
        batch
            .messages
            .iter()
            .filter_map(|e| match e.message {
                WorkerMessage::FrameReady { sequence, .. } => Some(sequence),
                _ => None,
            })
            .collect()
    }

    fn id(n: u32) -> RegistrationId {
        RegistrationId::new(n)
    }

    #[test]
    fn fifth_frame_evicts_oldest_of_four() {
        let mut bus = MessageBus::new(BusConfig::default());
        let port = bus.open(id(1));
        for seq in 1..=5 {
            port.send(frame(seq)).expect("frame send never fails while open");
        }

        let batch = bus.poll();
        assert_eq!(sequences(&batch), vec![2, 3, 4, 5]);
        assert_eq!(batch.evicted, vec![(id(1), 1)]);
        assert_eq!(sequences(&batch).iter().max(), Some(&5));
    }

    #[test]
    fn control_messages_survive_a_full_uplink() {
        let mut bus = MessageBus::new(BusConfig::default());
        let port = bus.open(id(1));
        for seq in 1..=4 {
            port.send(frame(seq)).expect("send");
        }
        port.send(WorkerMessage::error("boom")).expect("error must be queued");

        let batch = bus.poll();
        assert!(batch
            .messages
            .iter()
            .any(|e| e.message == WorkerMessage::error("boom")));
        assert_eq!(batch.messages.len(), 4);
    }

    #[test]
    fn saturated_inbox_surfaces_after_timeout() {
        let config = BusConfig {
            control_slots: 1,
            control_timeout: Duration::from_millis(10),
            ..BusConfig::default()
        };
        let mut bus = MessageBus::new(config);
        let _port = bus.open(id(1));

        bus.send(id(1), ControlMessage::Start).expect("first fits");
        let err = bus.send(id(1), ControlMessage::Pause).unwrap_err();
        assert_eq!(
            err,
            BusError::Saturated {
                id: id(1),
                timeout: Duration::from_millis(10)
            }
        );
    }

    #[test]
    fn unknown_and_closed_routes_are_distinct_errors() {
        let mut bus = MessageBus::new(BusConfig::default());
        assert_eq!(
            bus.send(id(9), ControlMessage::Start),
            Err(BusError::UnknownWorker(id(9)))
        );
        assert_eq!(bus.poll_from(id(9)), Err(BusError::UnknownWorker(id(9))));

        let port = bus.open(id(1));
        bus.close(id(1)).expect("close");
        assert_eq!(
            bus.send(id(1), ControlMessage::Stop),
            Err(BusError::WorkerClosed(id(1)))
        );
        assert_eq!(bus.poll_from(id(1)), Err(BusError::WorkerClosed(id(1))));
        assert_eq!(port.send(WorkerMessage::Ready), Err(BusError::WorkerClosed(id(1))));
        assert_eq!(port.recv(Duration::ZERO), Err(BusError::WorkerClosed(id(1))));
        assert!(bus.poll().is_empty());
    }

    #[test]
    fn reopening_a_route_detaches_the_old_port() {
        let mut bus = MessageBus::new(BusConfig::default());
        let old = bus.open(id(1));
        let new = bus.open(id(1));

        assert!(old.is_closed());
        assert!(old.send(frame(1)).is_err());
        new.send(frame(1)).expect("new port works");
        assert_eq!(sequences(&bus.poll()), vec![1]);
    }

    #[test]
    fn poll_is_bounded_per_worker_and_overall() {
        let config = BusConfig {
            frame_slots: 16,
            max_batch: 5,
            max_batch_per_worker: 3,
            ..BusConfig::default()
        };
        let mut bus = MessageBus::new(config);
        let noisy = bus.open(id(1));
        let quiet = bus.open(id(2));
        for seq in 1..=10 {
            noisy.send(frame(seq)).expect("send");
        }
        quiet.send(WorkerMessage::Ready).expect("send");

        let batch = bus.poll();
        assert!(batch.messages.len() <= 5);
        let from_noisy = batch.messages.iter().filter(|e| e.from == id(1)).count();
        assert!(from_noisy <= 3);
        assert!(batch.messages.iter().any(|e| e.from == id(2)));
    }

    #[test]
    fn injected_errors_look_like_worker_messages() {
        let mut bus = MessageBus::new(BusConfig::default());
        let _port = bus.open(id(3));
        bus.inject(id(3), WorkerMessage::error("crashed"))
            .expect("inject");
        let batch = bus.poll();
        assert_eq!(
            batch.messages,
            vec![Envelope {
                from: id(3),
                message: WorkerMessage::error("crashed")
            }]
        );
    }

    #[test]
    fn split_halves_work_independently() {
        let mut bus = MessageBus::new(BusConfig::default());
        let (up, down) = bus.open(id(1)).split();
        bus.send(id(1), ControlMessage::Resume).expect("send");
        up.send(WorkerMessage::Ready).expect("send");
        assert_eq!(down.recv(Duration::ZERO), Ok(Some(ControlMessage::Resume)));
        assert_eq!(bus.poll_from(id(1)), Ok(vec![WorkerMessage::Ready]));
    }

    #[test]
    fn remove_forgets_route() {
        let mut bus = MessageBus::new(BusConfig::default());
        let port = bus.open(id(1));
        assert!(bus.remove(id(1)));
        assert!(!bus.remove(id(1)));
        assert!(port.is_closed());
        assert_eq!(bus.route_count(), 0);
    }
}
