//! Single-flight request/response correlation.
//!
//! The wire protocol carries no request id, so a response can only be
//! matched by its kind (and sometimes its contents). At most one operation
//! per [`CommandClass`] may therefore be outstanding. An operation
//! [`claim`](Rendezvous::claim)s its class and gets a [`Flight`]; while the
//! flight lives, the router [`offer`](Rendezvous::offer)s every message the
//! class cares about to the flight's inbox. A second claim on the same class
//! fails with [`LinkError::Busy`] instead of stealing the first caller's
//! responses. Dropping the flight releases the class.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, warn};

use mavgc_metrics::{metric_defs, metrics};
use mavgc_wire::Message;

use crate::config::RetryPolicy;
use crate::error::{LinkError, LinkResult};

/// Correlation classes. Operations in different classes never see each
/// other's responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CommandClass {
    /// `COMMAND_LONG` and `SET_MODE`, answered by `COMMAND_ACK`.
    Command,
    /// Mission download, upload, clear and set-current.
    Mission,
    Parameter,
    Safety,
    GpsOrigin,
    Log,
}

impl CommandClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandClass::Command => "command",
            CommandClass::Mission => "mission",
            CommandClass::Parameter => "parameter",
            CommandClass::Safety => "safety",
            CommandClass::GpsOrigin => "gps_origin",
            CommandClass::Log => "log",
        }
    }

    /// Whether `message` may answer an operation of this class.
    pub fn accepts(&self, message: &Message) -> bool {
        match self {
            CommandClass::Command => matches!(message, Message::CommandAck(_)),
            CommandClass::Mission => matches!(
                message,
                Message::MissionCount(_)
                    | Message::MissionItem(_)
                    | Message::MissionRequest(_)
                    | Message::MissionAck(_)
                    | Message::MissionCurrent { .. }
            ),
            CommandClass::Parameter => matches!(message, Message::ParamValue(_)),
            CommandClass::Safety => matches!(message, Message::SafetyAllowedArea(_)),
            CommandClass::GpsOrigin => matches!(message, Message::GpsGlobalOrigin(_)),
            CommandClass::Log => matches!(message, Message::LogEntry(_)),
        }
    }
}

impl fmt::Display for CommandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct Slot {
    inbox: Mutex<VecDeque<Message>>,
    ready: Condvar,
}

/// Table of in-flight operations, one per class.
#[derive(Debug, Default)]
pub struct Rendezvous {
    slots: Mutex<HashMap<CommandClass, Arc<Slot>>>,
}

impl Rendezvous {
    pub fn new() -> Self {
        Rendezvous::default()
    }

    /// Claim `class` for one operation.
    ///
    /// Fails immediately with [`LinkError::Busy`] if the class is taken.
    pub fn claim(&self, class: CommandClass) -> LinkResult<Flight<'_>> {
        let mut slots = self.slots.lock();
        if slots.contains_key(&class) {
            metrics::counter!(metric_defs::RENDEZVOUS_BUSY.name, "class" => class.as_str())
                .increment(1);
            debug!("Rendezvous[{}]: rejected, already in flight", class);
            return Err(LinkError::Busy(class));
        }
        let slot = Arc::new(Slot::default());
        slots.insert(class, Arc::clone(&slot));
        Ok(Flight {
            owner: self,
            class,
            slot,
        })
    }

    /// Hand `message` to every in-flight operation whose class accepts it.
    ///
    /// Returns how many flights received it. Never blocks on a waiter.
    pub fn offer(&self, message: &Message) -> usize {
        let interested: Vec<Arc<Slot>> = self
            .slots
            .lock()
            .iter()
            .filter(|(class, _)| class.accepts(message))
            .map(|(_, slot)| Arc::clone(slot))
            .collect();

        for slot in &interested {
            slot.inbox.lock().push_back(message.clone());
            slot.ready.notify_all();
        }
        interested.len()
    }

    pub fn in_flight(&self, class: CommandClass) -> bool {
        self.slots.lock().contains_key(&class)
    }
}

/// An in-flight operation holding its class.
pub struct Flight<'a> {
    owner: &'a Rendezvous,
    class: CommandClass,
    slot: Arc<Slot>,
}

impl<'a> Flight<'a> {
    pub fn class(&self) -> CommandClass {
        self.class
    }

    /// Wait until `matcher` accepts a delivered message or `deadline` passes.
    ///
    /// Messages the matcher rejects are consumed and dropped.
    pub fn wait_until<T, F>(&self, deadline: Instant, mut matcher: F) -> Option<T>
    where
        F: FnMut(&Message) -> Option<T>,
    {
        let mut inbox = self.slot.inbox.lock();
        loop {
            while let Some(message) = inbox.pop_front() {
                if let Some(value) = matcher(&message) {
                    return Some(value);
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            // Spurious and timed-out wakeups both re-drain before giving up.
            self.slot.ready.wait_until(&mut inbox, deadline);
        }
    }

    /// [`wait_until`](Flight::wait_until) with a relative timeout.
    pub fn wait_for<T, F>(&self, timeout: Duration, matcher: F) -> Option<T>
    where
        F: FnMut(&Message) -> Option<T>,
    {
        self.wait_until(Instant::now() + timeout, matcher)
    }

    /// Send with `send`, then wait up to one attempt timeout for `matcher`,
    /// resending the identical request until the retry budget is spent.
    pub fn exchange<T, S, F>(
        &self,
        operation: &'static str,
        policy: RetryPolicy,
        mut send: S,
        mut matcher: F,
    ) -> LinkResult<T>
    where
        S: FnMut() -> LinkResult<()>,
        F: FnMut(&Message) -> Option<T>,
    {
        let started = Instant::now();
        for attempt in 1..=policy.attempts() {
            if attempt > 1 {
                metrics::counter!(metric_defs::RENDEZVOUS_RETRIES.name, "class" => self.class.as_str())
                    .increment(1);
                debug!(
                    "Rendezvous[{}]: {} attempt {}/{}",
                    self.class,
                    operation,
                    attempt,
                    policy.attempts()
                );
            }
            send()?;
            if let Some(value) = self.wait_for(policy.attempt_timeout, &mut matcher) {
                metrics::histogram!(metric_defs::RENDEZVOUS_LATENCY.name, "class" => self.class.as_str())
                    .record(started.elapsed().as_secs_f64() * 1000.0);
                return Ok(value);
            }
        }

        metrics::counter!(metric_defs::RENDEZVOUS_TIMEOUTS.name, "class" => self.class.as_str())
            .increment(1);
        warn!(
            "Rendezvous[{}]: {} timed out after {} attempt(s)",
            self.class,
            operation,
            policy.attempts()
        );
        Err(LinkError::Timeout {
            operation,
            attempts: policy.attempts(),
        })
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut slots = self.owner.slots.lock();
        if slots
            .get(&self.class)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot))
        {
            slots.remove(&self.class);
        }
    }
}
