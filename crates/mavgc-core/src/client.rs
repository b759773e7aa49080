//! Outer request/reply rendezvous for the text surface.
//!
//! A [`CommandClient`] hands command lines to a worker thread that runs them
//! through the [`CommandFacade`], and waits for the reply with a deadline.
//! There is one correlation slot. It stays claimed until the worker has
//! finished the job, even when the caller stopped waiting earlier, and any
//! vehicle command made meanwhile is answered `FAIL=<busy code>` at once.
//! Requests served from local state bypass the slot and run on the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use mavgc_command_protocol::{Reply, Request, BUSY_CODE};

use crate::error::LinkResult;
use crate::facade::CommandFacade;

struct Job {
    id: u64,
    line: String,
}

/// State of the single correlation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Idle,
    /// A caller is blocked on this job.
    Waiting(u64),
    /// The caller gave up; the worker frees the slot when the job ends.
    Abandoned(u64),
}

/// Blocking client for the command facade.
pub struct CommandClient {
    facade: Arc<CommandFacade>,
    jobs: Option<Sender<Job>>,
    replies: Receiver<(u64, Reply)>,
    slot: Arc<Mutex<Slot>>,
    next_id: AtomicU64,
    default_timeout: Duration,
    worker: Option<JoinHandle<()>>,
}

impl CommandClient {
    /// Start the worker thread.
    pub fn spawn(facade: Arc<CommandFacade>, default_timeout: Duration) -> LinkResult<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (reply_tx, reply_rx) = unbounded::<(u64, Reply)>();
        let slot = Arc::new(Mutex::new(Slot::Idle));

        let worker = {
            let facade = Arc::clone(&facade);
            let slot = Arc::clone(&slot);
            thread::Builder::new()
                .name("mavgc-facade".to_string())
                .spawn(move || {
                    for job in job_rx.iter() {
                        let reply = facade.execute(&job.line);
                        // Sent under the lock so a caller timing out now
                        // either finds the reply or leaves the slot to us.
                        let mut slot = slot.lock();
                        if *slot == Slot::Abandoned(job.id) {
                            debug!("Client: discarding late reply {}", job.id);
                            *slot = Slot::Idle;
                            continue;
                        }
                        if reply_tx.send((job.id, reply)).is_err() {
                            break;
                        }
                    }
                    debug!("Client: worker stopped");
                })?
        };

        Ok(CommandClient {
            facade,
            jobs: Some(job_tx),
            replies: reply_rx,
            slot,
            next_id: AtomicU64::new(1),
            default_timeout,
            worker: Some(worker),
        })
    }

    /// Run `line`, waiting as long as its command kind may take.
    ///
    /// The deadline comes from [`LinkConfig::reply_deadline`] and is never
    /// shorter than the client's default timeout.
    ///
    /// [`LinkConfig::reply_deadline`]: crate::config::LinkConfig::reply_deadline
    pub fn call(&self, line: &str) -> Reply {
        let timeout = match Request::parse(line) {
            Ok(request) => self
                .facade
                .link()
                .config()
                .reply_deadline(request.kind())
                .max(self.default_timeout),
            Err(_) => self.default_timeout,
        };
        self.call_with_timeout(line, timeout)
    }

    /// Run `line`, waiting at most `timeout` for its reply.
    pub fn call_with_timeout(&self, line: &str, timeout: Duration) -> Reply {
        if Request::parse(line).is_ok_and(|request| request.is_local()) {
            return self.facade.execute(line);
        }

        let id = {
            let mut slot = self.slot.lock();
            if *slot != Slot::Idle {
                debug!("Client: busy, rejecting '{}'", line.trim());
                return Reply::Fail(Some(BUSY_CODE));
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            *slot = Slot::Waiting(id);
            id
        };

        self.submit_and_wait(id, line, Instant::now() + timeout)
    }

    /// True while a vehicle command is outstanding, including one whose
    /// caller already timed out.
    pub fn is_busy(&self) -> bool {
        *self.slot.lock() != Slot::Idle
    }

    fn submit_and_wait(&self, id: u64, line: &str, deadline: Instant) -> Reply {
        let submitted = self.jobs.as_ref().is_some_and(|jobs| {
            jobs.send(Job {
                id,
                line: line.to_string(),
            })
            .is_ok()
        });
        if !submitted {
            warn!("Client: worker is gone");
            *self.slot.lock() = Slot::Idle;
            return Reply::Fail(None);
        }

        loop {
            match self.replies.recv_deadline(deadline) {
                Ok((reply_id, reply)) if reply_id == id => {
                    *self.slot.lock() = Slot::Idle;
                    return reply;
                }
                Ok((stale_id, _)) => debug!("Client: discarding late reply {}", stale_id),
                Err(_) => {
                    let mut slot = self.slot.lock();
                    // The worker may have replied between the deadline and the lock.
                    while let Ok((reply_id, reply)) = self.replies.try_recv() {
                        if reply_id == id {
                            *slot = Slot::Idle;
                            return reply;
                        }
                    }
                    warn!("Client: no reply to '{}' before the deadline", line.trim());
                    *slot = Slot::Abandoned(id);
                    return Reply::Fail(None);
                }
            }
        }
    }

    /// Stop accepting work and wait for the worker to finish its queue.
    pub fn shutdown(mut self) {
        self.jobs.take();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CommandClient {
    fn drop(&mut self) {
        self.jobs.take();
    }
}
