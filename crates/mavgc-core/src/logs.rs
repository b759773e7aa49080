//! Onboard log listing.

use std::collections::BTreeMap;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::info;

use mavgc_wire::{LogEntry, LogRequestList, Message, Target};

use crate::error::LinkResult;
use crate::link::Link;
use crate::rendezvous::CommandClass;

/// Log entries by id, fed by every `LOG_ENTRY` on the link.
#[derive(Debug, Default)]
pub struct LogStore {
    entries: Mutex<BTreeMap<u16, LogEntry>>,
}

impl LogStore {
    pub fn record(&self, entry: &LogEntry) {
        // A vehicle without logs answers with a placeholder entry.
        if entry.num_logs == 0 {
            return;
        }
        self.entries.lock().insert(entry.id, *entry);
    }

    /// Entries ordered by id.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Link {
    /// List the vehicle's logs.
    ///
    /// The first entry completes the request; later entries are collected
    /// until `num_logs` are present or the settle window ends.
    pub fn read_log_entries(&self, target: Target) -> LinkResult<Vec<LogEntry>> {
        let flight = self.rendezvous.claim(CommandClass::Log)?;
        self.logs().clear();

        let request = Message::LogRequestList(LogRequestList {
            start: 0,
            end: 0xFFFF,
            target,
        });
        let first = flight.exchange(
            "log list",
            self.config().command_policy(),
            || self.send(&request),
            |m| match m {
                Message::LogEntry(entry) => Some(*entry),
                _ => None,
            },
        )?;

        let expected = usize::from(first.num_logs);
        let deadline = Instant::now() + self.config().log_settle();
        while self.logs().len() < expected {
            let more = flight.wait_until(deadline, |m| matches!(m, Message::LogEntry(_)).then_some(()));
            if more.is_none() {
                break;
            }
        }

        let entries = self.logs().entries();
        info!("Logs[{}]: {} of {} entries listed", target, entries.len(), expected);
        Ok(entries)
    }
}
