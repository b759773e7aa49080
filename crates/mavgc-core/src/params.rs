//! Parameter cache and the bulk list, single read and set protocols.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use mavgc_metrics::{metric_defs, metrics};
use mavgc_wire::{Message, ParamRequestRead, ParamSet, ParamValue, Target};

use crate::error::{LinkError, LinkResult};
use crate::link::Link;
use crate::rendezvous::CommandClass;

/// A cached parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamEntry {
    pub value: f32,
    /// `MAV_PARAM_TYPE` tag, echoed back on set.
    pub param_type: u8,
    pub index: u16,
}

/// `name -> value` cache, fed by every `PARAM_VALUE` on the link.
#[derive(Debug, Default)]
pub struct ParameterStore {
    cache: Mutex<BTreeMap<String, ParamEntry>>,
}

impl ParameterStore {
    pub fn record(&self, value: &ParamValue) {
        metrics::counter!(metric_defs::PARAMS_RECEIVED.name).increment(1);
        self.cache.lock().insert(
            value.param_id.clone(),
            ParamEntry {
                value: value.param_value,
                param_type: value.param_type,
                index: value.param_index,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<ParamEntry> {
        self.cache.lock().get(name).copied()
    }

    /// Copy of the cache, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<String, ParamEntry> {
        self.cache.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

/// Counters of one bulk read.
///
/// `total_expected` starts at 1 and is overwritten by each value's count
/// field. The read is complete once `received == total_expected - 1`; a
/// vehicle reporting fewer values than already received also completes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkSession {
    pub received: u32,
    pub total_expected: u32,
}

impl Default for BulkSession {
    fn default() -> Self {
        BulkSession {
            received: 0,
            total_expected: 1,
        }
    }
}

impl BulkSession {
    /// Count one value; returns true when the session is complete.
    pub fn on_value(&mut self, value: &ParamValue) -> bool {
        self.received += 1;
        self.total_expected = u32::from(value.param_count);
        self.received + 1 == self.total_expected || self.received >= self.total_expected
    }
}

impl Link {
    /// Read every parameter. Returns how many were received.
    ///
    /// The cache is cleared first. The first value must arrive within the
    /// bulk window, resending the list request on expiry; after that each
    /// further value must arrive within one window of the previous one.
    pub fn read_parameter_list(&self, target: Target) -> LinkResult<usize> {
        let flight = self.rendezvous.claim(CommandClass::Parameter)?;
        let policy = self.config().param_list_policy();
        self.params().clear();
        info!("Params[{}]: requesting parameter list", target);

        let mut session = BulkSession::default();
        let mut complete = flight.exchange(
            "parameter list",
            policy,
            || self.send(&Message::ParamRequestList(target)),
            |m| match m {
                Message::ParamValue(value) => Some(session.on_value(value)),
                _ => None,
            },
        )?;

        while !complete {
            let next = flight.wait_for(policy.attempt_timeout, |m| match m {
                Message::ParamValue(value) => Some(session.on_value(value)),
                _ => None,
            });
            match next {
                Some(done) => complete = done,
                None => {
                    warn!(
                        "Params[{}]: list stalled at {}/{}",
                        target, session.received, session.total_expected
                    );
                    return Err(LinkError::Timeout {
                        operation: "parameter list",
                        attempts: 1,
                    });
                }
            }
        }

        info!(
            "Params[{}]: received {} of {} parameters",
            target, session.received, session.total_expected
        );
        Ok(session.received as usize)
    }

    /// Read one parameter by name from the vehicle.
    pub fn read_parameter(&self, name: &str, target: Target) -> LinkResult<ParamEntry> {
        let flight = self.rendezvous.claim(CommandClass::Parameter)?;
        let request = Message::ParamRequestRead(ParamRequestRead {
            param_index: -1,
            target,
            param_id: name.to_string(),
        });
        flight.exchange(
            "parameter read",
            self.config().command_policy(),
            || self.send(&request),
            |m| match m {
                Message::ParamValue(value) if value.param_id == name => Some(ParamEntry {
                    value: value.param_value,
                    param_type: value.param_type,
                    index: value.param_index,
                }),
                _ => None,
            },
        )
    }

    /// Read one parameter by index. Returns its name and entry.
    pub fn read_parameter_index(
        &self,
        index: u16,
        target: Target,
    ) -> LinkResult<(String, ParamEntry)> {
        let flight = self.rendezvous.claim(CommandClass::Parameter)?;
        let request = Message::ParamRequestRead(ParamRequestRead {
            param_index: index as i16,
            target,
            param_id: String::new(),
        });
        flight.exchange(
            "parameter read",
            self.config().command_policy(),
            || self.send(&request),
            |m| match m {
                Message::ParamValue(value) if value.param_index == index => Some((
                    value.param_id.clone(),
                    ParamEntry {
                        value: value.param_value,
                        param_type: value.param_type,
                        index: value.param_index,
                    },
                )),
                _ => None,
            },
        )
    }

    /// Set a cached parameter. Succeeds once the vehicle echoes the new value.
    ///
    /// Names not in the cache fail without sending anything.
    pub fn set_parameter(&self, name: &str, value: f32, target: Target) -> LinkResult<()> {
        let cached = self
            .params()
            .get(name)
            .ok_or_else(|| LinkError::UnknownParameter(name.to_string()))?;
        let flight = self.rendezvous.claim(CommandClass::Parameter)?;
        let request = Message::ParamSet(ParamSet {
            param_value: value,
            target,
            param_id: name.to_string(),
            param_type: cached.param_type,
        });
        debug!("Params[{}]: {} {} -> {}", target, name, cached.value, value);
        flight.exchange(
            "parameter set",
            self.config().command_policy(),
            || self.send(&request),
            |m| match m {
                Message::ParamValue(echo) if echo.param_id == name && echo.param_value == value => {
                    Some(())
                }
                _ => None,
            },
        )
    }
}
