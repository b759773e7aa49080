//! Vehicle commands: arm, power, mode, safety area, GPS origin, generic
//! `COMMAND_LONG`, and the fire-and-forget stream request.

use tracing::{debug, info};

use mavgc_command_protocol::PowerAction;
use mavgc_wire::{
    AllowedArea, CommandLong, Message, RequestDataStream, SafetySetAllowedArea,
    SetGpsGlobalOrigin, SetMode, Target, ARM_FORCE_MAGIC,
    MAV_CMD_COMPONENT_ARM_DISARM, MAV_CMD_DO_SET_MODE, MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN,
    MAV_MODE_FLAG_CUSTOM_MODE_ENABLED, MAV_RESULT_ACCEPTED, MSG_ID_SET_MODE,
};

use crate::error::{LinkError, LinkResult};
use crate::link::Link;
use crate::rendezvous::CommandClass;

/// `(param1, param2)` of `PREFLIGHT_REBOOT_SHUTDOWN` for each action.
pub fn power_params(action: PowerAction) -> (f32, f32) {
    match action {
        PowerAction::AutopilotReboot => (1.0, 0.0),
        PowerAction::AutopilotShutdown => (2.0, 0.0),
        PowerAction::BootloaderReboot => (3.0, 0.0),
        PowerAction::SystemShutdown => (0.0, 2.0),
        PowerAction::SystemReboot => (0.0, 1.0),
    }
}

/// Degrees to the `1e7` fixed point used on the wire.
pub fn degrees_to_wire(degrees: f64) -> i32 {
    (degrees * 1e7).round() as i32
}

/// Meters to millimeters.
pub fn meters_to_wire(meters: f64) -> i32 {
    (meters * 1000.0).round() as i32
}

fn accepted(result: u8) -> LinkResult<()> {
    if result == MAV_RESULT_ACCEPTED {
        Ok(())
    } else {
        Err(LinkError::Rejected { code: result })
    }
}

impl Link {
    /// Send `COMMAND_LONG` and wait for the matching `COMMAND_ACK`.
    pub fn command_long(&self, command: u16, params: [f32; 7], target: Target) -> LinkResult<()> {
        let flight = self.rendezvous.claim(CommandClass::Command)?;
        let request = Message::CommandLong(CommandLong {
            params,
            command,
            target,
            confirmation: 0,
        });
        debug!("Command[{}]: {} {:?}", target, command, params);
        let result = flight.exchange(
            "command",
            self.config().command_policy(),
            || self.send(&request),
            |m| match m {
                Message::CommandAck(ack) if ack.command == command => Some(ack.result),
                _ => None,
            },
        )?;
        accepted(result)
    }

    /// Arm (or disarm), forcing past pre-arm checks.
    pub fn arm(&self, arm: bool, target: Target) -> LinkResult<()> {
        let state = if arm { 1.0 } else { 0.0 };
        self.command_long(
            MAV_CMD_COMPONENT_ARM_DISARM,
            [state, ARM_FORCE_MAGIC, 0.0, 0.0, 0.0, 0.0, 0.0],
            target,
        )?;
        info!("Command[{}]: {}", target, if arm { "armed" } else { "disarmed" });
        Ok(())
    }

    /// Reboot or shut down. System id 0 addresses every vehicle at once.
    pub fn power(&self, action: PowerAction, target: Target) -> LinkResult<()> {
        let (p1, p2) = power_params(action);
        self.command_long(
            MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN,
            [p1, p2, 0.0, 0.0, 0.0, 0.0, 0.0],
            target,
        )
    }

    /// Switch to a custom flight mode.
    pub fn set_mode(&self, custom_mode: u32, system: u8) -> LinkResult<()> {
        let flight = self.rendezvous.claim(CommandClass::Command)?;
        let request = Message::SetMode(SetMode {
            custom_mode,
            target_system: system,
            base_mode: MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
        });
        let result = flight.exchange(
            "set mode",
            self.config().command_policy(),
            || self.send(&request),
            |m| match m {
                Message::CommandAck(ack)
                    if ack.command == u16::from(MSG_ID_SET_MODE)
                        || ack.command == MAV_CMD_DO_SET_MODE =>
                {
                    Some(ack.result)
                }
                _ => None,
            },
        )?;
        accepted(result)
    }

    /// Set the safety box; succeeds when the vehicle echoes the same box.
    pub fn set_allowed_area(&self, area: AllowedArea, target: Target) -> LinkResult<()> {
        let flight = self.rendezvous.claim(CommandClass::Safety)?;
        let request = Message::SafetySetAllowedArea(SafetySetAllowedArea { area, target });
        flight.exchange(
            "set allowed area",
            self.config().command_policy(),
            || self.send(&request),
            |m| match m {
                Message::SafetyAllowedArea(echo) if *echo == area => Some(()),
                _ => None,
            },
        )
    }

    /// Set the EKF origin; succeeds when the vehicle echoes the same origin.
    pub fn set_gps_origin(
        &self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        system: u8,
    ) -> LinkResult<()> {
        let flight = self.rendezvous.claim(CommandClass::GpsOrigin)?;
        let origin = SetGpsGlobalOrigin {
            latitude: degrees_to_wire(latitude),
            longitude: degrees_to_wire(longitude),
            altitude: meters_to_wire(altitude),
            target_system: system,
        };
        flight.exchange(
            "set gps origin",
            self.config().command_policy(),
            || self.send(&Message::SetGpsGlobalOrigin(origin)),
            |m| match m {
                Message::GpsGlobalOrigin(echo)
                    if echo.latitude == origin.latitude
                        && echo.longitude == origin.longitude
                        && echo.altitude == origin.altitude =>
                {
                    Some(())
                }
                _ => None,
            },
        )
    }

    /// Ask for a telemetry stream. Nothing answers this request.
    pub fn request_data_stream(
        &self,
        stream_id: u8,
        rate: u16,
        start: bool,
        target: Target,
    ) -> LinkResult<()> {
        self.send(&Message::RequestDataStream(RequestDataStream {
            req_message_rate: rate,
            target,
            req_stream_id: stream_id,
            start_stop: u8::from(start),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_params_table() {
        assert_eq!(power_params(PowerAction::AutopilotReboot), (1.0, 0.0));
        assert_eq!(power_params(PowerAction::BootloaderReboot), (3.0, 0.0));
        assert_eq!(power_params(PowerAction::SystemShutdown), (0.0, 2.0));
        assert_eq!(power_params(PowerAction::SystemReboot), (0.0, 1.0));
    }

    #[test]
    fn test_wire_units() {
        assert_eq!(degrees_to_wire(47.3769), 473_769_000);
        assert_eq!(degrees_to_wire(-122.4194155), -1_224_194_155);
        assert_eq!(meters_to_wire(550.25), 550_250);
    }

    #[test]
    fn test_accepted() {
        assert!(accepted(0).is_ok());
        assert!(matches!(accepted(4), Err(LinkError::Rejected { code: 4 })));
    }
}
