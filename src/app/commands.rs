//! Inbound commands to the application service.
//!
//! These represent settings changes requested by the outside world (cloud
//! functions, a serial console) that the
//! [`AppService`](super::service::AppService) validates and applies to the
//! System Status record.

use crate::error::CommandError;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Enter or leave low-power mode.
    SetLowPowerMode(bool),

    /// Turn extra diagnostic publishing on or off.
    SetVerboseMode(bool),

    /// Change the local-hour operating window.
    SetOperatingHours { open: u8, close: u8 },

    /// Overwrite the System Status with factory defaults.
    RestoreDefaults,
}

impl AppCommand {
    /// Reject values the System Status validator would refuse on reload.
    pub fn validate(&self) -> Result<(), CommandError> {
        match *self {
            Self::SetOperatingHours { open, .. } if open > 23 => {
                Err(CommandError::ValidationFailed("open hour must be 0-23"))
            }
            Self::SetOperatingHours { close, .. } if close > 24 => {
                Err(CommandError::ValidationFailed("close hour must be 0-24"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_out_of_range_are_rejected() {
        assert!(AppCommand::SetOperatingHours { open: 24, close: 24 }
            .validate()
            .is_err());
        assert!(AppCommand::SetOperatingHours { open: 6, close: 25 }
            .validate()
            .is_err());
        assert_eq!(
            AppCommand::SetOperatingHours { open: 6, close: 21 }.validate(),
            Ok(())
        );
    }

    #[test]
    fn mode_commands_always_validate() {
        assert_eq!(AppCommand::SetLowPowerMode(true).validate(), Ok(()));
        assert_eq!(AppCommand::RestoreDefaults.validate(), Ok(()));
    }
}
