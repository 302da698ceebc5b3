//! Device mode state machine.
//!
//! ```text
//!   Boot --BootCompleted (no credentials)--> NotConfigured
//!   Boot --BootCompleted (credentials)--> Provisioning
//!   NotConfigured | Provisioning --CredentialsApplied--> Connecting
//!   Provisioning --ApTimeout (credentials stored)--> Connecting
//!   Connecting --JoinSucceeded--> Connected
//!   Connecting | Connected --JoinFailed--> Provisioning
//!   any but Boot --ResetRequested | ApConfigReset--> Provisioning
//! ```
//!
//! The mode is a single value; [`ModeMachine::is_ap_mode`] and
//! [`ModeMachine::is_connected`] are both derived from it. Illegal
//! transitions are rejected and leave the mode unchanged.

use log::{debug, info, warn};
use std::fmt;
use std::time::{Duration, Instant};

/// How long the access point is served before joining stored credentials.
pub const AP_TIMEOUT: Duration = Duration::from_secs(300);

/// Operating mode of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// Configuration not loaded yet.
    Boot,
    /// No network credentials stored; serving the access point.
    NotConfigured,
    /// Serving the access point and configuration form.
    Provisioning,
    /// Joining the configured network.
    Connecting,
    /// Online with a validated configuration.
    Connected,
}

impl DeviceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::NotConfigured => "not-configured",
            Self::Provisioning => "provisioning",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inputs driving the mode machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// Configuration loaded.
    BootCompleted { credentials_present: bool },
    /// Network credentials were accepted and stored.
    CredentialsApplied,
    /// The access point was served for [`AP_TIMEOUT`].
    ApTimeout,
    /// The provisioning host joined the network.
    JoinSucceeded,
    /// The provisioning host failed to join or lost the network.
    JoinFailed,
    /// Explicit return to the access point.
    ResetRequested,
    /// Network credentials were cleared.
    ApConfigReset,
}

impl fmt::Display for ModeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BootCompleted {
                credentials_present,
            } => write!(f, "boot-completed(credentials={})", credentials_present),
            Self::CredentialsApplied => write!(f, "credentials-applied"),
            Self::ApTimeout => write!(f, "ap-timeout"),
            Self::JoinSucceeded => write!(f, "join-succeeded"),
            Self::JoinFailed => write!(f, "join-failed"),
            Self::ResetRequested => write!(f, "reset-requested"),
            Self::ApConfigReset => write!(f, "ap-config-reset"),
        }
    }
}

/// Device mode state machine.
#[derive(Debug)]
pub struct ModeMachine {
    mode: DeviceMode,
    /// When the current mode was entered.
    entered_at: Instant,
    ap_timeout: Duration,
}

impl ModeMachine {
    /// Start in [`DeviceMode::Boot`] with the default [`AP_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_ap_timeout(AP_TIMEOUT)
    }

    pub fn with_ap_timeout(ap_timeout: Duration) -> Self {
        Self {
            mode: DeviceMode::Boot,
            entered_at: Instant::now(),
            ap_timeout,
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// `true` in every mode except Connecting and Connected.
    pub fn is_ap_mode(&self) -> bool {
        !matches!(self.mode, DeviceMode::Connecting | DeviceMode::Connected)
    }

    /// `true` only when Connected.
    pub fn is_connected(&self) -> bool {
        self.mode == DeviceMode::Connected
    }

    /// Apply an event now.
    pub fn handle(&mut self, event: ModeEvent) -> Result<DeviceMode, TransitionError> {
        self.handle_at(event, Instant::now())
    }

    /// Apply an event at `now`.
    pub fn handle_at(
        &mut self,
        event: ModeEvent,
        now: Instant,
    ) -> Result<DeviceMode, TransitionError> {
        use DeviceMode::*;

        let next = match (self.mode, event) {
            (Boot, ModeEvent::BootCompleted { credentials_present }) => {
                if credentials_present {
                    Provisioning
                } else {
                    NotConfigured
                }
            }
            (NotConfigured | Provisioning, ModeEvent::CredentialsApplied) => Connecting,
            (Provisioning, ModeEvent::ApTimeout) => Connecting,
            (Connecting, ModeEvent::JoinSucceeded) => Connected,
            (Connecting | Connected, ModeEvent::JoinFailed) => Provisioning,
            (from, ModeEvent::ResetRequested | ModeEvent::ApConfigReset) if from != Boot => {
                Provisioning
            }
            (from, event) => {
                warn!("[mode] Ignoring {} in {}", event, from);
                return Err(TransitionError { from, event });
            }
        };

        if next != self.mode {
            info!("[mode] {} -> {} ({})", self.mode, next, event);
            self.mode = next;
            self.entered_at = now;
        } else {
            debug!("[mode] {} stays {}", event, next);
        }
        Ok(next)
    }

    /// Check the access point timeout.
    ///
    /// Moves Provisioning to Connecting once the access point has been served
    /// for the timeout and credentials are stored. Returns the new mode if a
    /// transition happened.
    pub fn poll(&mut self, now: Instant, credentials_present: bool) -> Option<DeviceMode> {
        if self.mode != DeviceMode::Provisioning || !credentials_present {
            return None;
        }
        if now.saturating_duration_since(self.entered_at) < self.ap_timeout {
            return None;
        }
        self.handle_at(ModeEvent::ApTimeout, now).ok()
    }

    /// Time left before the access point timeout fires, if it applies.
    pub fn ap_time_left(&self, now: Instant) -> Option<Duration> {
        (self.mode == DeviceMode::Provisioning).then(|| {
            self.ap_timeout
                .saturating_sub(now.saturating_duration_since(self.entered_at))
        })
    }
}

impl Default for ModeMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// An event that is not valid in the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: DeviceMode,
    pub event: ModeEvent,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not allowed in {} mode", self.event, self.from)
    }
}

impl std::error::Error for TransitionError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn booted(credentials_present: bool) -> ModeMachine {
        let mut machine = ModeMachine::new();
        machine
            .handle(ModeEvent::BootCompleted {
                credentials_present,
            })
            .unwrap();
        machine
    }

    #[test]
    fn test_boot_is_ap_mode() {
        let machine = ModeMachine::new();
        assert_eq!(machine.mode(), DeviceMode::Boot);
        assert!(machine.is_ap_mode());
        assert!(!machine.is_connected());
    }

    #[test]
    fn test_boot_without_credentials() {
        let machine = booted(false);
        assert_eq!(machine.mode(), DeviceMode::NotConfigured);
        assert!(machine.is_ap_mode());
    }

    #[test]
    fn test_full_connect_path() {
        let mut machine = booted(true);
        assert_eq!(machine.mode(), DeviceMode::Provisioning);

        machine.handle(ModeEvent::CredentialsApplied).unwrap();
        assert_eq!(machine.mode(), DeviceMode::Connecting);
        assert!(!machine.is_ap_mode());
        assert!(!machine.is_connected());

        machine.handle(ModeEvent::JoinSucceeded).unwrap();
        assert_eq!(machine.mode(), DeviceMode::Connected);
        assert!(!machine.is_ap_mode());
        assert!(machine.is_connected());
    }

    #[test]
    fn test_join_failure_returns_to_provisioning() {
        let mut machine = booted(true);
        machine.handle(ModeEvent::CredentialsApplied).unwrap();
        machine.handle(ModeEvent::JoinFailed).unwrap();
        assert_eq!(machine.mode(), DeviceMode::Provisioning);

        machine.handle(ModeEvent::CredentialsApplied).unwrap();
        machine.handle(ModeEvent::JoinSucceeded).unwrap();
        machine.handle(ModeEvent::JoinFailed).unwrap();
        assert_eq!(machine.mode(), DeviceMode::Provisioning);
    }

    #[test]
    fn test_resets_return_to_provisioning() {
        for event in [ModeEvent::ResetRequested, ModeEvent::ApConfigReset] {
            let mut machine = booted(true);
            machine.handle(ModeEvent::CredentialsApplied).unwrap();
            machine.handle(ModeEvent::JoinSucceeded).unwrap();
            assert_eq!(machine.handle(event), Ok(DeviceMode::Provisioning));
            assert!(machine.is_ap_mode());
        }
    }

    #[test]
    fn test_illegal_transition_keeps_mode() {
        let mut machine = booted(false);
        let err = machine.handle(ModeEvent::JoinSucceeded).unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: DeviceMode::NotConfigured,
                event: ModeEvent::JoinSucceeded
            }
        );
        assert_eq!(machine.mode(), DeviceMode::NotConfigured);

        let mut machine = ModeMachine::new();
        assert!(machine.handle(ModeEvent::ResetRequested).is_err());
        assert_eq!(machine.mode(), DeviceMode::Boot);
    }

    #[test]
    fn test_ap_timeout_with_credentials() {
        let mut machine = ModeMachine::with_ap_timeout(Duration::from_secs(10));
        let start = Instant::now();
        machine
            .handle_at(
                ModeEvent::BootCompleted {
                    credentials_present: true,
                },
                start,
            )
            .unwrap();

        assert_eq!(machine.poll(start + Duration::from_secs(9), true), None);
        assert_eq!(
            machine.ap_time_left(start + Duration::from_secs(9)),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            machine.poll(start + Duration::from_secs(10), true),
            Some(DeviceMode::Connecting)
        );
        assert_eq!(machine.ap_time_left(start), None);
    }

    #[test]
    fn test_ap_timeout_needs_credentials() {
        let mut machine = ModeMachine::with_ap_timeout(Duration::from_secs(10));
        let start = Instant::now();
        machine
            .handle_at(
                ModeEvent::BootCompleted {
                    credentials_present: true,
                },
                start,
            )
            .unwrap();
        // Credentials cleared meanwhile.
        assert_eq!(machine.poll(start + Duration::from_secs(60), false), None);
        assert_eq!(machine.mode(), DeviceMode::Provisioning);
    }

    #[test]
    fn test_ap_timeout_restarts_on_reentry() {
        let mut machine = ModeMachine::with_ap_timeout(Duration::from_secs(10));
        let start = Instant::now();
        machine
            .handle_at(
                ModeEvent::BootCompleted {
                    credentials_present: true,
                },
                start,
            )
            .unwrap();
        machine
            .handle_at(ModeEvent::CredentialsApplied, start + Duration::from_secs(1))
            .unwrap();
        machine
            .handle_at(ModeEvent::JoinFailed, start + Duration::from_secs(20))
            .unwrap();
        assert_eq!(machine.poll(start + Duration::from_secs(25), true), None);
        assert_eq!(
            machine.poll(start + Duration::from_secs(30), true),
            Some(DeviceMode::Connecting)
        );
    }

    #[test]
    fn test_default_timeout() {
        let machine = booted(true);
        let left = machine.ap_time_left(Instant::now()).unwrap();
        assert!(left <= AP_TIMEOUT);
        assert!(left > AP_TIMEOUT - Duration::from_secs(5));
    }
}
