//! Contract between the configuration core and the provisioning host.
//!
//! The provisioning host owns networking: it serves the access point and the
//! configuration form, and joins the infrastructure network. The core owns
//! configuration and mode. Each side only sees the other through a trait:
//!
//! - [`ProvisioningHost`] - what the core asks of the host
//! - [`ConfigPortal`] - what the host calls back into the core

use crate::config::{FieldId, FormField, SubmitError, WifiCredentials};
use std::collections::HashMap;
use std::fmt;

/// Network-side collaborator driven by the station.
pub trait ProvisioningHost {
    type Error: std::error::Error;

    /// Serve the access point with the configuration form.
    fn serve_portal(&mut self, fields: &[FormField]);

    /// Start joining the infrastructure network.
    ///
    /// The outcome is reported later through [`ConfigPortal::on_network_event`].
    fn join_network(&mut self, credentials: &WifiCredentials) -> Result<(), Self::Error>;

    /// Leave the infrastructure network.
    fn leave_network(&mut self);
}

/// Network events reported by the provisioning host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The network was joined.
    Joined,
    /// Joining the network failed.
    JoinFailed,
    /// An established connection was lost.
    Disconnected,
}

impl fmt::Display for NetworkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined => write!(f, "joined"),
            Self::JoinFailed => write!(f, "join failed"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Callbacks the provisioning host makes into the core.
pub trait ConfigPortal {
    /// Field descriptors for rendering the form.
    fn form_fields(&self) -> Vec<FormField>;

    /// Validate, apply and persist a form submission.
    fn apply_submitted_fields(
        &mut self,
        submitted: &HashMap<String, String>,
    ) -> Result<Vec<FieldId>, SubmitError>;

    /// Whether the access point is being served.
    fn is_ap_mode(&self) -> bool;

    /// Whether the station is online.
    fn is_connected(&self) -> bool;

    /// Report a network event.
    fn on_network_event(&mut self, event: NetworkEvent);
}
