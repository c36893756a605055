//! Responses for Network service Commands
use atat::AtatResp;

use super::types::RegistrationStatus;

/// Signal quality +CSQ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalQuality {
    /// Received signal strength indication, as reported
    pub rssi: u8,
    /// Channel bit error rate
    pub ber: u8,
}

impl AtatResp for SignalQuality {}

/// Network registration status +CREG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetworkRegistrationStatus {
    /// Unsolicited result code mode
    pub n: u8,
    pub stat: RegistrationStatus,
}

impl AtatResp for NetworkRegistrationStatus {}
