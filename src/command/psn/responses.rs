//! Responses for Packet Switched Data Services Commands
use atat::AtatResp;
use no_std_net::Ipv4Addr;

use super::types::GPRSAttachedState;
use crate::command::network_service::types::RegistrationStatus;

/// GPRS network registration status +CGREG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GPRSNetworkRegistrationStatus {
    pub n: u8,
    pub stat: RegistrationStatus,
}

/// GPRS attach or detach +CGATT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GPRSAttached {
    pub state: GPRSAttachedState,
}

/// Context activation #SGACT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDPContextActivation {
    /// Address assigned to the context by the network
    pub ip: Ipv4Addr,
}

impl AtatResp for GPRSNetworkRegistrationStatus {}

impl AtatResp for GPRSAttached {}

impl AtatResp for PDPContextActivation {}
