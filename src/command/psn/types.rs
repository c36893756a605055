//! Argument and parameter types used by Packet Switched Data Services Commands and Responses

/// PDP context identifier, `<cid>` of `+CGDCONT` and `#SGACT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ContextId(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GPRSAttachedState {
    Detached,
    Attached,
}

/// `<PDP_type>` of `+CGDCONT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PDPType {
    IP,
    IPV6,
}

impl PDPType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IP => "IP",
            Self::IPV6 => "IPV6",
        }
    }
}
