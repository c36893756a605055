//! Argument and parameter types used by Network service Commands and Responses

/// `<stat>` of `+CREG` and `+CGREG`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationStatus {
    /// 0: not registered, the MT is not currently searching a new operator
    NotRegistered,
    /// 1: registered, home network
    RegisteredHome,
    /// 2: not registered, but the MT is currently searching a new operator
    Searching,
    /// 3: registration denied
    RegistrationDenied,
    /// 4: unknown
    Unknown,
    /// 5: registered, roaming
    RegisteredRoaming,
    /// Any status the Telit 3G family does not document
    Other(u8),
}

impl From<u8> for RegistrationStatus {
    fn from(stat: u8) -> Self {
        match stat {
            0 => Self::NotRegistered,
            1 => Self::RegisteredHome,
            2 => Self::Searching,
            3 => Self::RegistrationDenied,
            4 => Self::Unknown,
            5 => Self::RegisteredRoaming,
            n => Self::Other(n),
        }
    }
}

impl RegistrationStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::NotRegistered => 0,
            Self::RegisteredHome => 1,
            Self::Searching => 2,
            Self::RegistrationDenied => 3,
            Self::Unknown => 4,
            Self::RegisteredRoaming => 5,
            Self::Other(n) => n,
        }
    }
}
