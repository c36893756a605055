//! Wait windows of the Telit command set.
//!
//! The modem answers most commands within a second, but network dependent
//! ones (connecting to the broker, activating a PDP context) can take many
//! seconds. A wait ends early as soon as the ingress completes the reply frame.

use embassy_time::Duration;

/// Default wait window for a reply
pub const fn response_time() -> Duration {
    Duration::from_secs(5)
}

/// Wait window after `#MQCONN`, the broker handshake runs in the modem
pub const fn mqtt_connect_time() -> Duration {
    Duration::from_secs(10)
}

/// Wait window for `#SGACT` context activation
pub const fn context_activation_time() -> Duration {
    Duration::from_secs(15)
}
