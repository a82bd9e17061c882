//! Client/server capability flags, assembled from the three greeting slices
//! into one 64-bit set.

use bitflags::bitflags;

bitflags! {
    pub struct Capabilities: u64 {
        const CLIENT_MYSQL = 1;
        const FOUND_ROWS = 1 << 1;
        const CONNECT_WITH_DB = 1 << 3;
        const COMPRESS = 1 << 5;
        const LOCAL_FILES = 1 << 7;
        const CLIENT_PROTOCOL_41 = 1 << 9;
        const CLIENT_SSL = 1 << 11;
        const TRANSACTIONS = 1 << 12;
        const SECURE_CONNECTION = 1 << 13;
        const MULTI_STATEMENTS = 1 << 16;
        const MULTI_RESULTS = 1 << 17;
        const PS_MULTI_RESULTS = 1 << 18;
        const PLUGIN_AUTH = 1 << 19;
        const CONNECT_ATTRS = 1 << 20;
        const PLUGIN_AUTH_LENENC_CLIENT_DATA = 1 << 21;
        const CLIENT_SESSION_TRACK = 1 << 23;
        const CLIENT_DEPRECATE_EOF = 1 << 24;
    }
}

impl Capabilities {
    /// Capabilities this driver always requests when it can (required bits
    /// plus whichever optional bits the client itself supports).
    pub fn client_default() -> Capabilities {
        Capabilities::CLIENT_PROTOCOL_41
            | Capabilities::SECURE_CONNECTION
            | Capabilities::PLUGIN_AUTH
            | Capabilities::PLUGIN_AUTH_LENENC_CLIENT_DATA
            | Capabilities::TRANSACTIONS
            | Capabilities::CLIENT_DEPRECATE_EOF
    }

    /// Concatenates the low 16 bits, high 16 bits, and extended 32 bits from
    /// the three slices of the initial greeting into one capability set.
    pub fn from_greeting(low: u16, high: u16, extended: u32) -> Capabilities {
        let bits = (low as u64) | ((high as u64) << 16) | ((extended as u64) << 32);
        Capabilities::from_bits_truncate(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_from_three_greeting_slices() {
        let caps = Capabilities::from_greeting(0x0201, 0x0008, 0x0000_0001);
        assert!(caps.contains(Capabilities::CLIENT_PROTOCOL_41));
        assert!(caps.contains(Capabilities::PLUGIN_AUTH));
        assert!(caps.contains(Capabilities::CLIENT_MYSQL));
    }
}
