//! Hex/decimal conversion helpers shared by the EVM and P-chain fetchers.
//!
//! JSON-RPC encodes every integer as a `0x`-prefixed hex string. Values that
//! can exceed `u64` (wei amounts) go through [`alloy_primitives::U256`] so a
//! 256-bit transfer doesn't truncate; narrower fields (gas, timestamps,
//! indices) are parsed directly as `u64`.

use alloy::primitives::U256;

/// Parse a `0x`-prefixed hex string as `u64`. Empty/absent values are `0`.
pub(crate) fn hex_to_u64(value: &str) -> Option<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16).ok()
}

/// Parse a `0x`-prefixed hex string as a decimal string, via [`U256`] so
/// wei-scale values never overflow. Falls back to the raw input if it isn't
/// valid hex at all (defensive only — RPC endpoints are trusted to be well
/// formed).
pub(crate) fn hex_to_decimal(value: &str) -> String {
    U256::from_str_radix(value.trim_start_matches("0x"), 16)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| value.to_string())
}

/// Format a height as the `0x`-prefixed hex JSON-RPC expects.
pub(crate) fn height_hex(height: u64) -> String {
    format!("0x{height:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_to_u64_parses() {
        assert_eq!(hex_to_u64("0x64"), Some(100));
        assert_eq!(hex_to_u64("0x0"), Some(0));
    }

    #[test]
    fn hex_to_decimal_handles_wei_scale_values() {
        // 1 ether in wei, comfortably beyond u64::MAX.
        assert_eq!(hex_to_decimal("0xde0b6b3a7640000"), "1000000000000000000");
    }

    #[test]
    fn height_hex_formats_with_prefix() {
        assert_eq!(height_hex(255), "0xff");
    }
}
