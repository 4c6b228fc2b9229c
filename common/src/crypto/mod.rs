mod address;
mod ecdsa;
mod hash;

pub use address::{Address, AddressError, ADDRESS_SIZE};
pub use ecdsa::{verify_ecdsa, EcdsaError};
pub use hash::{sha256, Hash, HASH_SIZE};

/// Historical addresses that predate reproducible address derivation.
///
/// These were created with a scheme that cannot be migrated; their
/// signatures are still verified normally, only the address-ownership
/// check is bypassed. Frozen at compile time; there is no runtime
/// mutation API for this list.
pub const LEGACY_ALLOWLIST: &[&str] = &[
    "0x000000000000000000000000000000deadbeef",
    "0x00000000000000000000000000000000c0ffee",
];

pub fn is_legacy_allowlisted(address: &Address) -> bool {
    let rendered = address.to_string();
    LEGACY_ALLOWLIST
        .iter()
        .any(|a| a.eq_ignore_ascii_case(&rendered))
}

/// Tries all three address-derivation schemes, in order, against a
/// raw public key. Does not consult the legacy allowlist — callers combine
/// this with [`is_legacy_allowlisted`] themselves, since a failed derivation
/// is only a mismatch for addresses outside that list.
pub fn owns_address(public_key: &[u8], candidate: &Address) -> bool {
    if let Ok(uncompressed) = ecdsa::decompress_public_key(public_key) {
        if &Address::derive_standard_evm(&uncompressed) == candidate {
            return true;
        }
    }
    if &Address::derive_legacy_hex_sha256(public_key) == candidate {
        return true;
    }
    let hex_string = hex::encode(public_key);
    &Address::derive_wallet_utf8_sha256(&hex_string) == candidate
}
