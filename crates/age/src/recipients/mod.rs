//! The two recipient/identity algorithms the core implements directly
//! (§4.3, §4.4), plus the `Recipient`/`Identity` traits they satisfy —
//! see [`crate::Recipient`] and [`crate::Identity`] — which is also the
//! plug-in boundary external recipient types (SSH, YubiKey, ...) build
//! against.

pub mod scrypt;
pub mod x25519;
