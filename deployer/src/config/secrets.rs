//! Random secret generation
//!
//! Bytes come from the operating system RNG; if that fails the thread RNG is
//! used instead and a warning is logged.

use rand::rngs::OsRng;
use rand::{thread_rng, RngCore};
use secrecy::SecretString;
use tracing::warn;

use crate::utils::hex_encode;

const ALPHANUMERIC: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated data-tier passwords
pub const PASSWORD_LEN: usize = 16;

fn fill_random(buf: &mut [u8]) {
    if let Err(e) = OsRng.try_fill_bytes(buf) {
        warn!("OS random source unavailable ({}), using fallback generator", e);
        thread_rng().fill_bytes(buf);
    }
}

/// Alphanumeric string of `len` characters
pub fn random_alphanumeric(len: usize) -> String {
    // 248 = 4 * 62; larger bytes are rejected to keep the distribution flat
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 64];
    while out.len() < len {
        fill_random(&mut buf);
        for byte in buf.iter().filter(|b| **b < 248) {
            if out.len() == len {
                break;
            }
            out.push(ALPHANUMERIC[(*byte % 62) as usize] as char);
        }
    }
    out
}

/// 16-character data-tier password
pub fn generate_password() -> SecretString {
    SecretString::from(random_alphanumeric(PASSWORD_LEN))
}

/// 256-bit JWT signing secret, hex encoded
pub fn generate_jwt_secret() -> SecretString {
    let mut bytes = [0u8; 32];
    fill_random(&mut bytes);
    SecretString::from(hex_encode(bytes))
}
