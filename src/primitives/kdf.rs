//! Key-derivation functions: PBKDF2 (LUKS1 and LUKS2) and Argon2i/Argon2id
//! (LUKS2 only).

use argon2::Argon2;
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::error::{Error, Result};
use crate::primitives::hash::HashSpec;

/// `PBKDF2(password, salt, iterations, hash_spec) -> out_len bytes`.
///
/// Fails with `Error::KdfFailed` on zero iterations, matching `vic_luks_pbkdf2`
/// rejecting a zero-size/zero-iteration request.
pub fn pbkdf2(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    hash_spec: HashSpec,
    out_len: usize,
) -> Result<Vec<u8>> {
    if iterations == 0 {
        return Err(Error::KdfFailed);
    }

    let mut out = vec![0u8; out_len];
    match hash_spec {
        HashSpec::Sha1 => pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut out),
        HashSpec::Sha256 => pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out),
        HashSpec::Sha512 => pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut out),
        HashSpec::Ripemd160 => {
            return Err(Error::Unsupported("pbkdf2 with ripemd160 prf".into()));
        }
    }
    Ok(out)
}

/// Argon2 variant selector (LUKS2 `kdf.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argon2Variant {
    I,
    Id,
}

/// `Argon2{i,id}(password, salt, t_cost, m_cost_kib, lanes) -> out_len bytes`.
pub fn argon2(
    variant: Argon2Variant,
    password: &[u8],
    salt: &[u8],
    t_cost: u32,
    m_cost_kib: u32,
    lanes: u32,
    out_len: usize,
) -> Result<Vec<u8>> {
    let algorithm = match variant {
        Argon2Variant::I => argon2::Algorithm::Argon2i,
        Argon2Variant::Id => argon2::Algorithm::Argon2id,
    };

    let params = argon2::Params::new(m_cost_kib, t_cost, lanes, Some(out_len))
        .map_err(|_| Error::KdfFailed)?;
    let argon2 = Argon2::new(algorithm, argon2::Version::V0x13, params);

    let mut out = vec![0u8; out_len];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|_| Error::KdfFailed)?;
    Ok(out)
}
