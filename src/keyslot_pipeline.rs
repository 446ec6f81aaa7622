//! C5: the keyslot lifecycle shared by LUKS1 and LUKS2 — stretch a
//! passphrase into a keyslot key, AF-split/merge the master key through
//! it, and verify recovered candidates against the stored digest in
//! constant time.
//!
//! Both formats reduce to the same four steps once their slot/area
//! objects are resolved to KDF parameters, a salt, and a raw byte range:
//! this module implements those four steps once; `luks1`/`luks2` supply
//! the format-specific slot bookkeeping around them.

use crate::config::KdfParams;
use crate::error::{Error, Result};
use crate::primitives::cipher::{self, Mode};
use crate::primitives::hash::HashSpec;
use crate::primitives::{
    aes_cbc_decrypt_sectors, aes_cbc_encrypt_sectors, aes_xts_decrypt, aes_xts_encrypt,
};
use crate::secret::Secret;
use crate::{af, primitives};

const SECTOR_SIZE: usize = 512;

/// The cipher spec LUKS2 wraps every keyslot area with, independent of
/// whatever cipher the payload segment uses — real LUKS2 draws the same
/// distinction (`keyslot.area.encryption` vs. `segment.encryption`), and
/// this core always picks XTS for the former since the keyslot area is a
/// fixed size computed ahead of time and XTS is length-preserving. LUKS1
/// has no separate area-encryption field: its keyslots wrap with the
/// payload cipher itself (`spec.md` §4.5 step 4), so callers on that path
/// pass the payload cipher spec straight through instead of this constant.
pub const KEYSLOT_WRAP_CIPHER: &str = "aes-xts-plain64";

/// Stretch `passphrase` into a `key_bytes`-long keyslot key per `kdf`.
pub fn derive_keyslot_key(
    kdf: &KdfParams,
    passphrase: &[u8],
    salt: &[u8],
    key_bytes: usize,
) -> Result<Secret> {
    let out = match kdf {
        KdfParams::Pbkdf2 { iterations, hash } => {
            primitives::kdf::pbkdf2(passphrase, salt, *iterations, *hash, key_bytes)
        }
        KdfParams::Argon2i {
            time_cost,
            memory_kib,
            lanes,
        } => primitives::kdf::argon2(
            primitives::kdf::Argon2Variant::I,
            passphrase,
            salt,
            *time_cost,
            *memory_kib,
            *lanes,
            key_bytes,
        ),
        KdfParams::Argon2id {
            time_cost,
            memory_kib,
            lanes,
        } => primitives::kdf::argon2(
            primitives::kdf::Argon2Variant::Id,
            passphrase,
            salt,
            *time_cost,
            *memory_kib,
            *lanes,
            key_bytes,
        ),
    }?;
    Ok(Secret::new(out))
}

/// `PBKDF2(master_key, salt, iterations, hash)`, requesting exactly
/// `digest_len` bytes of output — the value every active keyslot's
/// candidate master key is checked against. LUKS1's on-disk digest field
/// is a fixed 20 bytes regardless of which hash drives the PBKDF2 PRF;
/// LUKS2 stores whatever length the digest object's hash naturally
/// produces. Callers pass the length the stored digest actually has.
pub fn compute_master_key_digest(
    hash: HashSpec,
    master_key: &[u8],
    salt: &[u8],
    iterations: u32,
    digest_len: usize,
) -> Result<Vec<u8>> {
    primitives::kdf::pbkdf2(master_key, salt, iterations, hash, digest_len)
}

/// Encrypt a keyslot's AF-split material under its derived key, using
/// whichever mode `cipher_spec` names — XTS for LUKS2's fixed area
/// cipher, or the payload cipher's own mode for LUKS1 (`spec.md` §4.5
/// step 4). `data` is zero-padded to a 512-byte sector multiple before
/// encryption; [`decrypt_key_material`] truncates back down using the
/// caller-supplied original length.
pub fn encrypt_key_material(cipher_spec: &str, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let spec = cipher::cipher_spec_parse(cipher_spec)?;
    let padded_len = data.len().div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
    let mut buf = vec![0u8; padded_len];
    buf[..data.len()].copy_from_slice(data);
    match spec.mode {
        Mode::Xts => {
            let half = key.len() / 2;
            if half == 0 || key.len() % 2 != 0 {
                return Err(Error::BadParameter("XTS key must split evenly in two"));
            }
            aes_xts_encrypt(&key[..half], &key[half..], 0, &mut buf)?;
        }
        Mode::Cbc => aes_cbc_encrypt_sectors(key, 0, &mut buf)?,
        Mode::Ecb => {
            return Err(Error::Unsupported(format!(
                "{:?} keyslot-area encryption",
                spec.mode
            )))
        }
    }
    Ok(buf)
}

/// Inverse of [`encrypt_key_material`]. `expected_len` is the original
/// (pre-padding) plaintext length; the decrypted sector-padded buffer is
/// truncated back down to it.
pub fn decrypt_key_material(
    cipher_spec: &str,
    key: &[u8],
    data: &[u8],
    expected_len: usize,
) -> Result<Secret> {
    let spec = cipher::cipher_spec_parse(cipher_spec)?;
    if expected_len > data.len() {
        return Err(Error::DecryptFailed);
    }
    let mut buf = data.to_vec();
    match spec.mode {
        Mode::Xts => {
            let half = key.len() / 2;
            if half == 0 || key.len() % 2 != 0 {
                return Err(Error::BadParameter("XTS key must split evenly in two"));
            }
            aes_xts_decrypt(&key[..half], &key[half..], 0, &mut buf)?;
        }
        Mode::Cbc => aes_cbc_decrypt_sectors(key, 0, &mut buf)?,
        Mode::Ecb => {
            return Err(Error::Unsupported(format!(
                "{:?} keyslot-area encryption",
                spec.mode
            )))
        }
    }
    buf.truncate(expected_len);
    Ok(Secret::new(buf))
}

/// Enroll `master_key` into a slot: derive the keyslot key, AF-split the
/// master key, encrypt the split material. Returns the ciphertext ready
/// to write to the slot's key-material area.
pub fn enroll(
    cipher_spec: &str,
    kdf: &KdfParams,
    hash: HashSpec,
    passphrase: &[u8],
    salt: &[u8],
    master_key: &[u8],
    stripes: u32,
) -> Result<Vec<u8>> {
    let keyslot_key = derive_keyslot_key(kdf, passphrase, salt, master_key.len())?;
    let split_material = af::split(hash, master_key, stripes)?;
    encrypt_key_material(
        cipher_spec,
        keyslot_key.expose_secret(),
        split_material.expose_secret(),
    )
}

/// Recover the master key candidate from one slot's ciphertext, without
/// checking it against the digest — callers compare the result with
/// [`verify_candidate`].
pub fn recover_candidate(
    cipher_spec: &str,
    kdf: &KdfParams,
    hash: HashSpec,
    passphrase: &[u8],
    salt: &[u8],
    ciphertext: &[u8],
    stripes: u32,
    key_bytes: usize,
) -> Result<Secret> {
    let keyslot_key = derive_keyslot_key(kdf, passphrase, salt, key_bytes)?;
    let expected_len = stripes as usize * key_bytes;
    let split_material = decrypt_key_material(
        cipher_spec,
        keyslot_key.expose_secret(),
        ciphertext,
        expected_len,
    )?;
    af::merge(hash, split_material.expose_secret(), stripes, key_bytes)
}

/// Constant-time check of a recovered candidate against the stored
/// digest. Never reveals *how close* a wrong candidate was.
pub fn verify_candidate(
    hash: HashSpec,
    candidate: &[u8],
    digest_salt: &[u8],
    digest_iterations: u32,
    expected_digest: &[u8],
) -> Result<bool> {
    let computed = compute_master_key_digest(
        hash,
        candidate,
        digest_salt,
        digest_iterations,
        expected_digest.len(),
    )?;
    Ok(primitives::constant_time_eq(&computed, expected_digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enroll_then_recover_round_trips_the_master_key() {
        let master_key = vec![0x42u8; 32];
        let salt = vec![0x99u8; 16];
        let passphrase = b"correct horse battery staple";
        let kdf = KdfParams::Pbkdf2 {
            iterations: 1000,
            hash: HashSpec::Sha256,
        };

        let ciphertext = enroll(
            "aes-xts-plain64",
            &kdf,
            HashSpec::Sha256,
            passphrase,
            &salt,
            &master_key,
            8,
        )
        .unwrap();

        let candidate = recover_candidate(
            "aes-xts-plain64",
            &kdf,
            HashSpec::Sha256,
            passphrase,
            &salt,
            &ciphertext,
            8,
            32,
        )
        .unwrap();

        assert_eq!(candidate.expose_secret(), master_key.as_slice());
    }

    #[test]
    fn enroll_then_recover_round_trips_with_a_cbc_payload_cipher() {
        let master_key = vec![0x24u8; 32];
        let salt = vec![0x55u8; 16];
        let passphrase = b"hunter2";
        let kdf = KdfParams::Pbkdf2 {
            iterations: 1000,
            hash: HashSpec::Sha256,
        };

        let ciphertext = enroll(
            "aes-cbc-plain64",
            &kdf,
            HashSpec::Sha256,
            passphrase,
            &salt,
            &master_key,
            8,
        )
        .unwrap();

        let candidate = recover_candidate(
            "aes-cbc-plain64",
            &kdf,
            HashSpec::Sha256,
            passphrase,
            &salt,
            &ciphertext,
            8,
            32,
        )
        .unwrap();

        assert_eq!(candidate.expose_secret(), master_key.as_slice());
    }

    #[test]
    fn wrong_passphrase_does_not_recover_the_master_key() {
        let master_key = vec![0x11u8; 32];
        let salt = vec![0x22u8; 16];
        let kdf = KdfParams::Pbkdf2 {
            iterations: 1000,
            hash: HashSpec::Sha256,
        };

        let ciphertext = enroll(
            "aes-xts-plain64",
            &kdf,
            HashSpec::Sha256,
            b"right",
            &salt,
            &master_key,
            8,
        )
        .unwrap();

        let candidate = recover_candidate(
            "aes-xts-plain64",
            &kdf,
            HashSpec::Sha256,
            b"wrong",
            &salt,
            &ciphertext,
            8,
            32,
        )
        .unwrap();

        assert_ne!(candidate.expose_secret(), master_key.as_slice());
    }

    #[test]
    fn verify_candidate_matches_only_the_true_master_key() {
        let master_key = vec![0x77u8; 32];
        let digest_salt = vec![0x88u8; 16];
        let digest =
            compute_master_key_digest(HashSpec::Sha256, &master_key, &digest_salt, 1000, 32)
                .unwrap();

        assert!(verify_candidate(HashSpec::Sha256, &master_key, &digest_salt, 1000, &digest)
            .unwrap());
        assert!(!verify_candidate(
            HashSpec::Sha256,
            &vec![0x00u8; 32],
            &digest_salt,
            1000,
            &digest
        )
        .unwrap());
    }
}
