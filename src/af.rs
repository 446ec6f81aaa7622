//! C2: the anti-forensic (AF) splitter and merger.
//!
//! Expands a *k*-byte secret into `stripes * k` bytes such that discarding
//! any single stripe makes recovering the secret infeasible. Grounded
//! directly on `vic_luks_af_split` / `vic_luks_af_merge` / `_diffuse` in
//! `libvicsetup/crypto.c`, the C implementation this spec was distilled
//! from.

use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::primitives::hash::{hash as hash_digest, HashSpec};
use crate::secret::Secret;

/// `D_h`: treat `buf` as `ceil(len / hash_len)` blocks; replace the i-th
/// block with `h(be_u32(i) || block_i)` truncated to that block's length.
fn diffuse(hash_spec: HashSpec, buf: &mut [u8]) {
    let hash_len = hash_spec.digest_len();
    for (i, block) in buf.chunks_mut(hash_len).enumerate() {
        let mut input = Vec::with_capacity(4 + block.len());
        input.extend_from_slice(&(i as u32).to_be_bytes());
        input.extend_from_slice(block);
        let digest = hash_digest(hash_spec, &input);
        block.copy_from_slice(&digest[..block.len()]);
    }
}

fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= s;
    }
}

/// Split secret `key` (`key.len()` bytes) into `stripes * key.len()` bytes
/// of anti-forensically diffused material, using a fresh random fill for
/// the first `stripes - 1` strips.
///
/// `stripes` must be at least 1; `stripes == 1` degenerates to a plain
/// copy of `key` (no randomness, no diffusion), which is legal but
/// provides no anti-forensic property — callers format real volumes with
/// `stripes == 4000`.
pub fn split(hash_spec: HashSpec, key: &[u8], stripes: u32) -> Result<Secret> {
    if stripes == 0 || key.is_empty() {
        return Err(Error::AfSplitFailed);
    }

    let k = key.len();
    let stripes = stripes as usize;
    let mut out = vec![0u8; stripes * k];

    if stripes > 1 {
        crate::primitives::rng::random(&mut out[..(stripes - 1) * k]);
    }

    let mut accumulator = vec![0u8; k];
    for i in 0..stripes - 1 {
        xor_into(&mut accumulator, &out[i * k..(i + 1) * k]);
        diffuse(hash_spec, &mut accumulator);
    }

    xor_into(&mut accumulator, key);
    out[(stripes - 1) * k..].copy_from_slice(&accumulator);
    accumulator.zeroize();

    Ok(Secret::new(out))
}

/// Merge AF-split material `buf` (`stripes * k` bytes) back into the
/// original `k`-byte secret. `Merge(Split(S)) == S` for every `S`.
pub fn merge(hash_spec: HashSpec, buf: &[u8], stripes: u32, k: usize) -> Result<Secret> {
    if stripes == 0 || k == 0 || buf.len() != stripes as usize * k {
        return Err(Error::AfMergeFailed);
    }

    let stripes = stripes as usize;
    let mut accumulator = vec![0u8; k];

    for i in 0..stripes - 1 {
        xor_into(&mut accumulator, &buf[i * k..(i + 1) * k]);
        diffuse(hash_spec, &mut accumulator);
    }

    xor_into(&mut accumulator, &buf[(stripes - 1) * k..]);
    Ok(Secret::new(accumulator))
}
