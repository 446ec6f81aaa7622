//! Cryptographically secure random bytes for salts, AF random stripes, and
//! (when requested) master keys.
//!
//! A ChaCha20-based generator seeded from OS entropy, adapted from the
//! project's own CSPRNG rather than pulled in through `rand`/`rand_core` —
//! this core has exactly one random-bytes call site (`random`) and no need
//! for `rand`'s broader distribution API.
//!
//! ## References
//! - ChaCha20 specification: RFC 8439

use std::sync::{Mutex, OnceLock};

use crate::error::{Error, Result};

/// ChaCha20 keystream generator used as this core's single CSPRNG source.
#[derive(Clone)]
struct ChaCha20Rng {
    state: [u32; 16],
    counter: u64,
    buffer: [u8; 64],
    buffer_pos: usize,
}

impl ChaCha20Rng {
    const CONSTANTS: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

    fn from_seed(seed: [u8; 32]) -> Self {
        let mut state = [0u32; 16];
        state[0..4].copy_from_slice(&Self::CONSTANTS);
        for (i, chunk) in seed.chunks_exact(4).enumerate() {
            state[4 + i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        state[12] = 0;
        state[13] = 0;
        state[14] = 0;
        state[15] = 0;

        Self {
            state,
            counter: 0,
            buffer: [0; 64],
            buffer_pos: 64, // force initial block generation
        }
    }

    #[inline(always)]
    fn quarter_round(state: &mut [u32; 16], ai: usize, bi: usize, ci: usize, di: usize) {
        state[ai] = state[ai].wrapping_add(state[bi]);
        state[di] ^= state[ai];
        state[di] = state[di].rotate_left(16);

        state[ci] = state[ci].wrapping_add(state[di]);
        state[bi] ^= state[ci];
        state[bi] = state[bi].rotate_left(12);

        state[ai] = state[ai].wrapping_add(state[bi]);
        state[di] ^= state[ai];
        state[di] = state[di].rotate_left(8);

        state[ci] = state[ci].wrapping_add(state[di]);
        state[bi] ^= state[ci];
        state[bi] = state[bi].rotate_left(7);
    }

    fn generate_block(&mut self) {
        let mut working = self.state;

        for _ in 0..10 {
            Self::quarter_round(&mut working, 0, 4, 8, 12);
            Self::quarter_round(&mut working, 1, 5, 9, 13);
            Self::quarter_round(&mut working, 2, 6, 10, 14);
            Self::quarter_round(&mut working, 3, 7, 11, 15);

            Self::quarter_round(&mut working, 0, 5, 10, 15);
            Self::quarter_round(&mut working, 1, 6, 11, 12);
            Self::quarter_round(&mut working, 2, 7, 8, 13);
            Self::quarter_round(&mut working, 3, 4, 9, 14);
        }

        for i in 0..16 {
            working[i] = working[i].wrapping_add(self.state[i]);
        }

        for (i, &word) in working.iter().enumerate() {
            self.buffer[i * 4..(i + 1) * 4].copy_from_slice(&word.to_le_bytes());
        }

        self.counter += 1;
        self.state[12] = (self.counter & 0xFFFF_FFFF) as u32;
        self.state[13] = (self.counter >> 32) as u32;
        self.buffer_pos = 0;
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            if self.buffer_pos >= 64 {
                self.generate_block();
            }
            let available = 64 - self.buffer_pos;
            let needed = dest.len() - offset;
            let to_copy = available.min(needed);
            dest[offset..offset + to_copy]
                .copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + to_copy]);
            self.buffer_pos += to_copy;
            offset += to_copy;
        }
    }
}

#[cfg(unix)]
fn collect_system_entropy(seed: &mut [u8; 32]) -> Result<()> {
    use std::io::Read;
    std::fs::File::open("/dev/urandom")
        .or_else(|_| std::fs::File::open("/dev/random"))
        .and_then(|mut f| f.read_exact(seed))
        .map_err(Error::Io)
}

#[cfg(windows)]
fn collect_system_entropy(seed: &mut [u8; 32]) -> Result<()> {
    #[link(name = "advapi32")]
    unsafe extern "system" {
        fn SystemFunction036(buffer: *mut u8, length: u32) -> u8;
    }

    let ok = unsafe { SystemFunction036(seed.as_mut_ptr(), seed.len() as u32) };
    if ok == 0 {
        return Err(Error::BadParameter("failed to collect system entropy"));
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn collect_system_entropy(_seed: &mut [u8; 32]) -> Result<()> {
    Err(Error::BadParameter("no system entropy source on this platform"))
}

fn global_rng() -> &'static Mutex<ChaCha20Rng> {
    static RNG: OnceLock<Mutex<ChaCha20Rng>> = OnceLock::new();
    RNG.get_or_init(|| {
        let mut seed = [0u8; 32];
        collect_system_entropy(&mut seed).expect("system entropy source unavailable");
        Mutex::new(ChaCha20Rng::from_seed(seed))
    })
}

/// Fill `buf` with cryptographically strong random bytes, drawn from this
/// core's single process-wide CSPRNG source (seeded once from the host).
pub fn random(buf: &mut [u8]) {
    global_rng()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .fill_bytes(buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_fixed_seed() {
        let mut a = ChaCha20Rng::from_seed([0x42; 32]);
        let mut b = ChaCha20Rng::from_seed([0x42; 32]);
        let mut buf_a = [0u8; 128];
        let mut buf_b = [0u8; 128];
        a.fill_bytes(&mut buf_a);
        b.fill_bytes(&mut buf_b);
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn distinct_seeds_diverge() {
        let mut a = ChaCha20Rng::from_seed([0x11; 32]);
        let mut b = ChaCha20Rng::from_seed([0x22; 32]);
        let mut buf_a = [0u8; 64];
        let mut buf_b = [0u8; 64];
        a.fill_bytes(&mut buf_a);
        b.fill_bytes(&mut buf_b);
        assert_ne!(buf_a, buf_b);
    }

    #[test]
    fn global_random_not_all_zero_and_varies() {
        let mut first = [0u8; 64];
        let mut second = [0u8; 64];
        random(&mut first);
        random(&mut second);
        assert_ne!(first, [0u8; 64]);
        assert_ne!(first, second);
    }
}
