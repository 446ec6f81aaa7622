//! AES en/decryption in the three modes LUKS's cipher-spec strings can
//! name (XTS, CBC, ECB), plus parsing of the `"<algo>-<mode>-<iv>"`
//! strings used throughout both on-disk formats.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, KeyIvInit};
use aes::{Aes128, Aes256};
use xts_mode::{get_tweak_default, Xts128};

use crate::error::{Error, Result};

/// The only block cipher algorithm this core implements (AES); kept as an
/// enum rather than a bare string so an unsupported algorithm is caught at
/// parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algo {
    Aes,
}

/// Block cipher mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Xts,
    Cbc,
    Ecb,
}

/// IV generation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvMode {
    Plain64,
    Null,
}

/// A parsed `"aes-xts-plain64"`-style cipher specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSpec {
    pub algo: Algo,
    pub mode: Mode,
    pub iv: IvMode,
}

impl CipherSpec {
    /// Render back to the canonical on-disk string form.
    pub fn to_spec_string(self) -> String {
        let algo = match self.algo {
            Algo::Aes => "aes",
        };
        let mode = match self.mode {
            Mode::Xts => "xts",
            Mode::Cbc => "cbc",
            Mode::Ecb => "ecb",
        };
        match self.mode {
            Mode::Ecb => format!("{algo}-{mode}"),
            _ => {
                let iv = match self.iv {
                    IvMode::Plain64 => "plain64",
                    IvMode::Null => "null",
                };
                format!("{algo}-{mode}-{iv}")
            }
        }
    }
}

/// Splits e.g. `"aes-xts-plain64"` into `{algo, mode, iv}` and validates the
/// tuple, rejecting anything this core does not implement.
pub fn cipher_spec_parse(spec: &str) -> Result<CipherSpec> {
    let mut parts = spec.split('-');
    let algo_str = parts
        .next()
        .ok_or(Error::BadParameter("empty cipher spec"))?;
    let mode_str = parts
        .next()
        .ok_or(Error::BadParameter("cipher spec missing mode"))?;

    let algo = match algo_str {
        "aes" => Algo::Aes,
        other => return Err(Error::Unsupported(format!("cipher algorithm {other:?}"))),
    };

    let mode = match mode_str {
        "xts" => Mode::Xts,
        "cbc" => Mode::Cbc,
        "ecb" => Mode::Ecb,
        other => return Err(Error::Unsupported(format!("cipher mode {other:?}"))),
    };

    let iv = match mode {
        Mode::Ecb => {
            if parts.next().is_some() {
                return Err(Error::BadParameter("ecb cipher spec takes no IV mode"));
            }
            IvMode::Null
        }
        _ => {
            let iv_str = parts
                .next()
                .ok_or(Error::BadParameter("cipher spec missing IV mode"))?;
            match iv_str {
                "plain64" => IvMode::Plain64,
                "null" => IvMode::Null,
                other => return Err(Error::Unsupported(format!("IV mode {other:?}"))),
            }
        }
    };

    if parts.next().is_some() {
        return Err(Error::BadParameter("trailing garbage in cipher spec"));
    }

    Ok(CipherSpec { algo, mode, iv })
}

fn xts_tweak(sector_index: u64) -> [u8; 16] {
    get_tweak_default(sector_index as u128)
}

/// AES-XTS encrypt `plaintext` in place given the two XTS half-keys and the
/// starting sector index (used as the `plain64` IV/tweak).
pub fn aes_xts_encrypt(
    key_1: &[u8],
    key_2: &[u8],
    sector_index: u64,
    data: &mut [u8],
) -> Result<()> {
    xts_crypt(key_1, key_2, sector_index, data, true)
}

/// AES-XTS decrypt, the inverse of [`aes_xts_encrypt`].
pub fn aes_xts_decrypt(
    key_1: &[u8],
    key_2: &[u8],
    sector_index: u64,
    data: &mut [u8],
) -> Result<()> {
    xts_crypt(key_1, key_2, sector_index, data, false)
}

fn xts_crypt(
    key_1: &[u8],
    key_2: &[u8],
    sector_index: u64,
    data: &mut [u8],
    encrypt: bool,
) -> Result<()> {
    const SECTOR_SIZE: usize = 512;
    if key_1.len() != key_2.len() || data.len() % SECTOR_SIZE != 0 {
        return Err(Error::BadParameter("xts buffer must be sector aligned"));
    }

    match key_1.len() {
        16 => {
            let cipher_1 =
                aes::Aes128::new_from_slice(key_1).map_err(|_| Error::BadParameter("bad key"))?;
            let cipher_2 =
                aes::Aes128::new_from_slice(key_2).map_err(|_| Error::BadParameter("bad key"))?;
            let xts = Xts128::<Aes128>::new(cipher_1, cipher_2);
            crypt_sectors(&xts, sector_index, data, encrypt)
        }
        32 => {
            let cipher_1 =
                aes::Aes256::new_from_slice(key_1).map_err(|_| Error::BadParameter("bad key"))?;
            let cipher_2 =
                aes::Aes256::new_from_slice(key_2).map_err(|_| Error::BadParameter("bad key"))?;
            let xts = Xts128::<Aes256>::new(cipher_1, cipher_2);
            crypt_sectors(&xts, sector_index, data, encrypt)
        }
        _ => Err(Error::BadParameter("xts half-key must be 16 or 32 bytes")),
    }
}

fn crypt_sectors<C>(
    xts: &Xts128<C>,
    sector_index: u64,
    data: &mut [u8],
    encrypt: bool,
) -> Result<()>
where
    C: cipher::BlockEncrypt + cipher::BlockDecrypt + cipher::BlockSizeUser,
{
    const SECTOR_SIZE: usize = 512;
    for (i, sector) in data.chunks_mut(SECTOR_SIZE).enumerate() {
        let tweak = xts_tweak(sector_index + i as u64);
        if encrypt {
            xts.encrypt_sector(sector, tweak);
        } else {
            xts.decrypt_sector(sector, tweak);
        }
    }
    Ok(())
}

/// AES-CBC encrypt with a caller-supplied IV and PKCS7 padding, for
/// variable-length buffers that want a single whole-buffer IV. The
/// keyslot-area path does not use this directly — see
/// [`aes_cbc_encrypt_sectors`] for the fixed-size, per-sector-IV variant
/// LUKS1 uses when its payload cipher is CBC rather than XTS.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => cbc_encrypt::<Aes128>(key, iv, data),
        32 => cbc_encrypt::<Aes256>(key, iv, data),
        _ => Err(Error::BadParameter("cbc key must be 16 or 32 bytes")),
    }
}

/// AES-CBC decrypt, the inverse of [`aes_cbc_encrypt`]. Expects
/// PKCS7-padded ciphertext whose length is a multiple of the block size.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => cbc_decrypt::<Aes128>(key, iv, data),
        32 => cbc_decrypt::<Aes256>(key, iv, data),
        _ => Err(Error::BadParameter("cbc key must be 16 or 32 bytes")),
    }
}

fn cbc_encrypt<C>(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>>
where
    C: cipher::BlockSizeUser + cipher::KeySizeUser + cipher::BlockEncryptMut + KeyIvInit,
{
    let encryptor =
        cbc::Encryptor::<C>::new_from_slices(key, iv).map_err(|_| Error::EncryptFailed)?;
    Ok(encryptor.encrypt_padded_vec_mut::<cipher::block_padding::Pkcs7>(data))
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>>
where
    C: cipher::BlockSizeUser + cipher::KeySizeUser + cipher::BlockDecryptMut + KeyIvInit,
{
    let decryptor =
        cbc::Decryptor::<C>::new_from_slices(key, iv).map_err(|_| Error::DecryptFailed)?;
    decryptor
        .decrypt_padded_vec_mut::<cipher::block_padding::Pkcs7>(data)
        .map_err(|_| Error::DecryptFailed)
}

/// AES-CBC encrypt `data` in place across 512-byte sectors, unpadded:
/// `data.len()` must already be a sector multiple. Each sector gets its
/// own IV, derived from its sector index the same `plain64` way the XTS
/// tweak is — this is the keyslot-area wrap LUKS1 uses when the payload
/// cipher itself is CBC.
pub fn aes_cbc_encrypt_sectors(key: &[u8], sector_index: u64, data: &mut [u8]) -> Result<()> {
    cbc_sector_crypt(key, sector_index, data, true)
}

/// AES-CBC decrypt, the inverse of [`aes_cbc_encrypt_sectors`].
pub fn aes_cbc_decrypt_sectors(key: &[u8], sector_index: u64, data: &mut [u8]) -> Result<()> {
    cbc_sector_crypt(key, sector_index, data, false)
}

fn cbc_sector_crypt(key: &[u8], sector_index: u64, data: &mut [u8], encrypt: bool) -> Result<()> {
    match key.len() {
        16 => cbc_sector_crypt_generic::<Aes128>(key, sector_index, data, encrypt),
        32 => cbc_sector_crypt_generic::<Aes256>(key, sector_index, data, encrypt),
        _ => Err(Error::BadParameter("cbc key must be 16 or 32 bytes")),
    }
}

fn cbc_sector_crypt_generic<C>(
    key: &[u8],
    sector_index: u64,
    data: &mut [u8],
    encrypt: bool,
) -> Result<()>
where
    C: cipher::BlockSizeUser + cipher::KeySizeUser + cipher::BlockEncryptMut + cipher::BlockDecryptMut + KeyIvInit,
{
    const SECTOR_SIZE: usize = 512;
    if data.len() % SECTOR_SIZE != 0 {
        return Err(Error::BadParameter("cbc sector buffer must be sector aligned"));
    }
    for (i, sector) in data.chunks_mut(SECTOR_SIZE).enumerate() {
        let iv = xts_tweak(sector_index + i as u64);
        if encrypt {
            let encryptor =
                cbc::Encryptor::<C>::new_from_slices(key, &iv).map_err(|_| Error::EncryptFailed)?;
            let out = encryptor.encrypt_padded_vec_mut::<cipher::block_padding::NoPadding>(sector);
            sector.copy_from_slice(&out);
        } else {
            let decryptor =
                cbc::Decryptor::<C>::new_from_slices(key, &iv).map_err(|_| Error::DecryptFailed)?;
            let out = decryptor
                .decrypt_padded_vec_mut::<cipher::block_padding::NoPadding>(sector)
                .map_err(|_| Error::DecryptFailed)?;
            sector.copy_from_slice(&out);
        }
    }
    Ok(())
}

/// AES-ECB encrypt `data` in place, block by block, with no IV (`ecb`
/// takes none — every block is independent). `data.len()` must be a
/// multiple of the AES block size (16 bytes); this core never pads an
/// ECB buffer itself, matching the few on-disk uses of `aes-ecb` (e.g.
/// wrapping a fixed-size digest) where the caller already sized the
/// buffer to a block multiple.
pub fn aes_ecb_encrypt(key: &[u8], data: &mut [u8]) -> Result<()> {
    match key.len() {
        16 => ecb_crypt::<Aes128>(key, data, true),
        32 => ecb_crypt::<Aes256>(key, data, true),
        _ => Err(Error::BadParameter("ecb key must be 16 or 32 bytes")),
    }
}

/// AES-ECB decrypt, the inverse of [`aes_ecb_encrypt`].
pub fn aes_ecb_decrypt(key: &[u8], data: &mut [u8]) -> Result<()> {
    match key.len() {
        16 => ecb_crypt::<Aes128>(key, data, false),
        32 => ecb_crypt::<Aes256>(key, data, false),
        _ => Err(Error::BadParameter("ecb key must be 16 or 32 bytes")),
    }
}

fn ecb_crypt<C>(key: &[u8], data: &mut [u8], encrypt: bool) -> Result<()>
where
    C: BlockEncrypt + BlockDecrypt + KeyInit,
{
    const BLOCK_SIZE: usize = 16;
    if data.len() % BLOCK_SIZE != 0 {
        return Err(Error::BadParameter("ecb buffer must be a block-size multiple"));
    }
    let cipher = C::new_from_slice(key).map_err(|_| Error::BadParameter("bad key"))?;
    for chunk in data.chunks_mut(BLOCK_SIZE) {
        let block = cipher::Block::<C>::from_mut_slice(chunk);
        if encrypt {
            cipher.encrypt_block(block);
        } else {
            cipher.decrypt_block(block);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xts_plain64() {
        let spec = cipher_spec_parse("aes-xts-plain64").unwrap();
        assert_eq!(spec.algo, Algo::Aes);
        assert_eq!(spec.mode, Mode::Xts);
        assert_eq!(spec.iv, IvMode::Plain64);
        assert_eq!(spec.to_spec_string(), "aes-xts-plain64");
    }

    #[test]
    fn parses_cbc_plain64() {
        let spec = cipher_spec_parse("aes-cbc-plain64").unwrap();
        assert_eq!(spec.mode, Mode::Cbc);
    }

    #[test]
    fn rejects_unknown_algo() {
        assert!(cipher_spec_parse("twofish-xts-plain64").is_err());
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(cipher_spec_parse("aes-ctr-plain64").is_err());
    }

    #[test]
    fn xts_round_trips() {
        let key_1 = [0x11u8; 32];
        let key_2 = [0x22u8; 32];
        let mut data = vec![0x55u8; 512 * 3];
        let original = data.clone();

        aes_xts_encrypt(&key_1, &key_2, 7, &mut data).unwrap();
        assert_ne!(data, original);

        aes_xts_decrypt(&key_1, &key_2, 7, &mut data).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn cbc_round_trips() {
        let key = [0x33u8; 32];
        let iv = [0x44u8; 16];
        let original = b"attack at dawn, repeat: attack at dawn".to_vec();

        let encrypted = cbc_encrypt::<Aes256>(&key, &iv, &original).unwrap();
        assert_ne!(encrypted, original);

        let decrypted = cbc_decrypt::<Aes256>(&key, &iv, &encrypted).unwrap();
        assert_eq!(decrypted, original);
    }

    #[test]
    fn cbc_sectors_round_trip_with_per_sector_iv() {
        let key = [0x33u8; 32];
        let mut data = vec![0x55u8; 512 * 3];
        let original = data.clone();

        aes_cbc_encrypt_sectors(&key, 9, &mut data).unwrap();
        assert_ne!(data, original);
        // each sector's ciphertext depends on its own IV, not a chained one
        assert_ne!(data[..512], data[512..1024]);

        aes_cbc_decrypt_sectors(&key, 9, &mut data).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn ecb_round_trips() {
        let key = [0x66u8; 32];
        let mut data = [0x77u8; 48];
        let original = data;

        aes_ecb_encrypt(&key, &mut data).unwrap();
        assert_ne!(data, original);

        aes_ecb_decrypt(&key, &mut data).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn ecb_rejects_non_block_multiple() {
        let key = [0x11u8; 16];
        let mut data = [0u8; 17];
        assert!(aes_ecb_encrypt(&key, &mut data).is_err());
    }

    #[test]
    fn parses_bare_ecb_with_no_iv_mode() {
        let spec = cipher_spec_parse("aes-ecb").unwrap();
        assert_eq!(spec.mode, Mode::Ecb);
        assert_eq!(spec.to_spec_string(), "aes-ecb");
    }
}
