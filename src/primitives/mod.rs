//! C1: cryptographic primitives shared by the LUKS1 and LUKS2 codecs —
//! hashes, HMAC, PBKDF2/Argon2, AES-XTS/CBC, cipher-spec parsing, and the
//! CSPRNG.

pub mod cipher;
pub mod hash;
pub mod kdf;
pub mod rng;
pub mod subtle;

pub use cipher::{
    aes_cbc_decrypt, aes_cbc_decrypt_sectors, aes_cbc_encrypt, aes_cbc_encrypt_sectors,
    aes_ecb_decrypt, aes_ecb_encrypt, aes_xts_decrypt, aes_xts_encrypt, cipher_spec_parse,
    CipherSpec,
};
pub use hash::{hash as hash_digest, hmac, HashSpec};
pub use kdf::{argon2, pbkdf2, Argon2Variant};
pub use rng::random;
pub use subtle::constant_time_eq;
