//! §10.3 / §11.4: typed parameter structs a caller passes to `format` /
//! `add_key`, and the integrity algorithm tag used by the activation
//! bridge. Not a config file — a plain builder-friendly struct, the way
//! the teacher's own `cli::args::Config` is a plain struct rather than a
//! `serde`-deserialized document.

use crate::primitives::hash::HashSpec;
use crate::secret::Secret;

/// One of the three KDF kinds a keyslot can name. Only `Pbkdf2` is valid
/// for LUKS1; LUKS2 accepts all three.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KdfParams {
    Pbkdf2 {
        iterations: u32,
        hash: HashSpec,
    },
    Argon2i {
        time_cost: u32,
        memory_kib: u32,
        lanes: u32,
    },
    Argon2id {
        time_cost: u32,
        memory_kib: u32,
        lanes: u32,
    },
}

impl KdfParams {
    /// A reasonable interactive-unlock default: Argon2id, matching what a
    /// current `cryptsetup luksFormat` chooses without `--pbkdf`.
    pub fn default_argon2id() -> Self {
        KdfParams::Argon2id {
            time_cost: 4,
            memory_kib: 1 << 20, // 1 GiB
            lanes: 4,
        }
    }

    /// The JSON `kdf.type` discriminant string.
    pub fn type_str(&self) -> &'static str {
        match self {
            KdfParams::Pbkdf2 { .. } => "pbkdf2",
            KdfParams::Argon2i { .. } => "argon2i",
            KdfParams::Argon2id { .. } => "argon2id",
        }
    }
}

/// Number of AF stripes per keyslot. The spec notes "4000 in practice";
/// kept as a named constant rather than scattered literals.
pub const DEFAULT_AF_STRIPES: u32 = 4000;

/// `{type, journal_encryption, journal_integrity}` — §11.4's richer
/// integrity tag, matching `vic_integrity_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityAlg {
    HmacAead,
    HmacSha256,
    HmacSha512,
    CmacAes,
    Poly1305,
}

impl IntegrityAlg {
    /// The `capi:authenc(<alg>,...)` component name.
    pub fn capi_name(self) -> &'static str {
        match self {
            IntegrityAlg::HmacAead => "hmac(sha256)",
            IntegrityAlg::HmacSha256 => "hmac(sha256)",
            IntegrityAlg::HmacSha512 => "hmac(sha512)",
            IntegrityAlg::CmacAes => "cmac(aes)",
            IntegrityAlg::Poly1305 => "poly1305",
        }
    }

    /// Authentication tag size in bytes, used to fill the activation
    /// request's `integrity:<tag_size>:aead` field.
    pub fn tag_size(self) -> usize {
        match self {
            IntegrityAlg::HmacAead | IntegrityAlg::HmacSha256 => 32,
            IntegrityAlg::HmacSha512 => 64,
            IntegrityAlg::CmacAes => 16,
            IntegrityAlg::Poly1305 => 16,
        }
    }
}

/// Options for `Luks::format`. `master_key` of `None` means "generate a
/// random one of `key_bytes` length".
pub struct FormatOptions {
    pub cipher: String,
    pub key_bytes: usize,
    pub hash: HashSpec,
    pub mk_iterations: u32,
    pub keyslot_kdf: KdfParams,
    pub af_stripes: u32,
    pub master_key: Option<Secret>,
    pub integrity: Option<IntegrityAlg>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            cipher: "aes-xts-plain64".to_string(),
            key_bytes: 32,
            hash: HashSpec::Sha256,
            mk_iterations: 100_000,
            keyslot_kdf: KdfParams::default_argon2id(),
            af_stripes: DEFAULT_AF_STRIPES,
            master_key: None,
            integrity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_options_use_argon2id() {
        let opts = FormatOptions::default();
        assert_eq!(opts.keyslot_kdf.type_str(), "argon2id");
        assert_eq!(opts.cipher, "aes-xts-plain64");
    }

    #[test]
    fn integrity_capi_names_and_tag_sizes() {
        assert_eq!(IntegrityAlg::HmacSha256.capi_name(), "hmac(sha256)");
        assert_eq!(IntegrityAlg::HmacSha256.tag_size(), 32);
        assert_eq!(IntegrityAlg::HmacSha512.tag_size(), 64);
    }
}
