//! The LUKS2 JSON metadata schema: keyslots, tokens, segments, digests,
//! and config, plus deterministic (sorted-key) re-emission so the same
//! logical metadata always hashes and serializes identically.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD_NO_PAD.encode(bytes)
}

pub fn decode_b64(s: &str) -> Result<Vec<u8>> {
    STANDARD_NO_PAD
        .decode(s)
        .map_err(|_| Error::BadParameter("malformed base64 field"))
}

/// Anti-forensic parameters for a keyslot's key material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Af2 {
    #[serde(rename = "type")]
    pub kind: String,
    pub stripes: u32,
    pub hash: String,
}

/// Where a keyslot's AF-split material lives and how it's encrypted at
/// rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Area2 {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: String,
    pub size: String,
    pub encryption: String,
    pub key_size: u32,
}

/// The KDF that stretches a passphrase into this keyslot's unlock key.
/// Tagged union over the three kinds this core supports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kdf2 {
    Pbkdf2 {
        hash: String,
        iterations: u32,
        salt: String,
    },
    Argon2i {
        time: u32,
        memory: u32,
        cpus: u32,
        salt: String,
    },
    Argon2id {
        time: u32,
        memory: u32,
        cpus: u32,
        salt: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Keyslot2 {
    #[serde(rename = "type")]
    pub kind: String,
    pub key_size: u32,
    pub af: Af2,
    pub area: Area2,
    pub kdf: Kdf2,
}

/// An AEAD journal paired with a `segment`'s data encryption, present only
/// when the segment was formatted with an [`crate::config::IntegrityAlg`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentIntegrity2 {
    #[serde(rename = "type")]
    pub kind: String,
    pub journal_encryption: String,
    pub journal_integrity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment2 {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: String,
    /// Decimal byte count, or the literal string `"dynamic"` for a
    /// segment that spans to the end of the device.
    pub size: String,
    pub iv_tweak: String,
    pub encryption: String,
    pub sector_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<SegmentIntegrity2>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Digest2 {
    #[serde(rename = "type")]
    pub kind: String,
    pub keyslots: Vec<String>,
    pub segments: Vec<String>,
    pub digest: String,
    pub salt: String,
    pub hash: String,
    pub iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config2 {
    pub json_size: String,
    pub keyslots_size: String,
}

/// The full JSON metadata document stored alongside each binary header
/// copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Luks2Metadata {
    pub keyslots: BTreeMap<String, Keyslot2>,
    #[serde(default)]
    pub tokens: BTreeMap<String, serde_json::Value>,
    pub segments: BTreeMap<String, Segment2>,
    pub digests: BTreeMap<String, Digest2>,
    pub config: Config2,
}

impl Luks2Metadata {
    /// First unused keyslot id (LUKS2 ids are decimal strings, dense from
    /// `"0"` in practice but not required to be).
    pub fn next_keyslot_id(&self) -> String {
        (0u32..)
            .map(|i| i.to_string())
            .find(|id| !self.keyslots.contains_key(id))
            .unwrap()
    }

    /// Parse from a JSON text area, trimming the NUL padding the on-disk
    /// area is filled out to `config.json_size` with.
    pub fn parse(text: &[u8]) -> Result<Self> {
        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        serde_json::from_slice(&text[..end]).map_err(|_| Error::HeaderReadFailed)
    }

    /// Serialize to canonical form: alphabetically sorted object keys,
    /// decimal integers, no trailing whitespace. Does not pad to
    /// `json_size` — callers pad when writing to the device.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        let value = serde_json::to_value(self).map_err(|_| Error::HeaderWriteFailed)?;
        let sorted = sort_keys(value);
        serde_json::to_vec(&sorted).map_err(|_| Error::HeaderWriteFailed)
    }
}

fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> = map
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Luks2Metadata {
        let mut keyslots = BTreeMap::new();
        keyslots.insert(
            "0".to_string(),
            Keyslot2 {
                kind: "luks2".to_string(),
                key_size: 64,
                af: Af2 {
                    kind: "luks1".to_string(),
                    stripes: 4000,
                    hash: "sha256".to_string(),
                },
                area: Area2 {
                    kind: "raw".to_string(),
                    offset: "32768".to_string(),
                    size: "258048".to_string(),
                    encryption: "aes-xts-plain64".to_string(),
                    key_size: 64,
                },
                kdf: Kdf2::Argon2id {
                    time: 4,
                    memory: 1 << 20,
                    cpus: 4,
                    salt: encode_b64(&[0x11; 32]),
                },
            },
        );

        let mut segments = BTreeMap::new();
        segments.insert(
            "0".to_string(),
            Segment2 {
                kind: "crypt".to_string(),
                offset: "16777216".to_string(),
                size: "dynamic".to_string(),
                iv_tweak: "0".to_string(),
                encryption: "aes-xts-plain64".to_string(),
                sector_size: 512,
                integrity: None,
            },
        );

        let mut digests = BTreeMap::new();
        digests.insert(
            "0".to_string(),
            Digest2 {
                kind: "pbkdf2".to_string(),
                keyslots: vec!["0".to_string()],
                segments: vec!["0".to_string()],
                digest: encode_b64(&[0x22; 32]),
                salt: encode_b64(&[0x33; 32]),
                hash: "sha256".to_string(),
                iterations: 100_000,
            },
        );

        Luks2Metadata {
            keyslots,
            tokens: BTreeMap::new(),
            segments,
            digests,
            config: Config2 {
                json_size: "12288".to_string(),
                keyslots_size: "16744448".to_string(),
            },
        }
    }

    #[test]
    fn round_trips_through_canonical_json() {
        let metadata = sample();
        let encoded = metadata.to_canonical_json().unwrap();
        let decoded = Luks2Metadata::parse(&encoded).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn canonical_json_has_sorted_top_level_keys() {
        let metadata = sample();
        let encoded = metadata.to_canonical_json().unwrap();
        let text = String::from_utf8(encoded).unwrap();
        let config_pos = text.find("\"config\"").unwrap();
        let digests_pos = text.find("\"digests\"").unwrap();
        let keyslots_pos = text.find("\"keyslots\"").unwrap();
        let segments_pos = text.find("\"segments\"").unwrap();
        assert!(config_pos < digests_pos);
        assert!(digests_pos < keyslots_pos);
        assert!(keyslots_pos < segments_pos);
    }

    #[test]
    fn next_keyslot_id_skips_occupied_ids() {
        let metadata = sample();
        assert_eq!(metadata.next_keyslot_id(), "1");
    }

    #[test]
    fn parse_trims_nul_padding() {
        let metadata = sample();
        let mut padded = metadata.to_canonical_json().unwrap();
        padded.resize(512, 0);
        let decoded = Luks2Metadata::parse(&padded).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn rejects_malformed_base64() {
        assert!(decode_b64("not base64!!").is_err());
    }
}
