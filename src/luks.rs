//! The `Luks` façade: format/open/add_key/remove_key/change_key/stat over
//! either on-disk version, dispatching to [`crate::luks1`] or
//! [`crate::luks2`] under one API. Mirrors the caching pattern
//! `struct crypt_device` uses in the library this core was distilled
//! from: parse the header once at open time, keep it in memory, and only
//! re-read from the device if a caller asks for something this handle
//! hasn't cached.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::config::{FormatOptions, KdfParams};
use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::keyslot_pipeline;
use crate::luks1::{self, Keyslot1, Luks1Header, NUM_KEYSLOTS};
use crate::luks2::{self, Af2, Area2, Config2, Digest2, Kdf2, Keyslot2, Luks2Metadata, Segment2};
use crate::primitives::hash::HashSpec;
use crate::secret::Secret;

/// Which on-disk format a device holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuksVersion {
    V1,
    V2,
}

/// Read-only layout summary, per §11.3.
#[derive(Debug, Clone)]
pub struct LuksStat {
    pub version: LuksVersion,
    pub uuid: String,
    pub cipher: String,
    pub key_bytes: usize,
    pub payload_offset_bytes: u64,
    pub payload_size_bytes: Option<u64>,
}

enum Inner {
    V1(Luks1Header),
    V2 {
        header: luks2::Luks2BinaryHeader,
        metadata: Luks2Metadata,
    },
}

/// An opened (or freshly formatted) LUKS volume, bound to one
/// [`BlockDevice`].
pub struct Luks {
    device: Box<dyn BlockDevice>,
    inner: Inner,
}

fn split_cipher_spec(cipher: &str) -> (String, String) {
    match cipher.split_once('-') {
        Some((name, mode)) => (name.to_string(), mode.to_string()),
        None => (cipher.to_string(), String::new()),
    }
}

fn gen_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Luks {
    /// Format `device` fresh as the given version, enrolling `passphrase`
    /// into keyslot 0.
    pub fn format(
        mut device: Box<dyn BlockDevice>,
        version: LuksVersion,
        opts: &FormatOptions,
        passphrase: &[u8],
    ) -> Result<Self> {
        debug!("formatting {:?} volume, cipher={}", version, opts.cipher);
        match version {
            LuksVersion::V1 => Self::format_v1(device.as_mut(), opts, passphrase).map(|header| {
                Luks {
                    device,
                    inner: Inner::V1(header),
                }
            }),
            LuksVersion::V2 => {
                Self::format_v2(device.as_mut(), opts, passphrase).map(|(header, metadata)| {
                    Luks {
                        device,
                        inner: Inner::V2 { header, metadata },
                    }
                })
            }
        }
    }

    fn format_v1(
        device: &mut dyn BlockDevice,
        opts: &FormatOptions,
        passphrase: &[u8],
    ) -> Result<Luks1Header> {
        if opts.integrity.is_some() {
            return Err(Error::Unsupported("LUKS1 has no integrity segment".into()));
        }

        let iterations = match &opts.keyslot_kdf {
            KdfParams::Pbkdf2 { iterations, .. } => *iterations,
            _ => return Err(Error::Unsupported("LUKS1 keyslots only support pbkdf2".into())),
        };

        let master_key: Secret = match &opts.master_key {
            Some(k) => k.clone(),
            None => {
                let mut k = vec![0u8; opts.key_bytes];
                crate::primitives::rng::random(&mut k);
                Secret::new(k)
            }
        };

        let (cipher_name, cipher_mode) = split_cipher_spec(&opts.cipher);

        let slot_area_sectors = (opts.af_stripes as usize * opts.key_bytes).div_ceil(512) as u32;
        let mut keyslots: Vec<Keyslot1> = (0..NUM_KEYSLOTS)
            .map(|i| Keyslot1 {
                active: false,
                iterations: 0,
                salt: [0u8; 32],
                key_material_offset_sectors: 8 + i as u32 * slot_area_sectors,
                stripes: opts.af_stripes,
            })
            .collect();

        let payload_offset_sectors = 8 + NUM_KEYSLOTS as u32 * slot_area_sectors;

        let mut mk_digest_salt = [0u8; 32];
        crate::primitives::rng::random(&mut mk_digest_salt);
        let digest = keyslot_pipeline::compute_master_key_digest(
            opts.hash,
            master_key.expose_secret(),
            &mk_digest_salt,
            opts.mk_iterations,
            20,
        )?;
        let mut mk_digest = [0u8; 20];
        mk_digest.copy_from_slice(&digest);

        let mut header = Luks1Header {
            cipher_name,
            cipher_mode,
            hash_spec: opts.hash.as_str().to_string(),
            payload_offset_sectors,
            key_bytes: opts.key_bytes as u32,
            mk_digest,
            mk_digest_salt,
            mk_digest_iter: opts.mk_iterations,
            uuid: gen_uuid(),
            keyslots: keyslots.clone().try_into().unwrap(),
        };

        let mut salt = [0u8; 32];
        crate::primitives::rng::random(&mut salt);
        let ciphertext = keyslot_pipeline::enroll(
            &opts.cipher,
            &opts.keyslot_kdf,
            opts.hash,
            passphrase,
            &salt,
            master_key.expose_secret(),
            opts.af_stripes,
        )?;

        keyslots[0].active = true;
        keyslots[0].iterations = iterations;
        keyslots[0].salt = salt;
        header.keyslots = keyslots.try_into().unwrap();

        luks1::write_key_material(device, &header.keyslots[0], &ciphertext)
            .map_err(|_| Error::KeyMaterialWriteFailed)?;
        luks1::write_header(device, &header)?;

        Ok(header)
    }

    fn format_v2(
        device: &mut dyn BlockDevice,
        opts: &FormatOptions,
        passphrase: &[u8],
    ) -> Result<(luks2::Luks2BinaryHeader, Luks2Metadata)> {
        if opts.integrity.is_some() && opts.cipher != keyslot_pipeline::KEYSLOT_WRAP_CIPHER {
            return Err(Error::Unsupported(format!(
                "integrity is only defined over {} segments, not {}",
                keyslot_pipeline::KEYSLOT_WRAP_CIPHER,
                opts.cipher
            )));
        }

        let master_key: Secret = match &opts.master_key {
            Some(k) => k.clone(),
            None => {
                let mut k = vec![0u8; opts.key_bytes];
                crate::primitives::rng::random(&mut k);
                Secret::new(k)
            }
        };

        let area_offset = luks2::DEFAULT_KEYSLOTS_AREA_OFFSET;
        let area_size = (opts.af_stripes as u64 * opts.key_bytes as u64).div_ceil(512) * 512;
        if area_size > luks2::DEFAULT_KEYSLOTS_AREA_SIZE {
            return Err(Error::DeviceTooSmall);
        }

        let mut salt = [0u8; 32];
        crate::primitives::rng::random(&mut salt);
        let area = Area2 {
            kind: "raw".to_string(),
            offset: area_offset.to_string(),
            size: area_size.to_string(),
            encryption: keyslot_pipeline::KEYSLOT_WRAP_CIPHER.to_string(),
            key_size: opts.key_bytes as u32,
        };
        let ciphertext = keyslot_pipeline::enroll(
            keyslot_pipeline::KEYSLOT_WRAP_CIPHER,
            &opts.keyslot_kdf,
            opts.hash,
            passphrase,
            &salt,
            master_key.expose_secret(),
            opts.af_stripes,
        )?;
        luks2::write_keyslot_area(device, &area, &ciphertext)?;

        let kdf2 = match &opts.keyslot_kdf {
            KdfParams::Pbkdf2 { iterations, hash } => Kdf2::Pbkdf2 {
                hash: hash.as_str().to_string(),
                iterations: *iterations,
                salt: luks2::encode_b64(&salt),
            },
            KdfParams::Argon2i {
                time_cost,
                memory_kib,
                lanes,
            } => Kdf2::Argon2i {
                time: *time_cost,
                memory: *memory_kib,
                cpus: *lanes,
                salt: luks2::encode_b64(&salt),
            },
            KdfParams::Argon2id {
                time_cost,
                memory_kib,
                lanes,
            } => Kdf2::Argon2id {
                time: *time_cost,
                memory: *memory_kib,
                cpus: *lanes,
                salt: luks2::encode_b64(&salt),
            },
        };

        let mut keyslots = BTreeMap::new();
        keyslots.insert(
            "0".to_string(),
            Keyslot2 {
                kind: "luks2".to_string(),
                key_size: opts.key_bytes as u32,
                af: Af2 {
                    kind: "luks1".to_string(),
                    stripes: opts.af_stripes,
                    hash: opts.hash.as_str().to_string(),
                },
                area,
                kdf: kdf2,
            },
        );

        let mut segments = BTreeMap::new();
        segments.insert(
            "0".to_string(),
            Segment2 {
                kind: "crypt".to_string(),
                offset: luks2::DEFAULT_PAYLOAD_OFFSET.to_string(),
                size: "dynamic".to_string(),
                iv_tweak: "0".to_string(),
                encryption: opts.cipher.clone(),
                sector_size: 512,
                integrity: opts.integrity.map(|alg| luks2::SegmentIntegrity2 {
                    kind: "journal-hmac".to_string(),
                    journal_encryption: "none".to_string(),
                    journal_integrity: alg.capi_name().to_string(),
                }),
            },
        );

        let mut digest_salt = [0u8; 32];
        crate::primitives::rng::random(&mut digest_salt);
        let digest_bytes = keyslot_pipeline::compute_master_key_digest(
            opts.hash,
            master_key.expose_secret(),
            &digest_salt,
            opts.mk_iterations,
            opts.hash.digest_len(),
        )?;
        let mut digests = BTreeMap::new();
        digests.insert(
            "0".to_string(),
            Digest2 {
                kind: "pbkdf2".to_string(),
                keyslots: vec!["0".to_string()],
                segments: vec!["0".to_string()],
                digest: luks2::encode_b64(&digest_bytes),
                salt: luks2::encode_b64(&digest_salt),
                hash: opts.hash.as_str().to_string(),
                iterations: opts.mk_iterations,
            },
        );

        let metadata = Luks2Metadata {
            keyslots,
            tokens: BTreeMap::new(),
            segments,
            digests,
            config: Config2 {
                json_size: luks2::DEFAULT_JSON_AREA_SIZE.to_string(),
                keyslots_size: luks2::DEFAULT_KEYSLOTS_AREA_SIZE.to_string(),
            },
        };

        let uuid = gen_uuid();
        luks2::write_metadata(
            device,
            0,
            luks2::DEFAULT_SECONDARY_OFFSET,
            luks2::DEFAULT_SECONDARY_OFFSET,
            &uuid,
            &metadata,
        )?;
        let (header, metadata) = luks2::read_metadata(device)?;
        Ok((header, metadata))
    }

    /// Open an existing device, auto-detecting LUKS1 vs LUKS2 by magic.
    pub fn open(mut device: Box<dyn BlockDevice>) -> Result<Self> {
        if let Ok(header) = luks1::read_header(device.as_mut()) {
            debug!("opened LUKS1 volume {}", header.uuid);
            return Ok(Luks {
                device,
                inner: Inner::V1(header),
            });
        }
        let (header, metadata) = luks2::read_metadata(device.as_mut())?;
        debug!("opened LUKS2 volume, seqid={}", header.seqid);
        Ok(Luks {
            device,
            inner: Inner::V2 { header, metadata },
        })
    }

    /// Recover the master key from `passphrase`, trying every active
    /// keyslot. Errors are never disambiguated per-slot.
    pub fn unlock(&mut self, passphrase: &[u8]) -> Result<Secret> {
        match &self.inner {
            Inner::V1(header) => {
                let header = header.clone();
                self.unlock_v1(header, passphrase)
            }
            Inner::V2 { metadata, .. } => {
                let metadata = metadata.clone();
                self.unlock_v2(metadata, passphrase)
            }
        }
    }

    fn unlock_v1(&mut self, header: Luks1Header, passphrase: &[u8]) -> Result<Secret> {
        self.find_unlocking_slot_v1(&header, passphrase)
            .map(|(_, master_key)| master_key)
    }

    /// Like [`Self::unlock_v1`] but also returns which slot matched, for
    /// `add_key`/`remove_key`/`change_key` to act on.
    fn find_unlocking_slot_v1(
        &mut self,
        header: &Luks1Header,
        passphrase: &[u8],
    ) -> Result<(usize, Secret)> {
        let hash = HashSpec::parse(&header.hash_spec)?;
        let cipher_spec = format!("{}-{}", header.cipher_name, header.cipher_mode);
        for slot_index in header.find_filled_slots() {
            let slot = &header.keyslots[slot_index];
            let ciphertext = match luks1::read_key_material(self.device.as_mut(), slot, header.key_bytes as usize)
            {
                Ok(c) => c,
                Err(_) => continue,
            };
            let kdf = KdfParams::Pbkdf2 {
                iterations: slot.iterations,
                hash,
            };
            let candidate = match keyslot_pipeline::recover_candidate(
                &cipher_spec,
                &kdf,
                hash,
                passphrase,
                &slot.salt,
                &ciphertext,
                slot.stripes,
                header.key_bytes as usize,
            ) {
                Ok(c) => c,
                Err(_) => continue,
            };
            if keyslot_pipeline::verify_candidate(
                hash,
                candidate.expose_secret(),
                &header.mk_digest_salt,
                header.mk_digest_iter,
                &header.mk_digest,
            )? {
                return Ok((slot_index, candidate));
            }
        }
        warn!("no LUKS1 keyslot matched the supplied passphrase");
        Err(Error::KeyLookupFailed)
    }

    fn unlock_v2(&mut self, metadata: Luks2Metadata, passphrase: &[u8]) -> Result<Secret> {
        self.find_unlocking_slot_v2(&metadata, passphrase)
            .map(|(_, master_key)| master_key)
    }

    /// Like [`Self::unlock_v2`] but also returns which slot id matched, for
    /// `add_key`/`remove_key`/`change_key` to act on.
    fn find_unlocking_slot_v2(
        &mut self,
        metadata: &Luks2Metadata,
        passphrase: &[u8],
    ) -> Result<(String, Secret)> {
        for (slot_id, slot) in metadata.keyslots.iter() {
            let digest = match find_digest_for_slot(metadata, slot_id) {
                Some(d) => d,
                None => continue,
            };
            let hash = match HashSpec::parse(&slot.af.hash) {
                Ok(h) => h,
                Err(_) => continue,
            };
            let salt = match kdf2_salt(&slot.kdf).and_then(|s| luks2::decode_b64(s).ok()) {
                Some(s) => s,
                None => continue,
            };
            let kdf = match kdf2_to_params(&slot.kdf) {
                Ok(k) => k,
                Err(_) => continue,
            };
            let ciphertext = match luks2::read_keyslot_area(self.device.as_mut(), &slot.area) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let candidate = match keyslot_pipeline::recover_candidate(
                &slot.area.encryption,
                &kdf,
                hash,
                passphrase,
                &salt,
                &ciphertext,
                slot.af.stripes,
                slot.key_size as usize,
            ) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let digest_hash = match HashSpec::parse(&digest.hash) {
                Ok(h) => h,
                Err(_) => continue,
            };
            let digest_salt = match luks2::decode_b64(&digest.salt) {
                Ok(s) => s,
                Err(_) => continue,
            };
            let expected = match luks2::decode_b64(&digest.digest) {
                Ok(d) => d,
                Err(_) => continue,
            };
            if keyslot_pipeline::verify_candidate(
                digest_hash,
                candidate.expose_secret(),
                &digest_salt,
                digest.iterations,
                &expected,
            )? {
                return Ok((slot_id.clone(), candidate));
            }
        }
        warn!("no LUKS2 keyslot matched the supplied passphrase");
        Err(Error::KeyLookupFailed)
    }

    /// Enroll `new_passphrase` into a fresh keyslot, provided
    /// `existing_passphrase` unlocks the volume. The new keyslot protects
    /// the same master key as every other active slot.
    pub fn add_key(
        &mut self,
        existing_passphrase: &[u8],
        new_passphrase: &[u8],
        kdf: KdfParams,
    ) -> Result<()> {
        match &self.inner {
            Inner::V1(header) => {
                let header = header.clone();
                self.add_key_v1(header, existing_passphrase, new_passphrase, kdf)
            }
            Inner::V2 { metadata, .. } => {
                let metadata = metadata.clone();
                self.add_key_v2(metadata, existing_passphrase, new_passphrase, kdf)
            }
        }
    }

    fn add_key_v1(
        &mut self,
        mut header: Luks1Header,
        existing_passphrase: &[u8],
        new_passphrase: &[u8],
        kdf: KdfParams,
    ) -> Result<()> {
        let (_, master_key) = self.find_unlocking_slot_v1(&header, existing_passphrase)?;
        let iterations = match kdf {
            KdfParams::Pbkdf2 { iterations, .. } => iterations,
            _ => return Err(Error::Unsupported("LUKS1 keyslots only support pbkdf2".into())),
        };
        let hash = HashSpec::parse(&header.hash_spec)?;
        let slot_index = header.find_free_slot()?;
        let stripes = header.keyslots[slot_index].stripes;

        let mut salt = [0u8; 32];
        crate::primitives::rng::random(&mut salt);
        let cipher_spec = format!("{}-{}", header.cipher_name, header.cipher_mode);
        let ciphertext = keyslot_pipeline::enroll(
            &cipher_spec,
            &KdfParams::Pbkdf2 { iterations, hash },
            hash,
            new_passphrase,
            &salt,
            master_key.expose_secret(),
            stripes,
        )?;
        luks1::write_key_material(self.device.as_mut(), &header.keyslots[slot_index], &ciphertext)
            .map_err(|_| Error::KeyMaterialWriteFailed)?;

        header.keyslots[slot_index].active = true;
        header.keyslots[slot_index].iterations = iterations;
        header.keyslots[slot_index].salt = salt;
        luks1::write_header(self.device.as_mut(), &header)?;
        self.inner = Inner::V1(header);
        Ok(())
    }

    fn add_key_v2(
        &mut self,
        mut metadata: Luks2Metadata,
        existing_passphrase: &[u8],
        new_passphrase: &[u8],
        kdf: KdfParams,
    ) -> Result<()> {
        let (unlocked_slot_id, master_key) =
            self.find_unlocking_slot_v2(&metadata, existing_passphrase)?;
        let template = metadata
            .keyslots
            .get(&unlocked_slot_id)
            .expect("slot id just returned by find_unlocking_slot_v2 must be present")
            .clone();

        let new_slot_id = metadata.next_keyslot_id();
        let area_offset = next_free_area_offset(&metadata);
        let area_size = (template.af.stripes as u64 * template.key_size as u64).div_ceil(512) * 512;
        if area_offset + area_size > luks2::DEFAULT_KEYSLOTS_AREA_OFFSET + luks2::DEFAULT_KEYSLOTS_AREA_SIZE {
            return Err(Error::OutOfKeyslots);
        }

        let mut salt = [0u8; 32];
        crate::primitives::rng::random(&mut salt);
        let hash = HashSpec::parse(&template.af.hash)?;
        let ciphertext = keyslot_pipeline::enroll(
            keyslot_pipeline::KEYSLOT_WRAP_CIPHER,
            &kdf,
            hash,
            new_passphrase,
            &salt,
            master_key.expose_secret(),
            template.af.stripes,
        )?;
        let area = Area2 {
            kind: "raw".to_string(),
            offset: area_offset.to_string(),
            size: area_size.to_string(),
            encryption: keyslot_pipeline::KEYSLOT_WRAP_CIPHER.to_string(),
            key_size: template.key_size,
        };
        luks2::write_keyslot_area(self.device.as_mut(), &area, &ciphertext)?;

        let kdf2 = match &kdf {
            KdfParams::Pbkdf2 { iterations, hash } => Kdf2::Pbkdf2 {
                hash: hash.as_str().to_string(),
                iterations: *iterations,
                salt: luks2::encode_b64(&salt),
            },
            KdfParams::Argon2i { time_cost, memory_kib, lanes } => Kdf2::Argon2i {
                time: *time_cost,
                memory: *memory_kib,
                cpus: *lanes,
                salt: luks2::encode_b64(&salt),
            },
            KdfParams::Argon2id { time_cost, memory_kib, lanes } => Kdf2::Argon2id {
                time: *time_cost,
                memory: *memory_kib,
                cpus: *lanes,
                salt: luks2::encode_b64(&salt),
            },
        };

        metadata.keyslots.insert(
            new_slot_id.clone(),
            Keyslot2 {
                kind: "luks2".to_string(),
                key_size: template.key_size,
                af: template.af.clone(),
                area,
                kdf: kdf2,
            },
        );
        if let Some(digest) = metadata
            .digests
            .values_mut()
            .find(|d| d.keyslots.iter().any(|k| *k == unlocked_slot_id))
        {
            digest.keyslots.push(new_slot_id);
        }

        self.persist_v2(metadata)
    }

    /// Remove the keyslot that `passphrase` unlocks and wipe its area.
    /// Refuses to remove the last active keyslot.
    pub fn remove_key(&mut self, passphrase: &[u8]) -> Result<()> {
        match &self.inner {
            Inner::V1(header) => {
                let header = header.clone();
                self.remove_key_v1(header, passphrase)
            }
            Inner::V2 { metadata, .. } => {
                let metadata = metadata.clone();
                self.remove_key_v2(metadata, passphrase)
            }
        }
    }

    fn remove_key_v1(&mut self, mut header: Luks1Header, passphrase: &[u8]) -> Result<()> {
        if header.find_filled_slots().len() <= 1 {
            return Err(Error::LastKeyslot);
        }
        let (slot_index, _) = self.find_unlocking_slot_v1(&header, passphrase)?;
        let slot = header.keyslots[slot_index].clone();
        let mut wipe = vec![0u8; slot.stripes as usize * header.key_bytes as usize];
        crate::primitives::rng::random(&mut wipe);
        luks1::write_key_material(self.device.as_mut(), &slot, &wipe)
            .map_err(|_| Error::KeyMaterialWriteFailed)?;

        header.keyslots[slot_index].active = false;
        header.keyslots[slot_index].iterations = 0;
        header.keyslots[slot_index].salt = [0u8; 32];
        luks1::write_header(self.device.as_mut(), &header)?;
        self.inner = Inner::V1(header);
        Ok(())
    }

    fn remove_key_v2(&mut self, mut metadata: Luks2Metadata, passphrase: &[u8]) -> Result<()> {
        if metadata.keyslots.len() <= 1 {
            return Err(Error::LastKeyslot);
        }
        let (slot_id, _) = self.find_unlocking_slot_v2(&metadata, passphrase)?;
        let slot = metadata
            .keyslots
            .get(&slot_id)
            .expect("slot id just returned by find_unlocking_slot_v2 must be present")
            .clone();

        let area_size = luks2::parse_decimal(&slot.area.size)?;
        let mut wipe = vec![0u8; area_size as usize];
        crate::primitives::rng::random(&mut wipe);
        luks2::write_keyslot_area(self.device.as_mut(), &slot.area, &wipe)?;

        metadata.keyslots.remove(&slot_id);
        for digest in metadata.digests.values_mut() {
            digest.keyslots.retain(|k| *k != slot_id);
        }

        self.persist_v2(metadata)
    }

    /// Enroll `new_passphrase` into a new slot, then remove the slot
    /// `old_passphrase` unlocks. The new slot is written and durable
    /// before the old one is wiped, so a crash mid-operation always
    /// leaves at least one working passphrase.
    pub fn change_key(
        &mut self,
        old_passphrase: &[u8],
        new_passphrase: &[u8],
        kdf: KdfParams,
    ) -> Result<()> {
        self.add_key(old_passphrase, new_passphrase, kdf)?;
        self.remove_key(old_passphrase)
    }

    /// Re-read canonical on-disk state after a LUKS2 metadata write, the
    /// same way `format_v2` does.
    fn persist_v2(&mut self, metadata: Luks2Metadata) -> Result<()> {
        let Inner::V2 { header, .. } = &self.inner else {
            unreachable!("persist_v2 only called for LUKS2 volumes")
        };
        let current_seqid = header.seqid;
        let hdr_size = header.hdr_size;
        let uuid = header.uuid.clone();
        let secondary_offset = header.hdr_offset_of_secondary();

        luks2::write_metadata(
            self.device.as_mut(),
            current_seqid,
            hdr_size,
            secondary_offset,
            &uuid,
            &metadata,
        )?;
        let (header, metadata) = luks2::read_metadata(self.device.as_mut())?;
        self.inner = Inner::V2 { header, metadata };
        Ok(())
    }

    /// Release this handle, returning the underlying device.
    pub fn into_device(self) -> Box<dyn BlockDevice> {
        self.device
    }

    /// Read-only layout summary, per §11.3.
    pub fn stat(&self) -> LuksStat {
        match &self.inner {
            Inner::V1(header) => LuksStat {
                version: LuksVersion::V1,
                uuid: header.uuid.clone(),
                cipher: format!("{}-{}", header.cipher_name, header.cipher_mode),
                key_bytes: header.key_bytes as usize,
                payload_offset_bytes: header.payload_offset_sectors as u64 * 512,
                payload_size_bytes: None,
            },
            Inner::V2 { header, metadata } => {
                let segment = metadata.segments.get("0");
                LuksStat {
                    version: LuksVersion::V2,
                    uuid: header.uuid.clone(),
                    cipher: segment
                        .map(|s| s.encryption.clone())
                        .unwrap_or_default(),
                    key_bytes: metadata
                        .keyslots
                        .get("0")
                        .map(|s| s.key_size as usize)
                        .unwrap_or(0),
                    payload_offset_bytes: segment
                        .and_then(|s| s.offset.parse().ok())
                        .unwrap_or(0),
                    payload_size_bytes: segment.and_then(|s| s.size.parse().ok()),
                }
            }
        }
    }
}

/// Byte offset a newly enrolled keyslot's area can start at without
/// overlapping any existing keyslot's area.
fn next_free_area_offset(metadata: &Luks2Metadata) -> u64 {
    metadata
        .keyslots
        .values()
        .filter_map(|slot| {
            let offset = luks2::parse_decimal(&slot.area.offset).ok()?;
            let size = luks2::parse_decimal(&slot.area.size).ok()?;
            Some(offset + size)
        })
        .max()
        .unwrap_or(luks2::DEFAULT_KEYSLOTS_AREA_OFFSET)
}

fn find_digest_for_slot<'a>(metadata: &'a Luks2Metadata, slot_id: &str) -> Option<&'a Digest2> {
    metadata
        .digests
        .values()
        .find(|d| d.keyslots.iter().any(|k| k == slot_id))
}

fn kdf2_salt(kdf: &Kdf2) -> Option<&str> {
    match kdf {
        Kdf2::Pbkdf2 { salt, .. } => Some(salt),
        Kdf2::Argon2i { salt, .. } => Some(salt),
        Kdf2::Argon2id { salt, .. } => Some(salt),
    }
}

fn kdf2_to_params(kdf: &Kdf2) -> Result<KdfParams> {
    Ok(match kdf {
        Kdf2::Pbkdf2 { hash, iterations, .. } => KdfParams::Pbkdf2 {
            iterations: *iterations,
            hash: HashSpec::parse(hash)?,
        },
        Kdf2::Argon2i { time, memory, cpus, .. } => KdfParams::Argon2i {
            time_cost: *time,
            memory_kib: *memory,
            lanes: *cpus,
        },
        Kdf2::Argon2id { time, memory, cpus, .. } => KdfParams::Argon2id {
            time_cost: *time,
            memory_kib: *memory,
            lanes: *cpus,
        },
    })
}
