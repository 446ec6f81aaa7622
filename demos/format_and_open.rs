//! Minimal end-to-end demonstration: format a LUKS2 volume backed by an
//! in-memory device, close it, reopen it, and recover the master key.
//! Not a diagnostic CLI — that façade is out of scope for this crate.

use luks_core::config::FormatOptions;
use luks_core::device::{BlockDevice, MemBlockDevice};
use luks_core::luks::{Luks, LuksVersion};

fn main() {
    env_logger::init();

    let device: Box<dyn BlockDevice> = Box::new(MemBlockDevice::new(32 * 1024 * 1024));
    let opts = FormatOptions::default();
    let passphrase = b"correct horse battery staple";

    let luks = Luks::format(device, LuksVersion::V2, &opts, passphrase)
        .expect("format should succeed on a freshly allocated device");
    let stat = luks.stat();
    println!(
        "formatted {:?} volume {} (cipher {}, payload offset {} bytes)",
        stat.version, stat.uuid, stat.cipher, stat.payload_offset_bytes
    );

    let device = luks.into_device();
    let mut reopened = Luks::open(device).expect("reopening a just-formatted device must succeed");
    let master_key = reopened
        .unlock(passphrase)
        .expect("the enrolled passphrase must recover the master key");
    println!("recovered a {}-byte master key after reopening", master_key.len());
}
