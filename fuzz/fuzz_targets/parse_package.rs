#![no_main]

use ase_protocol::{Package, PacketQueue};
use ase_types::Endian;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&first, payload)) = data.split_first() else {
        return;
    };
    let endian = if first & 1 == 0 { Endian::Little } else { Endian::Big };

    // Decode a whole message the way a channel does, chaining formats.
    let mut queue = PacketQueue::from_payload(payload, endian);
    let mut preceding: Option<Package> = None;
    while !queue.all_packets_consumed() {
        match Package::decode(&mut queue, preceding.as_ref()) {
            Ok(package) => {
                let _ = package.to_string();
                preceding = Some(package);
            }
            Err(_) => break,
        }
    }
});
