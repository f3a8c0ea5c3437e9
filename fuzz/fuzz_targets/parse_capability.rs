#![no_main]

use ase_protocol::package::CapabilityPackage;
use ase_protocol::{Package, PacketQueue, Token};
use ase_types::Endian;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut payload = vec![Token::Capability.as_u8()];
    payload.extend_from_slice(data);

    let mut queue = PacketQueue::from_payload(&payload, Endian::Little);
    if let Ok(Package::Capability(echo)) = Package::decode(&mut queue, None) {
        let _ = CapabilityPackage::client_default().check_echo(&echo);
    }
});
