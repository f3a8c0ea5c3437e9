#![no_main]

use ase_protocol::{PACKET_HEADER_SIZE, PacketHeader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() >= PACKET_HEADER_SIZE {
        let mut cursor = data;
        if let Ok(header) = PacketHeader::decode(&mut cursor) {
            let encoded = header.encode_to_bytes();
            assert_eq!(&encoded[..], &data[..PACKET_HEADER_SIZE]);
        }
    }
});
