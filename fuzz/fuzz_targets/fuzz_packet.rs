#![no_main]

use libfuzzer_sys::fuzz_target;
use cubesat_link::Packet;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = Packet::from_bytes(data) {
        assert_eq!(packet.to_bytes(), data);
    }
});
