#![no_main]

use libfuzzer_sys::fuzz_target;
use cubesat_link::core::codec::BinaryDecoder;

fuzz_target!(|data: &[u8]| {
    // Arbitrary blobs must decode to a (possibly empty) prefix without panicking
    let decoder = BinaryDecoder::new(data, None);
    for (_, value) in decoder.iter() {
        let _ = value.to_string();
    }
});
