//! Property-based tests using proptest
//!
//! These tests check codec and framer invariants across randomly generated
//! values, message sizes and packet arrival orders.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use cubesat_link::config::FramerConfig;
use cubesat_link::core::codec::{BinaryDecoder, BinaryEncoder, Value};
use cubesat_link::core::packet::{Packet, HEADER_SIZE};
use cubesat_link::nvm::{self, Counter, MemoryNvm};
use cubesat_link::protocol::framer::PacketManager;
use cubesat_link::transport::LoopbackRadio;
use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

fn manager(radio: &LoopbackRadio) -> PacketManager<LoopbackRadio> {
    let counter = Counter::new(nvm::shared(MemoryNvm::new(1)), 0).unwrap();
    PacketManager::new(radio.clone(), "KK4XYZ", counter, FramerConfig::immediate())
}

#[derive(Debug, Clone)]
enum Input {
    Int(i64),
    Unsigned(u64),
    Double(f64),
    Text(String),
}

fn input_strategy() -> impl Strategy<Value = Input> {
    prop_oneof![
        any::<i64>().prop_map(Input::Int),
        any::<u64>().prop_map(Input::Unsigned),
        (-1.0e12..1.0e12f64).prop_map(Input::Double),
        "[a-zA-Z0-9 _-]{0,64}".prop_map(Input::Text),
    ]
}

// Property: decode(encode(values), key_map) recovers every value
proptest! {
    #[test]
    fn prop_codec_round_trip(inputs in prop::collection::vec(input_strategy(), 1..20)) {
        let mut encoder = BinaryEncoder::new();
        let mut expected = HashMap::new();

        for (i, input) in inputs.iter().enumerate() {
            let key = format!("field_{i}");
            let value = match input {
                Input::Int(v) => {
                    encoder.add_int(key.as_str(), *v, None).unwrap();
                    Value::Int(i128::from(*v))
                }
                Input::Unsigned(v) => {
                    encoder.add_int(key.as_str(), *v, None).unwrap();
                    Value::Int(i128::from(*v))
                }
                Input::Double(v) => {
                    encoder.add_float(key.as_str(), *v, true);
                    Value::Float(*v)
                }
                Input::Text(v) => {
                    encoder.add_string(key.as_str(), v, None).unwrap();
                    Value::Str(v.clone())
                }
            };
            expected.insert(key, value);
        }

        let data = encoder.to_bytes();
        prop_assert_eq!(data.len(), encoder.encoded_len());

        let decoder = BinaryDecoder::new(&data, Some(&encoder.key_map()));
        prop_assert_eq!(decoder.get_all(), &expected);
    }
}

// Property: decoding arbitrary bytes never panics and never yields more
// records than the buffer could hold
proptest! {
    #[test]
    fn prop_decoder_tolerates_garbage(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let decoder = BinaryDecoder::new(&data, None);
        prop_assert!(decoder.len() <= data.len() / 6);
    }
}

// Property: a valid blob cut anywhere decodes to a prefix of its fields
proptest! {
    #[test]
    fn prop_truncation_keeps_complete_records(
        values in prop::collection::vec(any::<i32>(), 1..10),
        cut in any::<prop::sample::Index>(),
    ) {
        let mut encoder = BinaryEncoder::new();
        for (i, v) in values.iter().enumerate() {
            encoder.add_int(format!("k{i}"), *v, None).unwrap();
        }
        let data = encoder.to_bytes();
        let cut = cut.index(data.len() + 1);

        let decoder = BinaryDecoder::new(&data[..cut], Some(&encoder.key_map()));
        for (i, (key, value)) in decoder.iter().enumerate() {
            prop_assert_eq!(key, format!("k{i}"));
            prop_assert_eq!(value, &Value::Int(i128::from(values[i])));
        }
    }
}

// Property: fragmentation produces ceil(len / payload) packets within the radio limit
proptest! {
    #[test]
    fn prop_fragmentation_bounds(
        data in prop::collection::vec(any::<u8>(), 0..2000),
        max_packet_size in (HEADER_SIZE + 1)..300usize,
    ) {
        let radio = LoopbackRadio::new(max_packet_size);
        let mut pm = manager(&radio);
        let packets = pm.pack_data(&data).unwrap();

        let payload = max_packet_size - HEADER_SIZE;
        prop_assert_eq!(packets.len(), data.len().div_ceil(payload));
        for (sequence, raw) in packets.iter().enumerate() {
            prop_assert!(raw.len() <= max_packet_size);
            let packet = Packet::from_bytes(raw).unwrap();
            prop_assert_eq!(usize::from(packet.header.sequence), sequence);
            prop_assert_eq!(usize::from(packet.header.total), packets.len());
        }
    }
}

// Property: reassembly is independent of arrival order
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn prop_reassembly_any_order(
        data in prop::collection::vec(any::<u8>(), 1..1500),
        max_packet_size in 16usize..128,
        seed in any::<u64>(),
    ) {
        let radio = LoopbackRadio::new(max_packet_size);
        let mut pm = manager(&radio);
        let mut packets = pm.pack_data(&data).unwrap();

        // Deterministic shuffle driven by the seed
        let mut state = seed | 1;
        for i in (1..packets.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            packets.swap(i, (state % (i as u64 + 1)) as usize);
        }

        radio.inject_all(packets);
        let received = pm.listen(Some(Duration::from_secs(1)));
        prop_assert_eq!(received, Some(data));
    }
}
