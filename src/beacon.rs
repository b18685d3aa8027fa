//! # Telemetry Beacon
//!
//! Periodic status message built from the satellite's name, its uptime, and
//! a list of telemetry sources, encoded with the binary codec and sent
//! through the packet framer.
//!
//! Sources contribute fields under `<name>_<index>_<quantity>` keys, where
//! `index` is the source's position in the beacon. A source whose read fails
//! is logged and left out of that beacon; the rest still go out.
//!
//! ## Field encoding
//! - booleans and integers: auto-sized integers
//! - floats: single-precision floats
//! - 3-vectors: three floats suffixed `_0`, `_1`, `_2`
//! - timestamped samples: `<key>_timestamp` plus `<key>_value` (or `_value_0..2`)
//! - text: length-prefixed strings

use crate::core::codec::{BinaryDecoder, BinaryEncoder, Value};
use crate::error::Result;
use crate::nvm::{Counter, Flag};
use crate::protocol::framer::PacketManager;
use crate::transport::Transport;
use crate::utils::metrics::global_metrics;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error};

/// Readings averaged per power-monitor quantity
pub const POWER_AVERAGE_SAMPLES: usize = 50;

/// Sensor value with the time it was taken
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: f64,
    pub value: SampleValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    Scalar(f64),
    Vector([f64; 3]),
}

/// One beacon field before encoding
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Bool(bool),
    Int(i64),
    Float(f64),
    Vector([f64; 3]),
    Text(String),
    Sample(Sample),
}

/// Ordered beacon fields. Re-inserting a key replaces it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeaconState {
    entries: Vec<(String, Reading)>,
}

impl BeaconState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, reading: Reading) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = reading,
            None => self.entries.push((key, reading)),
        }
    }

    /// Insert a reading, or log and skip it if the read failed
    pub fn record(&mut self, key: String, reading: Result<Reading>, sensor: &str, index: usize) {
        match reading {
            Ok(reading) => self.insert(key, reading),
            Err(e) => error!(
                error = %e,
                sensor,
                index,
                key = %key,
                "Error retrieving sensor reading"
            ),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Reading> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, reading)| reading)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Reading)> {
        self.entries.iter().map(|(key, reading)| (key.as_str(), reading))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for BeaconState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, reading) in &self.entries {
            map.serialize_entry(key, reading)?;
        }
        map.end()
    }
}

/// Anything that contributes fields to the beacon
pub trait TelemetrySource {
    /// Add current readings; `index` is the source's position in the beacon
    fn collect(&self, index: usize, state: &mut BeaconState);

    /// Add placeholder readings under every key `collect` can produce
    fn template(&self, index: usize, state: &mut BeaconState);
}

impl TelemetrySource for Counter {
    fn collect(&self, index: usize, state: &mut BeaconState) {
        let reading = self.get().map(|value| Reading::Int(i64::from(value)));
        state.record(format!("{}_{index}", self.name()), reading, "counter", index);
    }

    fn template(&self, index: usize, state: &mut BeaconState) {
        state.insert(format!("{}_{index}", self.name()), Reading::Int(0));
    }
}

impl TelemetrySource for Flag {
    fn collect(&self, index: usize, state: &mut BeaconState) {
        let reading = self.get().map(Reading::Bool);
        state.record(format!("{}_{index}", self.name()), reading, "flag", index);
    }

    fn template(&self, index: usize, state: &mut BeaconState) {
        state.insert(format!("{}_{index}", self.name()), Reading::Bool(false));
    }
}

pub trait TemperatureSource {
    fn name(&self) -> &str;

    /// Temperature in degrees Celsius
    fn temperature(&self) -> Result<Sample>;
}

pub trait ImuSource {
    fn name(&self) -> &str;

    /// Acceleration in m/s²
    fn acceleration(&self) -> Result<Sample>;

    /// Angular velocity in rad/s
    fn angular_velocity(&self) -> Result<Sample>;
}

pub trait PowerMonitorSource {
    fn name(&self) -> &str;

    /// Current in mA
    fn current(&self) -> Result<f64>;

    /// Bus voltage in V
    fn bus_voltage(&self) -> Result<f64>;

    /// Shunt voltage in V
    fn shunt_voltage(&self) -> Result<f64>;
}

/// Mean of `count` successive readings; the first failure aborts
pub fn average_readings<F>(mut read: F, count: usize) -> Result<f64>
where
    F: FnMut() -> Result<f64>,
{
    let mut sum = 0.0;
    for _ in 0..count {
        sum += read()?;
    }
    Ok(if count == 0 { 0.0 } else { sum / count as f64 })
}

fn zero_sample(value: SampleValue) -> Reading {
    Reading::Sample(Sample {
        timestamp: 0.0,
        value,
    })
}

pub struct TemperatureTelemetry<S>(pub S);

impl<S: TemperatureSource> TelemetrySource for TemperatureTelemetry<S> {
    fn collect(&self, index: usize, state: &mut BeaconState) {
        let name = self.0.name();
        let reading = self.0.temperature().map(Reading::Sample);
        state.record(format!("{name}_{index}_temperature"), reading, name, index);
    }

    fn template(&self, index: usize, state: &mut BeaconState) {
        let name = self.0.name();
        state.insert(
            format!("{name}_{index}_temperature"),
            zero_sample(SampleValue::Scalar(0.0)),
        );
    }
}

pub struct ImuTelemetry<S>(pub S);

impl<S: ImuSource> TelemetrySource for ImuTelemetry<S> {
    fn collect(&self, index: usize, state: &mut BeaconState) {
        let name = self.0.name();
        state.record(
            format!("{name}_{index}_acceleration"),
            self.0.acceleration().map(Reading::Sample),
            name,
            index,
        );
        state.record(
            format!("{name}_{index}_angular_velocity"),
            self.0.angular_velocity().map(Reading::Sample),
            name,
            index,
        );
    }

    fn template(&self, index: usize, state: &mut BeaconState) {
        let name = self.0.name();
        for quantity in ["acceleration", "angular_velocity"] {
            state.insert(
                format!("{name}_{index}_{quantity}"),
                zero_sample(SampleValue::Vector([0.0; 3])),
            );
        }
    }
}

pub struct PowerTelemetry<S>(pub S);

impl<S: PowerMonitorSource> TelemetrySource for PowerTelemetry<S> {
    fn collect(&self, index: usize, state: &mut BeaconState) {
        let sensor = &self.0;
        let name = sensor.name();
        let samples = POWER_AVERAGE_SAMPLES;
        let averages = [
            ("current_avg", average_readings(|| sensor.current(), samples)),
            ("bus_voltage_avg", average_readings(|| sensor.bus_voltage(), samples)),
            ("shunt_voltage_avg", average_readings(|| sensor.shunt_voltage(), samples)),
        ];
        for (quantity, average) in averages {
            state.record(
                format!("{name}_{index}_{quantity}"),
                average.map(Reading::Float),
                name,
                index,
            );
        }
    }

    fn template(&self, index: usize, state: &mut BeaconState) {
        let name = self.0.name();
        for quantity in ["current_avg", "bus_voltage_avg", "shunt_voltage_avg"] {
            state.insert(format!("{name}_{index}_{quantity}"), Reading::Float(0.0));
        }
    }
}

/// Reports a radio's current modulation
pub struct RadioTelemetry<T> {
    name: String,
    radio: T,
}

impl<T: Transport> RadioTelemetry<T> {
    pub fn new(name: impl Into<String>, radio: T) -> Self {
        Self {
            name: name.into(),
            radio,
        }
    }
}

impl<T: Transport> TelemetrySource for RadioTelemetry<T> {
    fn collect(&self, index: usize, state: &mut BeaconState) {
        state.insert(
            format!("{}_{index}_modulation", self.name),
            Reading::Text(self.radio.modulation().name().to_string()),
        );
    }

    fn template(&self, index: usize, state: &mut BeaconState) {
        state.insert(
            format!("{}_{index}_modulation", self.name),
            Reading::Text("template".to_string()),
        );
    }
}

/// Status beacon
pub struct Beacon {
    name: String,
    boot_time: Instant,
    sources: Vec<Box<dyn TelemetrySource>>,
}

impl Beacon {
    pub fn new(name: impl Into<String>, boot_time: Instant) -> Self {
        Self {
            name: name.into(),
            boot_time,
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl TelemetrySource + 'static) -> Self {
        self.add_source(source);
        self
    }

    pub fn add_source(&mut self, source: impl TelemetrySource + 'static) {
        self.sources.push(Box::new(source));
    }

    /// Collect the current beacon fields
    pub fn build_state(&self) -> BeaconState {
        let mut state = BeaconState::new();
        state.insert("name", Reading::Text(self.name.clone()));
        state.insert(
            "uptime",
            Reading::Float(self.boot_time.elapsed().as_secs_f64()),
        );
        for (index, source) in self.sources.iter().enumerate() {
            source.collect(index, &mut state);
        }
        state
    }

    /// Encode a state with the binary codec
    pub fn encode(state: &BeaconState) -> Result<BinaryEncoder> {
        let mut encoder = BinaryEncoder::new();
        for (key, reading) in state.iter() {
            encode_reading(&mut encoder, key, reading)?;
        }
        Ok(encoder)
    }

    /// Send the beacon in binary form
    pub fn send<T: Transport>(&self, packet_manager: &mut PacketManager<T>) -> bool {
        let state = self.build_state();
        let data = match Self::encode(&state) {
            Ok(mut encoder) => encoder.to_bytes(),
            Err(e) => {
                error!(error = %e, "Failed to encode beacon");
                return false;
            }
        };
        debug!(fields = state.len(), bytes = data.len(), "Sending beacon");
        let sent = packet_manager.send(&data);
        if sent {
            global_metrics().beacon_sent();
        }
        sent
    }

    /// Send the beacon as compact JSON
    pub fn send_json<T: Transport>(&self, packet_manager: &mut PacketManager<T>) -> bool {
        let state = self.build_state();
        match serde_json::to_vec(&state) {
            Ok(data) => {
                let sent = packet_manager.send(&data);
                if sent {
                    global_metrics().beacon_sent();
                }
                sent
            }
            Err(e) => {
                error!(error = %e, "Failed to serialize beacon");
                false
            }
        }
    }

    /// Key map covering every field this beacon can send, including fields
    /// of sources whose reads would currently fail.
    pub fn generate_key_mapping(&self) -> Result<HashMap<u32, String>> {
        let mut state = BeaconState::new();
        state.insert("name", Reading::Text(self.name.clone()));
        state.insert("uptime", Reading::Float(0.0));
        for (index, source) in self.sources.iter().enumerate() {
            source.template(index, &mut state);
        }

        let mut encoder = Self::encode(&state)?;
        encoder.to_bytes();
        Ok(encoder.key_map())
    }

    /// Decode a received binary beacon
    pub fn decode_binary_beacon(
        data: &[u8],
        key_map: Option<&HashMap<u32, String>>,
    ) -> HashMap<String, Value> {
        BinaryDecoder::new(data, key_map).into_map()
    }
}

fn encode_reading(encoder: &mut BinaryEncoder, key: &str, reading: &Reading) -> Result<()> {
    match reading {
        Reading::Bool(value) => encoder.add_int(key, u8::from(*value), None)?,
        Reading::Int(value) => encoder.add_int(key, *value, None)?,
        Reading::Float(value) => encoder.add_float(key, *value, false),
        Reading::Vector(values) => encode_vector(encoder, key, values),
        Reading::Text(value) => encoder.add_string(key, value, None)?,
        Reading::Sample(sample) => {
            encoder.add_float(format!("{key}_timestamp"), sample.timestamp, false);
            match sample.value {
                SampleValue::Scalar(value) => {
                    encoder.add_float(format!("{key}_value"), value, false)
                }
                SampleValue::Vector(values) => {
                    encode_vector(encoder, &format!("{key}_value"), &values)
                }
            }
        }
    }
    Ok(())
}

fn encode_vector(encoder: &mut BinaryEncoder, key: &str, values: &[f64; 3]) {
    for (i, value) in values.iter().enumerate() {
        encoder.add_float(format!("{key}_{i}"), *value, false);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::error::ProtocolError;

    struct FailingThermometer;

    impl TemperatureSource for FailingThermometer {
        fn name(&self) -> &str {
            "MCP9808"
        }

        fn temperature(&self) -> Result<Sample> {
            Err(ProtocolError::SensorError("i2c timeout".to_string()))
        }
    }

    #[test]
    fn test_failed_read_is_skipped() {
        let beacon = Beacon::new("Orbiter", Instant::now())
            .with_source(TemperatureTelemetry(FailingThermometer));
        let state = beacon.build_state();

        assert_eq!(state.len(), 2);
        assert!(state.get("MCP9808_0_temperature").is_none());
    }

    #[test]
    fn test_state_replaces_in_place() {
        let mut state = BeaconState::new();
        state.insert("a", Reading::Int(1));
        state.insert("b", Reading::Int(2));
        state.insert("a", Reading::Int(3));

        let keys: Vec<&str> = state.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(state.get("a"), Some(&Reading::Int(3)));
    }

    #[test]
    fn test_sample_encoding_keys() {
        let mut state = BeaconState::new();
        state.insert(
            "imu_0_acceleration",
            Reading::Sample(Sample {
                timestamp: 1.5,
                value: SampleValue::Vector([0.5, -1.0, 9.75]),
            }),
        );
        state.insert("flag", Reading::Bool(true));

        let mut encoder = Beacon::encode(&state).expect("encode");
        let data = encoder.to_bytes();
        let decoded = Beacon::decode_binary_beacon(&data, Some(&encoder.key_map()));

        assert_eq!(decoded.len(), 5);
        assert_eq!(decoded["imu_0_acceleration_timestamp"], Value::Float(1.5));
        assert_eq!(decoded["imu_0_acceleration_value_2"], Value::Float(9.75));
        assert_eq!(decoded["flag"], Value::Int(1));
    }

    #[test]
    fn test_average_readings() {
        let mut n = 0.0;
        let avg = average_readings(
            || {
                n += 1.0;
                Ok(n)
            },
            4,
        )
        .expect("average");
        assert_eq!(avg, 2.5);
    }
}
