// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::config::{FramerConfig, SatelliteConfig};
use crate::nvm::{shared, Counter, MemoryNvm};
use crate::protocol::command::*;
use crate::protocol::framer::{PacketManager, ACK};
use crate::transport::LoopbackRadio;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Clone, Default)]
struct SharedReset(Rc<Cell<u32>>);

impl ResetController for SharedReset {
    fn reset(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

fn station(radio: &LoopbackRadio, nvm_index: usize) -> PacketManager<LoopbackRadio> {
    let counter = Counter::new(shared(MemoryNvm::new(8)), nvm_index).unwrap();
    PacketManager::new(radio.clone(), "KK4XYZ", counter, FramerConfig::immediate())
}

fn satellite_config() -> SatelliteConfig {
    SatelliteConfig::default_with_overrides(|config| {
        config.cubesat_name = "Orbiter".to_string();
        config.super_secret_code = "hunter2".to_string();
        config.jokes = vec!["Why did the satellite cross the orbit?".to_string()];
        config.command.ack_delay = Duration::ZERO;
    })
}

#[test]
fn test_ground_to_satellite_round_trip() {
    // =================== Link setup ===================
    let (sat_radio, ground_radio) = LoopbackRadio::pair(24);
    let reset = SharedReset::default();
    let mut handler = CommandDataHandler::with_rng(
        station(&sat_radio, 0),
        satellite_config(),
        reset.clone(),
        StdRng::seed_from_u64(7),
    );
    let mut ground = station(&ground_radio, 1);

    // =================== Ground sends a multi-packet command ===================
    let envelope = CommandEnvelope::new("hunter2", "Orbiter", COMMAND_SEND_JOKE)
        .to_bytes()
        .expect("Envelope should serialize");
    assert!(envelope.len() > 18, "envelope should span several packets");
    assert!(ground.send(&envelope));

    // =================== Satellite handles it ===================
    let outcome = handler.listen_for_commands(Some(Duration::from_millis(200)));
    assert_eq!(
        outcome,
        Some(CommandOutcome::Dispatched(COMMAND_SEND_JOKE.to_string()))
    );

    // =================== Ground hears ACK then the joke ===================
    let ack = ground.listen(Some(Duration::from_millis(200))).unwrap();
    assert_eq!(ack, ACK);
    let joke = ground.listen(Some(Duration::from_millis(200))).unwrap();
    assert_eq!(joke, b"Why did the satellite cross the orbit?");
    assert_eq!(reset.0.get(), 0);
}

#[test]
fn test_reset_restarts_once() {
    let (sat_radio, ground_radio) = LoopbackRadio::pair(64);
    let reset = SharedReset::default();
    let mut handler = CommandDataHandler::with_rng(
        station(&sat_radio, 0),
        satellite_config(),
        reset.clone(),
        StdRng::seed_from_u64(1),
    );

    let envelope = CommandEnvelope::new("hunter2", "Orbiter", COMMAND_RESET)
        .to_bytes()
        .unwrap();
    let outcome = handler.process_message(&envelope).unwrap();

    assert_eq!(outcome, CommandOutcome::Dispatched(COMMAND_RESET.to_string()));
    assert_eq!(reset.0.get(), 1);

    let mut ground = station(&ground_radio, 1);
    assert_eq!(ground.listen(Some(Duration::from_millis(100))).unwrap(), ACK);
    assert_eq!(
        ground.listen(Some(Duration::from_millis(100))).unwrap(),
        b"Resetting satellite"
    );
}

#[test]
fn test_custom_command_sees_args() {
    let radio = LoopbackRadio::new(64);
    let mut handler = CommandDataHandler::with_rng(
        station(&radio, 0),
        satellite_config(),
        SharedReset::default(),
        StdRng::seed_from_u64(1),
    );
    handler.register_command("echo", |ctx, args| {
        ctx.packet_manager.send(args.join(" ").as_bytes());
        Ok(())
    });

    let envelope = CommandEnvelope::new("hunter2", "Orbiter", "echo")
        .with_args(["hello", "orbit"])
        .to_bytes()
        .unwrap();
    handler.process_message(&envelope).unwrap();

    let sent = radio.take_sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(&sent[1][6..], b"hello orbit");
}

#[test]
fn test_error_report_is_truncated() {
    let long = ProtocolErrorProbe("x".repeat(500));
    let report = format_error_report(&long);
    assert_eq!(report.chars().count(), ERROR_REPORT_LIMIT);
}

#[derive(Debug)]
struct ProtocolErrorProbe(String);

impl std::fmt::Display for ProtocolErrorProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ProtocolErrorProbe {}
