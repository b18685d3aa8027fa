#![no_main]

use libfuzzer_sys::fuzz_target;
use cubesat_link::protocol::command::CommandMessage;

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = CommandMessage::parse(data) {
        let _ = (message.password(), message.name(), message.command());
        let _ = message.args();
    }
});
