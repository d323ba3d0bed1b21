//! Shared helpers for the integration tests.

#![allow(dead_code)]

use aquanet::{FRAME_LEN, Server, ServerConfig};

/// A well-formed, aligned frame from a fictional Home unit: serial 1234,
/// redox probe only, pH 7.20, redox 550 mV, water 24.5 °C.
pub fn sample_frame() -> [u8; FRAME_LEN] {
    let mut data = [0u8; FRAME_LEN];

    for page in [0usize, 40, 80] {
        data[page..page + 4].copy_from_slice(&1234u32.to_be_bytes());
    }
    data[5] = 0x01;
    data[45] = 0x03;
    data[85] = 0x02;

    data[4] = 0x0E;
    data[6] = 24;
    data[7] = 6;
    data[8] = 15;
    data[9] = 12;
    data[10] = 34;
    data[11] = 56;
    data[14..16].copy_from_slice(&720u16.to_be_bytes());
    data[16..18].copy_from_slice(&550u16.to_be_bytes());
    data[18] = 0xFF;
    data[19] = 0xFF;
    data[25..27].copy_from_slice(&245u16.to_be_bytes());
    data[28] = 0xAA;
    data[29] = 0x08;
    data[52] = 72;
    data[53] = 65;
    data[54] = 5;
    data[55] = 28;
    data[56] = 8;
    data[58] = 10;
    data[60] = 14;
    data[62] = 16;
    data[68] = 3;
    data[69] = 2;
    data[70] = 30;
    data[71] = 2;
    data[74..76].copy_from_slice(&120u16.to_be_bytes());
    data[92..94].copy_from_slice(&5000u16.to_be_bytes());
    data[106..108].copy_from_slice(&30u16.to_be_bytes());

    data
}

/// The sample frame re-stamped with a different serial number.
pub fn sample_frame_for_serial(serial: u32) -> [u8; FRAME_LEN] {
    let mut data = sample_frame();
    for page in [0usize, 40, 80] {
        data[page..page + 4].copy_from_slice(&serial.to_be_bytes());
    }
    data
}

/// The sample frame with a different pH value, in hundredths.
pub fn sample_frame_with_ph(centi_ph: u16) -> [u8; FRAME_LEN] {
    let mut data = sample_frame();
    data[14..16].copy_from_slice(&centi_ph.to_be_bytes());
    data
}

/// Start a local-only server on an ephemeral loopback port.
pub async fn start_local_server() -> Server {
    let config = ServerConfig {
        bind_address: "127.0.0.1".to_string(),
        port: 0,
        forwarder: None,
    };
    Server::start(config).await.expect("server should bind an ephemeral port")
}
