#![no_main]

use libfuzzer_sys::fuzz_target;
use std::net::SocketAddr;
use udp_session::config::ServerConfig;
use udp_session::protocol::dispatcher::Dispatcher;
use udp_session::transport::memory::MemoryTransport;

fuzz_target!(|data: &[u8]| {
    // A handshake followed by arbitrary datagrams split on newlines
    let network = MemoryTransport::new(SocketAddr::from(([127, 0, 0, 1], 5555)));
    let mut transport = network.clone();
    let mut dispatcher = Dispatcher::new(&ServerConfig::default());
    let client = SocketAddr::from(([127, 0, 0, 1], 40000));

    network.inject(&br#"{"type":"handshake","response":false}"#[..], client);
    for chunk in data.split(|b| *b == b'\n') {
        network.inject(chunk.to_vec(), client);
    }

    let report = dispatcher.run_cycle(&mut transport);
    assert!(report.read_error.is_none());
    assert!(!dispatcher.registry().is_empty());
    dispatcher.flush(&mut transport);
});
