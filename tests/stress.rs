#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use udp_session::config::ServerConfig;
use udp_session::core::codec::WireCodec;
use udp_session::core::message::{Delivery, Message, SessionId};
use udp_session::core::serialization::WireFormat;
use udp_session::protocol::dispatcher::Dispatcher;
use udp_session::transport::memory::MemoryTransport;
use udp_session::utils::time::ManualClock;

fn addr(i: u32) -> SocketAddr {
    SocketAddr::from(([10, (i >> 16) as u8, (i >> 8) as u8, i as u8], 40000))
}

#[test]
fn stress_many_sessions_heavy_burst() {
    // Thousands of clients in one drain, each sending a mix of reliable and
    // unreliable traffic, with every reliable message sent twice
    const CLIENTS: u32 = 2_000;

    for format in [WireFormat::Json, WireFormat::MessagePack] {
        let clock = ManualClock::new();
        let config = ServerConfig {
            wire_format: format,
            ..ServerConfig::default()
        };
        let mut dispatcher = Dispatcher::with_clock(&config, clock.clone());
        let network = MemoryTransport::new(SocketAddr::from(([127, 0, 0, 1], 5555)));
        let mut transport = network.clone();
        let codec = WireCodec::new(format);

        for i in 0..CLIENTS {
            network.inject(codec.encode(&Message::HandshakeRequest).unwrap(), addr(i));
        }
        dispatcher.run_cycle(&mut transport);
        dispatcher.flush(&mut transport);
        assert_eq!(network.take_sent().len(), CLIENTS as usize);
        assert_eq!(dispatcher.registry().len(), CLIENTS as usize);

        // Identities were handed out in arrival order
        for i in 0..CLIENTS {
            let session_id = SessionId::new(u64::from(i) + 1);
            for message_id in 0..5u64 {
                let reliable = Message::GeneralRequest {
                    session_id,
                    delivery: Delivery::Reliable { message_id },
                    data: json!({"client": i, "seq": message_id}),
                };
                let encoded = codec.encode(&reliable).unwrap();
                network.inject(encoded.clone(), addr(i));
                network.inject(encoded, addr(i));
            }
            let unreliable = Message::GeneralRequest {
                session_id,
                delivery: Delivery::Unreliable,
                data: json!(i),
            };
            network.inject(codec.encode(&unreliable).unwrap(), addr(i));
        }

        let report = dispatcher.run_cycle(&mut transport);
        let flushed = dispatcher.flush(&mut transport);

        assert_eq!(report.payloads.len(), (CLIENTS * 6) as usize);
        assert_eq!(flushed.sent, (CLIENTS * 10) as usize);
        assert_eq!(flushed.failed, 0);
        assert_eq!(dispatcher.reliability().len(), (CLIENTS * 5) as usize);

        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.duplicates_suppressed, u64::from(CLIENTS * 5));
        assert_eq!(snapshot.acks_queued, u64::from(CLIENTS * 10));

        // Everybody goes silent: one pass clears sessions and dedup records
        clock.advance(Duration::from_secs(11));
        let maintenance = dispatcher.maintain().expect("gate open");
        assert_eq!(maintenance.sessions_evicted, CLIENTS as usize);
        assert_eq!(maintenance.records_evicted, (CLIENTS * 5) as usize);
        assert!(dispatcher.registry().is_empty());
        assert!(dispatcher.reliability().is_empty());
        assert_eq!(dispatcher.outbound().len(), CLIENTS as usize);
    }
}

#[test]
fn stress_long_running_session_churn() {
    // Clients come and go over simulated hours; state stays bounded by the
    // number of live sessions and the retention window
    let clock = ManualClock::new();
    let config = ServerConfig {
        session_timeout: Duration::from_secs(5),
        message_retention: Duration::from_secs(10),
        maintenance_interval: Duration::from_secs(1),
        ..ServerConfig::default()
    };
    let mut dispatcher = Dispatcher::with_clock(&config, clock.clone());
    let network = MemoryTransport::new(SocketAddr::from(([127, 0, 0, 1], 5555)));
    let mut transport = network.clone();
    let codec = WireCodec::default();

    let mut next_message_id = 0u64;
    let mut last_id = 0u64;
    for second in 0..7_200u32 {
        // A new client every second, talking once and then going silent
        network.inject(codec.encode(&Message::HandshakeRequest).unwrap(), addr(second));
        dispatcher.run_cycle(&mut transport);
        last_id += 1;

        next_message_id += 1;
        let request = Message::GeneralRequest {
            session_id: SessionId::new(last_id),
            delivery: Delivery::Reliable {
                message_id: next_message_id,
            },
            data: json!(second),
        };
        network.inject(codec.encode(&request).unwrap(), addr(second));
        let report = dispatcher.run_cycle(&mut transport);
        assert_eq!(report.payloads.len(), 1);

        dispatcher.flush(&mut transport);
        network.take_sent();

        assert!(dispatcher.registry().len() <= 7);
        assert!(dispatcher.reliability().len() <= 12);
        clock.advance(Duration::from_secs(1));
    }

    assert_eq!(dispatcher.metrics().snapshot().handshakes, 7_200);
}
