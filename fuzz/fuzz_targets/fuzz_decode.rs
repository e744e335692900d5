#![no_main]

use libfuzzer_sys::fuzz_target;
use std::net::SocketAddr;
use udp_session::core::codec::WireCodec;
use udp_session::core::serialization::WireFormat;

fuzz_target!(|data: &[u8]| {
    // Decoding untrusted datagrams must never panic, in either format
    let from = SocketAddr::from(([127, 0, 0, 1], 40000));
    for format in [WireFormat::Json, WireFormat::MessagePack] {
        let codec = WireCodec::new(format);
        if let Ok(received) = codec.decode(data, from) {
            // Anything that decodes must encode again
            let _ = codec.encode(&received.message).unwrap();
        }
    }
});
