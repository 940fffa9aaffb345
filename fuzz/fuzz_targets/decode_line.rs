#![no_main]

use bytes::BytesMut;
use driftdb_codec::LineCodec;
use driftdb_protocol::Response;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Small limit so the too-long path is reachable
    let mut codec = LineCodec::<Response>::with_max_length(256);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
    let _ = codec.decode_eof(&mut buf);
});
