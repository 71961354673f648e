// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample_envelope() -> Envelope {
    let mut headers = HeaderBlock::new();
    headers.append("messageType", "EVENT").unwrap();
    headers.append("messageId", "DSP-host:1:42").unwrap();
    headers.append("sessionId", "DSP-host:1").unwrap();
    headers.append("timeStamp", "1234.5").unwrap();
    headers.append("destination", "/event").unwrap();
    Envelope::new(headers, b"{\"events\":[]}".to_vec())
}

#[test]
fn lead_roundtrip() {
    let lead = Lead::new(120, 4096);
    let encoded = lead.encode();
    assert_eq!(encoded.len(), LEAD_SIZE);
    assert_eq!(&encoded[..13], &MAGIC);
    let decoded = Lead::decode(&encoded).unwrap();
    assert_eq!(decoded, lead);
    assert_eq!(decoded.protocol, PROTOCOL_VERSION);
}

#[test]
fn lead_rejects_bad_magic() {
    let mut encoded = Lead::new(0, 0).encode();
    encoded[0] ^= 0xff;
    assert!(matches!(Lead::decode(&encoded), Err(WireError::BadMagic)));
}

#[test]
fn lead_short_buffer_is_insufficient_data() {
    let encoded = Lead::new(0, 0).encode();
    let err = Lead::decode(&encoded[..10]).unwrap_err();
    assert!(matches!(err, WireError::InsufficientData { needed: 32, have: 10 }));
}

#[test]
fn header_block_orders_well_known_keys_first() {
    let mut headers = HeaderBlock::new();
    headers.append("destination", "/command").unwrap();
    headers.append("timeStamp", "1.0").unwrap();
    headers.append("commandId", "1-glibc").unwrap();
    headers.append("messageType", "BUILD_COMMAND").unwrap();
    headers.append("messageId", "a:1").unwrap();
    headers.append("sessionId", "a").unwrap();

    let text = String::from_utf8(headers.encode()).unwrap();
    let keys: Vec<&str> = text.lines().map(|l| l.split(':').next().unwrap()).collect();
    assert_eq!(
        keys,
        ["messageType", "messageId", "sessionId", "timeStamp", "commandId", "destination"]
    );
}

#[test]
fn header_block_repeats_multi_valued_keys_sorted() {
    let mut headers = HeaderBlock::new();
    headers.append("subscription", "/nodestatus").unwrap();
    headers.append("subscription", "/command").unwrap();

    let text = String::from_utf8(headers.encode()).unwrap();
    assert_eq!(text, "subscription: /command\nsubscription: /nodestatus\n");

    let parsed = HeaderBlock::parse(text.as_bytes()).unwrap();
    assert_eq!(parsed.entries.get("subscription").unwrap().len(), 2);
}

#[test]
fn header_block_rejects_newlines() {
    let mut headers = HeaderBlock::new();
    assert!(matches!(
        headers.append("key", "two\nlines"),
        Err(WireError::HeaderNewline(_))
    ));
}

#[test]
fn header_block_parses_empty_value() {
    let parsed = HeaderBlock::parse(b"targetId:\n").unwrap();
    assert_eq!(parsed.first("targetId"), Some(""));
}

#[test]
fn header_block_rejects_line_without_colon() {
    assert!(matches!(
        HeaderBlock::parse(b"not a header line\n"),
        Err(WireError::MalformedHeader(_))
    ));
}

#[test]
fn envelope_single_shot_roundtrip() {
    let envelope = sample_envelope();
    let bytes = envelope.encode();
    let (decoded, consumed) = Envelope::decode(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, envelope);
}

#[test]
fn envelope_decode_short_buffer_is_misuse() {
    let bytes = sample_envelope().encode();
    let err = Envelope::decode(&bytes[..bytes.len() - 1]).unwrap_err();
    assert!(matches!(err, WireError::InsufficientData { .. }));
}

#[test]
fn reader_handles_one_byte_reads() {
    let bytes = sample_envelope().encode();
    let mut reader = EnvelopeReader::new();

    // Feed one byte at a time through a cursor windowed to 1 byte.
    let mut decoded = None;
    for i in 0..bytes.len() {
        let mut window = std::io::Cursor::new(&bytes[i..i + 1]);
        match reader.read_from(&mut window, false).unwrap() {
            Some(envelope) => {
                assert_eq!(i, bytes.len() - 1);
                decoded = Some(envelope);
            }
            None => assert!(i < bytes.len() - 1),
        }
    }
    assert_eq!(decoded.unwrap(), sample_envelope());
    assert!(!reader.is_mid_frame());
}

#[test]
fn reader_blocking_reads_whole_envelope() {
    let bytes = sample_envelope().encode();
    let mut cursor = std::io::Cursor::new(bytes);
    let mut reader = EnvelopeReader::new();
    let envelope = reader.read_from(&mut cursor, true).unwrap().unwrap();
    assert_eq!(envelope, sample_envelope());
}

#[test]
fn reader_blocking_eof_mid_frame_is_connection_closed() {
    let bytes = sample_envelope().encode();
    let mut cursor = std::io::Cursor::new(&bytes[..10]);
    let mut reader = EnvelopeReader::new();
    assert!(matches!(
        reader.read_from(&mut cursor, true),
        Err(WireError::ConnectionClosed)
    ));
}

#[test]
fn reader_surfaces_bad_magic() {
    let mut bytes = sample_envelope().encode();
    bytes[0] ^= 0xff;
    let mut cursor = std::io::Cursor::new(bytes);
    let mut reader = EnvelopeReader::new();
    assert!(matches!(reader.read_from(&mut cursor, false), Err(WireError::BadMagic)));
}

#[test]
fn frozen_envelope_writers_are_independent() {
    let frozen = sample_envelope().freeze();
    let mut w1 = frozen.writer();
    let mut w2 = frozen.writer();

    let mut out1 = Vec::new();
    assert!(w1.write_to(&mut out1).unwrap());
    assert!(w1.is_finished());
    assert!(!w2.is_finished());

    let mut out2 = Vec::new();
    assert!(w2.write_to(&mut out2).unwrap());
    assert_eq!(out1, out2);
    assert_eq!(out1, frozen.as_bytes());
}

#[test]
fn envelope_writer_resumes_after_would_block() {
    struct OneByteThenBlock {
        out: Vec<u8>,
        budget: usize,
    }
    impl std::io::Write for OneByteThenBlock {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, "full"));
            }
            self.budget -= 1;
            self.out.push(buf[0]);
            Ok(1)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let frozen = sample_envelope().freeze();
    let total = frozen.as_bytes().len();
    let mut sink = OneByteThenBlock { out: Vec::new(), budget: 5 };
    let mut writer = frozen.writer();

    assert!(!writer.write_to(&mut sink).unwrap());
    assert_eq!(sink.out.len(), 5);

    sink.budget = total;
    assert!(writer.write_to(&mut sink).unwrap());
    assert_eq!(sink.out, frozen.as_bytes());
}
