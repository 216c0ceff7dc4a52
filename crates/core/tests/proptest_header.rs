//! Property-based tests for the RTP fixed header codec.

use proptest::prelude::*;
use rtp_h264::RtpError;
use rtp_h264::RtpHeader;
use rtp_h264::media::rtp::HEADER_LEN;

/// Headers whose fields already fit their wire bit widths.
fn header() -> impl Strategy<Value = RtpHeader> {
    (
        0u8..4,
        any::<bool>(),
        any::<bool>(),
        0u8..16,
        any::<bool>(),
        0u8..128,
        any::<u16>(),
        any::<u32>(),
        any::<u32>(),
    )
        .prop_map(
            |(version, padding, extension, csrc_count, marker, payload_type, seq, ts, ssrc)| {
                RtpHeader {
                    version,
                    padding,
                    extension,
                    csrc_count,
                    marker,
                    payload_type,
                    sequence_number: seq,
                    timestamp: ts,
                    ssrc,
                }
            },
        )
}

proptest! {
    #[test]
    fn header_roundtrip(h in header()) {
        let buf = h.encode();
        prop_assert_eq!(buf.len(), HEADER_LEN);
        prop_assert_eq!(RtpHeader::decode(&buf).unwrap(), h);
    }

    #[test]
    fn multi_byte_fields_are_big_endian(h in header()) {
        let buf = h.encode();
        prop_assert_eq!(&buf[2..4], &h.sequence_number.to_be_bytes()[..]);
        prop_assert_eq!(&buf[4..8], &h.timestamp.to_be_bytes()[..]);
        prop_assert_eq!(&buf[8..12], &h.ssrc.to_be_bytes()[..]);
    }

    #[test]
    fn short_buffers_are_rejected(data in proptest::collection::vec(any::<u8>(), 0..HEADER_LEN)) {
        let len = data.len();
        let rejected = matches!(
            RtpHeader::decode(&data),
            Err(RtpError::MalformedHeader { len: l }) if l == len
        );
        prop_assert!(rejected);
    }

    #[test]
    fn any_twelve_bytes_decode(data in proptest::collection::vec(any::<u8>(), HEADER_LEN..64)) {
        let h = RtpHeader::decode(&data).unwrap();
        prop_assert_eq!(&h.encode()[..], &data[..HEADER_LEN]);
    }
}
