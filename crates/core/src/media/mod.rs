//! RTP framing and H.264 payload classification.
//!
//! ## RTP overview (RFC 3550)
//!
//! Every datagram carries a 12-byte fixed header ([`rtp::RtpHeader`])
//! followed directly by the payload. The header holds:
//!
//! - **Sequence number** (16-bit, wrapping), advanced once per packet.
//! - **Timestamp** (32-bit, wrapping), media clock, 90 kHz for video.
//! - **SSRC** (32-bit), chosen once per sender to identify the stream.
//! - **Payload type** (7-bit), 96 is the dynamic type used for H.264.
//!
//! CSRC lists and header extensions are not modeled: the CSRC count is
//! carried through the codec but no identifiers follow the fixed header.
//!
//! ## H.264 payload formats (RFC 6184)
//!
//! | NAL type | Format | Handling |
//! |----------|--------|----------|
//! | 24 | STAP-A | walk the 2-byte length-prefixed units |
//! | 28 | FU-A | decode start/end bits, rebuild the NAL header on start |
//! | other | Single NAL unit | classify, surface SPS/PPS bytes |

pub mod h264;
pub mod rtp;

/// Dynamic RTP payload type conventionally used for H.264 (RFC 3551).
pub const H264_PAYLOAD_TYPE: u8 = 96;

/// RTP clock rate for video in Hz.
pub const VIDEO_CLOCK_RATE: u32 = 90_000;
