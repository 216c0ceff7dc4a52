//! Paced RTP sender.
//!
//! Pulls one chunk per tick from a [`ChunkSource`], puts a fixed RTP header
//! in front of it and writes the result as a single datagram.
//!
//! ```text
//! tick ──> next_chunk() ──> [12-byte header | chunk] ──> Transport::send
//!              │                                             │
//!          None: stop                              ok: seq += 1, ts += step
//!          Err:  skip tick                         err: skip, counters kept
//! ```

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, RtpError};
use crate::media::rtp::{RtpHeader, RtpPacket};
use crate::media::{H264_PAYLOAD_TYPE, VIDEO_CLOCK_RATE};
use crate::source::ChunkSource;
use crate::transport::Transport;

/// Default pacing rate in packets per second.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Default timestamp advance per packet: one frame at 30 fps on a 90 kHz clock.
pub const DEFAULT_TIMESTAMP_STEP: u32 = VIDEO_CLOCK_RATE / 30;

/// Sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Packets sent per second.
    pub frame_rate: f64,
    /// RTP timestamp advance after each sent packet, in clock ticks.
    /// Not derived from `frame_rate`.
    pub timestamp_step: u32,
    pub payload_type: u8,
    /// Sequence number of the first packet.
    pub initial_sequence: u16,
    /// Timestamp of the first packet.
    pub initial_timestamp: u32,
    /// Stream SSRC. `None` picks a random one (RFC 3550 §8.1).
    pub ssrc: Option<u32>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            timestamp_step: DEFAULT_TIMESTAMP_STEP,
            payload_type: H264_PAYLOAD_TYPE,
            initial_sequence: 1,
            initial_timestamp: 0,
            ssrc: None,
        }
    }
}

/// What happened on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A datagram of this many bytes went out.
    Sent(usize),
    /// The source failed to read; nothing was sent.
    ReadFailed,
    /// The datagram could not be written.
    SendFailed,
    /// The source is exhausted.
    Finished,
}

/// Totals reported when [`Sender::run`] completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendSummary {
    pub packets_sent: u64,
    /// Datagram bytes, headers included.
    pub bytes_sent: u64,
    pub read_failures: u64,
    pub send_failures: u64,
}

/// One RTP stream: its counters, SSRC, chunk source and transport.
///
/// The sequence number and timestamp belong to this instance alone and only
/// move after a datagram has been handed to the transport.
pub struct Sender<S, T> {
    source: S,
    transport: T,
    config: SenderConfig,
    ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl<S: ChunkSource, T: Transport> Sender<S, T> {
    pub fn new(source: S, transport: T, config: SenderConfig) -> Self {
        let ssrc = config.ssrc.unwrap_or_else(rand::random::<u32>);

        tracing::debug!(
            pt = config.payload_type,
            ssrc = format_args!("{:#010X}", ssrc),
            seq = config.initial_sequence,
            ts = config.initial_timestamp,
            "RTP sender created"
        );

        Self {
            source,
            transport,
            ssrc,
            sequence: config.initial_sequence,
            timestamp: config.initial_timestamp,
            config,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Sequence number the next packet will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Timestamp the next packet will carry.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Header for the next packet: version 2, no padding, extension, CSRCs
    /// or marker.
    pub fn next_header(&self) -> RtpHeader {
        RtpHeader::new(
            self.config.payload_type,
            self.sequence,
            self.timestamp,
            self.ssrc,
        )
    }

    /// Send `chunk` as one RTP packet and advance the counters.
    ///
    /// On a transport error nothing advances, so the next packet reuses the
    /// same sequence number and timestamp.
    pub fn send_chunk(&mut self, chunk: &[u8]) -> Result<usize> {
        let header = self.next_header();
        let sent = self
            .transport
            .send(&RtpPacket::new(header, chunk).to_bytes())?;

        tracing::info!(
            seq = header.sequence_number,
            ts = header.timestamp,
            size = chunk.len(),
            "sent RTP packet"
        );

        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(self.config.timestamp_step);
        Ok(sent)
    }

    /// Pull exactly one chunk and send it. Failures are logged, not retried.
    pub fn tick(&mut self) -> TickOutcome {
        let chunk = match self.source.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return TickOutcome::Finished,
            Err(e) => {
                tracing::warn!(error = %e, "error reading chunk");
                return TickOutcome::ReadFailed;
            }
        };

        match self.send_chunk(&chunk) {
            Ok(n) => TickOutcome::Sent(n),
            Err(e) => {
                tracing::warn!(error = %e, seq = self.sequence, "error sending RTP packet");
                TickOutcome::SendFailed
            }
        }
    }

    /// Tick every `1 / frame_rate` seconds until the source is exhausted.
    ///
    /// The first tick happens one period after the call. A tick that overruns
    /// its period is not made up for: the next deadline is measured from the
    /// late wakeup, so packets never leave in a burst.
    pub fn run(&mut self) -> Result<SendSummary> {
        let rate = self.config.frame_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(RtpError::InvalidFrameRate(rate));
        }

        let period = Duration::from_secs_f64(1.0 / rate);
        let mut summary = SendSummary::default();
        let mut deadline = Instant::now();

        tracing::info!(
            fps = rate,
            ssrc = format_args!("{:#010X}", self.ssrc),
            "sending RTP stream"
        );

        loop {
            deadline += period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                deadline = now;
            }

            match self.tick() {
                TickOutcome::Sent(n) => {
                    summary.packets_sent += 1;
                    summary.bytes_sent += n as u64;
                }
                TickOutcome::ReadFailed => summary.read_failures += 1,
                TickOutcome::SendFailed => summary.send_failures += 1,
                TickOutcome::Finished => break,
            }
        }

        tracing::info!(
            packets = summary.packets_sent,
            bytes = summary.bytes_sent,
            read_failures = summary.read_failures,
            send_failures = summary.send_failures,
            "end of video stream"
        );

        Ok(summary)
    }
}
