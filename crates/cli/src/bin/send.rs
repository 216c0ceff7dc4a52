use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rtp_h264::source::{ChunkSource, DEFAULT_CHUNK_SIZE};
use rtp_h264::{AnnexBChunkSource, ReaderChunkSource, Sender, SenderConfig, UdpTransport};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rtp-send", about = "Stream a file as RTP packets over UDP")]
struct Args {
    /// Receiver address (host:port)
    remote: String,

    /// File to stream
    source: PathBuf,

    /// Packets per second
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// RTP timestamp advance per packet (90 kHz ticks)
    #[arg(long, default_value_t = 3000)]
    timestamp_step: u32,

    /// Stream SSRC (random when omitted)
    #[arg(long)]
    ssrc: Option<u32>,

    /// Bytes per packet when reading fixed-size chunks
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Treat the file as an H.264 Annex B stream and send one NAL unit per packet
    #[arg(long)]
    annexb: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let transport = match UdpTransport::connect(&args.remote) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "failed to create RTP client");
            return ExitCode::FAILURE;
        }
    };

    let opened = if args.annexb {
        AnnexBChunkSource::open(&args.source).map(|s| Box::new(s) as Box<dyn ChunkSource>)
    } else {
        ReaderChunkSource::open(&args.source, args.chunk_size)
            .map(|s| Box::new(s) as Box<dyn ChunkSource>)
    };
    let source = match opened {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(path = %args.source.display(), error = %e, "failed to open source");
            return ExitCode::FAILURE;
        }
    };

    let config = SenderConfig {
        frame_rate: args.fps,
        timestamp_step: args.timestamp_step,
        ssrc: args.ssrc,
        ..SenderConfig::default()
    };

    tracing::info!(remote = %args.remote, "sending video stream");

    let mut sender = Sender::new(source, transport, config);
    match sender.run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "sender failed");
            ExitCode::FAILURE
        }
    }
}
