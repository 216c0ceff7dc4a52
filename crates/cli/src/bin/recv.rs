use std::process::ExitCode;

use clap::Parser;
use rtp_h264::transport::MAX_DATAGRAM_SIZE;
use rtp_h264::{Receiver, ReceiverConfig, UdpTransport};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rtp-recv", about = "Receive RTP over UDP and classify H.264 payloads")]
struct Args {
    /// Listen address (host:port)
    #[arg(default_value = "0.0.0.0:5004")]
    listen: String,

    /// Read buffer size in bytes
    #[arg(long, default_value_t = MAX_DATAGRAM_SIZE)]
    max_datagram: usize,
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

    // A bare ":port" listens on every interface.
    let listen = match args.listen.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => args.listen,
    };

    let transport = match UdpTransport::bind(&listen) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "failed to create RTP server");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(addr = %listen, "RTP server listening");

    let mut receiver = Receiver::new(
        transport,
        ReceiverConfig {
            max_datagram_size: args.max_datagram,
        },
    );
    receiver.run();
    ExitCode::SUCCESS
}
