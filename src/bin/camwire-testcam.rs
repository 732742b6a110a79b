//! `camwire-testcam` - serve a synthetic gradient over the camera protocol.
//!
//! Stands in for the camera board when no hardware is at hand. Clients are
//! served one at a time; a client that disconnects is dropped and the next
//! one is accepted.

use std::net::TcpListener;
use std::process::ExitCode;

use camwire_client::producer::{
    stream_test_pattern, AcceptBackoff, FrameWriter, StreamConfig, TestPattern,
};
use camwire_client::{Result, DEFAULT_PORT};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve a synthetic grayscale camera stream")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Frame width in pixels
    #[arg(long, default_value_t = 160)]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = 120)]
    height: u32,

    /// Target frames per second (0 sends as fast as possible)
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Frames per client before closing the connection
    #[arg(long)]
    frames: Option<u64>,

    /// Exit after serving this many clients
    #[arg(long)]
    clients: Option<u64>,

    /// Log verbosity
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(&args.log_level))
        .init();

    match serve(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "testcam failed");
            ExitCode::FAILURE
        }
    }
}

fn serve(args: &Args) -> Result<()> {
    let listener = TcpListener::bind((args.bind.as_str(), args.port))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        width = args.width,
        height = args.height,
        fps = args.fps,
        "test camera listening"
    );

    let config = StreamConfig::from_fps(args.fps, args.frames);
    let mut pattern = TestPattern::new(args.width, args.height);
    let mut served = 0u64;
    let mut backoff = AcceptBackoff::default();

    while args.clients.map_or(true, |limit| served < limit) {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => {
                backoff.succeeded();
                accepted
            }
            Err(e) => {
                backoff.failed(e)?;
                continue;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, "set_nodelay failed: {}", e);
        }
        tracing::info!(%peer, "client connected");

        let mut writer = FrameWriter::new(stream);
        match stream_test_pattern(&mut writer, &mut pattern, config) {
            Ok(sent) => tracing::info!(%peer, sent, "client done"),
            Err(e) => tracing::warn!(%peer, "client dropped: {}", e),
        }
        served += 1;
    }
    Ok(())
}
