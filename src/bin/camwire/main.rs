//! `camwire` - view, save or inspect a camera frame stream.

mod cli;

use std::io;
use std::process::ExitCode;

use camwire_client::report::write_stdout_json;
use camwire_client::sink::{
    DebugSink, FanOut, FrameSink, SavePolicy, SaveSink, TerminalDisplay,
};
use camwire_client::session::StopHandle;
use camwire_client::{CamwireError, Result, Session};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};

fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr; stdout belongs to the display and the JSON summary.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(args.log_level().as_str()))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "camwire failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.session_config();
    let mut sink = build_sink(&args.command)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        "starting camwire"
    );

    let mut session = Session::new(config);
    let mut receiver = session.connect()?;
    install_interrupt_handler(session.stop_handle(&receiver)?)?;

    let result = session.drive(&mut receiver, &mut sink);
    if let Err(e) = receiver.shutdown() {
        tracing::debug!("socket shutdown failed: {}", e);
    }
    let summary = result?;

    if args.stats_json {
        write_stdout_json(&summary)?;
    }
    Ok(())
}

/// Ctrl+C closes the socket so the session ends through `finish()` and
/// still reports its statistics.
fn install_interrupt_handler(stop: StopHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        tracing::info!("interrupted, closing connection");
        if let Err(e) = stop.stop() {
            tracing::warn!("failed to close connection: {}", e);
        }
    })
    .map_err(|e| CamwireError::Io(io::Error::other(e.to_string())))
}

fn build_sink(command: &Command) -> Result<Box<dyn FrameSink>> {
    let sink: Box<dyn FrameSink> = match command {
        Command::View { scale, .. } => Box::new(TerminalDisplay::stdout(*scale)),
        Command::Save {
            dir, every, scale, ..
        } => Box::new(SaveSink::new(SavePolicy {
            dir: dir.clone(),
            every: *every,
            scale: *scale,
        })?),
        Command::Debug { display, scale, .. } => {
            let mut fan = FanOut::new().with(DebugSink::new());
            if *display {
                fan.push(TerminalDisplay::stdout(*scale));
            }
            Box::new(fan)
        }
    };
    Ok(sink)
}
