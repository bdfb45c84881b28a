mod hardware;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tracing::{info, warn, Level};

use sigmadsp::{
    new_dsp, DspCore, DspWorker, MemoryTransport, RegisterTransport, RetryPolicy, SafetyGate,
    Settings, SigmaStudioServer,
};

#[derive(Parser, Debug)]
#[command(version, about = "SigmaStudio backend for SigmaDSP parts on SPI or I2C")]
struct Args {
    /// Settings file
    #[arg(short, long, default_value = "/var/lib/sigmadsp/config.toml")]
    settings: PathBuf,

    /// Serve an in-memory register map instead of opening the bus
    #[arg(long)]
    simulate: bool,

    /// Hard-reset the DSP before serving
    #[arg(long)]
    reset: bool,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    // SigmaStudio reconnects right after a restart
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("bind {addr}"))?;
    socket.listen(128)?;
    Ok(TcpListener::from_std(socket.into())?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let settings = Settings::from_path(&args.settings)
        .with_context(|| format!("load settings from {}", args.settings.display()))?;
    info!(family = %settings.dsp.family, protocol = ?settings.dsp.protocol, "settings loaded");

    let transport: Box<dyn RegisterTransport> = if args.simulate {
        info!("simulating the DSP in memory");
        Box::new(MemoryTransport::new().with_recording(false))
    } else {
        hardware::open_transport(&settings.dsp)?
    };

    let mut core = DspCore::new(transport, settings.dsp.use_safeload);
    match settings.dsp.reset_pin {
        Some(pin) if !args.simulate => {
            core = core.with_reset_line(hardware::open_reset_line(pin)?);
        }
        _ => {}
    }

    let dsp = new_dsp(settings.dsp.family, core);
    let (handle, _worker) = DspWorker::spawn_default(dsp)?;

    if args.reset {
        handle
            .hard_reset(Duration::from_millis(settings.dsp.reset_hold_ms))
            .await?;
    }

    let gate = SafetyGate::new();
    gate.startup_check(&handle, settings.safety_hash, RetryPolicy::from_config())
        .await;
    if !gate.is_unlocked() {
        warn!("configuration is locked");
    }

    let listener = bind_listener(settings.listen_addr()?)?;
    let server = SigmaStudioServer::new(handle);
    tokio::select! {
        res = server.run_listener_on(listener) => res?,
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    Ok(())
}
