use anyhow::{Context, Result};
use arq_lab_abstract::ArqConfigOverride;
use arq_lab_cli::{ephemeral_bind_for, init_logging, resolve_addr, resolve_config, write_trace};
use arq_lab_core::{
    FaultInjector, RecordingObserver, SenderEngine, TracingObserver, TransferReport, UdpTransport,
    read_chunks,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a file with stop-and-wait ARQ over UDP")]
struct Args {
    /// File to send.
    file: PathBuf,

    /// Host name or address of the receiver.
    receiver_address: String,

    receiver_port: u16,

    /// Retransmission timeout in milliseconds [default: 2000].
    #[arg(short, long, value_name = "MS")]
    timeout: Option<u64>,

    /// Packet size in bytes, header included [default: 512].
    #[arg(short, long, value_name = "BYTES", value_parser = clap::value_parser!(u16).range(13..=512))]
    size: Option<u16>,

    /// Percentage of data packets dropped or corrupted [default: 0].
    #[arg(short, long, value_name = "PERCENT", value_parser = clap::value_parser!(u8).range(0..=100))]
    drop: Option<u8>,

    /// Seed for the fault injector.
    #[arg(long)]
    seed: Option<u64>,

    /// TOML file with default settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a JSON trace of the finished transfer.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ArqConfigOverride {
        ArqConfigOverride {
            timeout_ms: self.timeout,
            packet_size: self.size.map(usize::from),
            drop_percent: self.drop,
            seed: self.seed,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let config = resolve_config(args.config.as_deref(), &args.overrides())?;
    let dest = resolve_addr(&args.receiver_address, args.receiver_port).await?;
    let chunks = read_chunks(&args.file, config.payload_capacity())
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let transport = UdpTransport::bind(ephemeral_bind_for(dest))
        .await
        .context("Failed to open UDP socket")?;
    info!(
        "arq-sender on {} -> {dest} (timeout {} ms, packet size {}, drop {}%)",
        transport.local_addr(),
        config.timeout_ms,
        config.packet_size,
        config.drop_percent
    );

    let mut engine = SenderEngine::new(
        transport,
        FaultInjector::from_config(&config),
        (TracingObserver, RecordingObserver::new()),
        dest,
        config.timeout(),
    );
    let summary = engine.run(chunks).await?;
    info!(
        "Sent {} bytes: {} attempts, {} timeouts, {} rejected acks",
        summary.bytes, summary.attempts, summary.timeouts, summary.rejected_acks
    );

    if let Some(path) = &args.trace_out {
        let (_, (_, recorder)) = engine.into_parts();
        write_trace(path, &TransferReport::new(config, recorder).with_sender(summary))?;
    }
    Ok(())
}
