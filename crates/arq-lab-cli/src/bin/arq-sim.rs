use anyhow::{Context, Result};
use arq_lab_abstract::{ArqConfig, ArqConfigOverride};
use arq_lab_cli::{PolicyArg, init_logging, resolve_config, write_trace};
use arq_lab_core::{
    FaultInjector, MemoryTransport, ReceiverEngine, RecordingObserver, SenderEngine,
    TracingObserver, TransferReport, read_chunks,
};
use clap::Parser;
use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run sender and receiver in one process over a lossy in-memory link")]
struct Args {
    input: PathBuf,

    output: PathBuf,

    /// Retransmission timeout in milliseconds [default: 2000].
    #[arg(short, long, value_name = "MS")]
    timeout: Option<u64>,

    /// Packet size in bytes, header included [default: 512].
    #[arg(short, long, value_name = "BYTES", value_parser = clap::value_parser!(u16).range(13..=512))]
    size: Option<u16>,

    /// Fault percentage applied to data packets [default: 0].
    #[arg(long, value_name = "PERCENT", value_parser = clap::value_parser!(u8).range(0..=100))]
    sender_drop: Option<u8>,

    /// Fault percentage applied to acknowledgments [default: same as data].
    #[arg(long, value_name = "PERCENT", value_parser = clap::value_parser!(u8).range(0..=100))]
    receiver_drop: Option<u8>,

    /// Seed for the sender's injector; the receiver uses the next value.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = PolicyArg::Reack)]
    policy: PolicyArg,

    /// TOML file with default settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a JSON trace with both sides' events.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let flags = ArqConfigOverride {
        timeout_ms: args.timeout,
        packet_size: args.size.map(usize::from),
        drop_percent: args.sender_drop,
        seed: args.seed,
    };
    let config = resolve_config(args.config.as_deref(), &flags)?;
    let receiver_config = ArqConfig {
        drop_percent: args.receiver_drop.unwrap_or(config.drop_percent),
        seed: config.seed.map(|seed| seed.wrapping_add(1)),
        ..config.clone()
    };
    receiver_config.validate().context("Invalid receiver configuration")?;

    let chunks = read_chunks(&args.input, config.payload_capacity())
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let mut output = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let sender_addr = SocketAddr::from(([127, 0, 0, 1], 5000));
    let receiver_addr = SocketAddr::from(([127, 0, 0, 1], 6000));
    let (sender_link, receiver_link) = MemoryTransport::pair(sender_addr, receiver_addr);
    info!(
        "Simulating {} packets, {}% data faults, {}% ack faults",
        chunks.len(),
        config.drop_percent,
        receiver_config.drop_percent
    );

    let mut sender = SenderEngine::new(
        sender_link,
        FaultInjector::from_config(&config),
        (TracingObserver, RecordingObserver::new()),
        receiver_addr,
        config.timeout(),
    );
    let mut receiver = ReceiverEngine::new(
        receiver_link,
        FaultInjector::from_config(&receiver_config),
        (TracingObserver, RecordingObserver::new()),
    )
    .with_policy(args.policy.into());

    let (sent, received) = tokio::join!(sender.run(chunks), receiver.run(&mut output));
    let sent = sent.context("Sender failed")?;
    let received = received.context("Receiver failed")?;
    info!(
        "Done: {} attempts for {} packets, {} bytes delivered",
        sent.attempts, sent.chunks, received.delivered_bytes
    );

    if let Some(path) = &args.trace_out {
        let (_, (_, sender_log)) = sender.into_parts();
        let (_, (_, receiver_log)) = receiver.into_parts();
        let report = TransferReport::new(config, sender_log)
            .with_sender(sent)
            .with_receiver(received)
            .merge_events(receiver_log.into_events());
        write_trace(path, &report)?;
    }
    Ok(())
}
