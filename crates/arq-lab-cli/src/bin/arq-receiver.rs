use anyhow::{Context, Result};
use arq_lab_abstract::ArqConfigOverride;
use arq_lab_cli::{PolicyArg, init_logging, resolve_addr, resolve_config, write_trace};
use arq_lab_core::{
    FaultInjector, ReceiverEngine, RecordingObserver, TracingObserver, TransferReport,
    UdpTransport,
};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Receive a file sent with stop-and-wait ARQ over UDP")]
struct Args {
    /// Where the received data is written. Truncated if it exists.
    file: PathBuf,

    /// Local address to listen on.
    bind_address: String,

    port: u16,

    /// Percentage of acknowledgments dropped or corrupted [default: 0].
    #[arg(short, long, value_name = "PERCENT", value_parser = clap::value_parser!(u8).range(0..=100))]
    drop: Option<u8>,

    /// Seed for the fault injector.
    #[arg(long)]
    seed: Option<u64>,

    /// How to answer packets that are not the expected one.
    #[arg(long, value_enum, default_value_t = PolicyArg::Reack)]
    policy: PolicyArg,

    /// TOML file with default settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a JSON trace of the finished transfer.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let flags = ArqConfigOverride {
        drop_percent: args.drop,
        seed: args.seed,
        ..Default::default()
    };
    let config = resolve_config(args.config.as_deref(), &flags)?;
    let bind = resolve_addr(&args.bind_address, args.port).await?;
    let transport = UdpTransport::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    let mut output = File::create(&args.file)
        .with_context(|| format!("Failed to create {}", args.file.display()))?;
    info!(
        "arq-receiver listening on {} (drop {}%, {:?})",
        transport.local_addr(),
        config.drop_percent,
        args.policy
    );

    let mut engine = ReceiverEngine::new(
        transport,
        FaultInjector::from_config(&config),
        (TracingObserver, RecordingObserver::new()),
    )
    .with_policy(args.policy.into());
    let summary = engine.run(&mut output).await?;
    info!(
        "Wrote {} bytes to {} ({} rejected, {} duplicates)",
        summary.delivered_bytes,
        args.file.display(),
        summary.rejected,
        summary.duplicates
    );

    if let Some(path) = &args.trace_out {
        let (_, (_, recorder)) = engine.into_parts();
        write_trace(path, &TransferReport::new(config, recorder).with_receiver(summary))?;
    }
    Ok(())
}
