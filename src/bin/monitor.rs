use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use topic_monitor::{
    TopicMonitor, config::read_config_file, console, sink::HttpSink, transport::MqttTransport,
    util::get_config_path,
};
use tracing::{debug, error, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON, or TOML when ending in .toml)
    #[arg(short, long)]
    file: Option<PathBuf>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_target("topic_monitor", LevelFilter::DEBUG);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => debug!("received interrupt"),
        Err(e) => {
            warn!("cannot listen for interrupts: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let config = read_config_file(get_config_path(args.file))?;

    let sink = HttpSink::new(config.sink.clone())?;
    let transport = MqttTransport::connect(&config.transport).await?;
    let monitor = TopicMonitor::from_config(&config, transport, sink)?;

    let outcome = monitor.run(interrupted()).await?;

    println!();
    print!("{}", console::render(&outcome.report, outcome.exit));

    Ok(outcome.is_healthy())
}
