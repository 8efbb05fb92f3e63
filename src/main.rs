use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use voicetake::audio::{list_input_devices, CaptureConfig, CpalBackend};
use voicetake::input::{self, KeyBindings};
use voicetake::session::SessionController;
use voicetake::Config;

#[derive(Parser)]
#[command(name = "voicetake", about = "Hands-free voice take recorder", version)]
struct Cli {
    /// Config file path, without extension
    #[arg(long, default_value = "config/voicetake")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List capture devices with at least one input channel
    Devices,
    /// Run the recorder (default)
    Record {
        /// Input device index (overrides config)
        #[arg(long)]
        device: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Record { device: None }) {
        Commands::Devices => {
            for device in list_input_devices()? {
                println!(
                    "{:>3}  {}{}",
                    device.index,
                    device.name,
                    if device.is_default { "  (default)" } else { "" }
                );
            }
            Ok(())
        }
        Commands::Record { device } => run_recorder(cfg, device).await,
    }
}

async fn run_recorder(cfg: Config, device_override: Option<usize>) -> Result<()> {
    let capture = CaptureConfig {
        sample_rate: cfg.audio.sample_rate,
        channels: cfg.audio.channels,
        device_index: device_override.or(cfg.audio.device),
    };
    let bindings = KeyBindings::from_names(&cfg.keys.primary, &cfg.keys.cancel)?;

    let (commands_tx, commands_rx) = mpsc::channel(32);

    let backend = CpalBackend::new(capture.clone());
    let mut controller = SessionController::new(
        Box::new(backend),
        cfg.recordings.path.into(),
        capture.sample_rate,
        capture.channels,
        commands_tx.clone(),
    );

    info!(
        "press <{}> to start/stop, <{}> to discard or delete last, q to quit",
        cfg.keys.primary, cfg.keys.cancel
    );

    let listener = tokio::task::spawn_blocking(move || input::listen(bindings, commands_tx));

    controller.run(commands_rx).await?;

    match listener.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("input listener error: {e:#}"),
        Err(e) => warn!("input listener panicked: {e}"),
    }

    Ok(())
}
