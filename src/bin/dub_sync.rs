use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use dub_sync::notification::{CompositeProgressObserver, LoggingProgressObserver};
use dub_sync::progress::{DefaultProgressReporter, ProgressReporter};
use dub_sync::{ProgressInfo, ProgressObserver};
use dub_sync::utils::init_logger;
use dub_sync::{DubConfig, DubRequest, DubbingPipeline, DubbingServices};

/// Dub the speech of a video into another language
#[derive(Debug, Parser)]
#[command(name = "dub-sync", version, about)]
struct Args {
    /// Input video file
    video: PathBuf,

    /// Target language code (en, es, fr, de, ...)
    #[arg(short, long)]
    lang: String,

    /// Drop the background track and keep only the dubbed voice
    #[arg(long)]
    no_background: bool,

    /// Output video path (default: <output_dir>/dubbed_<name>_<lang>_<run id>.mp4)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Abort the run after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the list of supported target languages and exit
    #[arg(long)]
    list_languages: bool,

    /// Emit every stage change as a JSON line on stderr
    #[arg(long)]
    progress_json: bool,
}

/// Stage events as JSON lines for wrapping tools
struct JsonLinesObserver;

impl ProgressObserver for JsonLinesObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        match serde_json::to_string(&progress) {
            Ok(line) => eprintln!("{}", line),
            Err(e) => warn!("Cannot serialize progress event: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DubConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => DubConfig::default(),
    };
    config.apply_env();

    if args.list_languages {
        for (code, name) in &config.supported_languages {
            println!("{:<6} {}", code, name);
        }
        return Ok(());
    }

    let services = DubbingServices::from_config(config).context("initializing dubbing services")?;

    let mut observers = CompositeProgressObserver::new();
    observers.add_observer(Box::new(LoggingProgressObserver::new()));
    if args.progress_json {
        observers.add_observer(Box::new(JsonLinesObserver));
    }
    let mut reporter = DefaultProgressReporter::new();
    reporter.add_observer(Box::new(observers));
    let pipeline =
        DubbingPipeline::new(Arc::new(services)).with_progress_reporter(Arc::new(reporter));

    let mut request = DubRequest::new(&args.video, &args.lang).keep_background(!args.no_background);
    if let Some(output) = &args.output {
        request = request.output_path(output);
    }

    let result = match args.timeout {
        Some(secs) => {
            pipeline
                .run_with_timeout(request, Duration::from_secs(secs))
                .await
        }
        None => pipeline.run(request).await,
    }
    .with_context(|| format!("dubbing {}", args.video.display()))?;

    info!("Output written to {}", result.output_path.display());
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
