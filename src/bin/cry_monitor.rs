use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cry_detector::config::AppConfig;
use cry_detector::engine::{CaptureBackend, CpalBackend, MonitorEvent, MonitorHandle, ScriptedBackend};
use cry_detector::fixtures::{
    DetectedTransition, ExpectationDiff, FixtureCatalog, FixtureProcessor, FixtureRun,
};
use cry_detector::testing::{SignalPattern, SignalSpec};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cry_monitor", about = "Real-time infant cry detector")]
struct Cli {
    /// Configuration JSON (defaults to assets/cry_config.json, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override directory containing fixture assets
    #[arg(long, global = true)]
    fixtures_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Monitor the default microphone and print state changes as JSON lines
    Listen {
        /// Replay a WAV file through the live session instead of the microphone
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Run a WAV file through the detector and optionally compare against expectations
    Analyze {
        /// WAV path or fixture name
        #[arg(long)]
        wav: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write a synthetic test signal to a WAV file
    Synth {
        #[arg(long, value_enum)]
        pattern: SignalPattern,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        frequency: Option<f32>,
        #[arg(long)]
        amplitude: Option<f32>,
        #[arg(long)]
        duration_ms: Option<u32>,
        #[arg(long)]
        sample_rate: Option<u32>,
    },
    /// List available fixtures on disk
    DumpFixtures,
    /// Print the effective configuration as JSON
    DumpConfig,
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cry_detector=info,cry_monitor=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_default();

    match cli.command {
        Commands::Listen {
            replay,
            duration_secs,
        } => run_listen(config, replay, duration_secs),
        Commands::Analyze {
            wav,
            expect,
            output,
        } => run_analyze(config, &catalog, &wav, expect, output),
        Commands::Synth {
            pattern,
            output,
            frequency,
            amplitude,
            duration_ms,
            sample_rate,
        } => {
            let mut spec = SignalSpec::new(pattern);
            if let Some(frequency) = frequency {
                spec = spec.with_frequency(frequency);
            }
            if let Some(amplitude) = amplitude {
                spec = spec.with_amplitude(amplitude);
            }
            if let Some(duration_ms) = duration_ms {
                spec = spec.with_duration_ms(duration_ms);
            }
            if let Some(sample_rate) = sample_rate {
                spec = spec.with_sample_rate(sample_rate);
            }
            run_synth(&spec, output)
        }
        Commands::DumpFixtures => run_dump(&catalog),
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

fn run_listen(
    config: AppConfig,
    replay: Option<PathBuf>,
    duration_secs: Option<u64>,
) -> Result<ExitCode> {
    let backend: Arc<dyn CaptureBackend> = match replay {
        Some(path) => {
            let (samples, sample_rate) = cry_detector::audio::source::read_wav(&path)
                .with_context(|| format!("loading replay {}", path.display()))?;
            Arc::new(ScriptedBackend::pcm(sample_rate, samples))
        }
        None => Arc::new(CpalBackend::new()),
    };

    let monitor = MonitorHandle::with_backend(config, backend);
    let mut events = monitor.subscribe();
    monitor
        .start_monitoring()
        .context("starting monitoring")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building event runtime")?;

    let source_closed = runtime.block_on(async move {
        let deadline = async {
            match duration_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("[cry_monitor] Interrupted");
                    return false;
                }
                _ = &mut deadline => return false,
                received = events.recv() => match received {
                    Ok(event) => {
                        println!("{}", event.to_json());
                        if matches!(event, MonitorEvent::SourceClosed { .. }) {
                            return true;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "[cry_monitor] Event consumer lagged");
                    }
                    Err(RecvError::Closed) => return true,
                }
            }
        }
    });

    let summary = monitor.stop_monitoring()?;
    if let Some(summary) = summary {
        tracing::info!(
            frames = summary.frames_processed,
            final_state = ?summary.final_state,
            source_closed,
            "[cry_monitor] Session finished"
        );
    }
    Ok(ExitCode::from(0))
}

fn run_analyze(
    config: AppConfig,
    catalog: &FixtureCatalog,
    wav: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let processor = FixtureProcessor::new(config);
    let data = catalog.load(wav, override_expect)?;
    let run = processor.run(&data);

    emit_report(&data.metadata.name, data.sample_rate, &run, output_path)?;

    if let Some(expectations) = data.expectations {
        match expectations.verify(&run.transitions) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        }
    } else {
        Ok(ExitCode::from(0))
    }
}

fn run_synth(spec: &SignalSpec, output: PathBuf) -> Result<ExitCode> {
    spec.write_wav(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    let summary = serde_json::json!({
        "output": output.display().to_string(),
        "signal": spec,
        "samples": spec.sample_count(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(ExitCode::from(0))
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_report(
    fixture: &str,
    sample_rate: u32,
    run: &FixtureRun,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let report = AnalysisReportPayload {
        fixture,
        sample_rate,
        frames_processed: run.frames_processed,
        frames_rejected: run.frames_rejected,
        final_state: run.final_state,
        peak_level: run.peak_level,
        event_count: run.transitions.len(),
        events: &run.transitions,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct AnalysisReportPayload<'a> {
    fixture: &'a str,
    sample_rate: u32,
    frames_processed: u64,
    frames_rejected: u64,
    final_state: cry_detector::CryState,
    peak_level: f32,
    event_count: usize,
    events: &'a [DetectedTransition],
}
