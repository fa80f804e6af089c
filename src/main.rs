use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use voice_command_session::{
    engine::{EngineInitError, SimulatedEngine},
    permission::SimulatedPermissions,
    replay::{parse_script, Replay, DEMO_SCRIPT},
    status::StatusSink,
    store::SettingsStore,
    target::{InteractiveTarget, InteractiveTargetAdapter, SceneObject},
    SpeechSessionController, VoiceSettings,
};

/// Replay recognizer events against the voice session controller.
#[derive(Debug, Parser)]
#[command(name = "voice-session-sim", version)]
struct Args {
    /// JSON settings file (defaults are used when missing).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// JSON-lines replay script; runs the built-in demo when omitted.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Answer every permission dialog with "deny".
    #[arg(long)]
    deny_permission: bool,

    /// Platform without a runtime microphone permission.
    #[arg(long)]
    non_gated: bool,

    /// Number of engine init attempts that fail before one succeeds.
    #[arg(long, default_value_t = 0)]
    init_failures: u32,

    /// Run without a bound scene object.
    #[arg(long)]
    no_target: bool,
}

struct ConsoleStatus;

impl StatusSink for ConsoleStatus {
    fn show(&mut self, message: &str) {
        println!("status: {message}");
    }

    fn transcript(&mut self, text: &str) {
        println!("  ... {text}");
    }
}

fn load_settings(args: &Args) -> Result<VoiceSettings> {
    let mut settings = match &args.settings {
        Some(path) => SettingsStore::new(path.clone()).load()?,
        None => VoiceSettings::default(),
    };
    if args.non_gated {
        settings.permission_gated = false;
    }
    settings.validate().context("invalid settings")?;
    Ok(settings)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;
    info!(?settings, "settings loaded");

    let script = match &args.script {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed reading script {}", path.display()))?,
        None => DEMO_SCRIPT.to_string(),
    };
    let steps = parse_script(&script)?;

    let engine = SimulatedEngine::new();
    for _ in 0..args.init_failures {
        engine.queue_init_outcome(Err(EngineInitError::Unavailable));
    }
    let permissions = SimulatedPermissions::new(false);
    let object = SceneObject::new();
    let target: Option<Box<dyn InteractiveTarget>> = if args.no_target {
        None
    } else {
        Some(Box::new(object.clone()))
    };

    let mut controller = SpeechSessionController::new(
        Box::new(engine.clone()),
        Box::new(permissions.clone()),
        InteractiveTargetAdapter::new(target),
        Box::new(ConsoleStatus),
        settings,
    );
    controller.enable();
    controller.request_permission();

    let mut replay = Replay::new(engine, permissions).deny_permission(args.deny_permission);
    replay.run(&mut controller, &steps);

    println!("phase: {}", controller.phase().label());
    println!("{}", serde_json::to_string_pretty(&controller.state())?);
    if !args.no_target {
        println!("scene object: {:?}", object.snapshot());
    }
    controller.destroy();
    Ok(())
}
