//! Spacing Calibration - per-image calibration scale management
//!
//! This is the CLI entry point for the spacing-calibration tool.
//! Run with: cargo run --bin spacing-calibration -- <command>

use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use spacing_calibration::config::get_messages;
use spacing_calibration::{
    dialog_channel, AppSettings, CalibrationLine, CalibrationOutcome, CalibrationStore,
    CalibrationWorkflow, DialogRequest, InputDialog, InputPrompt, Point3, RenderingEngineId,
    RescaleInstruction, ViewingSurface,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: spacing-calibration <command>

Commands:
  list                                  Show all stored calibration scales
  get <imageId>                         Show the scale stored for one image
  set <imageId> <scale>                 Store a scale for one image
  clear [imageId]                       Clear one image, or every image
  calibrate <imageId> <x,y,z> <x,y,z>   Calibrate against a reference line
  settings [save]                       Show the effective settings, or save them";

/// Prints rescale instructions instead of driving a renderer.
struct ConsoleSurface {
    engine: RenderingEngineId,
}

impl ViewingSurface for ConsoleSurface {
    fn rendering_engine(&self) -> RenderingEngineId {
        self.engine.clone()
    }

    fn apply_rescale(&self, instruction: &RescaleInstruction) {
        match serde_json::to_string(instruction) {
            Ok(json) => println!("🎯 Rescale: {}", json),
            Err(e) => tracing::error!("Failed to format rescale instruction: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let settings = AppSettings::load().with_env_overrides();

    // Initialize tracing, RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    if command == "settings" {
        return show_settings(&settings, &args[1..]);
    }

    let store = settings
        .open_store()
        .map_err(|e| anyhow!(e))
        .context("Failed to open calibration store")?;
    let messages = get_messages(&settings.lang);

    match (command.as_str(), &args[1..]) {
        ("list", []) => {
            let table = store.log_all();
            if table.is_empty() {
                println!("{}", messages.no_calibrations);
            }
            let mut entries: Vec<_> = table.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (image_id, scale) in entries {
                println!("{}\t{:.2}", image_id, scale);
            }
        }
        ("get", [image_id]) => match store.get(image_id) {
            Some(scale) => println!("{:.2}", scale),
            None => println!("{}: {}", image_id, messages.not_calibrated),
        },
        ("set", [image_id, scale]) => {
            let scale: f64 = scale
                .parse()
                .with_context(|| format!("Invalid scale: {}", scale))?;
            let outcome = store.save(image_id, scale);
            if let Some(reason) = outcome.reason() {
                bail!("{}", reason);
            }
            println!("✅ {}: {} = {:.2}", messages.calibration_saved, image_id, scale);
        }
        ("clear", rest) if rest.len() <= 1 => {
            let image_id = rest.first().map(String::as_str);
            if let Some(reason) = store.clear(image_id).reason() {
                bail!("{}", reason);
            }
            println!("✅ {}", messages.cleared);
        }
        ("calibrate", [image_id, start, end]) => {
            let line =
                CalibrationLine::new(image_id.as_str(), parse_point(start)?, parse_point(end)?);
            run_calibration(&settings, store, line).await?;
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("Unrecognized command: {}", args.join(" "));
        }
    }

    Ok(())
}

/// Run the calibration workflow, answering the dialog on stdin.
async fn run_calibration(
    settings: &AppSettings,
    store: CalibrationStore,
    line: CalibrationLine,
) -> anyhow::Result<()> {
    let messages = get_messages(&settings.lang);
    let (dialog, mut requests) = dialog_channel();

    let presenter = tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            let prompt = request.prompt.clone();
            let cancel_hint = messages.cancel_hint;
            let answer =
                tokio::task::spawn_blocking(move || ask_on_stdin(&prompt, cancel_hint)).await;
            respond(request, answer.ok().flatten());
        }
    });

    let dialog: Arc<dyn InputDialog> = Arc::new(dialog);
    let mut workflow =
        CalibrationWorkflow::new(settings.workflow_config(), Arc::new(store), Some(dialog));
    let viewport = ConsoleSurface {
        engine: RenderingEngineId::new("cli"),
    };

    let outcome = workflow.complete_calibration(&line, &viewport).await;
    // Dropping the workflow closes the dialog channel and ends the presenter
    drop(workflow);
    let _ = presenter.await;

    match outcome? {
        CalibrationOutcome::Applied(applied) => {
            println!("{}: {}", messages.reference_length, applied.reference_length);
            println!("{}: {}", messages.entered_length, applied.new_length);
            println!("{}: {:.4}", messages.scale_factor, applied.scale_factor);
            if applied.persisted.is_degraded() {
                println!("⚠️ {}", messages.calibration_not_saved);
            } else {
                println!("✅ {}", messages.calibration_saved);
            }
        }
        CalibrationOutcome::Cancelled => println!("{}", messages.calibration_cancelled),
    }

    Ok(())
}

/// Print the effective settings, writing them to the settings file on `save`.
fn show_settings(settings: &AppSettings, rest: &[String]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    match rest {
        [] => Ok(()),
        [save] if save == "save" => {
            let path = settings.save().map_err(|e| anyhow!(e))?;
            println!("✅ Settings saved to {}", path.display());
            Ok(())
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("Unrecognized settings command: {}", rest.join(" "));
        }
    }
}

fn respond(request: DialogRequest, answer: Option<String>) {
    match answer {
        Some(value) => {
            request.submit(value);
        }
        None => request.cancel(),
    }
}

/// Prompt on stdout and read one line. Empty input or EOF cancels.
fn ask_on_stdin(prompt: &InputPrompt, cancel_hint: &str) -> Option<String> {
    print!(
        "📏 {} - {} [{}] ({}): ",
        prompt.title, prompt.placeholder, prompt.default_value, cancel_hint
    );
    io::stdout().flush().ok()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line).ok()?;
    let value = line.trim();
    if read == 0 || value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_point(arg: &str) -> anyhow::Result<Point3> {
    let coords: Vec<f64> = arg
        .split(',')
        .map(|c| c.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("Invalid point: {}", arg))?;

    match coords.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        [x, y] => Ok([*x, *y, 0.0]),
        _ => bail!("Expected x,y or x,y,z: {}", arg),
    }
}
