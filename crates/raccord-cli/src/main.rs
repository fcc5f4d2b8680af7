use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use raccord_contracts::defects::DopError;
use raccord_contracts::events::EventLog;
use raccord_contracts::project::ProjectSnapshot;
use raccord_contracts::vocabulary::{Locale, Vocabulary};
use raccord_engine::{ContinuityEngine, ImageSource, ShotPair};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "raccord", version, about = "Shot-to-shot continuity checks")]
struct Cli {
    /// Append JSONL events to this file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[arg(long, global = true)]
    session_id: Option<String>,
    /// Vocabulary locale: en, fr or bilingual.
    #[arg(long, global = true, default_value = "bilingual")]
    locale: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Metadata continuity insights for a scene.
    Analyze(SceneArgs),
    /// Camera angle suggestion for the shot after a scene.
    Suggest(SuggestArgs),
    /// Offline fixable/unfixable split of a defect list.
    Classify(ClassifyArgs),
    /// Vision comparison of a scene with its predecessor.
    Validate(ValidateArgs),
    /// Retry decision for a shot that failed validation.
    Decide(DecideArgs),
}

#[derive(Debug, Args)]
struct SceneArgs {
    #[arg(long)]
    project: PathBuf,
    #[arg(long)]
    scene: String,
}

#[derive(Debug, Args)]
struct SuggestArgs {
    #[command(flatten)]
    target: SceneArgs,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Args)]
struct ClassifyArgs {
    #[arg(long)]
    errors: PathBuf,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[command(flatten)]
    target: SceneArgs,
    #[arg(long)]
    previous_image: Option<String>,
    #[arg(long)]
    current_image: Option<String>,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Args)]
struct DecideArgs {
    #[arg(long)]
    failed: Option<String>,
    #[arg(long)]
    reference: Option<String>,
    #[arg(long, default_value = "")]
    prompt: String,
    #[arg(long)]
    errors: PathBuf,
    #[arg(long)]
    model: Option<String>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("raccord error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let Some(locale) = Locale::parse(&cli.locale) else {
        bail!("unknown locale '{}' (expected en, fr or bilingual)", cli.locale);
    };
    let events = cli.events.as_ref().map(|path| {
        let session_id = cli
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        EventLog::new(path, session_id)
    });
    let vocabulary = Vocabulary::load(locale)?;

    let output = match cli.command {
        Command::Analyze(args) => {
            let engine = open_engine(&args.project, vocabulary, events)?;
            serde_json::to_value(engine.analyze(&args.scene))?
        }
        Command::Suggest(args) => {
            let engine = open_engine(&args.target.project, vocabulary, events)?;
            let suggestion = match args.seed {
                Some(seed) => {
                    engine.suggest_with(&args.target.scene, &mut StdRng::seed_from_u64(seed))
                }
                None => engine.suggest(&args.target.scene),
            };
            serde_json::to_value(suggestion)?
        }
        Command::Classify(args) => {
            let errors = read_errors(&args.errors)?;
            let engine = ContinuityEngine::new(ProjectSnapshot::default())
                .with_vocabulary(vocabulary)
                .with_events(events);
            serde_json::to_value(engine.classify(&errors))?
        }
        Command::Validate(args) => run_validate(args, vocabulary, events)?,
        Command::Decide(args) => run_decide(args, vocabulary, events)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(0)
}

fn run_validate(
    args: ValidateArgs,
    vocabulary: Vocabulary,
    events: Option<EventLog>,
) -> Result<Value> {
    let engine = open_engine(&args.target.project, vocabulary, events)?
        .with_vision_model(args.model);
    let scene_id = args.target.scene.as_str();
    let Some(pair) = ShotPair::from_project(engine.project(), scene_id) else {
        if engine.project().scene(scene_id).is_none() {
            bail!("unknown scene '{scene_id}'");
        }
        // First shot of the sequence: nothing to compare against.
        return Ok(serde_json::to_value(engine.validate_scene(scene_id))?);
    };
    let previous_image =
        image_override(args.previous_image.as_deref(), pair.previous_image.clone());
    let current_image =
        image_override(args.current_image.as_deref(), pair.current_image.clone());
    let pair = pair.with_images(previous_image, current_image);
    Ok(serde_json::to_value(engine.validate(&pair))?)
}

fn run_decide(args: DecideArgs, vocabulary: Vocabulary, events: Option<EventLog>) -> Result<Value> {
    let errors = read_errors(&args.errors)?;
    let failed = args.failed.as_deref().and_then(ImageSource::parse);
    let reference = args.reference.as_deref().and_then(ImageSource::parse);
    let engine = ContinuityEngine::new(ProjectSnapshot::default())
        .with_vocabulary(vocabulary)
        .with_events(events)
        .with_decision_model(args.model);
    let decision = engine.decide(failed.as_ref(), reference.as_ref(), &args.prompt, &errors);
    let mut output = serde_json::to_value(&decision)?;
    if let Value::Object(map) = &mut output {
        map.insert(
            "nextPrompt".to_string(),
            Value::String(decision.apply_to_prompt(&args.prompt)),
        );
    }
    Ok(output)
}

fn open_engine(
    project_path: &Path,
    vocabulary: Vocabulary,
    events: Option<EventLog>,
) -> Result<ContinuityEngine> {
    let project = ProjectSnapshot::load(project_path)?;
    Ok(ContinuityEngine::new(project)
        .with_vocabulary(vocabulary)
        .with_events(events))
}

fn image_override(raw: Option<&str>, fallback: Option<ImageSource>) -> Option<ImageSource> {
    match raw {
        Some(raw) => ImageSource::parse(raw),
        None => fallback,
    }
}

/// Reads a defect list: either a bare JSON array or a validation result
/// carrying an `errors` array.
fn read_errors(path: &Path) -> Result<Vec<DopError>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("errors file not readable ({})", path.display()))?;
    parse_errors(&raw).with_context(|| format!("invalid errors file ({})", path.display()))
}

fn parse_errors(raw: &str) -> Result<Vec<DopError>> {
    let value: Value = serde_json::from_str(raw)?;
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => match map.remove("errors") {
            Some(errors) => errors,
            None => bail!("expected an array or an object with `errors`"),
        },
        _ => bail!("expected an array or an object with `errors`"),
    };
    Ok(serde_json::from_value(list)?)
}
