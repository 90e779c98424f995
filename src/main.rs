//! Command-line front end: train models, predict porosity, and print reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crumbcast::analysis::FeatureEngineer;
use crumbcast::config::{self, EngineSettings};
use crumbcast::logging;
use crumbcast::ml::TrainControl;
use crumbcast::predict::{ModelStore, PredictError, PredictionService, Strategy};
use crumbcast::recipe::{Recipe, load_recipes};
use crumbcast::report;
use crumbcast::stats::StatisticsEngine;
use tracing::warn;

const DEFAULT_SIMILAR_LIMIT: usize = 5;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let mut settings = config::load_or_default().map_err(|err| err.to_string())?;
    if let Err(err) = logging::init(&settings.logging) {
        eprintln!("Logging disabled: {err}");
    }
    if let Some(dir) = &options.models_dir {
        settings.models_dir = Some(dir.clone());
    }
    match &options.command {
        Command::Train { recipes } => train(&settings, recipes, options.timeout_secs),
        Command::Status { recipes } => status(&settings, recipes, options.json),
        Command::Similar {
            recipes,
            query,
            limit,
        } => similar(&settings, recipes, query, *limit, options.json),
        Command::Predict {
            recipes,
            query,
            strategy,
        } => predict(&settings, recipes.as_deref(), query, *strategy, options.json),
        Command::Stats { recipes } => stats(&settings, recipes, options.json),
        Command::Report { recipes, kind } => print_report(&settings, recipes, *kind),
        Command::InitConfig => {
            config::save(&settings).map_err(|err| err.to_string())?;
            let path = config::config_path().map_err(|err| err.to_string())?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

fn open_service(settings: &EngineSettings) -> Result<PredictionService, String> {
    let dir = settings.resolve_models_dir().map_err(|err| err.to_string())?;
    let store = match ModelStore::open(dir.clone()) {
        Ok(store) => store,
        Err(err) => {
            warn!("Ignoring unreadable model store: {err}");
            ModelStore::empty(dir)
        }
    };
    Ok(PredictionService::new(
        FeatureEngineer::default(),
        settings.correlation,
        settings.ensemble.clone(),
        Arc::new(store),
    ))
}

fn read_recipes(path: &Path) -> Result<Vec<Recipe>, String> {
    load_recipes(path).map_err(|err| err.to_string())
}

fn train(
    settings: &EngineSettings,
    recipes: &Path,
    timeout_secs: Option<u64>,
) -> Result<(), String> {
    let recipes = read_recipes(recipes)?;
    let service = open_service(settings)?;
    let control = match timeout_secs.or(settings.train_timeout_secs) {
        Some(secs) => TrainControl::with_timeout(Duration::from_secs(secs)),
        None => TrainControl::new(),
    };
    let summary = service.retrain(&recipes, &control);
    println!(
        "Correlation predictor: {} training samples",
        summary.correlation_samples
    );
    let outcome = summary.ensemble.map_err(|err| err.to_string())?;
    if outcome.skipped_recipes > 0 || outcome.excluded_targets > 0 {
        println!(
            "Skipped {} malformed and {} out-of-range recipes",
            outcome.skipped_recipes, outcome.excluded_targets
        );
    }
    print!("{}", report::training_report(&outcome.metadata));
    Ok(())
}

fn predict(
    settings: &EngineSettings,
    recipes: Option<&Path>,
    query: &Path,
    strategy: Option<Strategy>,
    json: bool,
) -> Result<(), String> {
    let service = open_service(settings)?;
    if let Some(path) = recipes {
        service.train_correlation(&read_recipes(path)?);
    }
    let engineer = FeatureEngineer::default();
    let strategy = strategy.unwrap_or(settings.strategy);
    for recipe in read_recipes(query)? {
        let result = service
            .predict(&recipe, strategy)
            .map_err(|err| describe_failure(&recipe, &err))?;
        if json {
            let text = serde_json::to_string_pretty(&result).map_err(|err| err.to_string())?;
            println!("{text}");
        } else {
            let detail = engineer.engineer_detailed(&recipe).ok();
            print!("{}", report::prediction_report(&recipe, &result, detail.as_ref()));
            let factors = service.analyze_recipe_factors(&recipe);
            print!("{}", report::recipe_factors_report(&factors));
        }
    }
    Ok(())
}

/// A rejected query lists every structural problem, not only the first.
fn describe_failure(recipe: &Recipe, err: &PredictError) -> String {
    let problems = recipe.validate();
    if !matches!(err, PredictError::Feature(_)) || problems.is_empty() {
        return format!("{}: {err}", recipe.name);
    }
    let lines: Vec<String> = problems.iter().map(|problem| format!("  - {problem}")).collect();
    format!("{}: {err}\n{}", recipe.name, lines.join("\n"))
}

fn status(settings: &EngineSettings, recipes: &Path, json: bool) -> Result<(), String> {
    let recipes = read_recipes(recipes)?;
    let service = open_service(settings)?;
    service.train_correlation(&recipes);
    let status = service.training_status(&recipes);
    let info = service.model_info();
    if json {
        let value = serde_json::json!({ "status": status, "models": info });
        let text = serde_json::to_string_pretty(&value).map_err(|err| err.to_string())?;
        println!("{text}");
    } else {
        print!("{}", report::status_report(&status, &info));
    }
    Ok(())
}

fn similar(
    settings: &EngineSettings,
    recipes: &Path,
    query: &Path,
    limit: usize,
    json: bool,
) -> Result<(), String> {
    let candidates = read_recipes(recipes)?;
    let service = open_service(settings)?;
    for recipe in read_recipes(query)? {
        let matches = service.similar_recipes(&recipe, &candidates, limit);
        if json {
            let text = serde_json::to_string_pretty(&matches).map_err(|err| err.to_string())?;
            println!("{text}");
        } else {
            print!("{}", report::similar_report(&recipe, &matches));
        }
    }
    Ok(())
}

fn stats(settings: &EngineSettings, recipes: &Path, json: bool) -> Result<(), String> {
    let recipes = read_recipes(recipes)?;
    let service = open_service(settings)?;
    service.train_correlation(&recipes);
    let engine = StatisticsEngine::new(
        FeatureEngineer::default(),
        settings.confidence_level,
        settings.correlation.significance,
    );
    let dashboard = engine.dashboard(&recipes, &service);
    if json {
        let text = serde_json::to_string_pretty(&dashboard).map_err(|err| err.to_string())?;
        println!("{text}");
        return Ok(());
    }
    match &dashboard.training_stats {
        Some(stats) => println!(
            "Training samples: {}  mean {:.1}%  std {:.1}  range {:.1}-{:.1}%",
            stats.count, stats.mean, stats.std, stats.min, stats.max
        ),
        None => println!("Training samples: 0"),
    }
    println!("R²: {:.3}", dashboard.r_squared);
    if let Some(ci) = &dashboard.confidence_intervals {
        println!(
            "Mean porosity {:.0}% CI: {:.1}% to {:.1}%",
            ci.porosity.level * 100.0,
            ci.porosity.lower,
            ci.porosity.upper
        );
    }
    if let Some(residuals) = &dashboard.residuals {
        println!(
            "Residuals: MAE {:.2}  RMSE {:.2}  max {:.2}",
            residuals.mae, residuals.rmse, residuals.max_abs_error
        );
    }
    println!();
    print!("{}", report::correlations_report(&dashboard.correlations));
    Ok(())
}

fn print_report(
    settings: &EngineSettings,
    recipes: &Path,
    kind: ReportKind,
) -> Result<(), String> {
    let service = open_service(settings)?;
    let text = match kind {
        ReportKind::Training => {
            let model = service
                .store()
                .current()
                .ok_or_else(|| "No trained models available".to_string())?;
            report::training_report(&model.metadata)
        }
        ReportKind::Importance => {
            let model = service.store().current();
            let importance = model.as_ref().and_then(|m| m.feature_importance());
            let values = importance.as_ref().map(|(_, values)| values.as_slice());
            report::feature_importance_report(values)
        }
        ReportKind::Correlations => {
            let recipes = read_recipes(recipes)?;
            let correlations = StatisticsEngine::default().feature_correlations(&recipes);
            report::correlations_report(&correlations)
        }
    };
    print!("{text}");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportKind {
    Training,
    Importance,
    Correlations,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Train {
        recipes: PathBuf,
    },
    Predict {
        recipes: Option<PathBuf>,
        query: PathBuf,
        strategy: Option<Strategy>,
    },
    Stats {
        recipes: PathBuf,
    },
    Status {
        recipes: PathBuf,
    },
    Similar {
        recipes: PathBuf,
        query: PathBuf,
        limit: usize,
    },
    Report {
        recipes: PathBuf,
        kind: ReportKind,
    },
    InitConfig,
}

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    command: Command,
    models_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
    json: bool,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let Some((command, rest)) = args.split_first() else {
        return Err(help_text());
    };
    let mut recipes: Option<PathBuf> = None;
    let mut query: Option<PathBuf> = None;
    let mut strategy: Option<Strategy> = None;
    let mut kind = ReportKind::Training;
    let mut models_dir: Option<PathBuf> = None;
    let mut timeout_secs: Option<u64> = None;
    let mut limit = DEFAULT_SIMILAR_LIMIT;
    let mut json = false;

    let mut idx = 0usize;
    while idx < rest.len() {
        match rest[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--json" => json = true,
            "--recipes" => {
                idx += 1;
                let value = rest.get(idx).ok_or_else(|| "--recipes requires a value".to_string())?;
                recipes = Some(PathBuf::from(value));
            }
            "--query" => {
                idx += 1;
                let value = rest.get(idx).ok_or_else(|| "--query requires a value".to_string())?;
                query = Some(PathBuf::from(value));
            }
            "--models" => {
                idx += 1;
                let value = rest.get(idx).ok_or_else(|| "--models requires a value".to_string())?;
                models_dir = Some(PathBuf::from(value));
            }
            "--strategy" => {
                idx += 1;
                let value = rest.get(idx).ok_or_else(|| "--strategy requires a value".to_string())?;
                strategy = Some(value.parse::<Strategy>()?);
            }
            "--timeout" => {
                idx += 1;
                let value = rest.get(idx).ok_or_else(|| "--timeout requires a value".to_string())?;
                timeout_secs = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --timeout value: {value}"))?,
                );
            }
            "--limit" => {
                idx += 1;
                let value = rest.get(idx).ok_or_else(|| "--limit requires a value".to_string())?;
                limit = value
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("Invalid --limit value: {value}"))?;
            }
            "--kind" => {
                idx += 1;
                let value = rest.get(idx).ok_or_else(|| "--kind requires a value".to_string())?;
                kind = match value.as_str() {
                    "training" => ReportKind::Training,
                    "importance" => ReportKind::Importance,
                    "correlations" => ReportKind::Correlations,
                    other => return Err(format!("Invalid --kind value: {other}")),
                };
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let require_recipes =
        |recipes: Option<PathBuf>| recipes.ok_or_else(|| "--recipes is required".to_string());
    let require_query =
        |query: Option<PathBuf>| query.ok_or_else(|| "--query is required".to_string());
    let command = match command.as_str() {
        "train" => Command::Train {
            recipes: require_recipes(recipes)?,
        },
        "predict" => Command::Predict {
            recipes,
            query: require_query(query)?,
            strategy,
        },
        "status" => Command::Status {
            recipes: require_recipes(recipes)?,
        },
        "similar" => Command::Similar {
            recipes: require_recipes(recipes)?,
            query: require_query(query)?,
            limit,
        },
        "stats" => Command::Stats {
            recipes: require_recipes(recipes)?,
        },
        "report" => {
            let recipes = match kind {
                ReportKind::Correlations => require_recipes(recipes)?,
                _ => recipes.unwrap_or_default(),
            };
            Command::Report { recipes, kind }
        }
        "init-config" => Command::InitConfig,
        "-h" | "--help" | "help" => return Err(help_text()),
        other => return Err(format!("Unknown command: {other}\n\n{}", help_text())),
    };
    Ok(CliOptions {
        command,
        models_dir,
        timeout_secs,
        json,
    })
}

fn help_text() -> String {
    [
        "crumbcast",
        "",
        "Predicts bread crumb porosity from recipes.",
        "",
        "Usage:",
        "  crumbcast train --recipes <file> [--timeout <secs>] [--models <dir>]",
        "  crumbcast predict --query <file> [--recipes <file>] [--strategy <name>] [--json]",
        "  crumbcast stats --recipes <file> [--json]",
        "  crumbcast status --recipes <file> [--json]",
        "  crumbcast similar --query <file> --recipes <file> [--limit <n>] [--json]",
        "  crumbcast report --kind training|importance|correlations [--recipes <file>]",
        "  crumbcast init-config",
        "",
        "Options:",
        "  --recipes <file>   JSON recipe records; measured ones train the predictors.",
        "  --query <file>     JSON recipe records to predict.",
        "  --models <dir>     Model store directory (default: <app root>/models).",
        "  --strategy <name>  auto, ensemble or correlation (default from config.toml).",
        "  --limit <n>        Most similar recipes to list (default 5).",
        "  --timeout <secs>   Abort ensemble training after this many seconds.",
        "  --json             Print JSON instead of text reports.",
    ]
    .join("\n")
}
