//! ANFIS - Adaptive Neuro-Fuzzy Inference System
//! Command-line interface for building, inspecting and training models

mod data;

use std::fs;
use std::path::{Path, PathBuf};

use anfis::prelude::*;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "anfis")]
#[command(author = "Silvano Neto <dev@silvanoneto.com>")]
#[command(version = "2026.1.16")]
#[command(about = "ANFIS - Adaptive Neuro-Fuzzy Inference System", long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show variables, rules and parameter counts of a model
    Info {
        /// Model config (.json or .toml)
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// List every rule antecedent
        #[arg(short, long)]
        rules: bool,
    },

    /// Run the model on a CSV of input rows
    Eval {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// CSV with one sample per row, one column per variable
        #[arg(short, long, value_name = "CSV")]
        input: PathBuf,

        /// Parameter snapshot (.json) to load before evaluating
        #[arg(short, long, value_name = "SNAPSHOT")]
        snapshot: Option<PathBuf>,
    },

    /// Sample one variable's membership functions across its universe
    Grid {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Variable index
        #[arg(long, default_value_t = 0)]
        variable: usize,

        /// Number of grid points
        #[arg(short, long, default_value_t = 21)]
        points: usize,

        #[arg(short, long, value_name = "SNAPSHOT")]
        snapshot: Option<PathBuf>,
    },

    /// Fit the model to a CSV whose last column is the target
    Train {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Training data; the last column is the target (class index for classifiers)
        #[arg(short, long, value_name = "CSV")]
        data: PathBuf,

        #[arg(short, long, default_value_t = 100)]
        epochs: usize,

        /// Learning rate
        #[arg(long, default_value_t = 0.01)]
        lr: f64,

        #[arg(long, value_enum, default_value_t = OptimizerKind::Adam)]
        optimizer: OptimizerKind,

        /// Learning-rate schedule over the epochs
        #[arg(long, value_enum, default_value_t = Schedule::Constant)]
        schedule: Schedule,

        /// Write the trained parameters here (.json)
        #[arg(short, long, value_name = "SNAPSHOT")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OptimizerKind {
    Sgd,
    Adam,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Schedule {
    Constant,
    /// Cosine annealing down to 1% of the initial rate
    Cosine,
    /// Halve the rate every tenth of the run
    Step,
}

impl Schedule {
    fn rate(self, initial: f64, epoch: usize, epochs: usize) -> f64 {
        match self {
            Schedule::Constant => initial,
            Schedule::Cosine => lr_cosine_annealing(initial, epoch, epochs, initial * 0.01),
            Schedule::Step => lr_step_decay(initial, epoch, (epochs / 10).max(1), 0.5),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Info { config, rules } => info_command(&config, rules),
        Commands::Eval {
            config,
            input,
            snapshot,
        } => eval_command(&config, &input, snapshot.as_deref()),
        Commands::Grid {
            config,
            variable,
            points,
            snapshot,
        } => grid_command(&config, variable, points, snapshot.as_deref()),
        Commands::Train {
            config,
            data,
            epochs,
            lr,
            optimizer,
            schedule,
            output,
        } => train_command(&config, &data, epochs, lr, optimizer, schedule, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "anfis=debug" } else { "anfis=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ============================================================================
// Model loading
// ============================================================================

fn load_model(config: &Path, snapshot: Option<&Path>) -> Result<Anfis> {
    let config = AnfisConfig::load(config).with_context(|| format!("loading {}", config.display()))?;
    let mut model = Anfis::from_config(&config)?;
    if let Some(path) = snapshot {
        let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        model
            .restore(&ParameterSnapshot::from_json(&json)?)
            .with_context(|| format!("restoring {}", path.display()))?;
        debug!(snapshot = %path.display(), "parameters restored");
    }
    Ok(model)
}

// ============================================================================
// Commands
// ============================================================================

fn info_command(config: &Path, list_rules: bool) -> Result<()> {
    let model = load_model(config, None)?;

    println!("{} {}", "Model".green().bold(), config.display().to_string().cyan());
    println!("  {:<12} {}", "consequent", model.consequent().name());
    println!("  {:<12} {}", "classes", model.n_classes());
    println!("  {:<12} {}", "rules", model.n_rules());
    println!("  {:<12} {}", "parameters", model.parameter_count());
    println!();
    println!("{}", "Variables".bold());
    for var in model.variables() {
        let mf = var.mf();
        println!(
            "  {:<12} {:>2} × {:<10} on {}",
            var.name(),
            mf.n_sets(),
            mf.kind().to_string(),
            mf.universe()
        );
    }

    if list_rules {
        println!();
        println!("{}", "Rules".bold());
        for (i, label) in model.rule_labels().iter().enumerate() {
            println!("  {:>4}  IF {}", i, label);
        }
    }
    Ok(())
}

fn eval_command(config: &Path, input: &Path, snapshot: Option<&Path>) -> Result<()> {
    let model = load_model(config, snapshot)?;
    let rows = data::read_rows(input)?;
    let x = Tensor::from_rows(&rows)?;
    let y = model.predict(&x)?;

    let width = y.len() / rows.len().max(1);
    for chunk in y.data().chunks(width.max(1)) {
        let line: Vec<String> = chunk.iter().map(|v| format!("{:.6}", v)).collect();
        println!("{}", line.join(","));
    }
    info!(rows = rows.len(), "evaluated");
    Ok(())
}

fn grid_command(config: &Path, variable: usize, points: usize, snapshot: Option<&Path>) -> Result<()> {
    let model = load_model(config, snapshot)?;
    let Some(var) = model.variables().get(variable) else {
        bail!("variable {} out of range (model has {})", variable, model.n_vars());
    };
    let (grid, degrees) = var.mf().sample_grid(points)?;

    let header: Vec<String> = (0..var.mf().n_sets()).map(|s| format!("S{}", s)).collect();
    println!("{},{}", var.name(), header.join(","));
    for (i, x) in grid.data().iter().enumerate() {
        let row = degrees.row(i).unwrap_or_default();
        let cells: Vec<String> = row.iter().map(|d| format!("{:.6}", d)).collect();
        println!("{:.6},{}", x, cells.join(","));
    }
    Ok(())
}

fn train_command(
    config: &Path,
    data_path: &Path,
    epochs: usize,
    lr: f64,
    optimizer: OptimizerKind,
    schedule: Schedule,
    output: Option<&Path>,
) -> Result<()> {
    let mut model = load_model(config, None)?;
    let rows = data::read_rows(data_path)?;
    let (features, targets) = data::split_target(&rows)?;
    let x = Tensor::from_rows(&features)?;
    let n_classes = model.n_classes();
    let labels = if n_classes > 1 { Some(data::labels(&targets, n_classes)?) } else { None };
    let y = Tensor::vector(targets);

    println!(
        "{} {} samples, {} rules, {} parameters",
        "Training".green().bold(),
        rows.len(),
        model.n_rules(),
        model.parameter_count()
    );

    let run = Run {
        x: &x,
        y: &y,
        labels: labels.as_deref(),
        epochs,
        schedule,
    };
    match optimizer {
        OptimizerKind::Sgd => fit(&mut model, &run, &mut Sgd::with_momentum(lr, 0.9))?,
        OptimizerKind::Adam => fit(&mut model, &run, &mut Adam::new(lr))?,
    }

    if let Some(path) = output {
        fs::write(path, model.snapshot().to_json()?).with_context(|| format!("writing {}", path.display()))?;
        println!("{} {}", "   Saved".green().bold(), path.display().to_string().cyan());
    }
    Ok(())
}

struct Run<'a> {
    x: &'a Tensor,
    y: &'a Tensor,
    labels: Option<&'a [usize]>,
    epochs: usize,
    schedule: Schedule,
}

fn fit(model: &mut Anfis, run: &Run<'_>, opt: &mut impl Optimizer) -> Result<()> {
    let Run {
        x,
        y,
        labels,
        epochs,
        schedule,
    } = *run;
    let initial_lr = opt.learning_rate();
    let report_every = (epochs / 10).max(1);
    for epoch in 0..epochs {
        opt.set_learning_rate(schedule.rate(initial_lr, epoch, epochs));
        let tape = Tape::new();
        let out = model.forward(&tape, tape.constant(x.clone()))?.output;
        let loss = match labels {
            Some(labels) => cross_entropy(out, labels)?,
            None => mse(out, tape.constant(y.clone()))?,
        };
        let value = loss.value().item().unwrap_or(f64::NAN);
        let mut grads = tape.backward(loss)?;
        grads.clip_norm(10.0);
        opt.step(model.parameters_mut(), &grads)?;

        if epoch % report_every == 0 || epoch + 1 == epochs {
            println!("  epoch {:>5}  loss {:.6}  lr {:.2e}", epoch + 1, value, opt.learning_rate());
        }
        if !value.is_finite() {
            bail!("loss diverged at epoch {}", epoch + 1);
        }
    }
    Ok(())
}
