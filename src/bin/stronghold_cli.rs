use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use stronghold_engine::constants::{DEFAULT_RINGS, FIRST_RING, FIRST_RING_WIKI, PROGRESS_TICKS};
use stronghold_engine::{
    load_rings, run_simulation, write_table, OutputFormat, ResultTable, Ring, SimulationConfig,
    SweepBounds, SweepProgress, ThresholdOutput,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stronghold-cli")]
#[command(version = "0.1.0")]
#[command(about = "Monte-Carlo stronghold distance and blind travel calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Average distance to the nearest stronghold at each radius
    Average {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Chance that blind travel from each radius lands near a stronghold
    Blind {
        #[command(flatten)]
        run: RunArgs,

        /// Distance to a stronghold that counts as a success (blocks)
        #[arg(long)]
        threshold: Option<f64>,

        /// Report the share of successful samples instead of the raw count
        #[arg(long)]
        probability: bool,
    },

    /// Print a ring table as JSON
    Rings {
        /// Built-in ring table
        #[arg(long, value_enum, default_value = "standard")]
        set: RingSet,

        /// Ring table file to check and print instead
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Display tool information
    Info,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Number of simulated worlds
    #[arg(short = 'b', long)]
    batches: Option<usize>,

    /// Strongholds placed per world (defaults to every ring in full)
    #[arg(short = 'k', long)]
    strongholds: Option<usize>,

    /// First radius of the sweep (blocks)
    #[arg(long)]
    start: Option<f64>,

    /// Last radius of the sweep (blocks)
    #[arg(long)]
    end: Option<f64>,

    /// Number of radius increments
    #[arg(short = 'w', long)]
    radius_steps: Option<usize>,

    /// Number of sampled directions per world
    #[arg(short = 't', long)]
    angle_steps: Option<usize>,

    /// Leave the end radius out of the sweep
    #[arg(long)]
    exclusive: bool,

    /// Built-in ring table
    #[arg(long, value_enum, conflicts_with = "rings")]
    ring_set: Option<RingSet>,

    /// Ring table file (JSON array of {count, radius_min, radius_max})
    #[arg(long)]
    rings: Option<PathBuf>,

    /// RNG seed
    #[arg(short = 's', long, default_value = "0")]
    seed: u64,

    /// Worker threads (defaults to one per core)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Evaluate radius steps one at a time
    #[arg(long)]
    sequential: bool,

    /// Write the table to this file instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Table format
    #[arg(short = 'f', long, value_enum)]
    format: Option<TableFormat>,

    /// Hide the loading bar
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RingSet {
    /// All eight rings, 128 strongholds
    Standard,
    /// First ring at the range placement actually rolls
    FirstRing,
    /// First ring at the published range
    Wiki,
}

impl RingSet {
    fn rings(self) -> Vec<Ring> {
        match self {
            RingSet::Standard => DEFAULT_RINGS.to_vec(),
            RingSet::FirstRing => FIRST_RING.to_vec(),
            RingSet::Wiki => FIRST_RING_WIKI.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TableFormat {
    Labeled,
    Csv,
    Json,
}

impl From<TableFormat> for OutputFormat {
    fn from(format: TableFormat) -> Self {
        match format {
            TableFormat::Labeled => OutputFormat::Labeled,
            TableFormat::Csv => OutputFormat::Csv,
            TableFormat::Json => OutputFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run_cli(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::Average { run } => {
            let config = apply_run_args(SimulationConfig::average_distance(), &run)?;
            execute(&config, &run, OutputFormat::Labeled)?;
        },

        Commands::Blind { run, threshold, probability } => {
            let mut config = apply_run_args(SimulationConfig::blind_travel(), &run)?;
            let output = if probability { ThresholdOutput::Probability } else { ThresholdOutput::Count };
            let threshold = threshold.or(config.sweep.threshold).ok_or("Threshold is required")?;
            config.sweep = config.sweep.with_threshold(threshold, output);
            execute(&config, &run, OutputFormat::Csv)?;
        },

        Commands::Rings { set, file } => {
            let rings = match file {
                Some(path) => load_rings(&path)?,
                None => set.rings(),
            };
            println!("{}", serde_json::to_string_pretty(&rings)?);
        },

        Commands::Info => {
            println!("╔════════════════════════════════════════╗");
            println!("║      STRONGHOLD ENGINE v0.1.0          ║");
            println!("╠════════════════════════════════════════╣");
            println!("║ Monte-Carlo estimates of the distance  ║");
            println!("║ to the nearest stronghold.             ║");
            println!("╠════════════════════════════════════════╣");
            println!("║ Commands:                              ║");
            println!("║ • average  mean nearest distance       ║");
            println!("║ • blind    blind travel success odds   ║");
            println!("║ • rings    show a ring table           ║");
            println!("╚════════════════════════════════════════╝");
        }
    }

    Ok(())
}

fn apply_run_args(mut config: SimulationConfig, run: &RunArgs) -> Result<SimulationConfig, Box<dyn Error>> {
    if let Some(path) = &run.rings {
        config.rings = load_rings(path)?;
    } else if let Some(set) = run.ring_set {
        config.rings = set.rings();
    }
    if let Some(batches) = run.batches {
        config.batch_count = batches;
    }
    config.points_per_batch = run.strongholds;
    if let Some(start) = run.start {
        config.sweep.radius_start = start;
    }
    if let Some(end) = run.end {
        config.sweep.radius_end = end;
    }
    if let Some(steps) = run.radius_steps {
        config.sweep.radius_steps = steps;
    }
    if let Some(steps) = run.angle_steps {
        config.sweep.angle_steps = steps;
    }
    if run.exclusive {
        config.sweep.bounds = SweepBounds::Exclusive;
    }
    config.sweep.parallel = !run.sequential;
    config.seed = run.seed;
    config.threads = run.threads;
    Ok(config)
}

fn execute(config: &SimulationConfig, run: &RunArgs, default_format: OutputFormat) -> Result<(), Box<dyn Error>> {
    // Fail on bad input before the loading bar is drawn
    config.validate()?;

    let format = run.format.map(OutputFormat::from).unwrap_or(default_format);

    let table = if run.quiet {
        run_simulation(config, None)?
    } else {
        let bar = LoadingBar::new(PROGRESS_TICKS, ProgressDrawTarget::stderr())?;
        let report = |p: SweepProgress| bar.update(p);
        let table = run_simulation(config, Some(&report))?;
        bar.finish();
        table
    };

    match &run.output {
        Some(path) => {
            write_table(&table, path, format)?;
            display_summary(&table, config);
            println!("Results written to {}", path.display());
        },
        None => {
            print!("{}", table.render(format)?);
        },
    }

    Ok(())
}

fn display_summary(table: &ResultTable, config: &SimulationConfig) {
    let Some(summary) = table.summary() else {
        return;
    };
    let label = table.metric().label();

    println!("╔════════════════════════════════════════╗");
    println!("║      STRONGHOLD SIMULATION             ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Worlds:            {:>10}          ║", config.batch_count);
    println!("║ Strongholds:       {:>10}          ║", config.points_per_batch());
    println!("║ Radius rows:       {:>10}          ║", summary.rows);
    println!("╠════════════════════════════════════════╣");
    println!("║ {:<38} ║", label.to_uppercase());
    println!("║ Mean:              {:>10.3}          ║", summary.mean);
    println!("║ Std Dev:           {:>10.3}          ║", summary.std_dev);
    println!("║ Min:               {:>10.3}          ║", summary.min.value);
    println!("║ Max:               {:>10.3}          ║", summary.max.value);
    println!("╠════════════════════════════════════════╣");
    println!("║ Best radius:       {:>10.1}          ║", summary.best.radius);
    println!("║ Best value:        {:>10.3}          ║", summary.best.value);
    println!("╚════════════════════════════════════════╝");
}

/// Console loading bar of `ticks` steps, advanced as sweep rows finish
struct LoadingBar {
    bar: ProgressBar,
    ticks: usize,
}

impl LoadingBar {
    fn new(ticks: usize, target: ProgressDrawTarget) -> Result<Self, Box<dyn Error>> {
        let bar = ProgressBar::with_draw_target(Some(ticks as u64), target);
        bar.set_style(ProgressStyle::with_template("Loading :{bar:100} {pos} / {len}")?.progress_chars("#-"));
        Ok(Self { bar, ticks })
    }

    fn update(&self, progress: SweepProgress) {
        // Every row count is reported once, so the increments add up to `ticks`
        let total = progress.total.max(1);
        let tick = progress.completed * self.ticks / total;
        let previous = progress.completed.saturating_sub(1) * self.ticks / total;
        self.bar.inc((tick - previous) as u64);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
