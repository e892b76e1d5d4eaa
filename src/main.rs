use clap::Parser;
use reuse_optimizer::config::{ClassPolicy, CrossSectionPolicy, EngineConfig, SynthesisConfig};
use reuse_optimizer::{assign, loader, report};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "reuse_optimizer",
    about = "Assigns demanded pieces to reclaimed, recovered and market stock"
)]
struct Cli {
    /// Input JSON with `demands`, `stock` and optional `market` columns
    #[arg(long)]
    input: String,

    /// Engine config JSON; the flags below override it
    #[arg(long)]
    config: Option<String>,

    /// Minimum remnant length recovered as leftover stock
    #[arg(long)]
    min_leftover: Option<f64>,

    /// Ratio-ceiling mode: maximum stock area / demand area
    #[arg(long, conflicts_with = "min_section_ratio")]
    max_area_ratio: Option<f64>,

    /// Ratio-floor mode: minimum demand area / stock area
    #[arg(long)]
    min_section_ratio: Option<f64>,

    /// Group followers occupying at least this share of the stock section
    #[arg(long, requires = "group_tolerance")]
    group_min_ratio: Option<f64>,

    /// Band around the lead's section ratio that counts as compatible
    #[arg(long, requires = "group_min_ratio")]
    group_tolerance: Option<f64>,

    /// Run one pass per strength class so lower classes can use higher-class stock
    #[arg(long)]
    upgrade_classes: bool,

    /// Synthesize custom pieces for demands nothing else can serve
    #[arg(long)]
    synthesize: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log every placement
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn engine_config(&self) -> Result<EngineConfig, String> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path).map_err(|e| e.to_string())?,
            None => EngineConfig::default(),
        };
        if let Some(length) = self.min_leftover {
            config = config.with_minimum_leftover(length);
        }
        if let Some(max) = self.max_area_ratio {
            config = config.with_cross_section_policy(CrossSectionPolicy::RatioCeiling {
                max_stock_to_demand_area_ratio: max,
            });
        }
        if let Some(min) = self.min_section_ratio {
            config = config.with_cross_section_policy(CrossSectionPolicy::RatioFloor {
                min_cross_section_ratio: min,
            });
        }
        if let (Some(min), Some(tolerance)) = (self.group_min_ratio, self.group_tolerance) {
            config = config.with_grouping(min, tolerance);
        }
        if self.upgrade_classes {
            config = config.with_class_policy(ClassPolicy::Upgrade);
        }
        if self.synthesize && config.synthesis.is_none() {
            config = config.with_synthesis(SynthesisConfig::default());
        }
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let config = cli.engine_config().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let raw = std::fs::read_to_string(&cli.input).unwrap_or_else(|e| {
        eprintln!("Error: failed to read {}: {}", cli.input, e);
        std::process::exit(1);
    });
    let records = loader::from_json_str(&raw).unwrap_or_else(|e| {
        eprintln!("Error: invalid input {}: {}", cli.input, e);
        std::process::exit(1);
    });
    for w in &records.warnings {
        eprintln!("Warning: {}", w);
    }

    let solution = assign(records.demands, records.reclaimed, records.market, config)
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        });
    let report = report::build(&solution);

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print!("{}", report.to_text());
    }
}
