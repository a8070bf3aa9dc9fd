use bitheap_compression::catalog::device::Device;
use bitheap_compression::catalog::Ranking;
use bitheap_compression::io;
use bitheap_compression::strategy::{
    self, CompressionConfig, FinalAdder, Mode, OptimalConfig, Tuning,
};
use bitheap_compression::validation::{multiplier_heap, random_heap, replay, RandomHeapConfig};
use bitheap_compression::{Catalog, HeapModel};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// --- Command Line Arguments ---

#[derive(Parser)]
#[command(name = "bhc")]
#[command(about = "bhc - Bit-heap compression-tree synthesis")]
#[command(version)]
#[command(subcommand_required = true)]
#[command(arg_required_else_help = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// CLI strategy selection
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliMode {
    /// Greedy placement of the most efficient compressor
    Heuristic,
    /// Per-column first-fit placement
    Baseline,
    /// Greedy placement with pseudo-compressors (needs --modulus)
    Modular,
    /// Exact integer-program search (needs a solver backend)
    Optimal,
    /// Greedy result used to bound the exact search
    Hybrid,
}

impl From<CliMode> for Mode {
    fn from(cli: CliMode) -> Self {
        match cli {
            CliMode::Heuristic => Mode::Heuristic,
            CliMode::Baseline => Mode::Baseline,
            CliMode::Modular => Mode::Modular,
            CliMode::Optimal => Mode::Optimal,
            CliMode::Hybrid => Mode::Hybrid,
        }
    }
}

/// CLI final adder selection
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliFinalAdder {
    /// Two rows per column
    Binary,
    /// Three rows per column
    Ternary,
}

impl From<CliFinalAdder> for FinalAdder {
    fn from(cli: CliFinalAdder) -> Self {
        match cli {
            CliFinalAdder::Binary => FinalAdder::Binary,
            CliFinalAdder::Ternary => FinalAdder::Ternary,
        }
    }
}

/// CLI catalog ranking selection
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliRanking {
    /// Bits removed per unit area
    Efficiency,
    /// Input/output bit ratio
    Ratio,
}

impl From<CliRanking> for Ranking {
    fn from(cli: CliRanking) -> Self {
        match cli {
            CliRanking::Efficiency => Ranking::Efficiency,
            CliRanking::Ratio => Ranking::Ratio,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a compression tree for a heap document
    Synth {
        /// Path to the heap JSON document
        heap: PathBuf,
        /// Device JSON document (generic device if not specified)
        #[arg(long)]
        device: Option<PathBuf>,
        /// Use the pipelined pass-through cost
        #[arg(long)]
        pipelined: bool,

        // --- Strategy selection ---
        /// Strategy to run
        #[arg(long, value_enum, default_value = "heuristic")]
        mode: CliMode,
        /// Final adder consuming the last stage
        #[arg(long, value_enum, default_value = "binary")]
        final_adder: CliFinalAdder,
        /// Catalog ranking
        #[arg(long, value_enum, default_value = "efficiency")]
        ranking: CliRanking,
        /// Reduce the sum modulo this value
        #[arg(long)]
        modulus: Option<u64>,
        /// Per-stage efficiency lower bounds, comma separated
        #[arg(long, value_delimiter = ',')]
        lower_bounds: Vec<f64>,
        /// Record interior zero outputs as holes
        #[arg(long)]
        holes: bool,

        // --- Tuning ---
        /// Stage cap for the greedy strategies
        #[arg(long, default_value = "64")]
        max_stages: usize,
        /// Extra stages the exact search may try above its lower bound
        #[arg(long, default_value = "4")]
        extra_stages: usize,
        /// Widest middle section the greedy strategies try for variable compressors
        #[arg(long, default_value = "32")]
        max_variable_width: usize,

        // --- Exact search options ---
        /// Solver timeout in seconds, per trial
        #[arg(long)]
        solver_timeout: Option<u64>,
        /// Largest stage count the exact search tries
        #[arg(long)]
        exact_max_stages: Option<usize>,
        /// Write the trial integer program in LP format to this file
        #[arg(long)]
        lp_dump: Option<PathBuf>,

        // --- Output ---
        /// Write the solution JSON document to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Replay the solution and report violations
        #[arg(long)]
        verify: bool,
        /// Print the placements of every stage
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print the ranked compressor catalog of a device
    Catalog {
        /// Device JSON document (generic device if not specified)
        #[arg(long)]
        device: Option<PathBuf>,
        /// Catalog ranking
        #[arg(long, value_enum, default_value = "efficiency")]
        ranking: CliRanking,
        /// Use the pipelined pass-through cost
        #[arg(long)]
        pipelined: bool,
        /// Print the device as a JSON document instead
        #[arg(long)]
        json: bool,
    },
    /// Emit a heap JSON document
    Random {
        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,
        /// Number of weight columns
        #[arg(long, default_value = "8")]
        width: usize,
        /// Tallest column a stage can receive
        #[arg(long, default_value = "8")]
        max_height: u32,
        /// Stages receiving input bits
        #[arg(long, default_value = "1")]
        stages: usize,
        /// Emit the partial products of an AxB multiplier instead (e.g. 8x8)
        #[arg(long)]
        multiplier: Option<String>,
        /// Write the document to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// Options for one synthesis run
struct SynthOptions {
    device: Option<PathBuf>,
    pipelined: bool,
    config: CompressionConfig,
    output: Option<PathBuf>,
    verify: bool,
    verbose: bool,
}

fn load_device(path: Option<&Path>, pipelined: bool) -> Result<Device, Box<dyn std::error::Error>> {
    let device = match path {
        Some(path) => io::read_device(path)?,
        None => Device::default(),
    };
    Ok(if pipelined {
        device.with_pipelined(true)
    } else {
        device
    })
}

// --- Synthesis ---

fn synthesize_heap(path: &Path, options: &SynthOptions) -> Result<(), Box<dyn std::error::Error>> {
    let heap = io::read_heap(path)?;
    let device = load_device(options.device.as_deref(), options.pipelined)?;
    let catalog = device.catalog(options.config.ranking);

    println!("Heap: {} ({} bits)", path.display(), heap.total_bits());
    println!("Device: {} ({} compressors)", device.name, catalog.len());
    println!("Mode: {}", options.config.mode);
    if let Some(m) = options.config.modulus {
        println!("Modulus: {}", m);
    }

    let solution = strategy::synthesize(&heap, &catalog, &options.config)?;

    println!("\nSynthesis Statistics:");
    print!("{}", solution.statistics().format_summary());
    println!("Total area: {:.3}", solution.total_area());

    if options.verbose {
        println!("\n{}", solution);
    }

    if options.verify {
        verify_solution(&solution, &heap, &options.config)?;
    }

    if let Some(output) = &options.output {
        io::write_solution(output, &solution)?;
        println!("Wrote solution: {}", output.display());
    }

    Ok(())
}

fn verify_solution(
    solution: &bitheap_compression::Solution,
    heap: &HeapModel,
    config: &CompressionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = replay(solution, heap, config);
    println!("\nReplay:");
    for (stage, account) in report.stages.iter().enumerate() {
        println!(
            "  stage {}: {} bits in, {} consumed, {} produced, {} dropped",
            stage, account.bits_in, account.consumed, account.produced, account.dropped
        );
    }
    if report.is_valid() {
        println!("  Solution is valid.");
        Ok(())
    } else {
        for violation in &report.violations {
            eprintln!("  {}", violation);
        }
        Err(format!("{} violations found", report.violations.len()).into())
    }
}

// --- Catalog ---

fn print_catalog(catalog: &Catalog, device: &Device, ranking: Ranking) {
    println!("Device: {}", device.name);
    println!("Ranking: {}", ranking);
    println!(
        "Pass-through area: {}",
        catalog[catalog.pass_through()].area
    );
    println!();
    for (id, compressor) in catalog.iter() {
        if id == catalog.pass_through() {
            continue;
        }
        let inputs: Vec<String> = compressor.inputs.iter().map(|i| i.to_string()).collect();
        let outputs: Vec<String> = compressor.outputs.iter().map(|o| o.to_string()).collect();
        let kind = if compressor.is_variable() {
            let widths = compressor.middle_widths();
            format!(" variable {}..={}", widths.start(), widths.end())
        } else {
            String::new()
        };
        println!(
            "  {:>2} {:<12} ({}) -> ({})  area {:.3}  efficiency {:.3}  ratio {:.3}{}",
            id.0,
            compressor.name,
            inputs.join(","),
            outputs.join(","),
            compressor.area,
            compressor.nominal_efficiency(),
            compressor.compression_ratio(),
            kind
        );
    }
    let (_, violations) = catalog.scorable();
    for violation in violations {
        eprintln!("Warning: {}", violation);
    }
}

// --- Heap generation ---

fn parse_multiplier(size: &str) -> Result<(usize, usize), String> {
    let (a, b) = size
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Invalid multiplier size: {}", size))?;
    let a = a
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("Invalid operand width: {}", a))?;
    let b = b
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("Invalid operand width: {}", b))?;
    if a == 0 || b == 0 {
        return Err(format!("Operand widths must be positive: {}", size));
    }
    Ok((a, b))
}

fn emit(text: &str, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            fs::write(path, text)?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        Commands::Synth {
            heap,
            device,
            pipelined,
            mode,
            final_adder,
            ranking,
            modulus,
            lower_bounds,
            holes,
            max_stages,
            extra_stages,
            max_variable_width,
            solver_timeout,
            exact_max_stages,
            lp_dump,
            output,
            verify,
            verbose,
        } => {
            let mut optimal = OptimalConfig::default()
                .with_timeout_option(solver_timeout.map(Duration::from_secs));
            if let Some(stages) = exact_max_stages {
                optimal = optimal.with_max_stages(stages);
            }
            if let Some(path) = lp_dump {
                optimal = optimal.with_lp_dump(path);
            }

            let config = CompressionConfig::default()
                .with_mode(mode.into())
                .with_final_adder(final_adder.into())
                .with_ranking(ranking.into())
                .with_modulus_option(modulus)
                .with_lower_bounds(lower_bounds)
                .with_holes(holes)
                .with_tuning(
                    Tuning::default()
                        .with_max_stages(max_stages)
                        .with_extra_exact_stages(extra_stages)
                        .with_max_variable_width(max_variable_width),
                )
                .with_optimal(optimal);

            let options = SynthOptions {
                device,
                pipelined,
                config,
                output,
                verify,
                verbose,
            };
            synthesize_heap(&heap, &options)
        }
        Commands::Catalog {
            device,
            ranking,
            pipelined,
            json,
        } => {
            let device = load_device(device.as_deref(), pipelined)?;
            if json {
                println!("{}", io::device_to_json(&device)?);
            } else {
                let ranking = ranking.into();
                print_catalog(&device.catalog(ranking), &device, ranking);
            }
            Ok(())
        }
        Commands::Random {
            seed,
            width,
            max_height,
            stages,
            multiplier,
            output,
        } => {
            let heap = match multiplier {
                Some(size) => {
                    let (a, b) = parse_multiplier(&size)?;
                    multiplier_heap(a, b)
                }
                None => random_heap(
                    &RandomHeapConfig {
                        seed,
                        ..Default::default()
                    }
                    .with_width(width)
                    .with_max_height(max_height)
                    .with_stages(stages),
                ),
            };
            emit(&io::heap_to_json(&heap)?, output.as_deref())
        }
    }
}

// --- Main Function ---
fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiplier() {
        assert_eq!(parse_multiplier("8x8"), Ok((8, 8)));
        assert_eq!(parse_multiplier("4X12"), Ok((4, 12)));
        assert!(parse_multiplier("8").is_err());
        assert!(parse_multiplier("0x3").is_err());
    }

    #[test]
    fn test_cli_parses_synth() {
        let args = Args::try_parse_from([
            "bhc",
            "synth",
            "heap.json",
            "--mode",
            "modular",
            "--modulus",
            "5",
            "--lower-bounds",
            "0.5,0.25",
        ])
        .unwrap();
        match args.command {
            Commands::Synth {
                mode,
                modulus,
                lower_bounds,
                ..
            } => {
                assert_eq!(Mode::from(mode), Mode::Modular);
                assert_eq!(modulus, Some(5));
                assert_eq!(lower_bounds, vec![0.5, 0.25]);
            }
            _ => panic!("expected synth"),
        }
    }
}
