//! Stepspice - fixed-step transient circuit simulator
//!
//! Runs a netlist and prints one tab-separated row per step.
//!
//! # Usage
//!
//! ```bash
//! stepspice rc.cir --steps 200 --dt 10u --method trap > rc.tsv
//! RUST_LOG=debug stepspice rc.cir --summary
//! ```

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use stepspice_core::{
    circuit::{validate_circuit, Sample},
    elements::IntegrationMethod,
    error::{Result, SimError},
    netlist,
    report::{summarize, StepTable},
    Circuit, Simulator, SimulatorConfig, DEFAULT_STEPS, DEFAULT_TIME_STEP,
};

/// Fixed-step transient circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist file
    #[arg(value_name = "NETLIST")]
    netlist_file: PathBuf,

    /// Number of steps to run (overrides `.tran`)
    #[arg(short, long)]
    steps: Option<usize>,

    /// Time step in seconds, SI suffixes allowed (overrides `.tran`)
    #[arg(long, value_parser = parse_time_step)]
    dt: Option<f64>,

    /// Integration method: be or trap (overrides `.method`)
    #[arg(short, long, value_parser = parse_method)]
    method: Option<IntegrationMethod>,

    /// Keep at most this many history entries per node/element
    #[arg(long)]
    history: Option<usize>,

    /// Print node and element summaries after the run
    #[arg(long)]
    summary: bool,
}

fn parse_time_step(s: &str) -> std::result::Result<f64, String> {
    netlist::parse_value(s).ok_or_else(|| format!("invalid time step: {}", s))
}

fn parse_method(s: &str) -> std::result::Result<IntegrationMethod, String> {
    IntegrationMethod::from_str(s).ok_or_else(|| format!("unknown integration method: {} (use be or trap)", s))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Parse the netlist file
    let ast = netlist::parse_file(&args.netlist_file)?;

    // Build and validate the circuit
    let circuit = Circuit::from_ast(&ast)?;
    validate_circuit(&circuit)?;

    // Command-line values win over netlist directives
    let time_step = args
        .dt
        .or(ast.tran.map(|t| t.time_step))
        .unwrap_or(DEFAULT_TIME_STEP);
    let steps = args
        .steps
        .or(ast.tran.and_then(|t| t.steps))
        .unwrap_or(DEFAULT_STEPS);
    let method = args.method.or(ast.method).unwrap_or_default();

    let mut config = SimulatorConfig::new(time_step).with_method(method);
    if let Some(limit) = args.history {
        config = config.with_history_limit(limit);
    }

    let mut simulator = Simulator::with_config(circuit, config)?;
    log::info!("running {} steps", steps);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let table = StepTable::new(simulator.circuit());
    table.write_header(&mut out, simulator.circuit())?;
    table.write_row(&mut out, &simulator, Sample::Latest)?;

    let mut failure = None;
    for _ in 0..steps {
        if let Err(e) = simulator.step() {
            failure = Some(e);
            break;
        }
        table.write_row(&mut out, &simulator, Sample::Latest)?;
    }

    if args.summary {
        let (nodes, elements) = summarize(&simulator, Sample::Latest)?;
        for node in &nodes {
            writeln!(out, "# {}", node)?;
        }
        for element in &elements {
            writeln!(out, "# {}", element)?;
        }
    }
    out.flush().map_err(SimError::from)?;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
