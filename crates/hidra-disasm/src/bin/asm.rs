use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hidra::{CpuConfig, Machine, MachineKind};

#[derive(Parser, Debug)]
#[command(author, version, about = "Two-pass assembler for the Neander machine")]
struct Opts {
    /// Input assembly file (one instruction, directive or label per line)
    #[arg(short, long)]
    input: PathBuf,
    /// Output image file (defaults to the input path with a .mem extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Machine variant
    #[arg(long, value_enum, default_value_t = MachineKind::Neander)]
    machine: MachineKind,
    /// Do not preset cells 128..130 in the image
    #[arg(long)]
    no_presets: bool,
    /// Print the resolved symbol table
    #[arg(long)]
    symbols: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let text = fs::read_to_string(&opts.input)
        .with_context(|| format!("reading {}", opts.input.display()))?;
    let cfg = CpuConfig { preset_cells: !opts.no_presets, ..CpuConfig::default() };
    let mut machine = Machine::new(opts.machine, cfg);

    let report = machine.assemble(&text);
    if !report.success {
        for d in &report.diagnostics {
            eprintln!("{}: {d}", opts.input.display());
        }
        bail!("build failed with {} error(s)", report.diagnostics.len());
    }
    if opts.symbols {
        for (name, addr) in &report.symbols {
            println!("{name:<16} {addr}");
        }
    }

    let output = opts.output.unwrap_or_else(|| opts.input.with_extension("mem"));
    machine
        .save(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}
