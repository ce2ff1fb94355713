use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use hidra::{CpuConfig, Machine, MachineKind, State};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble or load a program and run it on the Neander machine"
)]
struct Opts {
    /// Machine variant
    #[arg(long, value_enum, default_value_t = MachineKind::Neander)]
    machine: MachineKind,
    /// Execute exactly N single steps instead of running to halt
    #[arg(long, conflicts_with = "max_steps")]
    steps: Option<u64>,
    /// Stop after N steps even if the program has not halted
    #[arg(long)]
    max_steps: Option<u64>,
    /// Start address
    #[arg(short, long, default_value_t = 0u8)]
    entry: u8,
    /// Do not preset cells 128..130 on a fresh memory
    #[arg(long)]
    no_presets: bool,
    /// Print a hex dump of memory after execution
    #[arg(long)]
    dump: bool,
    /// Print the final state as JSON
    #[arg(long)]
    json: bool,
    /// `.mem` image to load, or assembly source to build
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

#[derive(Serialize)]
struct Snapshot {
    registers: Vec<(&'static str, u8)>,
    flags: Vec<(&'static str, bool)>,
    halted: bool,
    steps: Option<u64>, // None when run to halt
    memory: Option<Vec<u8>>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let cfg = CpuConfig {
        preset_cells: !opts.no_presets,
        ..CpuConfig::default()
    };
    let mut machine = Machine::new(opts.machine, cfg);

    if opts.input.extension().is_some_and(|e| e == "mem") {
        machine
            .load(&opts.input)
            .with_context(|| format!("loading {}", opts.input.display()))?;
    } else {
        let src = std::fs::read_to_string(&opts.input)
            .with_context(|| format!("reading {}", opts.input.display()))?;
        let report = machine.assemble(&src);
        if !report.success {
            for d in &report.diagnostics {
                eprintln!("{}: {d}", opts.input.display());
            }
            bail!("build failed with {} error(s)", report.diagnostics.len());
        }
    }

    machine.clear_registers();
    machine.set_pc(opts.entry);

    let mut steps = 0u64;
    match (opts.steps, opts.max_steps) {
        (Some(n), _) => {
            while steps < n {
                steps += 1;
                if machine.step()? == State::Halted {
                    break;
                }
            }
        }
        (None, Some(cap)) => {
            while steps < cap {
                steps += 1;
                if machine.step()? == State::Halted {
                    break;
                }
            }
            if !machine.is_halted() {
                eprintln!("stopped after {cap} steps without halting");
            }
        }
        (None, None) => machine.run()?,
    }
    let counted = opts.steps.is_some() || opts.max_steps.is_some();

    let snap = Snapshot {
        registers: (0..machine.register_count())
            .filter_map(|i| Some((machine.register_name(i)?, machine.register_value(i)?)))
            .collect(),
        flags: (0..machine.flag_count())
            .filter_map(|i| Some((machine.flag_name(i)?, machine.flag_value(i)?)))
            .collect(),
        halted: machine.is_halted(),
        steps: counted.then_some(steps),
        memory: opts.dump.then(|| machine.memory().as_slice().to_vec()),
    };

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
        return Ok(());
    }
    println!("{} {}", machine.kind().name(), if snap.halted { "halted" } else { "stopped" });
    for (name, v) in &snap.registers {
        println!("{name:<3} {v:>3} ({v:#04x})");
    }
    for (name, v) in &snap.flags {
        println!("{name:<3} {}", u8::from(*v));
    }
    if let Some(mem) = &snap.memory {
        for (row, chunk) in mem.chunks(16).enumerate() {
            let cells: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            println!("{:02x}: {}", row * 16, cells.join(" "));
        }
    }
    Ok(())
}
