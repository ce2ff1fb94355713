use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use hidra::disasm::listing;
use hidra::isa::neander::{NeanderDecoder, MEM_SIZE};
use hidra::MachineKind;

use hidra_disasm::{analyze_entries, build_report, load_image};

#[derive(Parser, Debug)]
#[command(author, version, about = "Neander memory image disassembler", long_about=None)]
struct Cli {
    /// Machine the image was saved from
    #[arg(long, value_enum, default_value_t = MachineKind::Neander)]
    machine: MachineKind,
    /// Input image path (.mem)
    #[arg(value_name = "MEMFILE")]
    input: PathBuf,
    /// Subcommand
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Linear listing of the whole image
    Listing {
        /// Show instruction bytes
        #[arg(long)]
        show_bytes: bool,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Follow control flow from entry points
    Analyze {
        /// Entry addresses (hex or dec). Repeat flag to add multiple entries.
        #[arg(long = "entry", value_name = "ADDR", num_args = 1.., required = false)]
        entries: Vec<String>,
        /// Maximum instructions to decode before stopping
        #[arg(long, default_value_t = 10_000usize)]
        max_instr: usize,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write analysis output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat { Text, Json }

fn parse_addr(s: &str) -> Result<usize> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(usize::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<usize>()?)
    }
}

fn emit(buf: &str, out: Option<&Path>) -> Result<()> {
    if let Some(path) = out { std::fs::write(path, buf)?; } else { print!("{buf}"); }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let img = load_image(&cli.input, cli.machine, MEM_SIZE)?;
    let dec = NeanderDecoder::new();

    match cli.cmd {
        Command::Listing { show_bytes, format, out } => {
            let lines = listing(&img.cells, &dec);
            let mut buf = String::new();
            match format {
                OutputFormat::Json => {
                    buf = serde_json::to_string_pretty(&lines)?;
                    buf.push('\n');
                }
                OutputFormat::Text => {
                    for l in &lines {
                        if show_bytes {
                            let bytes: Vec<String> = l.bytes.iter().map(|b| format!("{b:02x}")).collect();
                            let _ = writeln!(buf, "{:3}: {:<6} {}", l.addr, bytes.join(" "), l.text);
                        } else {
                            let _ = writeln!(buf, "{:3}: {}", l.addr, l.text);
                        }
                    }
                }
            }
            emit(&buf, out.as_deref())?;
        }
        Command::Analyze { entries, max_instr, format, out } => {
            let mut seeds: Vec<usize> = if entries.is_empty() {
                vec![0]
            } else {
                entries.iter().map(|e| parse_addr(e)).collect::<Result<_>>()?
            };
            seeds.sort_unstable();
            seeds.dedup();
            for &s in &seeds {
                anyhow::ensure!(s < img.cells.len(), "entry {s} outside image of {} cells", img.cells.len());
            }
            let analysis = analyze_entries(&img, &dec, &seeds, max_instr);
            let report = build_report(&img, &dec, &analysis, &seeds);
            let mut buf = String::new();
            match format {
                OutputFormat::Json => {
                    buf = serde_json::to_string_pretty(&report)?;
                    buf.push('\n');
                }
                OutputFormat::Text => {
                    let _ = writeln!(buf, "Analysis summary:");
                    let _ = writeln!(buf, "  entries : {:?}", report.entries);
                    let _ = writeln!(buf, "  insts   : {}", analysis.visited.len());
                    let _ = writeln!(buf, "  blocks  : {}", report.blocks.len());
                    let _ = writeln!(buf, "  edges   : {}", report.edges.len());
                    let _ = writeln!(buf, "  halts   : {:?}", report.halts);
                    if !report.faults.is_empty() {
                        let _ = writeln!(buf, "  faults  : {:?}", report.faults);
                    }
                    for b in &report.blocks {
                        let _ = writeln!(buf, "\nblock {}..{}:", b.start, b.end);
                        for i in &b.insns { let _ = writeln!(buf, "  {i}"); }
                    }
                    let _ = writeln!(buf, "\nEdges:");
                    for e in &report.edges {
                        let _ = writeln!(buf, "  {:3} -> {:3} ({:?})", e.from, e.to, e.kind);
                    }
                }
            }
            emit(&buf, out.as_deref())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_addr_hex_and_dec() {
        assert_eq!(parse_addr("0x10").unwrap(), 0x10);
        assert_eq!(parse_addr("16").unwrap(), 16);
        assert!(parse_addr("zz").is_err());
    }
}
