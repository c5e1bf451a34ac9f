use clap::{Parser, Subcommand};
use hexrec::io_stream::{convert_file, load_records, merge_files, InputFile};
use hexrec::record::SplitOptions;
use hexrec::registry::FormatId;
use hexrec::report::SequenceReport;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hexrec", about = "Intel HEX, Motorola S-record, MOS and binary file tool")]
struct Cli {
    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a file to another format
    Convert {
        input:  PathBuf,
        output: PathBuf,
        /// Input format: intel, motorola, mos, binary (default: by extension)
        #[arg(short = 'i', long)]
        input_format: Option<FormatId>,
        /// Output format (default: by extension)
        #[arg(short = 'o', long)]
        output_format: Option<FormatId>,
        /// Data bytes per record
        #[arg(short, long)]
        columns: Option<usize>,
        /// Do not align records to multiples of the column count
        #[arg(long)]
        no_align: bool,
        /// Address added to every input byte, e.g. 0x8000
        #[arg(long, value_parser = parse_address, default_value = "0")]
        offset: u32,
    },
    /// Merge files; later inputs overwrite earlier ones
    Merge {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        output_format: Option<FormatId>,
        #[arg(short, long)]
        columns: Option<usize>,
    },
    /// Validate records and sequence grammar
    Check {
        input: PathBuf,
        #[arg(short, long)]
        format: Option<FormatId>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the data blocks of a file
    Info {
        input: PathBuf,
        #[arg(short, long)]
        format: Option<FormatId>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Convert ──────────────────────────────────────────────────────────
        Commands::Convert { input, output, input_format, output_format, columns, no_align, offset } => {
            let options = SplitOptions { columns, align: !no_align, ..SplitOptions::default() };
            let source = InputFile::new(&input).with_format(input_format).with_offset(offset);
            convert_file(&source, &output, output_format, &options)?;
            println!("Converted: {} -> {}", input.display(), output.display());
        }

        // ── Merge ────────────────────────────────────────────────────────────
        Commands::Merge { inputs, output, output_format, columns } => {
            let options = SplitOptions { columns, ..SplitOptions::default() };
            let sources: Vec<InputFile> = inputs.iter().map(InputFile::new).collect();
            merge_files(&sources, &output, output_format, &options)?;
            for path in &inputs {
                println!("  merged  {}", path.display());
            }
            println!("Created: {}", output.display());
        }

        // ── Check ────────────────────────────────────────────────────────────
        Commands::Check { input, format, json } => {
            let records = load_records(&input, format)?;
            let report = SequenceReport::scan(&records);
            if json {
                println!("{}", report.to_json()?);
            } else {
                println!("{}: {}", input.display(), report.summary());
                for index in &report.corrupted {
                    println!("  corrupted record at index {index}");
                }
            }
            if !report.is_valid() {
                std::process::exit(1);
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, format } => {
            let records = load_records(&input, format)?;
            let blocks = records.to_blocks();

            println!("── {} ─────────────────────────────────────────", input.display());
            println!("  Format   {}", records.format());
            println!("  Records  {} ({} data)", records.len(), records.data_count());
            println!("  Blocks   {}", blocks.len());
            println!("{:>10} {:>10} {:>8}  Preview", "Start", "Endex", "Size");
            for block in &blocks {
                let preview = &block.data[..block.len().min(16)];
                println!(
                    "{:>#10x} {:>#10x} {:>8}  {}{}",
                    block.start,
                    block.endex(),
                    block.len(),
                    hex::encode_upper(preview),
                    if block.len() > 16 { "..." } else { "" },
                );
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn parse_address(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None         => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}
