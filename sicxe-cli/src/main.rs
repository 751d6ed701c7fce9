//! Command-line driver for the `sicxe` assembler: reads a source file,
//! runs the pipeline, and writes the object program. No business logic
//! lives here beyond argument parsing, logging setup, and formatting.

use clap::{Parser, ValueEnum};
use serde::Serialize;
use sicxe::error::Diagnostics;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum MemoryProfile {
    Sic,
    Xe,
}

impl MemoryProfile {
    fn size_bytes(self) -> u32 {
        match self {
            MemoryProfile::Sic => 32 * 1024,
            MemoryProfile::Xe => 1024 * 1024,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum DiagnosticFormat {
    Text,
    Json,
}

/// Assembles a SIC/XE source file into an H/T/M/E object program.
#[derive(Parser, Debug)]
#[command(name = "sicxe", about, version)]
struct Cli {
    /// Source file to assemble.
    input: PathBuf,

    /// Where to write the object program (defaults to INPUT with a
    /// `.obj` extension).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Memory profile used if `--load` is given.
    #[arg(long, value_enum, default_value_t = MemoryProfile::Xe)]
    memory: MemoryProfile,

    /// Additionally run the memory loader and print a hex/ASCII dump.
    #[arg(long)]
    load: bool,

    /// Diagnostic rendering format.
    #[arg(long, value_enum, default_value_t = DiagnosticFormat::Text)]
    format: DiagnosticFormat,

    /// Increase log verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct DiagnosticJson<'a> {
    phase: String,
    line: Option<u32>,
    severity: String,
    message: &'a str,
    hint: Option<&'a str>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let source = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: could not read {}: {}", cli.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = sicxe::assemble(&source);

    render_diagnostics(&result.parse_diagnostics, cli.format);
    render_diagnostics(&result.pass1.diagnostics, cli.format);
    if let Some(pass2) = &result.pass2 {
        render_diagnostics(&pass2.diagnostics, cli.format);
    }

    let object = match &result.object {
        Some(o) => o,
        None => {
            eprintln!("assembly failed; no object program produced");
            return ExitCode::FAILURE;
        }
    };

    let text = object.to_text();
    let output_path = cli.output.clone().unwrap_or_else(|| default_output_path(&cli.input));
    if let Err(e) = fs::write(&output_path, &text) {
        eprintln!("error: could not write {}: {}", output_path.display(), e);
        return ExitCode::FAILURE;
    }
    println!("{}", text);

    if cli.load {
        let pass2 = result.pass2.as_ref().expect("object program implies pass2 succeeded");
        let spans = sicxe::loader::build_spans(&result.pass1, pass2);
        let (image, load_diagnostics) = sicxe::loader::load(object, &spans, cli.memory.size_bytes());
        render_diagnostics(&load_diagnostics, cli.format);
        print!("{}", image.dump(result.pass1.start_address, result.pass1.program_length));
    }

    if !result.success {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("obj")
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn render_diagnostics(diagnostics: &Diagnostics, format: DiagnosticFormat) {
    if diagnostics.is_empty() {
        return;
    }
    match format {
        DiagnosticFormat::Text => {
            for diagnostic in diagnostics.iter() {
                eprintln!("{}", diagnostic);
            }
        }
        DiagnosticFormat::Json => {
            let rows: Vec<DiagnosticJson> = diagnostics
                .iter()
                .map(|d| DiagnosticJson {
                    phase: d.phase.to_string(),
                    line: d.line,
                    severity: d.severity.to_string(),
                    message: &d.message,
                    hint: d.hint.as_deref(),
                })
                .collect();
            match serde_json::to_string_pretty(&rows) {
                Ok(json) => eprintln!("{}", json),
                Err(e) => eprintln!("error: could not render diagnostics as json: {}", e),
            }
        }
    }
}
