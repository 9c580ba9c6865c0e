use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rngtables::{compile, errors::RngError};

/// Compile a RELAX NG simple-syntax schema into the `NameMap`/`States` lookup tables a fast
/// approximate validator consumes.
#[derive(Parser)]
#[command(name = "srng2tables", bin_name = "srng2tables")]
struct Cli {
    /// Path to the input RELAX NG simple-syntax schema.
    #[arg(long = "srng", value_name = "FILE")]
    srng: PathBuf,

    /// Path to write the compiled JSON tables to.
    #[arg(long = "out", value_name = "FILE")]
    out: PathBuf,

    /// Also write a graphviz `.dot` rendering of the compiled states to this path.
    #[cfg(feature = "dot")]
    #[arg(long = "dot", value_name = "FILE")]
    dot: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RngError> {
    let xml = fs::read_to_string(&cli.srng)?;
    let tables = compile(&xml)?;

    let json = serde_json::to_string_pretty(&tables)?;
    fs::write(&cli.out, json)?;
    log::info!(
        "compiled {} into {} states",
        cli.srng.display(),
        tables.states.len()
    );

    #[cfg(feature = "dot")]
    if let Some(dot_path) = &cli.dot {
        let mut buf = Vec::new();
        rngtables::dot::render_to(&tables, &mut buf);
        fs::write(dot_path, buf)?;
    }

    Ok(())
}
