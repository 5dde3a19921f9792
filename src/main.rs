//! The main entry point to the program.
use anyhow::Result;

fn main() -> Result<()> {
    scout::cli::run_cli()
}
