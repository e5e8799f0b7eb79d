//! `hu`: generate a shell script from a goal, then print, run or save it.

use clap::Parser;
use houston::cli::{Cli, exit_code_for, run};
use houston::logging;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);
    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}
