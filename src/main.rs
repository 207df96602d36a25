//! Makeup Compiler Binary

use makeup::{Cli, CompilerError};
use std::process;

fn main() {
    let mut cli = Cli::new();

    match cli.run() {
        Ok(()) => {}
        Err(CompilerError::Io(e)) => {
            eprintln!("IO Error: {}", e);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(1);
        }
    }
}
