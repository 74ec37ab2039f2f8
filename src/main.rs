//! chirpstore CLI entry point
//!
//! All logic is delegated to the CLI module; the outcome has already been
//! printed as JSON by the time an error reaches here.

use chirpstore::cli;

fn main() {
    if cli::run().is_err() {
        std::process::exit(1);
    }
}
