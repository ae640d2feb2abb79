//! Binary entry point for the `knz` command-line tool.

use clap::Parser;

use knz::cli::args::{resolve, Args};
use knz::io::prefs::{display_level, set_display_level};

fn main() {
    let args = Args::parse();
    set_display_level(args.verbose as i32);

    let request = match resolve(&args) {
        Ok(r) => r,
        Err(e) => {
            display_level(1, &format!("knz: {}\n", e));
            std::process::exit(e.exit_code());
        }
    };

    match knz::io::run(
        &request.prefs,
        request.compress,
        &request.input,
        request.output.as_deref(),
    ) {
        Ok(()) => {}
        Err(e) => {
            display_level(1, &format!("knz: {}\n", e));
            std::process::exit(e.exit_code());
        }
    }
}
