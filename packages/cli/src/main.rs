use clap::Parser;

use phile_cli::Args;

fn main() {
    let args = Args::parse();

    if let Err(e) = phile_cli::logger::init_logger(args.verbose) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = phile_cli::run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
