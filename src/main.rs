use clap::Parser;
use hashwatch::cli::Cli;
use hashwatch::theme::Theme;

/// Exit code for failures that are neither drift nor a missing baseline
const EXIT_FAILURE: i32 = 3;

fn main() {
    let cli = Cli::parse();
    let code = match cli.run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", Theme::error("Error:"), e);
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
