use std::process::ExitCode;

fn main() -> ExitCode {
    desky_cli::run()
}
