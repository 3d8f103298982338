use std::process::ExitCode;

fn main() -> ExitCode {
    shipbot_cli::run()
}
