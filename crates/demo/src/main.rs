mod app;

use std::env;
use std::process::ExitCode;

use tracing::error;

use app::bootstrap::{build_app, init_tracing, parse_args, usage_text};

fn main() -> ExitCode {
    init_tracing();

    let args = env::args().skip(1).collect::<Vec<_>>();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}\n\n{}", usage_text());
            return ExitCode::from(2);
        }
    };
    if options.help {
        println!("{}", usage_text());
        return ExitCode::SUCCESS;
    }

    match build_app(&options) {
        Ok(wiring) => app::loop_runner::run(wiring),
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
