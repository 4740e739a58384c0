mod batch;

use std::io::Read;
use std::process::ExitCode;

use gather_core::telemetry;

use crate::batch::Batch;

fn main() -> ExitCode {
    telemetry::init_logging();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: gather <batch.json | ->");
        return ExitCode::from(2);
    };

    let raw = match read_input(&path) {
        Ok(raw) => raw,
        Err(error) => {
            eprintln!("gather: failed to read '{path}': {error}");
            return ExitCode::from(2);
        }
    };

    let batch = match Batch::from_json(&raw) {
        Ok(batch) => batch,
        Err(error) => {
            eprintln!("gather: invalid batch '{path}': {error}");
            return ExitCode::from(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("gather: failed to create Tokio runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(crate::batch::run(&batch)) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(kind = ?error.kind(), error = %error, "batch failed");
            eprintln!("gather: {error}");
            ExitCode::FAILURE
        }
    }
}

fn read_input(path: &str) -> std::io::Result<String> {
    if path == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        return Ok(raw);
    }
    std::fs::read_to_string(path)
}
