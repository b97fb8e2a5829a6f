//! Print the OpenAPI document as JSON.

use std::io::Write;
use std::process::ExitCode;

use birthday::ApiDoc;
use utoipa::OpenApi;

fn main() -> ExitCode {
    let json = match ApiDoc::openapi().to_pretty_json() {
        Ok(json) => json,
        Err(e) => {
            eprintln!("failed to serialise OpenAPI document: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut stdout = std::io::stdout().lock();
    match writeln!(stdout, "{json}") {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("failed to write OpenAPI document: {e}");
            ExitCode::FAILURE
        }
    }
}
