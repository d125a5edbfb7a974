use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match beommed_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("beommed: {e}");
            ExitCode::FAILURE
        }
    }
}
