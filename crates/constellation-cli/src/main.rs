//! Just main(). Keep as small as possible.

use color_eyre::eyre::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let result = constellation_cli::run::run().await;
    if let Err(error) = &result {
        tracing::error!("Constellation exited with an error: {error:?}");
    }
    tracing::debug!("Constellation is exiting");
    result
}
