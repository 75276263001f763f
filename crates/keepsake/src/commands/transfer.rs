//! Export and import of the whole version history.

use crate::app::App;
use anyhow::Context;
use std::path::Path;
use tracing::info;

/// Write the history as JSON to `output`, or to stdout.
pub async fn handle_export(app: &App, output: Option<&Path>) -> anyhow::Result<()> {
    let data = app.store().export_versions().await?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &data)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let files = app.store().get_files_with_versions().await.len();
            info!(path = %path.display(), files, "Exported version history");
            println!("Exported history of {files} file(s) to {}", path.display());
        }
        None => println!("{data}"),
    }
    Ok(())
}

/// Replace the history with the contents of `input`.
///
/// A malformed file leaves the existing history untouched.
pub async fn handle_import(app: &App, input: &Path) -> anyhow::Result<()> {
    let data = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    app.store().import_versions(&data).await?;

    let files = app.store().get_files_with_versions().await.len();
    println!("Imported history of {files} file(s) from {}", input.display());
    Ok(())
}
