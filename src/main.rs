use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use catalog_import::adapter::FormatAdapter;
use catalog_import::cli::{Cli, Command};
use catalog_import::config::ConfigManager;
use catalog_import::logging;
use catalog_import::model::ImportMetadata;
use catalog_import::output::Output;
use catalog_import::registry::FormatRegistry;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    logging::init(cli.verbosity());

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;
    let registry = FormatRegistry::new(&config);
    let output = Output::new(cli.verbosity(), cli.output);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match &cli.command {
        Command::Formats => {
            print!("{}", output.formats(&registry)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Detect { file } => {
            let bytes = read_file(file).await?;
            let content = FormatRegistry::decode(&bytes);
            let name = file_name(file);

            let scores = registry.scores(&content, &name);
            let detected = registry.detect(&content, &name);
            print!("{}", output.detection(file, &scores, detected)?);

            Ok(if detected.is_some() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Command::Validate { file, format } => {
            let bytes = read_file(file).await?;
            let content = FormatRegistry::decode(&bytes);
            let name = file_name(file);

            let (adapter, _) = registry.resolve(&content, &name, format.as_deref())?;
            let result = adapter.validate(&content, &cancel).await?;
            print!(
                "{}",
                output.validation(file, adapter.format_id(), &result)?
            );

            Ok(if result.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Import {
            file,
            tenant,
            supplier,
            source,
            format,
        } => {
            let bytes = read_file(file).await?;
            let content = FormatRegistry::decode(&bytes);
            let name = file_name(file);

            let mut metadata = ImportMetadata::new(tenant.clone());
            if let Some(supplier) = supplier {
                metadata = metadata.with_supplier_id(supplier.clone());
            }
            if let Some(source) = source {
                metadata = metadata.with_source_identifier(source.clone());
            }

            let outcome = registry
                .import(&content, &name, format.as_deref(), &metadata, &cancel)
                .await?;
            print!("{}", output.import(file, &outcome)?);

            Ok(if outcome.is_imported() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
