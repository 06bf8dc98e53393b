//! tabledb - run a cascading delete against a SQLite database.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tabledb_core::{Catalog, SchemaDocument};
use tabledb_server::{Args, Command, Database, Error, ResourceRegistry};

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabledb_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let init = args.init;
    let (config, command) = args.into_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database_path.display(),
        schema = %config.schema_path.display(),
        "starting tabledb"
    );

    match run(&config, init, &command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, kind = ?e.kind(), "command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &tabledb_server::ServerConfig, init: bool, command: &Command) -> Result<(), Error> {
    if !config.schema_path.is_file() {
        return Err(Error::Config(format!(
            "schema document {} does not exist",
            config.schema_path.display()
        )));
    }
    let document = SchemaDocument::from_path(&config.schema_path)?;
    let catalog = Catalog::new(document)?;
    let database = Arc::new(Database::open(&config.database_path, catalog)?);
    if init {
        database.install_schema()?;
    }

    let registry = ResourceRegistry::builder(database).with_config(config).build()?;

    match command {
        Command::Delete {
            table,
            reference_id,
            ..
        } => {
            let response = registry.deleter(table)?.delete(reference_id, &command.request())?;
            let json = serde_json::to_string_pretty(&response)
                .map_err(|e| Error::Store(e.into()))?;
            println!("{}", json);
        }
    }

    Ok(())
}
