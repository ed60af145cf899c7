//! Command-line driver for the patient record store.
//!
//! # Responsibility
//! - Load configuration, open the configured store once, and run one
//!   list/get/add command against it.
//! - Print JSON responses shaped like the HTTP API responses.
//!
//! Exit codes: 0 success, 1 not found or server-side failure, 2 bad input.

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::error;
use patient_core::{
    core_version, init_logging_from_config, open_record_store, parse_patient_id,
    parse_patient_payload, AddPatientError, AppConfig, DynRecordStore, PatientService,
    RawPatientInput, StoreBackend,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "patient_cli", version, about = "Manage patient records")]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
    #[command(subcommand)]
    command: Command,
}

/// Store overrides layered over the environment.
#[derive(Debug, Args)]
struct StoreArgs {
    /// Storage backend; overrides PATIENTS_BACKEND.
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendArg>,
    /// Store location; overrides PATIENTS_STORE_PATH.
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,
    /// Bounded lock wait; overrides PATIENTS_LOCK_TIMEOUT_MS.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    lock_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Json,
    Sqlite,
}

impl From<BackendArg> for StoreBackend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Json => StoreBackend::Json,
            BackendArg::Sqlite => StoreBackend::Sqlite,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the core library version.
    Version,
    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that run against the configured store.
#[derive(Debug, Subcommand)]
enum StoreCommand {
    /// List every patient.
    List,
    /// Show one patient by id.
    Get { id: String },
    /// Validate and add a patient.
    Add(AddArgs),
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Raw JSON object body; replaces the field flags.
    #[arg(long, conflicts_with_all = ["name", "age", "email", "condition"])]
    json: Option<String>,
    #[arg(long)]
    name: Option<String>,
    /// Kept as text so validation sees exactly what was typed.
    #[arg(long)]
    age: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    condition: Option<String>,
}

impl AddArgs {
    fn into_raw(self) -> Result<RawPatientInput, String> {
        if let Some(body) = self.json {
            return parse_patient_payload(&body).map_err(|err| err.to_string());
        }

        let mut raw = RawPatientInput::new();
        for (key, value) in [
            ("name", self.name),
            ("age", self.age),
            ("email", self.email),
            ("condition", self.condition),
        ] {
            if let Some(value) = value {
                raw.insert(key.to_string(), Value::String(value));
            }
        }
        Ok(raw)
    }
}

fn main() -> ExitCode {
    let Cli {
        store: overrides,
        command,
    } = Cli::parse();

    let command = match command {
        Command::Version => {
            println!("{}", core_version());
            return ExitCode::SUCCESS;
        }
        Command::Store(command) => command,
    };

    let config = match load_config(&overrides) {
        Ok(config) => config,
        Err(message) => return respond(ExitCode::from(2), json!({ "error": message })),
    };
    if let Err(message) = init_logging_from_config(&config) {
        eprintln!("logging disabled: {message}");
    }

    let store = match open_record_store(&config.store) {
        Ok(store) => store,
        Err(err) => {
            error!(
                "event=cli_start module=cli status=error error_code={} error={}",
                err.code(),
                err
            );
            return server_error();
        }
    };

    run(PatientService::new(store), command)
}

fn load_config(overrides: &StoreArgs) -> Result<AppConfig, String> {
    let mut config = AppConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(backend) = overrides.backend {
        let backend = StoreBackend::from(backend);
        if config.store.backend != backend && overrides.store_path.is_none() {
            config.store.path = backend.default_path();
        }
        config.store.backend = backend;
    }
    if let Some(path) = &overrides.store_path {
        config.store.path = path.clone();
    }
    if let Some(millis) = overrides.lock_timeout_ms {
        config.store.lock_timeout = Some(Duration::from_millis(millis));
    }
    Ok(config)
}

fn run(service: PatientService<DynRecordStore>, command: StoreCommand) -> ExitCode {
    match command {
        StoreCommand::List => match service.list_patients() {
            Ok(patients) => respond(ExitCode::SUCCESS, json!({ "patients": patients })),
            Err(err) => {
                error!("event=cli_list module=cli status=error error_code={}", err.code());
                server_error()
            }
        },
        StoreCommand::Get { id } => {
            let Ok(id) = parse_patient_id(&id) else {
                return respond(ExitCode::from(2), json!({ "error": "Invalid id" }));
            };
            match service.get_patient(id) {
                Ok(Some(patient)) => respond(ExitCode::SUCCESS, json!({ "patient": patient })),
                Ok(None) => respond(ExitCode::from(1), json!({ "error": "Patient not found" })),
                Err(err) => {
                    error!("event=cli_get module=cli status=error error_code={}", err.code());
                    server_error()
                }
            }
        }
        StoreCommand::Add(args) => {
            let raw = match args.into_raw() {
                Ok(raw) => raw,
                Err(message) => return respond(ExitCode::from(2), json!({ "error": message })),
            };
            match service.add_patient(&raw) {
                Ok(patient) => respond(
                    ExitCode::SUCCESS,
                    json!({ "success": true, "patient": patient }),
                ),
                Err(AddPatientError::Validation(err)) => {
                    respond(ExitCode::from(2), json!({ "errors": err.messages() }))
                }
                Err(AddPatientError::Persistence(err)) => {
                    error!("event=cli_add module=cli status=error error_code={}", err.code());
                    server_error()
                }
            }
        }
    }
}

fn server_error() -> ExitCode {
    respond(ExitCode::from(1), json!({ "error": "Server error" }))
}

fn respond(code: ExitCode, body: Value) -> ExitCode {
    println!("{body}");
    code
}

#[cfg(test)]
mod tests {
    use super::{AddArgs, BackendArg, Cli, Command, StoreCommand};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn version_and_store_commands_parse_at_the_top_level() {
        let cli = Cli::parse_from(["patient_cli", "version"]);
        assert!(matches!(cli.command, Command::Version));

        let cli = Cli::parse_from(["patient_cli", "--backend", "sqlite", "get", "7"]);
        assert!(matches!(
            cli.command,
            Command::Store(StoreCommand::Get { ref id }) if id == "7"
        ));
        assert!(matches!(cli.store.backend, Some(BackendArg::Sqlite)));
    }

    #[test]
    fn field_flags_only_include_provided_values() {
        let args = AddArgs {
            json: None,
            name: Some("Alice".to_string()),
            age: Some("25".to_string()),
            email: None,
            condition: None,
        };
        let raw = args.into_raw().unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw["age"], "25");
    }

    #[test]
    fn json_body_must_be_an_object() {
        let args = AddArgs {
            json: Some("[]".to_string()),
            name: None,
            age: None,
            email: None,
            condition: None,
        };
        assert!(args.into_raw().unwrap_err().contains("Invalid JSON body"));
    }
}
