use anyhow::Context;
use serde_json::{json, Value};

use crate::api::ApiClient;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::session::{FileStorage, SessionStore};

pub type CliSession = SessionStore<ApiClient, FileStorage>;

/// Restore the persisted session against the configured backend
pub fn open_session() -> anyhow::Result<CliSession> {
    let config = config();
    let api = ApiClient::from_config(config).context("failed to build API client")?;
    let storage = FileStorage::in_config_dir(config.storage.config_dir.as_deref())
        .context("failed to locate session storage")?;
    tracing::debug!("Session storage at {}", storage.path().display());
    Ok(SessionStore::restore(api, storage))
}

/// Use the given password or prompt for one without echo
pub fn password_or_prompt(
    password: Option<String>,
    prompt: &str,
    confirm: bool,
) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    let mut input = dialoguer::Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Repeat password", "Passwords do not match");
    }
    input.interact().context("failed to read password")
}

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Print `key: value` lines for text output, skipping nulls
pub fn print_fields(fields: &Value) {
    if let Some(map) = fields.as_object() {
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::String(s) => println!("{}: {}", key, s),
                other => println!("{}: {}", key, other),
            }
        }
    }
}

/// Emit the JSON error body when asked for one, then fail the command.
/// Text output is left to the binary's error printer.
pub fn report_failure<E>(
    output_format: &OutputFormat,
    err: E,
    error_code: &str,
) -> anyhow::Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let OutputFormat::Json = output_format {
        output_error(output_format, &err.to_string(), Some(error_code))?;
    }
    Err(err.into())
}
