use clap::Subcommand;
use serde_json::json;

use crate::api::DevToolsApi;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::devtools::{validate_input, verify_with_backend, DevToolsVerificationError};

#[derive(Subcommand)]
pub enum DevtoolsCommands {
    #[command(about = "Show whether a developer-tools password is configured")]
    Status,

    #[command(about = "Check a developer-tools password against the backend")]
    Verify {
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Set the developer-tools password (requires login)")]
    SetPassword {
        #[arg(long, help = "New password (will prompt if not provided)")]
        password: Option<String>,
    },
}

pub async fn handle(cmd: DevtoolsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = open_session()?;
    let api = store.api();
    let min_len = config().devtools.min_password_len;

    match cmd {
        DevtoolsCommands::Status => match api.password_status().await {
            Ok(has_password) => {
                let message = if has_password {
                    "Developer tools are password protected"
                } else {
                    "No developer-tools password configured; protection is off"
                };
                let data = json!({ "has_password": has_password });
                output_success(&output_format, message, Some(data))
            }
            Err(e) => {
                let code = e.error_code();
                report_failure(&output_format, e, code)
            }
        },
        DevtoolsCommands::Verify { password } => {
            let password = password_or_prompt(password, "Developer-tools password", false)?;
            if let Err(e) = validate_input(&password, min_len) {
                return report_failure(&output_format, e, "INVALID_INPUT");
            }

            match verify_with_backend(api, &password).await {
                Ok(()) => {
                    let data = json!({ "valid": true });
                    output_success(&output_format, "Password accepted", Some(data))
                }
                Err(e) => {
                    let code = match e {
                        DevToolsVerificationError::WrongPassword => "WRONG_PASSWORD",
                        DevToolsVerificationError::NetworkFailure(_) => "NETWORK_FAILURE",
                    };
                    report_failure(&output_format, e, code)
                }
            }
        }
        DevtoolsCommands::SetPassword { password } => {
            if !store.session().authenticated() {
                anyhow::bail!("not logged in, run `auth login` first");
            }

            let password = password_or_prompt(password, "New developer-tools password", true)?;
            if let Err(e) = validate_input(&password, min_len) {
                return report_failure(&output_format, e, "INVALID_INPUT");
            }

            match api.set_password(&store.session().token, &password).await {
                Ok(()) => output_success(&output_format, "Developer-tools password updated", None),
                Err(e) => {
                    let code = e.error_code();
                    report_failure(&output_format, e, code)
                }
            }
        }
    }
}
