use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::session::AuthError;
use crate::types::{Credentials, RegisterRequest};

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to the console backend")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
        #[arg(long, help = "Remember the username for the next login")]
        remember: bool,
    },

    #[command(about = "Logout and clear the local session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Fetch current user information from the backend")]
    Whoami,

    #[command(about = "Register new user")]
    Register {
        #[arg(help = "Username")]
        username: String,
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut store = open_session()?;

    match cmd {
        AuthCommands::Login { username, password, remember } => {
            let password = password_or_prompt(password, "Password", false)?;
            let credentials = Credentials { username, password, remember };

            match store.login(&credentials).await {
                Ok(response) => output_success(
                    &output_format,
                    &format!("Logged in as {}", credentials.username),
                    Some(json!({
                        "user": response.user_info,
                        "role": response.user_info.effective_role(),
                    })),
                ),
                Err(e) => fail(&output_format, e),
            }
        }
        AuthCommands::Logout => {
            if !store.session().authenticated() {
                return output_success(&output_format, "Not logged in", None);
            }
            store.logout().await;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let session = store.session();
            let status = json!({
                "authenticated": session.authenticated(),
                "username": session.user.username,
                "role": session.authenticated().then(|| session.user.effective_role()),
                "remembered_username": store.remembered_username(),
                "backend": store.api().base_url().as_str(),
            });

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                OutputFormat::Text => print_fields(&status),
            }
            Ok(())
        }
        AuthCommands::Whoami => match store.refresh_profile().await {
            Ok(user) => {
                let details = json!({
                    "id": user.id,
                    "username": user.username,
                    "email": user.email,
                    "role": user.effective_role(),
                });
                match output_format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&details)?),
                    OutputFormat::Text => print_fields(&details),
                }
                Ok(())
            }
            Err(e) => fail(&output_format, e),
        },
        AuthCommands::Register { username, email, password } => {
            let password = password_or_prompt(password, "Password", true)?;
            let request = RegisterRequest { username, password, email };

            match store.register(&request).await {
                Ok(_) => output_success(
                    &output_format,
                    &format!("Registered {}, you can now log in", request.username),
                    None,
                ),
                Err(e) => fail(&output_format, e),
            }
        }
    }
}

fn fail(output_format: &OutputFormat, err: AuthError) -> anyhow::Result<()> {
    let code = err.error_code();
    report_failure(output_format, err, code)
}
