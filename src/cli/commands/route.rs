use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::route::{evaluate, GuardDecision, RouteTable};

#[derive(Subcommand)]
pub enum RouteCommands {
    #[command(about = "Check whether the current session may open a path")]
    Check {
        #[arg(help = "Console path, e.g. /products")]
        path: String,
    },

    #[command(about = "List console routes and their access rules")]
    List,
}

pub async fn handle(cmd: RouteCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let table = RouteTable::console();

    match cmd {
        RouteCommands::Check { path } => {
            let store = open_session()?;
            let route = table.resolve(&path);
            let decision = evaluate(&route, store.session());

            let result = json!({
                "path": path,
                "route": route.name,
                "decision": decision,
                "redirect": decision.redirect_path(),
            });

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                OutputFormat::Text => match decision {
                    GuardDecision::Allow => println!("{} ({}): allowed", path, route.name),
                    other => println!(
                        "{} ({}): redirected to {}",
                        path,
                        route.name,
                        other.redirect_path().unwrap_or_default()
                    ),
                },
            }
            Ok(())
        }
        RouteCommands::List => {
            match output_format {
                OutputFormat::Json => {
                    let routes = json!({ "routes": table.routes() });
                    println!("{}", serde_json::to_string_pretty(&routes)?);
                }
                OutputFormat::Text => {
                    println!("{:<12} {:<12} {:<6} {}", "PATH", "NAME", "AUTH", "ROLES");
                    println!("{}", "-".repeat(48));

                    for route in table.routes() {
                        let roles = if route.required_roles.is_empty() {
                            "-".to_string()
                        } else {
                            route
                                .required_roles
                                .iter()
                                .map(|r| r.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        };
                        let auth = if route.requires_auth { "yes" } else { "no" };
                        println!("{:<12} {:<12} {:<6} {}", route.path, route.name, auth, roles);
                    }
                }
            }
            Ok(())
        }
    }
}
