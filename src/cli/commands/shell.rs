use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::ApiClient;
use crate::bridge;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::devtools::{DevToolsGate, GateNotice, KeyDisposition, KeyEvent};
use crate::host::{HeadlessRegistrar, HeadlessWindow, HostShortcutGuard};
use crate::renderer::RendererRuntime;

const HELP: &str = "\
commands:
  key <combo>        press a key in the renderer (e.g. f12, ctrl+shift+i)
  shortcut [combo]   fire the host's global shortcut
  submit <password>  submit the open devtools challenge
  cancel             dismiss the open challenge
  refresh            re-fetch the devtools password status
  minimize | maximize | close
  status             show renderer, host and window state
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShellCommand {
    Key(KeyEvent),
    Shortcut(Option<String>),
    Submit(String),
    Cancel,
    Refresh,
    Minimize,
    Maximize,
    Close,
    Status,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_start().trim_end_matches(['\r', '\n']);
        let (word, raw) = match line.split_once(char::is_whitespace) {
            Some((word, raw)) => (word, raw),
            None => (line, ""),
        };
        let rest = raw.trim();

        match word.to_ascii_lowercase().as_str() {
            "key" if !rest.is_empty() => rest.parse().map(ShellCommand::Key),
            "key" => Err("usage: key <combo>".to_string()),
            "shortcut" => Ok(ShellCommand::Shortcut((!rest.is_empty()).then(|| rest.to_string()))),
            // passwords may start or end with spaces; only the separator is dropped
            "submit" => Ok(ShellCommand::Submit(raw.to_string())),
            "cancel" => Ok(ShellCommand::Cancel),
            "refresh" => Ok(ShellCommand::Refresh),
            "minimize" => Ok(ShellCommand::Minimize),
            "maximize" => Ok(ShellCommand::Maximize),
            "close" => Ok(ShellCommand::Close),
            "status" => Ok(ShellCommand::Status),
            "help" | "?" => Ok(ShellCommand::Help),
            "quit" | "exit" => Ok(ShellCommand::Quit),
            other => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    let api = Arc::new(ApiClient::from_config(config).context("failed to build API client")?);
    let ((renderer_bridge, from_host), (host_bridge, to_host)) = bridge::pair();

    let window = HeadlessWindow::new();
    let mut guard = HostShortcutGuard::new(
        config.trust_mode(),
        Box::new(window.clone()),
        Box::new(HeadlessRegistrar::new()),
        api.clone(),
        host_bridge,
        config.host_challenge_timeout(),
    );
    guard.register_shortcuts(&config.host.shortcuts);
    let active_shortcut = guard.active_shortcut().map(str::to_string);
    if active_shortcut.is_none() {
        tracing::warn!("No global devtools shortcut could be registered");
    }
    let host = guard.handle();

    let (runtime, mut notices) =
        RendererRuntime::new(DevToolsGate::from_config(config), api, renderer_bridge);
    let renderer = runtime.handle();

    let host_task = tokio::spawn(guard.run(to_host));
    let renderer_task = tokio::spawn(runtime.run(from_host));

    let notice_format = output_format.clone();
    let printer = tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            print_notice(&notice_format, &notice);
        }
    });

    if let OutputFormat::Text = output_format {
        println!("upload-console shell ({} mode), 'help' for commands", config.trust_mode());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ShellCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match command {
            ShellCommand::Key(event) => {
                let disposition = renderer.key(event).await;
                let outcome = match disposition {
                    KeyDisposition::Intercepted => "intercepted",
                    KeyDisposition::PassThrough => "passed through",
                };
                println!("{}: {}", line.trim(), outcome);
            }
            ShellCommand::Shortcut(combo) => match combo.or_else(|| active_shortcut.clone()) {
                Some(combo) => host.trigger_shortcut(combo),
                None => eprintln!("no global shortcut is registered"),
            },
            ShellCommand::Submit(password) => renderer.submit(password),
            ShellCommand::Cancel => renderer.cancel(),
            ShellCommand::Refresh => renderer.refresh_status(),
            ShellCommand::Minimize => renderer.window().minimize_window(),
            ShellCommand::Maximize => renderer.window().maximize_window(),
            ShellCommand::Close => renderer.window().close_window(),
            ShellCommand::Status => {
                let status = json!({
                    "renderer": renderer.snapshot().await,
                    "host": host.snapshot().await,
                    "window": window.snapshot(),
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Quit => break,
        }
    }

    renderer.shutdown();
    host.shutdown();
    let (host_done, renderer_done) = futures::future::join(host_task, renderer_task).await;
    host_done.context("host guard task failed")?;
    renderer_done.context("renderer task failed")?;
    printer.await.context("notice printer failed")?;
    Ok(())
}

fn print_notice(output_format: &OutputFormat, notice: &GateNotice) {
    let at = chrono::Local::now().format("%H:%M:%S");
    match output_format {
        OutputFormat::Json => println!("{}", json!({ "at": at.to_string(), "notice": notice })),
        OutputFormat::Text => {
            let text = match notice {
                GateNotice::ProtectionEnabled => "devtools protection enabled".to_string(),
                GateNotice::ProtectionDisabled => "devtools protection disabled".to_string(),
                GateNotice::ChallengeOpened { challenge, .. } => {
                    format!("password required to open devtools (challenge {})", challenge)
                }
                GateNotice::ChallengeClosed { .. } => "password dialog closed".to_string(),
                GateNotice::InputRejected(reason) => format!("input rejected: {}", reason),
                GateNotice::Verifying => "verifying...".to_string(),
                GateNotice::VerificationFailed(reason) => reason.clone(),
                GateNotice::Unlocked { rearm_after } => {
                    format!("devtools unlocked, protection re-arms in {:?}", rearm_after)
                }
                GateNotice::Rearmed => "devtools protection re-armed".to_string(),
            };
            println!("[{}] {}", at, text);
        }
    }
}
