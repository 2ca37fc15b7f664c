use std::path::PathBuf;

use anyhow::{Context, Result};
use toastq_core::{NewMessage, NotifierConfig, default_config_path};
use toastq_runtime::{RuntimeConfig, ToastService};
use toastq_types::{GroupKey, MessageId, Severity};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Toast {
        severity: Option<Severity>,
        group: GroupKey,
        text: String,
    },
    Delete(GroupKey, MessageId),
    Click(GroupKey, MessageId),
    Clear(GroupKey),
    List(GroupKey),
}

/// Parses one stdin line.
///
/// `[severity] text` or `[severity:group] text` submits a toast, bare text submits an info
/// toast. `/delete ID [GROUP]`, `/click ID [GROUP]`, `/clear [GROUP]` and `/list [GROUP]`
/// act on the default group unless a group is given.
fn parse_line(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(command) = line.strip_prefix('/') {
        let mut parts = command.split_whitespace();
        let name = parts.next()?;
        return match name {
            "delete" | "click" => {
                let id = MessageId(parts.next()?.parse::<u64>().ok()?);
                let group = parts.next().map(GroupKey::new).unwrap_or_default();
                if name == "delete" {
                    Some(Input::Delete(group, id))
                } else {
                    Some(Input::Click(group, id))
                }
            }
            "clear" => Some(Input::Clear(
                parts.next().map(GroupKey::new).unwrap_or_default(),
            )),
            "list" => Some(Input::List(
                parts.next().map(GroupKey::new).unwrap_or_default(),
            )),
            _ => None,
        };
    }

    if let Some(rest) = line.strip_prefix('[')
        && let Some((tag, text)) = rest.split_once(']')
    {
        let (severity, group) = match tag.split_once(':') {
            Some((severity, group)) => (severity, GroupKey::new(group.trim())),
            None => (tag, GroupKey::default()),
        };
        return Some(Input::Toast {
            severity: Severity::parse(severity),
            group,
            text: text.trim().to_string(),
        });
    }

    Some(Input::Toast {
        severity: Some(Severity::Info),
        group: GroupKey::default(),
        text: line.to_string(),
    })
}

async fn apply(service: &ToastService, input: Input) -> Result<()> {
    match input {
        Input::Toast {
            severity,
            group,
            text,
        } => {
            let mut message = NewMessage::new(text).group(group);
            if let Some(severity) = severity {
                message = message.severity(severity);
            }
            match service.add(message).await? {
                Some(id) => info!(%id, "toast accepted"),
                None => info!("duplicate toast rejected"),
            }
        }
        Input::Delete(group, id) => {
            let deleted = service.delete(group.clone(), id).await?;
            info!(%group, %id, deleted, "delete handled");
        }
        Input::Click(group, id) => {
            let outcome = service.click(group.clone(), id).await?;
            info!(%group, %id, ?outcome, "click handled");
        }
        Input::Clear(group) => {
            let removed = service.destroy_all(group.clone()).await?;
            info!(%group, removed, "cleared group");
        }
        Input::List(group) => {
            for toast in service.messages(group).await? {
                info!(
                    id = %toast.id,
                    severity = ?toast.severity,
                    title = toast.title.as_deref().unwrap_or(""),
                    countdown = ?toast.countdown,
                    text = %toast.text,
                    "visible toast"
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("toastq_debug=info".parse()?))
        .init();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let notifier = NotifierConfig::load_or_default(&config_path);

    let (service, mut events, task) = ToastService::start(RuntimeConfig {
        notifier,
        ..RuntimeConfig::default()
    });

    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(?event, "toast event");
        }
    });

    info!("type `[error:side] disk full`, `/list side`, `/click 1 side`, `/delete 1` or `/clear`");
    info!("press Ctrl+C or close stdin to stop");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shutdown = Box::pin(signal::ctrl_c());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("received Ctrl+C; exiting");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed; exiting");
                    break;
                };

                match parse_line(&line) {
                    Some(input) => apply(&service, input).await?,
                    None => warn!(%line, "unrecognized input"),
                }
            }
        }
    }

    service
        .shutdown()
        .await
        .context("toast runtime exited before shutdown")?;
    task.await.context("toast runtime task failed")?;
    event_task.await.context("event logger task failed")?;

    Ok(())
}
