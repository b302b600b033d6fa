//! WebSocket Chat Client - Entry Point
//!
//! Joins a room from the command line, prints messages as they arrive and
//! sends each stdin line. `/leave` or Ctrl+C leaves the room.
//!
//! Usage: `chat_client <username> <room> <password> [--create]`

use std::env;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chat_client::{
    AppError, ClientConfig, ConnectionManager, RenderedMessage, SessionController, SessionState,
};

/// Input line that leaves the room
const LEAVE_COMMAND: &str = "/leave";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_client=trace
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_client=info")),
        )
        .init();

    let config = ClientConfig::from_env()?;
    info!("Using chat server {}", config.server_url);

    let mut session = SessionController::new(ConnectionManager::new(&config));
    read_form(&mut session)?;
    session.join()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0;

    loop {
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event else { break };
                let before = session.state();
                session.handle_event(event);

                if before == SessionState::Connecting && session.is_joined() {
                    println!("*** Joined room '{}'", session.form().room);
                }
                printed = print_new(&session, printed);
                if session.state() == SessionState::Idle {
                    println!("*** Disconnected");
                    break;
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim() == LEAVE_COMMAND => {
                        session.leave();
                        println!("*** Left room");
                        break;
                    }
                    Some(line) => {
                        if !session.is_joined() {
                            warn!("Not joined yet, message dropped");
                            continue;
                        }
                        session.set_input(line);
                        session.send_message();
                    }
                    None => {
                        session.leave();
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.leave();
                println!("*** Left room");
                break;
            }
        }
    }

    Ok(())
}

/// Fill the join form from command line arguments
fn read_form(session: &mut SessionController<ConnectionManager>) -> Result<(), AppError> {
    let mut positional = Vec::new();
    let mut create = false;

    for arg in env::args().skip(1) {
        if arg == "--create" {
            create = true;
        } else {
            positional.push(arg);
        }
    }

    let mut positional = positional.into_iter();
    let form = session.form_mut();
    form.username = positional.next().ok_or(AppError::MissingArgument("username"))?;
    form.room = positional.next().ok_or(AppError::MissingArgument("room"))?;
    form.password = positional.next().ok_or(AppError::MissingArgument("password"))?;
    form.create_if_missing = create;
    Ok(())
}

/// Print log entries added since the last call, returns the new count
fn print_new(session: &SessionController<ConnectionManager>, printed: usize) -> usize {
    for entry in session.rendered().skip(printed) {
        print_message(entry);
    }
    session.messages().len()
}

fn print_message(entry: RenderedMessage<'_>) {
    if entry.own {
        println!("{:>40} <", entry.message.message);
    } else {
        println!("[{}] {}", entry.message.username, entry.message.message);
    }
}
