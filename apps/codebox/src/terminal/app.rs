use codebox_proto::ReturnCode;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::ClientConfig;
use crate::runtime::{run_session, RuntimeOutcome, StopWhen};
use crate::session::{Controller, UserAction};
use crate::telemetry::logging;
use crate::terminal::cli::{Cli, Command, ExecArgs};
use crate::terminal::error::CliError;
use crate::terminal::shell;
use crate::terminal::surface::{self, TerminalEditor, TerminalSurface};
use crate::transport::Connection;

/// Runs the selected command and returns the process exit code.
pub async fn run(cli: Cli) -> Result<i32, CliError> {
    logging::init(&cli.logging.to_config())?;

    let config = cli.client_config()?;
    info!(
        target: "codebox::terminal",
        endpoint = %config.endpoint,
        connect_timeout = ?config.connect_timeout,
        request_timeout = ?config.request_timeout,
        "starting"
    );

    match cli.command {
        Command::Exec(args) => exec(&config, args).await,
        Command::Shell => shell(&config).await,
    }
}

async fn exec(config: &ClientConfig, args: ExecArgs) -> Result<i32, CliError> {
    let source = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|source| CliError::ReadSource {
            path: args.file.clone(),
            source,
        })?;

    let state = surface::shared();
    state.lock().buffer = source;
    let (action_tx, mut actions) = mpsc::unbounded_channel();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let connection = Connection::connect(config, event_tx);

    let mut controller = Controller::new(
        TerminalSurface::new(state.clone(), "."),
        TerminalEditor::new(state.clone()),
        connection.handle(),
    )
    .with_request_timeout(config.request_timeout);

    // Queued now, applied once the connection opens.
    let _ = action_tx.send(UserAction::Run);
    let input = tokio::spawn(shell::forward_input(state, action_tx));

    let outcome = run_session(
        &mut controller,
        &mut events,
        &mut actions,
        StopWhen::RunFinished,
    )
    .await;
    input.abort();
    connection.close().await;
    println!();

    match outcome {
        RuntimeOutcome::RunFinished(code) => Ok(exit_code(code)),
        RuntimeOutcome::RunTimedOut => Err(CliError::RunTimedOut),
        RuntimeOutcome::ConnectionFailed(cause) => Err(CliError::Connection(cause)),
        RuntimeOutcome::ActionsClosed | RuntimeOutcome::EventsClosed => {
            Err(CliError::SessionEnded)
        }
    }
}

async fn shell(config: &ClientConfig) -> Result<i32, CliError> {
    let state = surface::shared();
    let (action_tx, mut actions) = mpsc::unbounded_channel();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let connection = Connection::connect(config, event_tx);

    let mut controller = Controller::new(
        TerminalSurface::new(state.clone(), "."),
        TerminalEditor::new(state.clone()),
        connection.handle(),
    )
    .with_request_timeout(config.request_timeout);

    eprintln!("Connecting to {}... type 'help' for commands", config.endpoint);
    let reader = tokio::spawn(shell::read_commands(state, action_tx));

    let outcome = run_session(
        &mut controller,
        &mut events,
        &mut actions,
        StopWhen::ActionsClosed,
    )
    .await;
    reader.abort();
    connection.close().await;

    match outcome {
        RuntimeOutcome::ActionsClosed => Ok(0),
        RuntimeOutcome::ConnectionFailed(cause) => Err(CliError::Connection(cause)),
        RuntimeOutcome::RunFinished(_)
        | RuntimeOutcome::RunTimedOut
        | RuntimeOutcome::EventsClosed => Err(CliError::SessionEnded),
    }
}

/// Process exit status for a run's return code.
pub fn exit_code(code: ReturnCode) -> i32 {
    match code.code() {
        Some(code) => i32::try_from(code).unwrap_or(1),
        None => 1,
    }
}
