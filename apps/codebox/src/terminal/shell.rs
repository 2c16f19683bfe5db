//! Line commands for `codebox shell`.

use std::path::PathBuf;

use codebox_proto::NodeKind;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::surface::{format_tree, SharedTerminal};
use crate::session::UserAction;

pub const HELP: &str = "\
commands:
  register <email> <password>   create an account
  login <email> <password>      sign in and load your files
  tree                          list your files
  cd <folder>|/                 choose where new files go
  open <path>                   load a remote file into the buffer
  edit <local-file>             replace the buffer with a local file
  show                          print the buffer
  save                          save the open file
  run                           run the open file, or the buffer as a snippet
  new-file <name>               create a file in the current folder
  new-folder <name>             create a folder in the current folder
  rm <path>                     delete a file or folder
  download <path>               save a remote file to the working directory
  help                          show this text
  quit                          leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Register { email: String, password: String },
    Login { email: String, password: String },
    Tree,
    Cd(Option<String>),
    Open(String),
    Edit(PathBuf),
    Show,
    Save,
    Run,
    NewFile(String),
    NewFolder(String),
    Rm(String),
    Download(String),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellParseError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl ShellCommand {
    /// Parses one line. Returns `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, ShellParseError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let one = |usage: &'static str| match rest.as_slice() {
            [arg] => Ok(arg.to_string()),
            _ => Err(ShellParseError::Usage(usage)),
        };
        let pair = |usage: &'static str| match rest.as_slice() {
            [first, second] => Ok((first.to_string(), second.to_string())),
            _ => Err(ShellParseError::Usage(usage)),
        };
        let none = |command: ShellCommand, usage: &'static str| {
            if rest.is_empty() {
                Ok(command)
            } else {
                Err(ShellParseError::Usage(usage))
            }
        };

        let command = match verb {
            "register" => {
                let (email, password) = pair("register <email> <password>")?;
                ShellCommand::Register { email, password }
            }
            "login" => {
                let (email, password) = pair("login <email> <password>")?;
                ShellCommand::Login { email, password }
            }
            "tree" | "ls" => none(ShellCommand::Tree, "tree")?,
            "cd" => {
                let folder = one("cd <folder>|/")?;
                let folder = folder.trim_matches('/');
                ShellCommand::Cd((!folder.is_empty()).then(|| folder.to_string()))
            }
            "open" => ShellCommand::Open(one("open <path>")?),
            "edit" => ShellCommand::Edit(PathBuf::from(one("edit <local-file>")?)),
            "show" | "cat" => none(ShellCommand::Show, "show")?,
            "save" => none(ShellCommand::Save, "save")?,
            "run" => none(ShellCommand::Run, "run")?,
            "new-file" => ShellCommand::NewFile(one("new-file <name>")?),
            "new-folder" | "mkdir" => ShellCommand::NewFolder(one("new-folder <name>")?),
            "rm" => ShellCommand::Rm(one("rm <path>")?),
            "download" => ShellCommand::Download(one("download <path>")?),
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(ShellParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }

    /// The session action this command maps to, if it needs the session.
    pub fn to_action(&self) -> Option<UserAction> {
        Some(match self {
            ShellCommand::Register { email, password } => UserAction::Register {
                email: email.clone(),
                password: password.clone(),
            },
            ShellCommand::Login { email, password } => UserAction::Login {
                email: email.clone(),
                password: password.clone(),
            },
            ShellCommand::Cd(folder) => UserAction::SelectFolder {
                path: folder.clone(),
            },
            ShellCommand::Open(path) => UserAction::OpenFile { path: path.clone() },
            ShellCommand::Save => UserAction::Save,
            ShellCommand::Run => UserAction::Run,
            ShellCommand::NewFile(name) => UserAction::Create {
                kind: NodeKind::File,
                name: name.clone(),
            },
            ShellCommand::NewFolder(name) => UserAction::Create {
                kind: NodeKind::Folder,
                name: name.clone(),
            },
            ShellCommand::Rm(path) => UserAction::Delete { path: path.clone() },
            ShellCommand::Download(path) => UserAction::Download { path: path.clone() },
            ShellCommand::Tree
            | ShellCommand::Edit(_)
            | ShellCommand::Show
            | ShellCommand::Help
            | ShellCommand::Quit => return None,
        })
    }
}

/// Reads stdin lines until `quit` or EOF and turns them into actions.
///
/// While the running program waits for input, the next line is committed
/// to it instead of being parsed.
pub async fn read_commands(state: SharedTerminal, actions: UnboundedSender<UserAction>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if state.lock().input_pending {
            if actions.send(UserAction::InputCommitted { line }).is_err() {
                break;
            }
            continue;
        }

        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        debug!(target: "codebox::terminal", ?command, "shell command");

        match &command {
            ShellCommand::Quit => break,
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Tree => {
                let listing = format_tree(&state.lock().tree);
                if listing.is_empty() {
                    println!("(no files)");
                } else {
                    print!("{listing}");
                }
            }
            ShellCommand::Show => println!("{}", state.lock().buffer),
            ShellCommand::Edit(path) => match tokio::fs::read_to_string(path).await {
                Ok(text) => {
                    {
                        let mut state = state.lock();
                        if state.read_only {
                            eprintln!("The buffer is still loading");
                            continue;
                        }
                        state.buffer = text;
                    }
                    if actions.send(UserAction::EditorChanged).is_err() {
                        break;
                    }
                }
                Err(err) => eprintln!("cannot read {}: {err}", path.display()),
            },
            _ => {}
        }

        if let Some(action) = command.to_action() {
            if actions.send(action).is_err() {
                break;
            }
        }
    }
}

/// Forwards stdin lines as input replies for `codebox exec`.
pub async fn forward_input(state: SharedTerminal, actions: UnboundedSender<UserAction>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !state.lock().input_pending {
            debug!(target: "codebox::terminal", "ignoring unrequested input line");
            continue;
        }
        if actions.send(UserAction::InputCommitted { line }).is_err() {
            break;
        }
    }
}
