use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoding;
use crate::listing::{ListingEntry, NodeKind};
use crate::status::{ErrorCode, ReturnCode};
use crate::wire::{WireMessage, FIELD_SEPARATOR};

pub mod codes {
    // client -> server
    pub const REGISTER: &str = "REGI";
    pub const LOGIN: &str = "LOGN";
    pub const RUN_SNIPPET: &str = "EXEC";
    pub const RUN_FILE: &str = "RUNF";
    pub const GET_FILE: &str = "GETF";
    pub const SAVE_FILE: &str = "SAVF";
    pub const CREATE: &str = "CREA";
    pub const DELETE_FILE: &str = "DELF";
    pub const INPUT_REPLY: &str = "INPR";
    pub const DOWNLOAD_FILE: &str = "DNLD";

    // server -> client
    pub const REGISTERED: &str = "REGR";
    pub const LOGGED_IN: &str = "LOGR";
    pub const STORAGE_UPDATED: &str = "CRER";
    pub const FILE_CONTENT: &str = "FILC";
    pub const FILE_SAVED: &str = "SAVR";
    pub const FILE_DELETED: &str = "DELR";
    pub const OUTPUT: &str = "OUTP";
    pub const RUN_DONE: &str = "DONE";
    pub const ERROR: &str = "ERRR";
    pub const INPUT_REQUEST: &str = "INPT";
    pub const FILE_DOWNLOAD: &str = "DNLR";
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown message code '{0}'")]
    UnknownCode(String),
    #[error("{code} frame is missing field {index}")]
    MissingField { code: &'static str, index: usize },
    #[error("{code} field is not valid base64: {source}")]
    Base64 {
        code: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("{code} field is not valid json: {source}")]
    Json {
        code: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Payload of a `SAVF` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub path: String,
    pub content: String,
}

/// Payload of a `CREA` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    pub path: String,
}

#[derive(Debug, Default, Deserialize)]
struct InputPrompt {
    #[serde(default)]
    prompt: String,
}

/// Every command a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Register { email: String, password: String },
    Login { email: String, password: String },
    RunSnippet { code: String },
    RunFile { path: String },
    GetFile { path: String },
    SaveFile(SaveRequest),
    Create(CreateRequest),
    DeleteFile { path: String },
    /// `None` is the failure reply: a bare `INPR` frame.
    InputReply { line: Option<String> },
    DownloadFile { path: String },
}

impl ClientCommand {
    pub fn code(&self) -> &'static str {
        match self {
            ClientCommand::Register { .. } => codes::REGISTER,
            ClientCommand::Login { .. } => codes::LOGIN,
            ClientCommand::RunSnippet { .. } => codes::RUN_SNIPPET,
            ClientCommand::RunFile { .. } => codes::RUN_FILE,
            ClientCommand::GetFile { .. } => codes::GET_FILE,
            ClientCommand::SaveFile(_) => codes::SAVE_FILE,
            ClientCommand::Create(_) => codes::CREATE,
            ClientCommand::DeleteFile { .. } => codes::DELETE_FILE,
            ClientCommand::InputReply { .. } => codes::INPUT_REPLY,
            ClientCommand::DownloadFile { .. } => codes::DOWNLOAD_FILE,
        }
    }

    pub fn to_wire(&self) -> WireMessage {
        let fields = match self {
            ClientCommand::Register { email, password }
            | ClientCommand::Login { email, password } => vec![email.clone(), password.clone()],
            ClientCommand::RunSnippet { code } => vec![encoding::encode_text(code)],
            ClientCommand::RunFile { path }
            | ClientCommand::GetFile { path }
            | ClientCommand::DeleteFile { path }
            | ClientCommand::DownloadFile { path } => vec![path.clone()],
            ClientCommand::SaveFile(request) => vec![json_field(request)],
            ClientCommand::Create(request) => vec![json_field(request)],
            ClientCommand::InputReply { line: Some(line) } => vec![encoding::encode_text(line)],
            ClientCommand::InputReply { line: None } => Vec::new(),
        };
        WireMessage::new(self.code(), fields)
    }

    pub fn encode(&self) -> String {
        self.to_wire().encode()
    }

    /// Returns the first plain field that contains the field separator.
    /// Such a frame cannot be split back into its original fields.
    pub fn ambiguous_field(&self) -> Option<&str> {
        let plain: Vec<&str> = match self {
            ClientCommand::Register { email, password }
            | ClientCommand::Login { email, password } => vec![email, password],
            ClientCommand::RunFile { path }
            | ClientCommand::GetFile { path }
            | ClientCommand::DeleteFile { path }
            | ClientCommand::DownloadFile { path } => vec![path],
            _ => Vec::new(),
        };
        plain.into_iter().find(|field| field.contains(FIELD_SEPARATOR))
    }
}

/// Serializes a JSON field. A separator inside a JSON string is written as
/// its unicode escape, which any JSON parser reads back unchanged.
fn json_field<T: Serialize>(value: &T) -> String {
    // Serializing plain string structs cannot fail.
    let json = serde_json::to_string(value).unwrap_or_default();
    json.replace(FIELD_SEPARATOR, "\\u007e")
}

/// Every reply the backend may send, decoded once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Registered,
    LoggedIn { listing: Vec<ListingEntry> },
    StorageUpdated,
    FileContent { content: String },
    FileSaved,
    FileDeleted,
    Output { chunk: String },
    RunDone { return_code: ReturnCode },
    Error { code: ErrorCode },
    InputRequested { prompt: String },
    FileDownload { content: Vec<u8> },
}

impl ServerMessage {
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        Self::from_wire(&WireMessage::decode(raw))
    }

    pub fn from_wire(msg: &WireMessage) -> Result<Self, ProtocolError> {
        let decoded = match msg.code() {
            codes::REGISTERED => ServerMessage::Registered,
            codes::LOGGED_IN => {
                let field = required(msg, codes::LOGGED_IN, 0)?;
                let listing = ListingEntry::parse_listing(field).map_err(|source| {
                    ProtocolError::Json {
                        code: codes::LOGGED_IN,
                        source,
                    }
                })?;
                ServerMessage::LoggedIn { listing }
            }
            codes::STORAGE_UPDATED => ServerMessage::StorageUpdated,
            codes::FILE_CONTENT => ServerMessage::FileContent {
                content: base64_text(msg, codes::FILE_CONTENT)?,
            },
            codes::FILE_SAVED => ServerMessage::FileSaved,
            codes::FILE_DELETED => ServerMessage::FileDeleted,
            codes::OUTPUT => ServerMessage::Output {
                chunk: base64_text(msg, codes::OUTPUT)?,
            },
            codes::RUN_DONE => ServerMessage::RunDone {
                return_code: msg
                    .field(0)
                    .map(ReturnCode::parse)
                    .unwrap_or(ReturnCode::Unknown(None)),
            },
            codes::ERROR => ServerMessage::Error {
                code: ErrorCode::parse(required(msg, codes::ERROR, 0)?),
            },
            codes::INPUT_REQUEST => {
                let prompt = match msg.field(0).filter(|field| !field.trim().is_empty()) {
                    Some(field) => {
                        serde_json::from_str::<InputPrompt>(field)
                            .map_err(|source| ProtocolError::Json {
                                code: codes::INPUT_REQUEST,
                                source,
                            })?
                            .prompt
                    }
                    None => String::new(),
                };
                ServerMessage::InputRequested { prompt }
            }
            codes::FILE_DOWNLOAD => {
                let field = required(msg, codes::FILE_DOWNLOAD, 0)?;
                let content =
                    encoding::decode_bytes(field).map_err(|source| ProtocolError::Base64 {
                        code: codes::FILE_DOWNLOAD,
                        source,
                    })?;
                ServerMessage::FileDownload { content }
            }
            other => return Err(ProtocolError::UnknownCode(other.to_string())),
        };
        Ok(decoded)
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServerMessage::Registered => codes::REGISTERED,
            ServerMessage::LoggedIn { .. } => codes::LOGGED_IN,
            ServerMessage::StorageUpdated => codes::STORAGE_UPDATED,
            ServerMessage::FileContent { .. } => codes::FILE_CONTENT,
            ServerMessage::FileSaved => codes::FILE_SAVED,
            ServerMessage::FileDeleted => codes::FILE_DELETED,
            ServerMessage::Output { .. } => codes::OUTPUT,
            ServerMessage::RunDone { .. } => codes::RUN_DONE,
            ServerMessage::Error { .. } => codes::ERROR,
            ServerMessage::InputRequested { .. } => codes::INPUT_REQUEST,
            ServerMessage::FileDownload { .. } => codes::FILE_DOWNLOAD,
        }
    }
}

fn required<'a>(
    msg: &'a WireMessage,
    code: &'static str,
    index: usize,
) -> Result<&'a str, ProtocolError> {
    msg.field(index)
        .ok_or(ProtocolError::MissingField { code, index })
}

fn base64_text(msg: &WireMessage, code: &'static str) -> Result<String, ProtocolError> {
    let field = required(msg, code, 0)?;
    encoding::decode_text(field).map_err(|source| ProtocolError::Base64 { code, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::timeout]
    fn encodes_plain_commands() {
        let login = ClientCommand::Login {
            email: "user@x.com".into(),
            password: "pw1".into(),
        };
        assert_eq!(login.encode(), "LOGN~user@x.com~pw1");
        assert_eq!(
            ClientCommand::RunFile {
                path: "a/b.py".into()
            }
            .encode(),
            "RUNF~a/b.py"
        );
        assert_eq!(
            ClientCommand::DownloadFile {
                path: "x.txt".into()
            }
            .encode(),
            "DNLD~x.txt"
        );
    }

    #[test_timeout::timeout]
    fn encodes_json_payloads_in_field_order() {
        let save = ClientCommand::SaveFile(SaveRequest {
            path: "a/b.py".into(),
            content: "print(1)\n".into(),
        });
        assert_eq!(
            save.encode(),
            r#"SAVF~{"path":"a/b.py","content":"print(1)\n"}"#
        );

        let create = ClientCommand::Create(CreateRequest {
            kind: NodeKind::Folder,
            name: "lib".into(),
            path: "src/lib".into(),
        });
        assert_eq!(
            create.encode(),
            r#"CREA~{"type":"folder","name":"lib","path":"src/lib"}"#
        );
    }

    #[test_timeout::timeout]
    fn json_payload_never_contains_separator() {
        let save = ClientCommand::SaveFile(SaveRequest {
            path: "a.py".into(),
            content: "x = ~1".into(),
        });
        let frame = save.encode();
        let wire = WireMessage::decode(&frame);
        assert_eq!(wire.fields().len(), 1);
        let parsed: SaveRequest = serde_json::from_str(wire.field(0).unwrap()).unwrap();
        assert_eq!(parsed.content, "x = ~1");
    }

    #[test_timeout::timeout]
    fn base64_commands() {
        assert_eq!(
            ClientCommand::RunSnippet {
                code: "print(1)".into()
            }
            .encode(),
            "EXEC~cHJpbnQoMSk="
        );
        assert_eq!(
            ClientCommand::InputReply {
                line: Some("Bob".into())
            }
            .encode(),
            "INPR~Qm9i"
        );
        assert_eq!(ClientCommand::InputReply { line: None }.encode(), "INPR");
    }

    #[test_timeout::timeout]
    fn flags_separator_in_plain_fields() {
        let cmd = ClientCommand::GetFile {
            path: "we~ird.py".into(),
        };
        assert_eq!(cmd.ambiguous_field(), Some("we~ird.py"));
        let code = ClientCommand::RunSnippet { code: "~".into() };
        assert_eq!(code.ambiguous_field(), None);
    }

    #[test_timeout::timeout]
    fn decodes_server_replies() {
        assert_eq!(
            ServerMessage::decode("LOGR~[]").unwrap(),
            ServerMessage::LoggedIn {
                listing: Vec::new()
            }
        );
        assert_eq!(
            ServerMessage::decode("OUTP~aGkK").unwrap(),
            ServerMessage::Output { chunk: "hi\n".into() }
        );
        assert_eq!(
            ServerMessage::decode("DONE~3").unwrap(),
            ServerMessage::RunDone {
                return_code: ReturnCode::Timeout
            }
        );
        assert_eq!(
            ServerMessage::decode("DONE").unwrap(),
            ServerMessage::RunDone {
                return_code: ReturnCode::Unknown(None)
            }
        );
        assert_eq!(
            ServerMessage::decode("ERRR~301").unwrap(),
            ServerMessage::Error {
                code: ErrorCode::CreateFailed
            }
        );
        assert_eq!(
            ServerMessage::decode("DNLR~AAEC").unwrap(),
            ServerMessage::FileDownload {
                content: vec![0, 1, 2]
            }
        );
    }

    #[test_timeout::timeout]
    fn input_request_prompt_is_optional() {
        assert_eq!(
            ServerMessage::decode(r#"INPT~{"prompt":"Name? "}"#).unwrap(),
            ServerMessage::InputRequested {
                prompt: "Name? ".into()
            }
        );
        assert_eq!(
            ServerMessage::decode("INPT").unwrap(),
            ServerMessage::InputRequested {
                prompt: String::new()
            }
        );
        assert_eq!(
            ServerMessage::decode("INPT~{}").unwrap(),
            ServerMessage::InputRequested {
                prompt: String::new()
            }
        );
    }

    #[test_timeout::timeout]
    fn malformed_replies_are_typed_errors() {
        assert!(matches!(
            ServerMessage::decode("NOPE~1"),
            Err(ProtocolError::UnknownCode(code)) if code == "NOPE"
        ));
        assert!(matches!(
            ServerMessage::decode("FILC"),
            Err(ProtocolError::MissingField { code: "FILC", index: 0 })
        ));
        assert!(matches!(
            ServerMessage::decode("OUTP~***"),
            Err(ProtocolError::Base64 { code: "OUTP", .. })
        ));
        assert!(matches!(
            ServerMessage::decode("LOGR~{not json"),
            Err(ProtocolError::Json { code: "LOGR", .. })
        ));
    }
}
