use std::fmt;

/// Error codes carried by `ERRR` frames.
///
/// The first digit groups them: 0xx general, 1xx authentication,
/// 2xx execution and file lookup, 3xx storage updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    General,
    LoginFailed,
    UserExists,
    FileNotFound,
    ExecutionTimeout,
    CreateFailed,
    DeleteFailed,
    Other(String),
}

impl ErrorCode {
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "001" => ErrorCode::General,
            "101" => ErrorCode::LoginFailed,
            "102" => ErrorCode::UserExists,
            "201" => ErrorCode::FileNotFound,
            "202" => ErrorCode::ExecutionTimeout,
            "301" => ErrorCode::CreateFailed,
            "302" => ErrorCode::DeleteFailed,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::General => "001",
            ErrorCode::LoginFailed => "101",
            ErrorCode::UserExists => "102",
            ErrorCode::FileNotFound => "201",
            ErrorCode::ExecutionTimeout => "202",
            ErrorCode::CreateFailed => "301",
            ErrorCode::DeleteFailed => "302",
            ErrorCode::Other(code) => code,
        }
    }

    pub fn description(&self) -> String {
        match self {
            ErrorCode::General => "General Error (001), Try to refresh".to_string(),
            ErrorCode::LoginFailed => "Login Failed (101)".to_string(),
            ErrorCode::UserExists => "User already exists (102)".to_string(),
            ErrorCode::FileNotFound => "File not found (201)".to_string(),
            ErrorCode::ExecutionTimeout => "Execution timeout (202)".to_string(),
            ErrorCode::CreateFailed => "Failed to create file or folder (301)".to_string(),
            ErrorCode::DeleteFailed => "Failed to delete file (302)".to_string(),
            ErrorCode::Other(code) => format!("Unknown error ({code})"),
        }
    }

    /// Soft errors surface as a transient notification instead of a
    /// blocking alert. Only a failed create is soft.
    pub fn is_soft(&self) -> bool {
        matches!(self, ErrorCode::CreateFailed)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Return code carried by the terminal `DONE` frame of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Success,
    ExitedWithErrors,
    EnvironmentFailure,
    Timeout,
    /// Any other integer, or a field that is not an integer at all.
    Unknown(Option<i64>),
}

impl ReturnCode {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ReturnCode::Success,
            1 => ReturnCode::ExitedWithErrors,
            2 => ReturnCode::EnvironmentFailure,
            3 => ReturnCode::Timeout,
            other => ReturnCode::Unknown(Some(other)),
        }
    }

    pub fn parse(field: &str) -> Self {
        field
            .trim()
            .parse::<i64>()
            .map(Self::from_code)
            .unwrap_or(ReturnCode::Unknown(None))
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            ReturnCode::Success => Some(0),
            ReturnCode::ExitedWithErrors => Some(1),
            ReturnCode::EnvironmentFailure => Some(2),
            ReturnCode::Timeout => Some(3),
            ReturnCode::Unknown(code) => *code,
        }
    }

    pub fn status_message(&self) -> &'static str {
        match self {
            ReturnCode::Success => "Code Execution Successful",
            ReturnCode::ExitedWithErrors => "Code Exited With Errors",
            ReturnCode::EnvironmentFailure => "Code Execution Environment Failed (Server Error)",
            ReturnCode::Timeout => "Reached execution timeout",
            ReturnCode::Unknown(_) => "Unknown error or signal",
        }
    }

    /// Text appended to the output surface when a run ends.
    pub fn status_line(&self) -> String {
        format!("\n=== {} ===", self.status_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::timeout]
    fn known_return_codes_map_to_fixed_messages() {
        let expected = [
            (0, "Code Execution Successful"),
            (1, "Code Exited With Errors"),
            (2, "Code Execution Environment Failed (Server Error)"),
            (3, "Reached execution timeout"),
        ];
        for (code, message) in expected {
            assert_eq!(ReturnCode::from_code(code).status_message(), message);
        }
    }

    #[test_timeout::timeout]
    fn other_return_codes_fall_back() {
        for code in [-9, 4, 137, i64::MAX] {
            assert_eq!(
                ReturnCode::from_code(code).status_message(),
                "Unknown error or signal"
            );
        }
        assert_eq!(ReturnCode::parse("sigkill"), ReturnCode::Unknown(None));
        assert_eq!(ReturnCode::parse(" 1 "), ReturnCode::ExitedWithErrors);
    }

    #[test_timeout::timeout]
    fn status_line_is_framed() {
        assert_eq!(
            ReturnCode::Success.status_line(),
            "\n=== Code Execution Successful ==="
        );
    }

    #[test_timeout::timeout]
    fn only_create_failure_is_soft() {
        for code in ["001", "101", "102", "201", "202", "302", "999"] {
            assert!(!ErrorCode::parse(code).is_soft(), "{code}");
        }
        assert!(ErrorCode::parse("301").is_soft());
    }

    #[test_timeout::timeout]
    fn error_codes_round_trip_their_text() {
        assert_eq!(ErrorCode::parse("101"), ErrorCode::LoginFailed);
        assert_eq!(ErrorCode::parse("101").as_str(), "101");
        assert_eq!(ErrorCode::parse("555").as_str(), "555");
        assert_eq!(ErrorCode::parse("555").description(), "Unknown error (555)");
    }
}
