use std::fmt;

use mongodb::error::ErrorKind;
use serde::{Deserialize, Serialize};

/// Summary of a driver failure on the read path.
///
/// Exports only run `find` and `aggregate`, so write failures never show up
/// here. Rendered as one line of JSON under an `error` key.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

#[derive(Serialize)]
struct Wrapped<'a> {
    error: &'a ErrorInfo,
}

impl ErrorInfo {
    fn labelled(label: &str, message: &str) -> Self {
        Self {
            error_type: Some(format!("mongo.{label}")),
            message: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Single-line JSON, wrapped as `{"error": {...}}`
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(&Wrapped { error: self })
    }
}

impl From<&mongodb::error::Error> for ErrorInfo {
    fn from(error: &mongodb::error::Error) -> Self {
        match error.kind.as_ref() {
            ErrorKind::Command(command) => Self {
                code: Some(command.code),
                name: code_name(command.code).map(str::to_string),
                ..Self::labelled("command_error", &command.message)
            },
            ErrorKind::Authentication { message, .. } => {
                Self::labelled("authentication_error", message)
            }
            ErrorKind::InvalidArgument { message, .. } => {
                Self::labelled("invalid_argument", message)
            }
            ErrorKind::ServerSelection { message, .. } => {
                Self::labelled("server_selection_error", message)
            }
            _ => Self {
                message: Some(error.to_string()),
                ..Self::default()
            },
        }
    }
}

/// `Display` body of `ExportableError::MongoDb`
pub fn format_mongodb_error(
    f: &mut fmt::Formatter<'_>,
    error: &mongodb::error::Error,
) -> fmt::Result {
    let json = ErrorInfo::from(error)
        .to_json_compact()
        .map_err(|_| fmt::Error)?;
    f.write_str(&json)
}

/// Server error codes a read can run into
fn code_name(code: i32) -> Option<&'static str> {
    match code {
        2 => Some("BadValue"),
        13 => Some("Unauthorized"),
        26 => Some("NamespaceNotFound"),
        27 => Some("IndexNotFound"),
        31 => Some("PathCollision"),
        43 => Some("CursorNotFound"),
        50 => Some("MaxTimeMSExpired"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_names_cover_read_failures() {
        assert_eq!(code_name(27), Some("IndexNotFound"));
        assert_eq!(code_name(43), Some("CursorNotFound"));
        assert!(code_name(11000).is_none());
    }

    #[test]
    fn test_compact_json_is_wrapped_and_skips_empty_fields() {
        let info = ErrorInfo {
            code: Some(50),
            name: code_name(50).map(str::to_string),
            ..ErrorInfo::labelled("command_error", "operation exceeded time limit")
        };

        assert_eq!(
            info.to_json_compact().unwrap(),
            r#"{"error":{"type":"mongo.command_error","code":50,"name":"MaxTimeMSExpired","message":"operation exceeded time limit"}}"#
        );

        let bare = ErrorInfo::labelled("server_selection_error", "no servers")
            .to_json_compact()
            .unwrap();
        assert_eq!(
            bare,
            r#"{"error":{"type":"mongo.server_selection_error","message":"no servers"}}"#
        );
    }
}
