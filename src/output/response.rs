//! CLI response formatting and output.
//!
//! Provides JSON envelope, printing, and exit code mapping.

use serde::Serialize;
use unicorn_deploy::error::Hint;
use unicorn_deploy::{Error, ErrorCode, Result};

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
                retryable: err.retryable,
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    use std::io::{self, Write};

    let payload = response.to_json()?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(()); // Exit gracefully on SIGPIPE
        }
        return Err(Error::internal_io(
            e.to_string(),
            Some("write stdout".to_string()),
        ));
    }
    Ok(())
}

pub fn map_cmd_result_to_json<T: Serialize>(
    result: Result<(T, i32)>,
) -> (Result<serde_json::Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize response".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidToml
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::ProjectNotFound => 4,

        ErrorCode::SshIdentityFileNotFound => 10,

        ErrorCode::RemoteCommandFailed => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

pub fn print_json_result(result: Result<serde_json::Value>) -> Result<()> {
    match result {
        Ok(data) => print_response(&CliResponse::success(data)),
        Err(err) => print_response(&CliResponse::<()>::from_error(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unicorn_deploy::error::{RemoteCommandFailedDetails, TargetDetails};

    fn remote_failure() -> Error {
        Error::remote_command_failed(RemoteCommandFailedDetails {
            command: "kill -s QUIT `cat /tmp/u.pid`".to_string(),
            exit_code: 127,
            stdout: "some stdout".to_string(),
            stderr: "some stderr".to_string(),
            target: TargetDetails {
                project_id: Some("shop".to_string()),
                host: Some("deploy@app1".to_string()),
            },
        })
    }

    #[test]
    fn remote_command_failed_serializes_stdout_stderr() {
        let json = CliResponse::<()>::from_error(&remote_failure())
            .to_json()
            .unwrap();

        assert!(json.contains("\"code\": \"remote.command_failed\""));
        assert!(json.contains("some stdout"));
        assert!(json.contains("some stderr"));
        assert!(json.contains("\"exitCode\": 127"));
    }

    #[test]
    fn remote_command_failed_maps_to_exit_code_20() {
        let (_value, exit_code) =
            map_cmd_result_to_json::<serde_json::Value>(Err(remote_failure()));
        assert_eq!(exit_code, 20);
    }

    #[test]
    fn missing_key_maps_to_exit_code_2() {
        let err = Error::config_missing_key("app_path", None);
        let (_value, exit_code) = map_cmd_result_to_json::<serde_json::Value>(Err(err));
        assert_eq!(exit_code, 2);
    }

    #[test]
    fn success_keeps_command_exit_code() {
        let (value, exit_code) = map_cmd_result_to_json(Ok((serde_json::json!({"task": "stop"}), 0)));
        assert_eq!(exit_code, 0);
        assert_eq!(value.unwrap()["task"], "stop");
    }
}
