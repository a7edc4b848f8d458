//! WinRM shell client driving the WS-Management exchanges over HTTP.
//!
//! Each gateway call opens its own shell, runs one pipeline, drains the
//! output streams, and deletes the shell again; nothing is pooled across
//! calls. Shell teardown runs on every exit path, including faults.

use super::protocol;
use crate::adapters::transport::{RegistryTransport, TransportError, TransportOptions};
use crate::domain::types::{AccessMethod, TargetHost};
use base64::Engine;
use std::time::Instant;
use uuid::Uuid;

const SOAP_CONTENT_TYPE: &str = "application/soap+xml;charset=UTF-8";

/// Collected result of one remote pipeline.
struct CommandOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: i64,
}

/// Strategy implementation over a WinRM shell session.
pub struct WinRmTransport {
    options: TransportOptions,
    client: reqwest::blocking::Client,
}

impl WinRmTransport {
    /// Build the transport and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::RemoteFault`] if the HTTP client cannot be
    /// constructed.
    pub fn new(options: TransportOptions) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| {
                TransportError::RemoteFault(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(WinRmTransport { options, client })
    }

    fn endpoint(&self, host: &TargetHost) -> String {
        let scheme = if self.options.use_tls { "https" } else { "http" };
        format!(
            "{scheme}://{}:{}/wsman",
            host.as_str(),
            self.options.remote_port
        )
    }

    /// POST one SOAP envelope and return the response body.
    fn post_envelope(
        &self,
        host: &TargetHost,
        endpoint: &str,
        envelope: String,
    ) -> Result<String, TransportError> {
        let mut request = self
            .client
            .post(endpoint)
            .header("Content-Type", SOAP_CONTENT_TYPE)
            .body(envelope);
        if let Some(creds) = &self.options.credentials {
            request = request.basic_auth(creds.username(), Some(creds.secret()));
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.options.timeout)
            } else if e.is_connect() {
                TransportError::Unreachable(format!("{host}: {e}"))
            } else {
                TransportError::RemoteFault(format!("{host}: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| TransportError::RemoteFault(format!("{host}: {e}")))?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TransportError::AccessDenied(format!(
                "{host}: WinRM authentication rejected"
            )));
        }
        if let Some(fault) = protocol::extract_fault(&body) {
            return Err(TransportError::RemoteFault(format!("{host}: {fault}")));
        }
        if !status.is_success() {
            return Err(TransportError::RemoteFault(format!(
                "{host}: WinRM endpoint returned {status}"
            )));
        }
        Ok(body)
    }

    /// Run one pipeline in a fresh shell and collect its streams.
    fn run(&self, host: &TargetHost, script: &str) -> Result<CommandOutput, TransportError> {
        let endpoint = self.endpoint(host);
        let timeout = self.options.timeout;

        let create = protocol::build_create_shell(&endpoint, &Uuid::new_v4(), timeout);
        let body = self.post_envelope(host, &endpoint, create)?;
        let shell_id = protocol::extract_shell_id(&body).ok_or_else(|| {
            TransportError::RemoteFault(format!("{host}: CreateShell reply carried no ShellId"))
        })?;

        let result = self.run_in_shell(host, &endpoint, &shell_id, script);

        // Best-effort teardown; the operation result stands either way.
        let delete =
            protocol::build_delete_shell(&endpoint, &shell_id, &Uuid::new_v4(), timeout);
        if let Err(e) = self.post_envelope(host, &endpoint, delete) {
            log::debug!("shell {shell_id} teardown on {host} failed: {e}");
        }

        result
    }

    fn run_in_shell(
        &self,
        host: &TargetHost,
        endpoint: &str,
        shell_id: &str,
        script: &str,
    ) -> Result<CommandOutput, TransportError> {
        let timeout = self.options.timeout;
        let encoded = protocol::encode_powershell(script);
        let command =
            protocol::build_run_command(endpoint, shell_id, &Uuid::new_v4(), timeout, &encoded);
        let body = self.post_envelope(host, endpoint, command)?;
        let command_id = protocol::extract_command_id(&body).ok_or_else(|| {
            TransportError::RemoteFault(format!("{host}: Command reply carried no CommandId"))
        })?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let started = Instant::now();
        loop {
            if started.elapsed() > timeout {
                return Err(TransportError::Timeout(timeout));
            }
            let receive = protocol::build_receive(
                endpoint,
                shell_id,
                &command_id,
                &Uuid::new_v4(),
                timeout,
            );
            let body = self.post_envelope(host, endpoint, receive)?;
            stdout.extend(protocol::extract_stream(&body, "stdout"));
            stderr.extend(protocol::extract_stream(&body, "stderr"));
            if protocol::command_done(&body) {
                let exit_code = protocol::extract_exit_code(&body).unwrap_or(0);
                return Ok(CommandOutput {
                    stdout,
                    stderr,
                    exit_code,
                });
            }
        }
    }

    /// Map a finished pipeline to success or a transport error.
    fn check_output(
        host: &TargetHost,
        output: &CommandOutput,
    ) -> Result<String, TransportError> {
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.exit_code == 0 && output.stderr.is_empty() {
            return Ok(stdout);
        }
        let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = if detail.is_empty() {
            format!("remote pipeline exited with code {}", output.exit_code)
        } else {
            detail
        };
        if detail.to_ascii_lowercase().contains("denied") {
            Err(TransportError::AccessDenied(format!("{host}: {detail}")))
        } else {
            Err(TransportError::RemoteFault(format!("{host}: {detail}")))
        }
    }
}

impl RegistryTransport for WinRmTransport {
    fn method(&self) -> AccessMethod {
        AccessMethod::RemoteExec
    }

    fn read_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let output = self.run(host, &protocol::get_script(key_path, value_name))?;
        let stdout = Self::check_output(host, &output)?;
        if stdout == protocol::ABSENT_SENTINEL {
            return Ok(None);
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(stdout.as_bytes())
            .map_err(|e| {
                TransportError::RemoteFault(format!(
                    "{host}: undecodable value payload from remote pipeline: {e}"
                ))
            })?;
        Ok(Some(bytes))
    }

    fn write_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let script = protocol::set_script(key_path, value_name, bytes);
        let output = self.run(host, &script)?;
        let stdout = Self::check_output(host, &output)?;
        if stdout != protocol::DONE_SENTINEL {
            return Err(TransportError::RemoteFault(format!(
                "{host}: write pipeline did not confirm completion"
            )));
        }
        Ok(())
    }

    fn delete_value(
        &self,
        host: &TargetHost,
        key_path: &str,
        value_name: &str,
    ) -> Result<(), TransportError> {
        let script = protocol::delete_script(key_path, value_name);
        let output = self.run(host, &script)?;
        let stdout = Self::check_output(host, &output)?;
        if stdout != protocol::DONE_SENTINEL {
            return Err(TransportError::RemoteFault(format!(
                "{host}: delete pipeline did not confirm completion"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Credentials;
    use std::time::Duration;

    #[test]
    fn endpoint_reflects_scheme_and_port() {
        let host = TargetHost::new("ca01").unwrap();

        let plain = WinRmTransport::new(TransportOptions::default()).unwrap();
        assert_eq!(plain.endpoint(&host), "http://ca01:5985/wsman");

        let tls = WinRmTransport::new(
            TransportOptions::default()
                .with_remote_port(5986)
                .with_tls(),
        )
        .unwrap();
        assert_eq!(tls.endpoint(&host), "https://ca01:5986/wsman");
    }

    #[test]
    fn check_output_classifies_denials() {
        let host = TargetHost::new("ca01").unwrap();
        let output = CommandOutput {
            stdout: Vec::new(),
            stderr: b"Requested registry access is not allowed. Access is denied.".to_vec(),
            exit_code: 1,
        };
        let err = WinRmTransport::check_output(&host, &output).unwrap_err();
        assert_eq!(err.classification(), "transport/access-denied");
    }

    #[test]
    fn check_output_reports_exit_code_without_stderr() {
        let host = TargetHost::new("ca01").unwrap();
        let output = CommandOutput {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: 3,
        };
        let err = WinRmTransport::check_output(&host, &output).unwrap_err();
        assert_eq!(err.classification(), "transport/remote-fault");
        assert!(err.to_string().contains("code 3"));
    }

    #[test]
    fn transport_reports_remote_exec_method() {
        let options = TransportOptions::default()
            .with_timeout(Duration::from_secs(3))
            .with_credentials(Credentials::new("svc", "pw").unwrap());
        let transport = WinRmTransport::new(options).unwrap();
        assert_eq!(transport.method(), AccessMethod::RemoteExec);
    }
}
