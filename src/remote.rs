use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::DiagnosticSettings;
use crate::error::{RemoteError, Result};
use crate::lightsail::{AccessDetails, AccessProvider};

/// Captured result of one remote script run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
}

/// Channel that runs a shell script on the instance
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run_script(&self, script: &str, timeout: Duration) -> Result<CommandOutput>;
}

/// Runs scripts over the system ssh client using Lightsail-issued keys
pub struct SshExecutor<P> {
    provider: P,
    instance_name: String,
    ssh_binary: String,
    ssh_port: u16,
}

impl<P: AccessProvider> SshExecutor<P> {
    pub fn new(provider: P, instance_name: &str, settings: &DiagnosticSettings) -> Self {
        Self {
            provider,
            instance_name: instance_name.to_string(),
            ssh_binary: settings.ssh_binary.clone(),
            ssh_port: settings.ssh_port,
        }
    }
}

/// Private key and certificate written for a single ssh invocation
struct KeyFiles {
    _dir: TempDir,
    key: PathBuf,
    cert: PathBuf,
}

impl KeyFiles {
    fn write(access: &AccessDetails) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("node-doctor-").tempdir()?;
        let key = dir.path().join("id_lightsail");
        let cert = dir.path().join("id_lightsail-cert.pub");

        write_private(&key, &access.private_key)?;
        write_private(&cert, &access.cert_key)?;

        Ok(Self { _dir: dir, key, cert })
    }
}

fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    let mut content = content.to_string();
    if !content.ends_with('\n') {
        content.push('\n');
    }
    std::fs::write(path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

fn ssh_args(access: &AccessDetails, key: &Path, cert: &Path, port: u16) -> Vec<String> {
    vec![
        "-i".to_string(),
        key.display().to_string(),
        "-o".to_string(),
        format!("CertificateFile={}", cert.display()),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "ConnectTimeout=15".to_string(),
        "-o".to_string(),
        "LogLevel=ERROR".to_string(),
        "-p".to_string(),
        port.to_string(),
        format!("{}@{}", access.username, access.ip_address),
        "bash -s".to_string(),
    ]
}

#[async_trait]
impl<P: AccessProvider> RemoteExecutor for SshExecutor<P> {
    async fn run_script(&self, script: &str, timeout: Duration) -> Result<CommandOutput> {
        let access = self.provider.access_details(&self.instance_name).await?;
        let keys = KeyFiles::write(&access).map_err(|e| RemoteError::Io {
            message: format!("failed to write SSH key files: {}", e),
        })?;

        info!(
            "Running diagnostic script on {}@{} (timeout {})",
            access.username,
            access.ip_address,
            humantime::format_duration(timeout)
        );

        let mut child = Command::new(&self.ssh_binary)
            .args(ssh_args(&access, &keys.key, &keys.cert, self.ssh_port))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RemoteError::Spawn {
                message: format!("{}: {}", self.ssh_binary, e),
            })?;

        let mut stdin = child.stdin.take();
        let run = async move {
            if let Some(stdin) = stdin.as_mut() {
                stdin.write_all(script.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            drop(stdin);
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RemoteError::Io {
                    message: e.to_string(),
                }
                .into())
            }
            Err(_) => {
                warn!("Remote script exceeded {}s, ssh killed", timeout.as_secs());
                return Err(RemoteError::Timeout {
                    seconds: timeout.as_secs(),
                }
                .into());
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        debug!("ssh exited with {:?}, {} bytes captured", output.status.code(), text.len());

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            output: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DoctorError;

    struct StaticAccess;

    #[async_trait]
    impl AccessProvider for StaticAccess {
        async fn access_details(&self, _instance_name: &str) -> Result<AccessDetails> {
            Ok(AccessDetails {
                ip_address: "203.0.113.10".to_string(),
                username: "ubuntu".to_string(),
                private_key: "PRIVATE".to_string(),
                cert_key: "CERT".to_string(),
            })
        }
    }

    fn access() -> AccessDetails {
        AccessDetails {
            ip_address: "203.0.113.10".to_string(),
            username: "ubuntu".to_string(),
            private_key: "PRIVATE".to_string(),
            cert_key: "CERT".to_string(),
        }
    }

    #[test]
    fn test_ssh_args_target_and_command() {
        let args = ssh_args(&access(), Path::new("/tmp/k"), Path::new("/tmp/k-cert.pub"), 2222);

        assert_eq!(&args[..2], &["-i".to_string(), "/tmp/k".to_string()]);
        assert!(args.contains(&"CertificateFile=/tmp/k-cert.pub".to_string()));
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-p" && w[1] == "2222"));
        assert_eq!(args[args.len() - 2], "ubuntu@203.0.113.10");
        assert_eq!(args[args.len() - 1], "bash -s");
    }

    #[test]
    fn test_key_files_are_private() {
        let keys = KeyFiles::write(&access()).unwrap();
        assert_eq!(std::fs::read_to_string(&keys.key).unwrap(), "PRIVATE\n");
        assert_eq!(std::fs::read_to_string(&keys.cert).unwrap(), "CERT\n");
        assert!(keys.cert.file_name().unwrap().to_string_lossy().ends_with("-cert.pub"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&keys.key).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let dir = keys.key.parent().unwrap().to_path_buf();
        drop(keys);
        assert!(!dir.exists());
    }

    // Every case shares one test so no other test thread forks while a
    // freshly written fake ssh is still open for writing.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_fake_ssh_runs() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let fake = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            DiagnosticSettings {
                ssh_binary: path.display().to_string(),
                ..DiagnosticSettings::default()
            }
        };

        // script arrives on stdin, stderr is appended after stdout
        let echo = fake("echo-ssh", "cat\necho 'warn: noisy' >&2");
        let executor = SshExecutor::new(StaticAccess, "web-1", &echo);
        let out = executor.run_script("✅ Node.js installed\n", Duration::from_secs(10)).await.unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.output, "✅ Node.js installed\nwarn: noisy\n");

        let failing = fake("fail-ssh", "cat >/dev/null\necho 'Permission denied (publickey)' >&2\nexit 255");
        let executor = SshExecutor::new(StaticAccess, "web-1", &failing);
        let out = executor.run_script("true", Duration::from_secs(10)).await.unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(255));
        assert!(out.output.contains("Permission denied"));

        let slow = fake("slow-ssh", "cat >/dev/null\nsleep 5");
        let executor = SshExecutor::new(StaticAccess, "web-1", &slow);
        let err = executor.run_script("true", Duration::from_millis(300)).await.unwrap_err();
        assert!(matches!(err, DoctorError::Remote(RemoteError::Timeout { .. })));

        let missing = DiagnosticSettings {
            ssh_binary: dir.path().join("no-such-ssh").display().to_string(),
            ..DiagnosticSettings::default()
        };
        let executor = SshExecutor::new(StaticAccess, "web-1", &missing);
        let err = executor.run_script("true", Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, DoctorError::Remote(RemoteError::Spawn { .. })));
    }
}
