use thiserror::Error;

/// Main error type for node-doctor
#[derive(Error, Debug, Clone)]
pub enum DoctorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("AWS error: {0}")]
    Aws(AwsError),

    #[error("Remote execution error: {0}")]
    Remote(RemoteError),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("YAML error: {0}")]
    Yaml(String),

    #[error("TOML error: {0}")]
    Toml(String),
}

/// Lightsail control-plane errors
#[derive(Error, Debug, Clone)]
pub enum AwsError {
    #[error("Failed to look up instance '{instance}': {message}")]
    InstanceLookup { instance: String, message: String },

    #[error("Instance '{instance}' has no public IP address")]
    MissingPublicIp { instance: String },

    #[error("Failed to get SSH access details for '{instance}': {message}")]
    AccessDetails { instance: String, message: String },
}

/// Remote command channel errors
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    #[error("Failed to start ssh: {message}")]
    Spawn { message: String },

    #[error("Remote command timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Remote I/O failed: {message}")]
    Io { message: String },
}

/// Result type alias for node-doctor operations
pub type Result<T> = std::result::Result<T, DoctorError>;

impl From<AwsError> for DoctorError {
    fn from(err: AwsError) -> Self {
        DoctorError::Aws(err)
    }
}

impl From<RemoteError> for DoctorError {
    fn from(err: RemoteError) -> Self {
        DoctorError::Remote(err)
    }
}

impl From<std::io::Error> for DoctorError {
    fn from(err: std::io::Error) -> Self {
        DoctorError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DoctorError {
    fn from(err: serde_json::Error) -> Self {
        DoctorError::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for DoctorError {
    fn from(err: serde_yaml::Error) -> Self {
        DoctorError::Yaml(err.to_string())
    }
}

impl From<toml::de::Error> for DoctorError {
    fn from(err: toml::de::Error) -> Self {
        DoctorError::Toml(err.to_string())
    }
}

impl DoctorError {
    /// Short hint printed next to the error, when there is more to say than the error itself
    pub fn user_message(&self) -> Option<String> {
        let hint = match self {
            DoctorError::Aws(AwsError::InstanceLookup { .. }) => {
                "Check the instance name, region and your AWS credentials (aws configure list).".to_string()
            }
            DoctorError::Aws(AwsError::MissingPublicIp { instance }) => {
                format!("Start '{}' or attach a static IP before running diagnostics.", instance)
            }
            DoctorError::Aws(AwsError::AccessDetails { .. }) => {
                "The IAM user needs lightsail:GetInstanceAccessDetails.".to_string()
            }
            DoctorError::Remote(RemoteError::Spawn { .. }) => {
                "Make sure an OpenSSH client is installed and on PATH.".to_string()
            }
            DoctorError::Remote(RemoteError::Timeout { .. }) => {
                "The instance may be overloaded. Raise --timeout or check it from the Lightsail console.".to_string()
            }
            DoctorError::Config(_) | DoctorError::Toml(_) => {
                "Fix the configuration file or run with --env-help to list overrides.".to_string()
            }
            _ => return None,
        };
        Some(hint)
    }
}
