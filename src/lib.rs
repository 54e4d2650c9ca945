//! Remote diagnostics for Node.js/PM2 deployments on AWS Lightsail.
//!
//! A run resolves the instance's public IP, executes a fixed diagnostic
//! script over SSH, matches known failure lines in the captured output and
//! prints recommended actions.

pub mod analysis;
pub mod config;
pub mod doctor;
pub mod error;
pub mod lightsail;
pub mod logging;
pub mod prompt;
pub mod remote;
pub mod report;
pub mod script;

pub use analysis::{analyze, AnalysisReport, Issue, IssueKind};
pub use config::{Config, TargetConfig};
pub use doctor::{DiagnosticRunner, RunOutcome};
pub use error::{DoctorError, Result};
pub use lightsail::{InstanceInfo, InstanceResolver, LightsailManager};
pub use remote::{CommandOutput, RemoteExecutor, SshExecutor};
pub use report::{ReportFormat, RunReport};
