use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::analysis::AnalysisReport;
use crate::error::{DoctorError, Result};

pub const BANNER_WIDTH: usize = 80;

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Text,
    Json,
    Yaml,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Yaml => write!(f, "yaml"),
        }
    }
}

impl ReportFormat {
    /// Structured formats own stdout; prompts and progress go elsewhere.
    pub fn is_structured(&self) -> bool {
        !matches!(self, ReportFormat::Text)
    }
}

impl FromStr for ReportFormat {
    type Err = DoctorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "yaml" | "yml" => Ok(ReportFormat::Yaml),
            other => Err(DoctorError::Config(format!("Unknown report format: {}", other))),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Healthy,
    IssuesFound,
    LookupFailed,
    ExecutionFailed,
}

/// Record of one diagnostic run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub instance_name: String,
    pub region: String,
    pub public_ip: Option<String>,
    pub blueprint: Option<String>,
    pub login_user: Option<String>,
    pub status: RunStatus,
    pub error: Option<String>,
    pub output: Option<String>,
    pub analysis: AnalysisReport,
    pub health_url: Option<String>,
    pub exit_code: i32,
}

impl RunReport {
    pub fn new(instance_name: &str, region: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            instance_name: instance_name.to_string(),
            region: region.to_string(),
            public_ip: None,
            blueprint: None,
            login_user: None,
            status: RunStatus::ExecutionFailed,
            error: None,
            output: None,
            analysis: AnalysisReport::default(),
            health_url: None,
            exit_code: 1,
        }
    }
}

pub fn banner(title: &str) -> String {
    let rule = "=".repeat(BANNER_WIDTH);
    format!("{}\n{}\n{}", rule, title, rule)
}

/// Blueprint and login user line shown under the instance IP
pub fn instance_details(report: &RunReport) -> Option<String> {
    match (&report.blueprint, &report.login_user) {
        (None, None) => None,
        (blueprint, user) => Some(format!(
            "🧩 Blueprint: {}, login user: {}",
            blueprint.as_deref().unwrap_or("unknown"),
            user.as_deref().unwrap_or("unknown")
        )),
    }
}

/// The analysis section printed after the captured output
pub fn render_analysis(report: &RunReport) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&banner("📊 ANALYSIS & RECOMMENDATIONS"));
    out.push('\n');

    let analysis = &report.analysis;
    if analysis.is_healthy() {
        out.push_str("\n✅ No critical issues detected!\n");
        if let Some(url) = &report.health_url {
            out.push_str(&format!("🌐 Application should be accessible at: {}\n", url));
        }
    } else {
        out.push_str("\n⚠️  ISSUES DETECTED:\n");
        for (i, issue) in analysis.issues.iter().enumerate() {
            out.push_str(&format!("   {}. {}\n", i + 1, issue.summary));
        }

        out.push_str("\n💡 RECOMMENDED ACTIONS:\n");
        for (i, action) in analysis.recommendations.iter().enumerate() {
            out.push_str(&format!("   {}. {}\n", i + 1, action));
        }
    }

    out.push('\n');
    out.push_str(&"=".repeat(BANNER_WIDTH));
    out.push('\n');
    out
}

/// Whole report as plain text, as written by `--output` in text format
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&banner(&format!("🔍 Diagnostic run {}", report.run_id)));
    out.push('\n');
    out.push_str(&format!("Instance: {} ({})\n", report.instance_name, report.region));
    out.push_str(&format!("Timestamp: {}\n", report.timestamp.to_rfc3339()));
    if let Some(ip) = &report.public_ip {
        out.push_str(&format!("📍 Instance IP: {}\n", ip));
    }
    if let Some(details) = instance_details(report) {
        out.push_str(&details);
        out.push('\n');
    }
    if let Some(error) = &report.error {
        out.push_str(&format!("❌ {}\n", error));
    }
    if let Some(output) = &report.output {
        out.push('\n');
        out.push_str(output);
        if !output.ends_with('\n') {
            out.push('\n');
        }
    }
    if matches!(report.status, RunStatus::Healthy | RunStatus::IssuesFound) {
        out.push_str(&render_analysis(report));
    }
    out
}

pub fn render(report: &RunReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ReportFormat::Yaml => Ok(serde_yaml::to_string(report)?),
    }
}

/// Write the report to `path` in `format`
pub async fn save(report: &RunReport, path: &Path, format: ReportFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, render(report, format)?).await?;
    info!("Report saved to {}", path.display());
    Ok(())
}
