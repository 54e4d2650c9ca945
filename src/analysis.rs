use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TargetConfig;
use crate::script::markers;

/// Known failure signatures, in check order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NodeMissing,
    NpmMissing,
    Pm2Missing,
    DistMissing,
    PortNotListening,
    HealthUnreachable,
}

impl IssueKind {
    pub const ALL: [IssueKind; 6] = [
        IssueKind::NodeMissing,
        IssueKind::NpmMissing,
        IssueKind::Pm2Missing,
        IssueKind::DistMissing,
        IssueKind::PortNotListening,
        IssueKind::HealthUnreachable,
    ];

    /// Line the remote script prints when this check fails
    pub fn marker(&self) -> &'static str {
        match self {
            IssueKind::NodeMissing => markers::NODE_MISSING,
            IssueKind::NpmMissing => markers::NPM_MISSING,
            IssueKind::Pm2Missing => markers::PM2_MISSING,
            IssueKind::DistMissing => markers::DIST_MISSING,
            IssueKind::PortNotListening => markers::PORT_NOT_LISTENING,
            IssueKind::HealthUnreachable => markers::HEALTH_UNREACHABLE,
        }
    }

    pub fn summary(&self, target: &TargetConfig) -> String {
        match self {
            IssueKind::NodeMissing => "Node.js is not installed".to_string(),
            IssueKind::NpmMissing => "npm is not installed".to_string(),
            IssueKind::Pm2Missing => "PM2 is not installed".to_string(),
            IssueKind::DistMissing => "TypeScript not compiled (dist folder missing)".to_string(),
            IssueKind::PortNotListening => {
                format!("Application not listening on port {}", target.app_port)
            }
            IssueKind::HealthUnreachable => "Health endpoint not responding".to_string(),
        }
    }

    /// Remediation steps, most direct first
    pub fn actions(&self, target: &TargetConfig) -> Vec<String> {
        match self {
            IssueKind::NodeMissing => vec![
                "Install Node.js: curl -fsSL https://deb.nodesource.com/setup_lts.x | sudo -E bash - && sudo apt-get install -y nodejs".to_string(),
            ],
            IssueKind::NpmMissing => vec![
                "Install npm: sudo apt-get install -y npm".to_string(),
            ],
            IssueKind::Pm2Missing => vec![
                "Install PM2: npm install -g pm2".to_string(),
            ],
            IssueKind::DistMissing => vec![
                format!("Run: cd {} && npm run build", target.app_dir),
            ],
            IssueKind::PortNotListening => vec![
                format!("Check PM2 logs: pm2 logs {}", target.process_name),
                format!("Restart application: pm2 restart {}", target.process_name),
            ],
            IssueKind::HealthUnreachable => vec![
                format!(
                    "Verify the route: curl -v http://localhost:{}{}",
                    target.app_port, target.health_path
                ),
            ],
        }
    }
}

/// One failure signature found in the captured output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub summary: String,
}

/// Issues detected in one run's captured output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
}

impl AnalysisReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_healthy() {
            0
        } else {
            1
        }
    }
}

/// Classify captured output by substring containment
pub fn analyze(output: &str, target: &TargetConfig) -> AnalysisReport {
    let issues: Vec<Issue> = IssueKind::ALL
        .iter()
        .filter(|kind| output.contains(kind.marker()))
        .map(|kind| Issue {
            kind: *kind,
            summary: kind.summary(target),
        })
        .collect();

    let mut recommendations: Vec<String> = Vec::new();
    for issue in &issues {
        for action in issue.kind.actions(target) {
            if !recommendations.contains(&action) {
                recommendations.push(action);
            }
        }
    }

    debug!("Analysis found {} issue(s)", issues.len());
    AnalysisReport {
        issues,
        recommendations,
    }
}
