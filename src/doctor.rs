use crossterm::style::Stylize;
use std::io::Write;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

use crate::analysis::analyze;
use crate::config::TargetConfig;
use crate::error::Result;
use crate::lightsail::InstanceResolver;
use crate::prompt::TargetSelection;
use crate::remote::RemoteExecutor;
use crate::report::{instance_details, render_analysis, RunReport, RunStatus, BANNER_WIDTH};
use crate::script::DiagnosticScript;

/// Final state of a run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub report: RunReport,
}

/// Resolve, execute, classify, advise
pub struct DiagnosticRunner<R, E> {
    resolver: R,
    executor: E,
    target: TargetConfig,
    timeout: Duration,
    colors: bool,
}

impl<R: InstanceResolver, E: RemoteExecutor> DiagnosticRunner<R, E> {
    pub fn new(resolver: R, executor: E, target: TargetConfig, timeout: Duration) -> Self {
        Self {
            resolver,
            executor,
            target,
            timeout,
            colors: false,
        }
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    fn failure(&self, text: String) -> String {
        if self.colors {
            text.red().bold().to_string()
        } else {
            text
        }
    }

    /// Run the checklist once, writing human output to `out`.
    ///
    /// Only failures to write to `out` are returned as errors; lookup and
    /// execution failures end the run with exit code 1.
    pub async fn run<W: Write>(&self, selection: &TargetSelection, out: &mut W) -> Result<RunOutcome> {
        let mut report = RunReport::new(&selection.instance_name, &selection.region);
        let span = info_span!("diagnose", run_id = %report.run_id, instance = %selection.instance_name);

        writeln!(out, "\n🔍 Debugging {} Node.js Deployment", selection.instance_name)?;
        writeln!(out, "{}", "=".repeat(BANNER_WIDTH))?;

        let instance = match self
            .resolver
            .resolve_instance(&selection.instance_name)
            .instrument(span.clone())
            .await
        {
            Ok(instance) => instance,
            Err(e) => {
                error!(parent: &span, "Instance lookup failed: {}", e);
                writeln!(out, "{}", self.failure(format!("❌ Could not get instance IP: {}", e)))?;
                if let Some(hint) = e.user_message() {
                    writeln!(out, "   {}", hint)?;
                }
                report.status = RunStatus::LookupFailed;
                report.error = Some(e.to_string());
                return Ok(RunOutcome { exit_code: 1, report });
            }
        };

        writeln!(out, "📍 Instance IP: {}", instance.public_ip)?;
        report.public_ip = Some(instance.public_ip.clone());
        report.blueprint = instance.blueprint.clone();
        report.login_user = instance.username.clone();
        if let Some(details) = instance_details(&report) {
            writeln!(out, "{}", details)?;
        }
        if let Some(state) = instance.state.as_deref().filter(|s| *s != "running") {
            warn!(parent: &span, "Instance state is {}", state);
            writeln!(out, "⚠️  Instance state: {}", state)?;
        }

        writeln!(out, "\n🚀 Running comprehensive diagnostic...")?;
        out.flush()?;

        let script = DiagnosticScript::build(&self.target);
        let result = self
            .executor
            .run_script(&script, self.timeout)
            .instrument(span.clone())
            .await;

        let captured = match result {
            Ok(captured) => captured,
            Err(e) => {
                error!(parent: &span, "Remote execution failed: {}", e);
                writeln!(out, "{}", self.failure(format!("❌ {}", e)))?;
                if let Some(hint) = e.user_message() {
                    writeln!(out, "   {}", hint)?;
                }
                writeln!(out, "{}", self.failure("\n❌ Debug script failed to execute".to_string()))?;
                report.status = RunStatus::ExecutionFailed;
                report.error = Some(e.to_string());
                return Ok(RunOutcome { exit_code: 1, report });
            }
        };

        writeln!(out, "{}", captured.output)?;
        report.output = Some(captured.output.clone());

        if !captured.success {
            error!(parent: &span, "Remote script exited with {:?}", captured.exit_code);
            writeln!(out, "{}", self.failure("\n❌ Debug script failed to execute".to_string()))?;
            report.status = RunStatus::ExecutionFailed;
            report.error = Some(match captured.exit_code {
                Some(code) => format!("remote script exited with status {}", code),
                None => "remote script terminated by signal".to_string(),
            });
            return Ok(RunOutcome { exit_code: 1, report });
        }

        report.analysis = analyze(&captured.output, &self.target);
        report.exit_code = report.analysis.exit_code();
        report.status = if report.analysis.is_healthy() {
            report.health_url = Some(format!("http://{}{}", instance.public_ip, self.target.health_path));
            RunStatus::Healthy
        } else {
            RunStatus::IssuesFound
        };

        info!(parent: &span, "Diagnostic finished with {} issue(s)", report.analysis.issues.len());
        write!(out, "{}", render_analysis(&report))?;

        Ok(RunOutcome {
            exit_code: report.exit_code,
            report,
        })
    }
}
