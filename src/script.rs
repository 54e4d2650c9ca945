//! The remote diagnostic checklist.
//!
//! The script is rendered once per run with the target's paths and names
//! bound to shell variables in a preamble, so the section bodies below stay
//! static. Failure lines it prints are the markers in [`markers`].

use crate::config::TargetConfig;

/// Failure lines printed by the script and matched by the analyzer.
///
/// Section bodies must print these verbatim.
pub mod markers {
    pub const NODE_MISSING: &str = "❌ Node.js NOT installed";
    pub const NPM_MISSING: &str = "❌ npm NOT installed";
    pub const PM2_MISSING: &str = "❌ PM2 NOT installed";
    pub const DIST_MISSING: &str = "❌ dist directory NOT found";
    pub const PORT_NOT_LISTENING: &str = "❌ No process listening on port";
    pub const HEALTH_UNREACHABLE: &str = "❌ Failed to connect to health endpoint";

    pub const ALL: [&str; 6] = [
        NODE_MISSING,
        NPM_MISSING,
        PM2_MISSING,
        DIST_MISSING,
        PORT_NOT_LISTENING,
        HEALTH_UNREACHABLE,
    ];
}

const RULE: &str = "================================================================================";
const SUB_RULE: &str = "-----------------------------------";

/// One numbered block of the checklist
#[derive(Debug, Clone, Copy)]
pub struct Section {
    pub title: &'static str,
    body: &'static str,
}

const SECTIONS: &[Section] = &[
    Section {
        title: "Node.js and npm Installation",
        body: r#"if command -v node >/dev/null 2>&1; then
    echo "✅ Node.js installed: $(node --version)"
else
    echo "❌ Node.js NOT installed"
fi

if command -v npm >/dev/null 2>&1; then
    echo "✅ npm installed: $(npm --version)"
else
    echo "❌ npm NOT installed"
fi

if command -v npx >/dev/null 2>&1; then
    echo "✅ npx available: $(npx --version)"
else
    echo "❌ npx NOT available"
fi"#,
    },
    Section {
        title: "TypeScript Installation",
        body: r#"if command -v tsc >/dev/null 2>&1; then
    echo "✅ TypeScript installed globally: $(tsc --version)"
else
    echo "⚠️  TypeScript not installed globally (may be in node_modules)"
fi"#,
    },
    Section {
        title: "Application Directory Structure",
        body: r#"if [ -d "$APP_DIR" ]; then
    echo "✅ Application directory exists: $APP_DIR"
    echo ""
    echo "Directory contents:"
    ls -lah "$APP_DIR" | head -20
    echo ""

    for f in package.json tsconfig.json; do
        if [ -f "$APP_DIR/$f" ]; then
            echo "✅ $f exists"
        else
            echo "❌ $f NOT found"
        fi
    done

    for d in src node_modules; do
        if [ -d "$APP_DIR/$d" ]; then
            echo "✅ $d directory exists"
        else
            echo "❌ $d directory NOT found"
        fi
    done

    if [ -d "$APP_DIR/dist" ]; then
        echo "✅ dist directory exists (TypeScript compiled)"
        echo ""
        echo "dist contents:"
        ls -lah "$APP_DIR/dist" | head -10
    else
        echo "❌ dist directory NOT found (TypeScript not compiled)"
    fi
else
    echo "❌ Application directory NOT found: $APP_DIR"
fi"#,
    },
    Section {
        title: "Package.json Configuration",
        body: r#"if [ -f "$APP_DIR/package.json" ]; then
    echo "Main entry point:"
    grep '"main"' "$APP_DIR/package.json" || echo "No main field found"
    echo ""
    echo "Scripts:"
    grep -A 10 '"scripts"' "$APP_DIR/package.json" | head -15
    echo ""
    echo "Dependencies:"
    grep -A 20 '"dependencies"' "$APP_DIR/package.json" | head -25
fi"#,
    },
    Section {
        title: "PM2 Process Manager Status",
        body: r#"if command -v pm2 >/dev/null 2>&1; then
    echo "✅ PM2 installed: $(pm2 --version)"
    echo ""
    echo "PM2 Process List:"
    pm2 list
    echo ""
    echo "PM2 Detailed Info:"
    pm2 show "$APP_NAME" 2>/dev/null || echo "No process named '$APP_NAME' found"
else
    echo "❌ PM2 NOT installed"
fi"#,
    },
    Section {
        title: "PM2 Application Logs (Last 50 lines)",
        body: r#"if command -v pm2 >/dev/null 2>&1; then
    pm2 logs "$APP_NAME" --lines 50 --nostream 2>/dev/null || pm2 logs --lines 50 --nostream
else
    echo "PM2 not available"
fi"#,
    },
    Section {
        title: "PM2 Ecosystem Configuration",
        body: r#"if [ -f "$APP_DIR/ecosystem.config.js" ]; then
    echo "✅ ecosystem.config.js exists"
    echo ""
    cat "$APP_DIR/ecosystem.config.js"
else
    echo "❌ ecosystem.config.js NOT found"
fi"#,
    },
    Section {
        title: "Application Port Status",
        body: r#"if command -v netstat >/dev/null 2>&1; then
    echo "Processes listening on port $APP_PORT:"
    sudo netstat -tlnp | grep ":$APP_PORT " || echo "❌ No process listening on port $APP_PORT"
elif command -v ss >/dev/null 2>&1; then
    echo "Processes listening on port $APP_PORT:"
    sudo ss -tlnp | grep ":$APP_PORT " || echo "❌ No process listening on port $APP_PORT"
else
    echo "⚠️  netstat/ss not available"
fi"#,
    },
    Section {
        title: "Node.js Processes",
        body: r#"ps aux | grep node | grep -v grep || echo "No Node.js processes running""#,
    },
    Section {
        title: "Local Health Check",
        body: r#"echo "Testing http://localhost:$APP_PORT$HEALTH_PATH"
curl -v "http://localhost:$APP_PORT$HEALTH_PATH" 2>&1 || echo "❌ Failed to connect to health endpoint""#,
    },
    Section {
        title: "Environment Variables",
        body: r#"if [ -f "$APP_DIR/.env" ]; then
    echo "✅ .env file exists"
    echo "Environment variables (values hidden):"
    grep -v "^#" "$APP_DIR/.env" | grep -v "^$" | cut -d= -f1
else
    echo "⚠️  .env file NOT found (may not be required)"
fi"#,
    },
    Section {
        title: "System Logs (Last 20 lines)",
        body: r#"if [ -f "/var/log/syslog" ]; then
    echo "Recent syslog entries related to Node.js/PM2:"
    sudo tail -20 /var/log/syslog | grep -i "node\|pm2\|error" || echo "No relevant entries"
fi"#,
    },
    Section {
        title: "Disk Space",
        body: r#"df -h | grep -E "Filesystem|/$""#,
    },
    Section {
        title: "Memory Usage",
        body: "free -h",
    },
    Section {
        title: "Recent Deployment Activity",
        body: r#"if [ -d "$APP_DIR/.git" ]; then
    echo "Git repository detected"
    echo "Last commit:"
    (cd "$APP_DIR" && git log -1 --oneline 2>/dev/null) || echo "Could not read git log"
else
    echo "Not a git repository"
fi"#,
    },
];

/// Renders the checklist for one target
pub struct DiagnosticScript;

impl DiagnosticScript {
    /// Section titles in execution order
    pub fn sections() -> impl Iterator<Item = &'static str> {
        SECTIONS.iter().map(|s| s.title)
    }

    /// Full bash script for `target`
    pub fn build(target: &TargetConfig) -> String {
        let mut script = String::new();

        script.push_str(&format!("APP_DIR={}\n", shell_quote(&target.app_dir)));
        script.push_str(&format!("APP_NAME={}\n", shell_quote(&target.process_name)));
        script.push_str(&format!("APP_PORT={}\n", target.app_port));
        script.push_str(&format!("HEALTH_PATH={}\n\n", shell_quote(&target.health_path)));

        script.push_str(&format!("echo \"{}\"\n", RULE));
        script.push_str("echo \"🔍 $APP_NAME Deployment Diagnostic Report\"\n");
        script.push_str(&format!("echo \"{}\"\n", RULE));
        script.push_str("echo \"\"\n\n");

        for (i, section) in SECTIONS.iter().enumerate() {
            script.push_str(&format!("# {}. {}\n", i + 1, section.title));
            script.push_str(&format!("echo \"📋 {}. {}\"\n", i + 1, section.title));
            script.push_str(&format!("echo \"{}\"\n", SUB_RULE));
            script.push_str(section.body);
            script.push_str("\n\necho \"\"\n\n");
        }

        script.push_str(&format!("echo \"{}\"\n", RULE));
        script.push_str("echo \"✅ Diagnostic Complete\"\n");
        script.push_str(&format!("echo \"{}\"\n", RULE));

        script
    }
}

/// Single-quote `value` for POSIX sh
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_prints_every_marker() {
        let script = DiagnosticScript::build(&TargetConfig::default());
        for marker in markers::ALL {
            assert!(script.contains(marker), "script never prints {:?}", marker);
        }
    }

    #[test]
    fn test_script_binds_target_values() {
        let target = TargetConfig {
            app_dir: "/srv/shop".to_string(),
            process_name: "shop-api".to_string(),
            app_port: 8080,
            health_path: "/healthz".to_string(),
        };
        let script = DiagnosticScript::build(&target);

        assert!(script.starts_with("APP_DIR='/srv/shop'\n"));
        assert!(script.contains("APP_NAME='shop-api'\n"));
        assert!(script.contains("APP_PORT=8080\n"));
        assert!(script.contains("HEALTH_PATH='/healthz'\n"));
        assert!(!script.contains("aifuncheckapp1"));
    }

    #[test]
    fn test_target_values_only_appear_quoted() {
        let target = TargetConfig {
            process_name: "api$(reboot)`id`".to_string(),
            ..TargetConfig::default()
        };
        let script = DiagnosticScript::build(&target);

        assert!(script.contains("APP_NAME='api$(reboot)`id`'\n"));
        assert_eq!(script.matches("$(reboot)").count(), 1);
        assert!(script.contains("echo \"🔍 $APP_NAME Deployment Diagnostic Report\"\n"));
    }

    #[test]
    fn test_sections_are_numbered_in_order() {
        let script = DiagnosticScript::build(&TargetConfig::default());
        assert_eq!(DiagnosticScript::sections().count(), 15);

        let mut last = 0;
        for (i, title) in DiagnosticScript::sections().enumerate() {
            let heading = format!("📋 {}. {}", i + 1, title);
            let pos = script.find(&heading).expect("missing section heading");
            assert!(pos > last);
            last = pos;
        }
        assert!(script.trim_end().ends_with(&format!("echo \"{}\"", RULE)));
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("/var/www/app"), "'/var/www/app'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
