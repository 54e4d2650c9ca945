use std::io::{BufRead, Write};

use crate::config::AwsConfig;
use crate::error::{DoctorError, Result};

/// Instance name and region the run is aimed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSelection {
    pub instance_name: String,
    pub region: String,
}

/// Ask for a value, returning `default` on an empty line or EOF.
pub fn prompt_with_default<R, W>(reader: &mut R, writer: &mut W, label: &str, default: &str) -> Result<String>
where
    R: BufRead,
    W: Write,
{
    write!(writer, "{} [{}]: ", label, default)?;
    writer.flush()?;

    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| DoctorError::Prompt(format!("Failed to read {}: {}", label, e)))?;

    let answer = line.trim();
    if read == 0 || answer.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(answer.to_string())
    }
}

/// Resolve instance name and region from flags, prompts or config defaults.
pub fn collect_target<R, W>(
    reader: &mut R,
    writer: &mut W,
    defaults: &AwsConfig,
    instance_flag: Option<String>,
    region_flag: Option<String>,
    interactive: bool,
) -> Result<TargetSelection>
where
    R: BufRead,
    W: Write,
{
    let instance_name = match instance_flag {
        Some(name) => name,
        None if interactive => prompt_with_default(reader, writer, "Instance name", &defaults.default_instance)?,
        None => defaults.default_instance.clone(),
    };

    let region = match region_flag {
        Some(region) => region,
        None if interactive => prompt_with_default(reader, writer, "AWS region", &defaults.default_region)?,
        None => defaults.default_region.clone(),
    };

    Ok(TargetSelection { instance_name, region })
}
