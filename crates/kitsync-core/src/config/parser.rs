//! TOML parser with helpful error messages

use super::schema::KitConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse kitsync.toml with detailed error messages
pub fn parse_kit_toml(path: &Path) -> Result<KitConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_kit_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse kitsync.toml content from string
pub fn parse_kit_toml_str(content: &str) -> Result<KitConfig> {
    let config: KitConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &KitConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize configuration to TOML")
}

/// Enhance TOML parsing errors with the offending line
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let line_num = error
        .span()
        .and_then(|span| content.get(..span.start))
        .map(|before| before.matches('\n').count() + 1);

    match line_num {
        Some(line_num) => anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            get_line_context(content, line_num),
            error.message()
        ),
        None => anyhow::anyhow!("TOML parsing error: {}", error),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());
    if start >= end {
        return String::new();
    }

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
source = "/opt/kit"

[paths]
skills = "ai/skills"
mcp = ".vscode/mcp.json"
"#;

        let config = parse_kit_toml_str(toml).unwrap();
        assert_eq!(config.source, Some(PathBuf::from("/opt/kit")));
        assert_eq!(config.paths.skills, Some(PathBuf::from("ai/skills")));
        assert_eq!(config.paths.agents, None);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_kit_toml_str("").unwrap();
        assert_eq!(config, KitConfig::default());
    }

    #[test]
    fn test_parse_invalid_toml_reports_line() {
        let toml = "source = \"/opt/kit\"\n[paths\nskills = \"x\"\n";

        let err = parse_kit_toml_str(toml).unwrap_err().to_string();
        assert!(err.contains("TOML parsing error at line"), "unexpected error: {}", err);
    }

    #[test]
    fn test_parse_rejects_invalid_paths() {
        let toml = "[paths]\nagents = \"/abs/agents\"\n";
        assert!(parse_kit_toml_str(toml).is_err());
    }

    #[test]
    fn test_parse_file_round_trip() {
        let config = parse_kit_toml_str("source = \"/opt/kit\"\n").unwrap();
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", to_toml(&config).unwrap()).unwrap();

        let reread = parse_kit_toml(file.path()).unwrap();
        assert_eq!(reread, config);
    }
}
