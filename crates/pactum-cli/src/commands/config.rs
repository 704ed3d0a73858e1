//! Config command implementation.

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::path::Path;

/// Execute the config command.
pub async fn execute_config(
    args: ConfigArgs,
    config: &Config,
    path: &Path,
    formatter: &Formatter,
) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            println!("# {}", path.display());
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init { force, preset } => {
            let config = Config {
                extractor: preset.into(),
                ..Config::default()
            };
            init_config(&config, path, force)?;
            println!(
                "{}",
                formatter.success(&format!("Configuration written to {}", path.display()))
            );
        }
    }
    Ok(())
}

/// Write `config` to `path`, refusing to overwrite unless `force` is set.
pub fn init_config(config: &Config, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    config.save_to(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactum_extractor::ExtractorConfig;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pactum").join("config.toml");
        let config = Config {
            extractor: ExtractorConfig::aggressive(),
            ..Config::default()
        };

        init_config(&config, &path, false).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        init_config(&Config::default(), &path, false).unwrap();

        let result = init_config(&Config::default(), &path, false);
        assert!(matches!(result, Err(CliError::Config(_))));
        assert!(init_config(&Config::default(), &path, true).is_ok());
    }
}
