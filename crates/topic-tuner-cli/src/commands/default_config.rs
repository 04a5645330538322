//! default-config CLI command

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::error;

use topic_tuner_core::TunerConfig;

use crate::error::{exit_code_for_error, CliExitCode};

/// Arguments for `default-config` command
#[derive(Args, Debug)]
pub struct DefaultConfigArgs {
    /// Write to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// Execute the default-config command
pub fn default_config_command(args: DefaultConfigArgs) -> i32 {
    match write_default_config(&args) {
        Ok(()) => CliExitCode::Success.into(),
        Err(e) => {
            error!("default-config: {e:#}");
            exit_code_for_error(&e).into()
        }
    }
}

fn write_default_config(args: &DefaultConfigArgs) -> anyhow::Result<()> {
    let toml = TunerConfig::default().to_toml_string()?;
    match &args.output {
        Some(path) => std::fs::write(path, toml)
            .with_context(|| format!("writing config to '{}'", path.display())),
        None => {
            print!("{toml}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuner.toml");

        let code = default_config_command(DefaultConfigArgs {
            output: Some(path.clone()),
        });
        assert_eq!(code, 0);

        let loaded = TunerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, TunerConfig::default());
        assert!(loaded.validate().is_ok());
        println!("[PASS] test_written_config_round_trips");
    }

    #[test]
    fn test_unwritable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let code = default_config_command(DefaultConfigArgs {
            output: Some(dir.path().join("missing").join("tuner.toml")),
        });
        assert_eq!(code, i32::from(CliExitCode::Failure));
    }
}
