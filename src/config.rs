//! Configuration handling for stencil-render.
//! Loads the project configuration file (.cx.yml, .cx.yaml or .cx.json) and
//! merges it with command-line flags into [`Settings`].

use crate::batch::BatchTarget;
use crate::cli::Args;
use crate::constants::{CONFIG_FILES, DEFAULT_API_URL, DEFAULT_DEBOUNCE, TOKEN_ENV};
use crate::error::{Error, Result};
use crate::invoker::RenderPolicy;
use crate::writer::{ensure_dir, Output};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Values a project configuration file may provide.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub stack: Option<String>,
    pub formation: Option<String>,
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub debounce_secs: Option<u64>,
}

/// Loads the first configuration file found in `dir`.
///
/// # Returns
/// * `Result<Option<String>>` - Contents of the first found configuration
///   file, `None` if there is none
pub fn load_config<P: AsRef<Path>>(dir: P, config_files: &[&str]) -> Result<Option<String>> {
    for file in config_files {
        let config_path = dir.as_ref().join(file);
        if config_path.exists() {
            debug!("Loading configuration from {}", config_path.display());
            return Ok(Some(std::fs::read_to_string(&config_path)?));
        }
    }
    debug!(
        "No configuration file found (tried: {})",
        config_files.join(", ")
    );
    Ok(None)
}

/// Parses configuration content, trying JSON first and YAML second.
///
/// # Errors
/// * `Error::ConfigError` if parsing fails
pub fn parse_config(content: &str) -> Result<ProjectConfig> {
    if content.trim().is_empty() {
        return Ok(ProjectConfig::default());
    }
    match serde_json::from_str(content) {
        Ok(config) => Ok(config),
        Err(_) => serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration format: {e}"))),
    }
}

/// Reads `explicit` if given, otherwise looks for a configuration file in `dir`.
pub fn get_config<P: AsRef<Path>>(explicit: Option<&Path>, dir: P) -> Result<ProjectConfig> {
    let content = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(Error::ConfigError(format!(
                    "Invalid configuration path: {}",
                    path.display()
                )));
            }
            Some(std::fs::read_to_string(path)?)
        }
        None => load_config(dir, &CONFIG_FILES)?,
    };

    match content {
        Some(content) => parse_config(&content),
        None => Ok(ProjectConfig::default()),
    }
}

/// Which collaborators render the stencils.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSettings {
    Api { url: String, token: Option<String> },
    Local { context: Option<PathBuf> },
}

/// Everything a render run needs, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub stack: String,
    pub formation: String,
    pub target: BatchTarget,
    pub output: Output,
    pub snapshot: Option<String>,
    pub watch: bool,
    pub policy: RenderPolicy,
    pub debounce: Duration,
    pub backend: BackendSettings,
}

impl Settings {
    /// Merges flags, configuration file and environment.
    ///
    /// Flags win over the configuration file; `CX_TOKEN` wins over the token
    /// in the file.
    pub fn resolve(args: Args, config: ProjectConfig, env_token: Option<String>) -> Result<Self> {
        let formation = args.formation.or(config.formation).ok_or_else(|| {
            Error::ConfigError(
                "No formation provided. Please use --formation or use .cx.yml to specify a formation"
                    .to_string(),
            )
        })?;

        let (target, output) = if args.default_folders {
            let (stencils, renders) = default_folders(&formation)?;
            (BatchTarget::Folder(stencils), Output::Path(renders))
        } else {
            let target = match (args.stencil_file, args.stencil_folder) {
                (Some(file), None) => BatchTarget::File(file),
                (None, Some(folder)) => BatchTarget::Folder(folder),
                (Some(_), Some(_)) => {
                    return Err(Error::ConfigError(
                        "Both --stencil-file and --stencil-folder provided. Please use only one"
                            .to_string(),
                    ))
                }
                (None, None) => {
                    return Err(Error::ConfigError(
                        "No stencil file or folder provided. Please use --stencil-file or --stencil-folder to specify a stencil file or folder. Alternatively you can use --default-folders"
                            .to_string(),
                    ))
                }
            };
            (target, Output::from_option(args.output))
        };

        if args.watch && output.is_stdout() {
            return Err(Error::ConfigError(
                "Cannot use --watch without --output".to_string(),
            ));
        }

        let backend = if args.local {
            BackendSettings::Local {
                context: args.context,
            }
        } else {
            BackendSettings::Api {
                url: args
                    .api_url
                    .or(config.api_url)
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                token: env_token.or(config.token),
            }
        };

        let stack = match (args.stack.or(config.stack), &backend) {
            (Some(stack), _) => stack,
            (None, BackendSettings::Local { .. }) => "local".to_string(),
            (None, BackendSettings::Api { .. }) => {
                return Err(Error::ConfigError(
                    "No stack provided. Please use --stack or use .cx.yml to specify a stack"
                        .to_string(),
                ))
            }
        };

        let debounce = args
            .debounce
            .or(config.debounce_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DEBOUNCE);

        Ok(Self {
            stack,
            formation,
            target,
            output,
            snapshot: args.snapshot,
            watch: args.watch,
            policy: RenderPolicy {
                ignore_errors: args.ignore_errors,
                ignore_warnings: args.ignore_warnings,
            },
            debounce,
            backend,
        })
    }
}

/// Token from the environment, if set and not blank.
pub fn env_token() -> Option<String> {
    std::env::var(TOKEN_ENV)
        .ok()
        .filter(|token| !token.trim().is_empty())
}

/// Creates and returns the default stencil and render folders of a formation.
pub fn default_folders(formation: &str) -> Result<(PathBuf, PathBuf)> {
    let home = dirs::home_dir().ok_or_else(|| {
        Error::ConfigError("Cannot determine the home directory".to_string())
    })?;
    let root = home.join("cloud66").join("formations").join(formation);
    let stencils = root.join("stencils");
    let renders = root.join("renders");
    ensure_dir(&stencils)?;
    ensure_dir(&renders)?;
    Ok((stencils, renders))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_yaml() {
        let content = "stack: web-prod\nformation: web\ndebounce_secs: 3\n";
        let config = parse_config(content).unwrap();
        assert_eq!(config.stack.as_deref(), Some("web-prod"));
        assert_eq!(config.formation.as_deref(), Some("web"));
        assert_eq!(config.debounce_secs, Some(3));
    }

    #[test]
    fn test_parse_config_json() {
        let content = r#"{"stack": "web-prod", "token": "abc"}"#;
        let config = parse_config(content).unwrap();
        assert_eq!(config.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_config_empty() {
        assert_eq!(parse_config("  \n").unwrap(), ProjectConfig::default());
    }

    #[test]
    fn test_parse_config_unknown_key() {
        assert!(matches!(
            parse_config("stacks: nope\n"),
            Err(Error::ConfigError(_))
        ));
    }
}
