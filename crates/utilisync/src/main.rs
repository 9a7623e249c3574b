//! Utilisync service entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use utilisync::app;
use utilisync_config::{ConfigError, ConfigLoader, UtilisyncConfig};
use utilisync_server::os_shutdown_signal;

/// Utility billing backend.
///
/// Settings come from built-in defaults, the optional config file, a `.env`
/// file in the working directory and `UTILISYNC__SECTION__KEY` variables,
/// later layers winning.
#[derive(Debug, Parser)]
#[command(name = "utilisync", version)]
struct Cli {
    /// TOML or JSON configuration file.
    #[arg(short, long, value_name = "PATH", env = "UTILISYNC_CONFIG")]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<UtilisyncConfig, ConfigError> {
    let mut loader = ConfigLoader::new().with_defaults();
    if let Some(path) = path {
        loader = loader.with_file(path)?;
    }
    loader.with_dotenv()?.with_env_prefix("UTILISYNC").load()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("utilisync: configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = utilisync_telemetry::init_telemetry(&app::telemetry_config(&config)) {
        eprintln!("utilisync: telemetry: {e}");
        std::process::exit(1);
    }

    info!(
        version = utilisync::VERSION,
        environment = config.environment.as_str(),
        config = ?cli.config,
        "starting utilisync"
    );

    if let Err(e) = app::run(&config, os_shutdown_signal()).await {
        error!(error = %format!("{e:#}"), "server error");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_flag() {
        let cli = Cli::try_parse_from(["utilisync", "-c", "/etc/utilisync.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/utilisync.toml")));

        assert!(Cli::try_parse_from(["utilisync", "--bogus"]).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let path = PathBuf::from("/nonexistent/utilisync.toml");
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::MissingFile { .. })
        ));
    }
}
