mod settings;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{BrokerSettings, ServerSettings, Settings};

/// Loads the configuration from the default file and environment variables.
/// Merges the configuration with default values.
/// Returns a `Settings` struct containing the server and broker
/// configurations.
///
/// Environment variables nest with `_` (`SERVER_PORT` maps to
/// `server.port`). That separator also splits multi-word field names, so
/// `broker.command_buffer` cannot be reached from the environment and is
/// settable through the `config/default` file only.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_"));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    Ok(Settings {
        server: ServerSettings {
            host: partial
                .server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: partial
                .server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            command_buffer: partial
                .broker
                .as_ref()
                .and_then(|b| b.command_buffer)
                .unwrap_or(default.broker.command_buffer),
        },
    })
}
