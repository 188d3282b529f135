//! All of the user config for the Constellation CLI.

use std::str::FromStr as _;

use color_eyre::eyre::{ContextCompat as _, Result};

/// A copy of the default config file. It gets copied to the user's config folder the first time
/// they start Constellation.
static DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

/// The name of the config file in the config directory.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "constellation.toml";

/// The valid log levels. Based on our `tracing` crate.
#[derive(
    serde::Serialize, serde::Deserialize, clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Error
    Error,
    /// Warnings
    Warn,
    /// Info
    Info,
    /// Debug
    Debug,
    /// Trace
    Trace,
    /// No logging
    Off,
}

/// Managing user config.
#[derive(serde::Deserialize, Debug, Clone)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// The maximum log level
    pub log_level: LogLevel,
    /// The location of the log file.
    pub log_path: std::path::PathBuf,
    /// Ticks per second when running interactively
    pub tick_rate: u32,
    /// Everything about the simulation itself
    pub simulation: constellation::config::Config,
}

impl Default for Config {
    fn default() -> Self {
        let log_directory = match dirs::state_dir() {
            Some(directory) => directory,
            None => std::path::PathBuf::new().join("./"),
        };
        let log_path = log_directory
            .join("constellation")
            .join("constellation.log");

        Self {
            log_level: LogLevel::Off,
            log_path,
            tick_rate: 60,
            simulation: constellation::config::Config::default(),
        }
    }
}

impl Config {
    /// Get the stable location of Constellation's config directory on the user's system.
    pub fn default_directory() -> Result<std::path::PathBuf> {
        Ok(dirs::config_dir()
            .context("Couldn't get standard config directory")?
            .join("constellation"))
    }

    /// Load the config from a custom path, or from the user's config directory. The bundled
    /// default config is written to the config directory if there isn't one there yet.
    pub fn load(custom_path: Option<&std::path::Path>) -> Result<Self> {
        let config_path = match custom_path {
            Some(path) => path.to_path_buf(),
            None => {
                let directory = Self::default_directory()?;
                let path = directory.join(DEFAULT_CONFIG_FILE_NAME);
                if !path.exists() {
                    std::fs::create_dir_all(&directory)?;
                    std::fs::write(&path, DEFAULT_CONFIG)?;
                }
                path
            }
        };

        let result = std::fs::read_to_string(&config_path);
        match result {
            Ok(data) => {
                tracing::trace!("Using config file:\n{data}");
                Self::parse(&data).map_err(|error| {
                    color_eyre::eyre::eyre!("Bad config file at {config_path:?}: {error}")
                })
            }
            Err(error) => {
                color_eyre::eyre::bail!("Couldn't load config at {config_path:?}: {error}");
            }
        }
    }

    /// Parse the contents of a config file.
    pub fn parse(data: &str) -> Result<Self> {
        let mut value = toml::from_str::<toml::Value>(data)?;
        convert_hex_colours(&mut value)?;
        Ok(value.try_into::<Self>()?)
    }

    /// Parse the bundled default config.
    pub fn parse_default_config() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG)
    }
}

/// Colours in the config file are hex strings, but the simulation wants RGBA floats. Every
/// string inside any `colours` array is converted in place.
fn convert_hex_colours(value: &mut toml::Value) -> Result<()> {
    #[expect(
        clippy::wildcard_enum_match_arm,
        reason = "Only tables and arrays can contain colours"
    )]
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table.iter_mut() {
                if key == "colours" {
                    if let toml::Value::Array(items) = child {
                        for item in items.iter_mut() {
                            if let toml::Value::String(hex) = item {
                                let colour = parse_hex_colour(hex)?;
                                *item = colour_to_toml(colour);
                            }
                        }
                    }
                } else {
                    convert_hex_colours(child)?;
                }
            }
        }
        toml::Value::Array(items) => {
            for item in items.iter_mut() {
                convert_hex_colours(item)?;
            }
        }
        _ => (),
    }
    Ok(())
}

/// Parse a hex colour like `#ff8800` or `#ff880080`. The `#` is optional, and so is the alpha.
pub fn parse_hex_colour(hex: &str) -> Result<constellation::particle::Colour> {
    let digits = hex.trim().trim_start_matches('#');
    let invalid = |error: palette::rgb::FromHexError| {
        color_eyre::eyre::eyre!("Invalid hex colour {hex:?}: {error}")
    };

    let colour = match digits.len() {
        3 | 6 => {
            let rgb = palette::Srgb::<u8>::from_str(digits)
                .map_err(invalid)?
                .into_format::<f32>();
            (rgb.red, rgb.green, rgb.blue, 1.0)
        }
        4 | 8 => {
            let rgba = palette::Srgba::<u8>::from_str(digits)
                .map_err(invalid)?
                .into_format::<f32, f32>();
            (rgba.red, rgba.green, rgba.blue, rgba.alpha)
        }
        _ => color_eyre::eyre::bail!("Invalid hex colour {hex:?}: wrong number of digits"),
    };
    Ok(colour)
}

/// A colour as a TOML array of 4 floats.
fn colour_to_toml(colour: constellation::particle::Colour) -> toml::Value {
    toml::Value::Array(
        [colour.0, colour.1, colour.2, colour.3]
            .into_iter()
            .map(|channel| toml::Value::Float(f64::from(channel)))
            .collect(),
    )
}

#[cfg(test)]
#[expect(clippy::indexing_slicing, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    #[test]
    fn hex_colours() {
        let (red, green, blue, alpha) = parse_hex_colour("#ff0000").unwrap();
        assert!((red - 1.0).abs() < f32::EPSILON);
        assert!(green.abs() < f32::EPSILON);
        assert!(blue.abs() < f32::EPSILON);
        assert!((alpha - 1.0).abs() < f32::EPSILON);

        let colour = parse_hex_colour("00ff00cc").unwrap();
        assert!((colour.1 - 1.0).abs() < f32::EPSILON);
        assert!((colour.3 - 0.8).abs() < 1e-3);

        assert!(parse_hex_colour("#abc").is_ok());
        assert!(parse_hex_colour("#abcde").is_err());
        assert!(parse_hex_colour("#gggggg").is_err());
    }

    #[test]
    fn bundled_default_config_parses() {
        let config = Config::parse_default_config().unwrap();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.log_level, LogLevel::Off);
        let emitter = &config.simulation.emitters[0];
        assert_eq!(emitter.colours.len(), 3);
        assert!((emitter.colours[2].3 - 0.8).abs() < 1e-3);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config = Config::parse(indoc::indoc! {r##"
            tick_rate = 30

            [simulation]
            seed = 7

            [simulation.interaction.template]
            colours = ["#000000"]

            [simulation.physics]
            boundary = "wrap"
        "##})
        .unwrap();

        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(
            config.simulation.physics.boundary,
            constellation::physics::BoundaryPolicy::Wrap
        );
        assert_eq!(
            config.simulation.interaction.template.colours,
            vec![(0.0, 0.0, 0.0, 1.0)]
        );
        assert_eq!(config.simulation.emitters.len(), 1);
    }

    #[test]
    fn bad_colours_are_reported() {
        let result = Config::parse(indoc::indoc! {r#"
            [[simulation.emitters]]
            colours = ["not a colour"]
        "#});
        assert!(result.is_err());
    }

    #[test]
    fn loads_from_a_custom_path() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("custom.toml");
        std::fs::write(&path, "tick_rate = 5\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.tick_rate, 5);

        let missing = Config::load(Some(&directory.path().join("missing.toml")));
        assert!(missing.is_err());
    }
}
