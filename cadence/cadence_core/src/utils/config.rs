//! Configuration loading.
//!
//! Configuration documents are TOML. These helpers parse any
//! `Deserialize` type and fold parser failures into [`ConfigError`].

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Result};

/// Parse a TOML document.
pub fn parse_toml<T: DeserializeOwned>(source: &str) -> Result<T> {
    toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()).into())
}

/// Read and parse a TOML file.
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let source = fs::read_to_string(path)?;
    log::debug!("Loaded configuration from {}", path.display());
    parse_toml(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        #[serde(default)]
        count: u32,
    }

    #[test]
    fn test_parse_toml() {
        let sample: Sample = parse_toml("name = \"pool\"\ncount = 3").unwrap();
        assert_eq!(
            sample,
            Sample {
                name: "pool".into(),
                count: 3
            }
        );
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let result: Result<Sample> = parse_toml("name = ");
        assert!(matches!(result, Err(Error::Config(ConfigError::Parse(_)))));
    }

    #[test]
    fn test_load_toml_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"timer\"").unwrap();

        let sample: Sample = load_toml(file.path()).unwrap();
        assert_eq!(sample.name, "timer");
        assert_eq!(sample.count, 0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result: Result<Sample> = load_toml("/definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
