//! Generic parameters functions
//!
//! Parameter files are TOML by default. Files with a `.json` extension are
//! read as JSON instead, which matches the format vehicle models are usually
//! distributed in.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable which, if set, gives the directory relative parameter
/// paths are resolved against.
pub const PARAMS_DIR_ENV: &str = "STEER_PARAMS_DIR";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot load the parmeter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),

    #[error("Cannot read the JSON parameter file: {0}")]
    JsonDeserialiseError(serde_json::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// Absolute paths are used as given. Relative paths are resolved against the
/// directory in `STEER_PARAMS_DIR` if it is set, otherwise against the current
/// working directory.
pub fn load<P, F>(param_file_path: F) -> Result<P, LoadError> 
where
    P: DeserializeOwned,
    F: AsRef<Path>
{
    let path = resolve(param_file_path.as_ref());

    // Load the file into a string
    let params_str = match read_to_string(&path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(path, e))
    };

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        from_json_str(&params_str)
    }
    else {
        from_toml_str(&params_str)
    }
}

/// Parse parameters from a TOML string.
pub fn from_toml_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}

/// Parse parameters from a JSON string.
pub fn from_json_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    serde_json::from_str(params_str).map_err(LoadError::JsonDeserialiseError)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn resolve(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    match std::env::var_os(PARAMS_DIR_ENV) {
        Some(dir) => {
            let mut full = PathBuf::from(dir);
            full.push(path);
            full
        },
        None => path.to_path_buf()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Demo {
        gain: f64,
        #[serde(rename = "Lookahead Distance")]
        lookahead_m: Option<f64>,
    }

    #[test]
    fn test_toml_and_json_agree() {
        let from_toml: Demo = from_toml_str(
            "gain = 0.5\n\"Lookahead Distance\" = 5.0\n"
        ).unwrap();
        let from_json: Demo = from_json_str(
            r#"{ "gain": 0.5, "Lookahead Distance": 5.0 }"#
        ).unwrap();

        assert_eq!(from_toml, from_json);
        assert_eq!(from_toml.lookahead_m, Some(5.0));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = std::env::temp_dir().join("util_params_test");
        std::fs::create_dir_all(&dir).unwrap();

        let json_path = dir.join("demo.json");
        std::fs::write(&json_path, r#"{ "gain": 2.0 }"#).unwrap();
        let demo: Demo = load(&json_path).unwrap();
        assert_eq!(demo.gain, 2.0);
        assert_eq!(demo.lookahead_m, None);

        let toml_path = dir.join("demo.toml");
        std::fs::write(&toml_path, "gain = 3\n").unwrap();
        let demo: Demo = load(&toml_path).unwrap();
        assert_eq!(demo.gain, 3.0);
    }

    #[test]
    fn test_missing_file() {
        let err = load::<Demo, _>("/definitely/not/here.toml").unwrap_err();
        match err {
            LoadError::FileLoadError(p, _) => {
                assert_eq!(p, PathBuf::from("/definitely/not/here.toml"))
            },
            e => panic!("Unexpected error {}", e)
        }
    }
}
