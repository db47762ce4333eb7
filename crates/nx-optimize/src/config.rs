use crate::error::config_error;
use nx_core::{bail, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a reduction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceOptions {
    /// File imported when an import path names a directory
    pub default_file_name: String,
    /// Name under which an imported file sees its own resolved path
    pub current_file_binding: String,
    /// Identifier whose application triggers static import resolution
    pub import_symbol: String,
    /// Print `Importing file <path>` on stdout for every file parsed
    pub announce_imports: bool,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            default_file_name: "default.nix".to_string(),
            current_file_binding: "__cur_file".to_string(),
            import_symbol: "import".to_string(),
            announce_imports: true,
        }
    }
}

impl ReduceOptions {
    /// Load options from JSON; absent fields keep their defaults.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let options: Self =
            serde_json::from_str(contents).map_err(|err| config_error(err.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Names must be usable as a file name and as identifiers.
    pub fn validate(&self) -> Result<()> {
        let file_name = self.default_file_name.as_str();
        if file_name.is_empty() || file_name.contains('/') || file_name == "." || file_name == ".." {
            bail!("invalid reduce options: bad default file name {:?}", file_name);
        }
        for (field, name) in [
            ("current_file_binding", &self.current_file_binding),
            ("import_symbol", &self.import_symbol),
        ] {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                bail!("invalid reduce options: {} {:?} is not an identifier", field, name);
            }
        }
        Ok(())
    }

    pub fn quiet(mut self) -> Self {
        self.announce_imports = false;
        self
    }
}
