//! INI file configuration adapter.
//!
//! Section and key lookups are case-insensitive.

use crate::domain::error::CrosstrendError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CrosstrendError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| CrosstrendError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, CrosstrendError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| CrosstrendError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn sections(&self) -> Vec<String> {
        let mut sections = self.config.sections();
        sections.sort();
        sections
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[data]
dir = ./data
symbols = BTC-USDT-SWAP, ETH-USDT-SWAP

[strategy]
top_k = 5
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(adapter.get_string("data", "dir"), Some("./data".to_string()));
        assert_eq!(adapter.get_string("strategy", "top_k"), Some("5".to_string()));
        assert_eq!(adapter.sections(), vec!["data", "strategy"]);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[strategy]\ntop_k = 5\n").unwrap();
        assert_eq!(adapter.get_string("strategy", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let adapter = FileConfigAdapter::from_string("[Strategy]\nL_ret = 30\n").unwrap();
        assert_eq!(adapter.get_string("strategy", "l_ret"), Some("30".to_string()));
        assert_eq!(adapter.get_string("STRATEGY", "L_RET"), Some("30".to_string()));
    }

    #[test]
    fn get_list_splits_on_commas() {
        let adapter =
            FileConfigAdapter::from_string("[data]\nsymbols = A, B ,,C\n").unwrap();
        assert_eq!(
            adapter.get_list("data", "symbols"),
            Some(vec!["A".to_string(), "B".to_string(), "C".to_string()])
        );
        assert_eq!(adapter.get_list("data", "missing"), None);
    }

    #[test]
    fn non_ascii_keys() {
        let adapter = FileConfigAdapter::from_string("[strategy]\n调仓间隔 = 30\n").unwrap();
        assert_eq!(adapter.get_string("strategy", "调仓间隔"), Some("30".to_string()));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[output]\ndir = /tmp/reports\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("output", "dir"),
            Some("/tmp/reports".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini")
            .err()
            .unwrap();
        assert!(matches!(err, CrosstrendError::ConfigParse { .. }));
        assert_eq!(err.exit_status(), 2);
    }
}
