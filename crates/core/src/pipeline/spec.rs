use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{PipelineError, PipelineResult};
use crate::catalog::sha256_hex;
use crate::model::parse_address;
use crate::oracle::OracleScope;

/// Per-run description, read from YAML or JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    /// Disassembly directory, relative to the project root unless absolute.
    pub catalog: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_scope: Option<OracleScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// RAM ranges holding code at runtime, as `"0xHHHH-0xHHHH"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ram_code: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PortSpec {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::InvalidSpec("'name' is required".into()));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(PipelineError::InvalidSpec(format!(
                "'name' may only contain letters, digits, '-', '_' and '.': {}",
                self.name
            )));
        }
        if self.catalog.as_os_str().is_empty() {
            return Err(PipelineError::InvalidSpec("'catalog' is required".into()));
        }
        if self.workers == Some(0) {
            return Err(PipelineError::InvalidSpec("'workers' must be at least 1".into()));
        }
        self.ram_code_ranges()?;
        Ok(())
    }

    pub fn ram_code_ranges(&self) -> PipelineResult<Vec<RangeInclusive<u16>>> {
        self.ram_code.iter().map(|text| parse_range(text)).collect()
    }

    pub fn catalog_dir(&self, root: &Path) -> PathBuf {
        if self.catalog.is_absolute() {
            self.catalog.clone()
        } else {
            root.join(&self.catalog)
        }
    }
}

fn parse_range(text: &str) -> PipelineResult<RangeInclusive<u16>> {
    let invalid = || PipelineError::InvalidSpec(format!("bad ram_code range '{text}'"));
    let (start, end) = text.split_once('-').ok_or_else(invalid)?;
    let start = parse_address(start.trim()).ok_or_else(invalid)?;
    let end = parse_address(end.trim()).ok_or_else(invalid)?;
    if end < start {
        return Err(invalid());
    }
    Ok(start..=end)
}

/// Read a spec; `.json` files are JSON, anything else YAML. Also returns the
/// SHA-256 of the file.
pub fn load_port_spec(path: &Path) -> PipelineResult<(PortSpec, String)> {
    let bytes = fs::read(path)
        .map_err(|source| PipelineError::SpecIo { path: path.to_path_buf(), source })?;
    let hash = sha256_hex(&bytes);
    let spec: PortSpec = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::SpecParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    } else {
        serde_yaml::from_slice(&bytes).map_err(|e| PipelineError::SpecParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    };
    spec.validate()?;
    Ok((spec, hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("port.yaml");
        fs::write(
            &yaml,
            "name: demo\ncatalog: extracted\noracle_scope: all\nram_code:\n  - 0x0300-0x03FF\n",
        )
        .unwrap();
        let (spec, hash) = load_port_spec(&yaml).unwrap();
        assert_eq!(spec.oracle_scope, Some(OracleScope::All));
        assert_eq!(spec.ram_code_ranges().unwrap(), vec![0x0300..=0x03FF]);
        assert_eq!(hash.len(), 64);

        let json = dir.path().join("port.json");
        fs::write(&json, r#"{"name":"demo","catalog":"extracted"}"#).unwrap();
        let (spec, _) = load_port_spec(&json).unwrap();
        assert_eq!(spec.catalog_dir(Path::new("/p")), PathBuf::from("/p/extracted"));
    }

    #[test]
    fn rejects_bad_specs() {
        let spec = PortSpec {
            name: "bad name".into(),
            catalog: "x".into(),
            title: None,
            oracle_scope: None,
            workers: None,
            ram_code: vec![],
            description: None,
        };
        assert!(matches!(spec.validate(), Err(PipelineError::InvalidSpec(_))));
        let spec = PortSpec { name: "ok".into(), ram_code: vec!["0x0400-0x0300".into()], ..spec };
        assert!(spec.validate().is_err());
    }
}
