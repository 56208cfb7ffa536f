//! The build manifest.
//!
//! Lists every unit written by a build so the host can load them and the next
//! build can prune units that are no longer generated.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use daedalus_codegen::CompiledController;
use daedalus_unit::UnitKind;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BuildError, BuildResult};

/// Manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// One generated unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Unit name.
    pub name: String,
    /// Unit kind.
    pub kind: UnitKind,
    /// Controller the unit was generated from.
    pub controller: String,
    /// File name inside the output directory.
    pub file: String,
    /// Encoded size in bytes.
    pub size: usize,
    /// Handler units installed by a registration unit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handlers: Vec<String>,
}

/// Every unit of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version.
    pub version: u32,
    /// Units, per controller: handlers first, then the registration unit.
    pub units: Vec<ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            units: Vec::new(),
        }
    }
}

/// File name of unit `name` with `extension`.
///
/// # Errors
///
/// Returns [`BuildError::InvalidUnitName`] for names that are empty, contain
/// a path separator, or start with `.`.
pub fn unit_file_name(name: &str, extension: &str) -> BuildResult<String> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return Err(BuildError::InvalidUnitName(name.to_string()));
    }
    Ok(format!("{name}.{extension}"))
}

impl Manifest {
    /// Describes the units of `compiled`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidUnitName`] if a unit name is not a valid
    /// file name.
    pub fn from_compiled(compiled: &[CompiledController], extension: &str) -> BuildResult<Self> {
        let mut units = Vec::new();
        for controller in compiled {
            let handlers: Vec<String> = controller.handlers.iter().map(|u| u.name.clone()).collect();
            for unit in controller.units() {
                units.push(ManifestEntry {
                    name: unit.name.clone(),
                    kind: unit.kind,
                    controller: controller.controller.clone(),
                    file: unit_file_name(&unit.name, extension)?,
                    size: unit.bytes.len(),
                    handlers: match unit.kind {
                        UnitKind::Registration => handlers.clone(),
                        UnitKind::Handler => Vec::new(),
                    },
                });
            }
        }
        Ok(Self {
            version: MANIFEST_VERSION,
            units,
        })
    }

    /// Reads the manifest at `path`.
    ///
    /// A missing file, an unreadable one, or one in another format version
    /// yields `None`; stale units then stay on disk.
    pub fn read(path: &Path) -> Option<Self> {
        let text = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Self>(&text) {
            Ok(manifest) if manifest.version == MANIFEST_VERSION => Some(manifest),
            Ok(manifest) => {
                warn!(
                    path = %path.display(),
                    version = manifest.version,
                    "ignoring manifest with unsupported version"
                );
                None
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable manifest");
                None
            }
        }
    }

    /// Pretty JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Manifest`] if encoding fails.
    pub fn to_json(&self, path: &Path) -> BuildResult<Vec<u8>> {
        let mut json = serde_json::to_vec_pretty(self).map_err(|source| BuildError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;
        json.push(b'\n');
        Ok(json)
    }

    /// Registration units, one per controller.
    pub fn registrations(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.units
            .iter()
            .filter(|u| u.kind == UnitKind::Registration)
    }

    /// Entry for unit `name`.
    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Entries of `previous` whose files this manifest no longer lists.
    pub fn stale_in<'a>(&self, previous: &'a Manifest) -> Vec<&'a ManifestEntry> {
        let current: HashSet<&str> = self.units.iter().map(|u| u.file.as_str()).collect();
        previous
            .units
            .iter()
            .filter(|u| !current.contains(u.file.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, kind: UnitKind) -> ManifestEntry {
        ManifestEntry {
            name: name.to_string(),
            kind,
            controller: "app.C".to_string(),
            file: format!("{name}.dunit"),
            size: 10,
            handlers: Vec::new(),
        }
    }

    #[test]
    fn test_unit_file_name() {
        assert_eq!(
            unit_file_name("app.C$GET_s", "dunit").unwrap(),
            "app.C$GET_s.dunit"
        );
        assert!(unit_file_name("../evil", "dunit").is_err());
        assert!(unit_file_name("a/b", "dunit").is_err());
        assert!(unit_file_name("", "dunit").is_err());
    }

    #[test]
    fn test_stale_entries() {
        let previous = Manifest {
            version: MANIFEST_VERSION,
            units: vec![
                entry("app.C$GET_s", UnitKind::Handler),
                entry("app.C$DELETE_s", UnitKind::Handler),
                entry("app.C$Routes", UnitKind::Registration),
            ],
        };
        let current = Manifest {
            version: MANIFEST_VERSION,
            units: vec![
                entry("app.C$GET_s", UnitKind::Handler),
                entry("app.C$Routes", UnitKind::Registration),
            ],
        };
        let stale: Vec<&str> = current
            .stale_in(&previous)
            .into_iter()
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(stale, ["app.C$DELETE_s"]);
        assert_eq!(current.registrations().count(), 1);
        assert!(current.get("app.C$GET_s").is_some());
    }

    #[test]
    fn test_serde_shape() {
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            units: vec![entry("app.C$GET_s", UnitKind::Handler)],
        };
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["units"][0]["kind"], "handler");
        assert!(json["units"][0].get("handlers").is_none());
    }
}
