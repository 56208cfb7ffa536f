//! Controller descriptor input.
//!
//! A descriptor file holds one controller object or an array of them. A
//! directory input expands to its `*.json` files in name order. Method
//! patterns are mounted under the controller's `path` prefix and normalized
//! on load, so hand-written files may use any spelling.

use std::fs;
use std::path::{Path, PathBuf};

use daedalus_model::pattern::join_patterns;
use daedalus_model::ControllerDescriptor;
use serde::Deserialize;
use tracing::debug;

use crate::error::{BuildError, BuildResult};

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Many(Vec<ControllerDescriptor>),
    One(ControllerDescriptor),
}

/// Parses descriptor JSON.
///
/// ```
/// use daedalus_build::parse_descriptors;
///
/// let controllers = parse_descriptors(r#"{"name": "app.Health"}"#).unwrap();
/// assert_eq!(controllers[0].name, "app.Health");
/// assert!(controllers[0].methods.is_empty());
/// ```
///
/// # Errors
///
/// Returns the JSON error for malformed input.
pub fn parse_descriptors(text: &str) -> serde_json::Result<Vec<ControllerDescriptor>> {
    let mut controllers = match serde_json::from_str(text)? {
        Document::Many(controllers) => controllers,
        Document::One(controller) => vec![controller],
    };
    for controller in &mut controllers {
        for method in &mut controller.methods {
            method.pattern = join_patterns(&controller.path, &method.pattern);
        }
    }
    Ok(controllers)
}

/// Loads one descriptor file.
///
/// # Errors
///
/// Returns [`BuildError::Io`] or [`BuildError::Descriptor`].
pub fn load_descriptor_file(path: &Path) -> BuildResult<Vec<ControllerDescriptor>> {
    let text = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    let controllers = parse_descriptors(&text).map_err(|source| BuildError::Descriptor {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), controllers = controllers.len(), "loaded descriptors");
    Ok(controllers)
}

/// Loads every input, expanding directories, in input order.
///
/// # Errors
///
/// Returns the first load failure.
pub fn load_descriptors(inputs: &[PathBuf]) -> BuildResult<Vec<ControllerDescriptor>> {
    let mut controllers = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for file in json_files(input)? {
                controllers.extend(load_descriptor_file(&file)?);
            }
        } else {
            controllers.extend(load_descriptor_file(input)?);
        }
    }
    Ok(controllers)
}

fn json_files(dir: &Path) -> BuildResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| BuildError::io(dir, e))? {
        let path = entry.map_err(|e| BuildError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_model::{BindingKind, HttpVerb, TypeRef};

    const PETS: &str = r#"{
        "name": "app.PetController",
        "methods": [{
            "owner": "app.PetController",
            "name": "getPet",
            "verb": "GET",
            "pattern": "pets//{id}/",
            "params": [{"name": "id", "binding": "path", "type": {"primitive": "int"}}],
            "return_type": {"class": {"name": "app.Pet"}}
        }]
    }"#;

    #[test]
    fn test_parse_single_controller_normalizes_patterns() {
        let controllers = parse_descriptors(PETS).unwrap();
        assert_eq!(controllers.len(), 1);
        let method = &controllers[0].methods[0];
        assert_eq!(method.pattern, "/pets/{id}");
        assert_eq!(method.verb, HttpVerb::Get);
        assert_eq!(method.params[0].binding, BindingKind::Path);
        assert_eq!(method.params[0].ty, TypeRef::int());
        assert_eq!(method.return_type, TypeRef::class("app.Pet"));
    }

    #[test]
    fn test_parse_mounts_methods_under_controller_path() {
        let text = r#"{
            "name": "app.PetController",
            "path": "/api/v1/",
            "methods": [
                {"owner": "app.PetController", "name": "list", "verb": "GET", "pattern": "pets"},
                {"owner": "app.PetController", "name": "index", "verb": "GET", "pattern": "/"}
            ]
        }"#;
        let controllers = parse_descriptors(text).unwrap();
        let patterns: Vec<&str> = controllers[0]
            .methods
            .iter()
            .map(|m| m.pattern.as_str())
            .collect();
        assert_eq!(patterns, ["/api/v1/pets", "/api/v1"]);

        // Re-encoding yields mounted patterns and no prefix, so it parses back
        // to the same routes.
        let again = serde_json::to_string(&controllers).unwrap();
        assert_eq!(parse_descriptors(&again).unwrap()[0].methods, controllers[0].methods);
    }

    #[test]
    fn test_parse_array() {
        let text = format!("[{PETS}, {{\"name\": \"app.Health\"}}]");
        let controllers = parse_descriptors(&text).unwrap();
        assert_eq!(controllers.len(), 2);
        assert_eq!(controllers[1].name, "app.Health");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_descriptors("{\"methods\": 3}").is_err());
        assert!(parse_descriptors("not json").is_err());
    }
}
