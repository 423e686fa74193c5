use super::ApiDefinition;
use crate::constants;
use crate::error::Error;
use std::fs;
use std::path::Path;

/// Loads interface definitions from a TOML or YAML file.
///
/// The format is chosen by extension: `.toml`, or `.yaml` / `.yml`.
///
/// # Arguments
/// * `path` - The definitions file
///
/// # Returns
/// * `Ok(ApiDefinition)` - The parsed interfaces, not yet merged or bound
/// * `Err(Error)` - If the file cannot be read or parsed
///
/// # Errors
/// Returns an error if the file doesn't exist, has an unsupported extension,
/// or does not deserialize into an `ApiDefinition`
pub fn load_definitions<P: AsRef<Path>>(path: P) -> Result<ApiDefinition, Error> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let definition: ApiDefinition = match extension.as_str() {
        constants::FILE_EXT_TOML => toml::from_str(&content)?,
        constants::FILE_EXT_YAML | constants::FILE_EXT_YML => serde_yaml::from_str(&content)?,
        other => {
            return Err(Error::configuration(format!(
                "Unsupported definitions format '{other}' for {}; use .toml, .yaml or .yml",
                path.display()
            )))
        }
    };

    let mut names = Vec::new();
    for interface in &definition.interfaces {
        if names.contains(&interface.name.as_str()) {
            return Err(Error::configuration(format!(
                "Interface '{}' is defined twice in {}",
                interface.name,
                path.display()
            )));
        }
        names.push(interface.name.as_str());
    }

    Ok(definition)
}
