use crate::app::AppDescriptor;
use crate::snapshot::RawUiTree;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("App descriptor has no package name")]
    MissingPackage,

    #[error("Main entry '{entry}' is not a declared component")]
    UndeclaredEntry { entry: String },
}

/// Parse a UI hierarchy dump.
pub fn parse_snapshot(json: &str) -> Result<RawUiTree, ParseError> {
    Ok(serde_json::from_str(json)?)
}

/// Parse and validate an app descriptor.
///
/// The main entry is added to the component set if the document omits it from
/// `components`, but it must then at least belong to the package.
pub fn load_descriptor(json: &str) -> Result<AppDescriptor, ParseError> {
    let mut app: AppDescriptor = serde_json::from_str(json)?;
    if app.package.trim().is_empty() {
        return Err(ParseError::MissingPackage);
    }
    if !app.components.contains(&app.main_entry) {
        if !app.owns(&app.main_entry) {
            return Err(ParseError::UndeclaredEntry {
                entry: app.main_entry.clone(),
            });
        }
        app.components.insert(app.main_entry.clone());
    }
    Ok(app)
}
