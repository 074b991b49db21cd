use crate::document::{Document, DocumentFields};
use serde_json::Value;
use std::io;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum FileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("top-level JSON value is not an object")]
    NotAnObject,
    #[error("object has none of the {0} keys")]
    NoDocumentKeys(&'static str),
}

impl FileError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FileError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

/// Reads a document of kind `D` from a UTF-8 JSON file.
///
/// The file is read on every call, so edits take effect without a restart.
/// Keys outside the document's layout are served as they are. An object
/// with none of the layout's keys is rejected.
pub(crate) async fn load<D: Document>(path: &Path) -> Result<D, FileError> {
    let bytes = tokio::fs::read(path).await?;
    let value: Value = serde_json::from_slice(&bytes)?;
    let Value::Object(object) = &value else {
        return Err(FileError::NotAnObject);
    };
    if !DocumentFields::has_layout_key(&D::LAYOUT, object) {
        return Err(FileError::NoDocumentKeys(D::KIND.as_str()));
    }
    let fields = DocumentFields::from_json(&D::LAYOUT, value).ok_or(FileError::NotAnObject)?;
    Ok(D::from_fields(fields))
}
