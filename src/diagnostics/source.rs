use std::{collections::HashMap, fs, path::Path, rc::Rc};

use crate::{
    errors::errors::{Error, ErrorImpl},
    Position,
};

/// Owns the text of every file handed to the toolchain, keyed by the file
/// name recorded in token positions.
#[derive(Debug, Default)]
pub struct SourceManager {
    files: HashMap<String, Rc<String>>,
}

impl SourceManager {
    pub fn new() -> Self {
        SourceManager::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, content: impl Into<String>) -> Rc<String> {
        let content = Rc::new(content.into());
        self.files.insert(name.into(), Rc::clone(&content));
        content
    }

    /// Reads `path` from disk and registers it under its display name.
    pub fn load_file(&mut self, path: &Path) -> Result<(String, Rc<String>), Error> {
        let content = fs::read_to_string(path).map_err(|error| {
            Error::new(
                ErrorImpl::IoError {
                    message: format!("failed to read {}: {}", path.display(), error),
                },
                Position::null(),
            )
        })?;

        let name = path.display().to_string();
        let content = self.add_file(name.clone(), content);
        Ok((name, content))
    }

    /// The full text of `name`, or `None` if it was never registered.
    pub fn get_file_content(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(|content| content.as_str())
    }
}
