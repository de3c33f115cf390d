use std::{collections::HashMap, fs, path::Path};

use log::warn;

use crate::{
    errors::errors::{Error, ErrorImpl},
    Position,
};

use super::diagnostics::DiagId;

const BUILTIN_DIAG_TEXT: &str = include_str!("diag_text.txt");

/// DiagId to message template table.
///
/// The source format alternates a line holding a DiagId name with a line
/// holding its text; a blank line ends the table. Templates reference
/// arguments as `{0}`, `{1}`, ...
#[derive(Debug, Default, Clone)]
pub struct DiagTextMap {
    texts: HashMap<DiagId, String>,
}

impl DiagTextMap {
    pub fn parse(content: &str) -> DiagTextMap {
        let mut texts = HashMap::new();
        let mut lines = content.lines();

        while let Some(name) = lines.next() {
            let name = name.trim();
            if name.is_empty() {
                break;
            }

            let Some(text) = lines.next() else {
                warn!("diagnostic {} has no text", name);
                break;
            };

            match DiagId::from_name(name) {
                None => warn!("ignoring unknown diagnostic id {}", name),
                Some(id) if texts.contains_key(&id) => {
                    warn!("ignoring duplicate text for diagnostic {}", name)
                }
                Some(id) => {
                    texts.insert(id, text.to_string());
                }
            }
        }

        DiagTextMap { texts }
    }

    pub fn builtin() -> DiagTextMap {
        DiagTextMap::parse(BUILTIN_DIAG_TEXT)
    }

    pub fn from_file(path: &Path) -> Result<DiagTextMap, Error> {
        let content = fs::read_to_string(path).map_err(|error| {
            Error::new(
                ErrorImpl::IoError {
                    message: format!("{}: {}", path.display(), error),
                },
                Position::null(),
            )
        })?;

        Ok(DiagTextMap::parse(&content))
    }

    pub fn get_text(&self, id: DiagId) -> Option<&str> {
        self.texts.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Substitutes `args` into the template for `id`. Ids without a text
    /// fall back to the id name followed by the arguments.
    pub fn format(&self, id: DiagId, args: &[String]) -> String {
        let Some(template) = self.get_text(id) else {
            if args.is_empty() {
                return id.name().to_string();
            }
            return format!("{}: {}", id.name(), args.join(", "));
        };

        let mut message = template.to_string();
        for (index, arg) in args.iter().enumerate() {
            message = message.replace(&format!("{{{}}}", index), arg);
        }
        message
    }
}
