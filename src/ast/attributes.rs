use std::{any::Any, collections::HashMap, fmt::Debug, rc::Rc};

use crate::errors::errors::Error;

/// Metadata attached to a declaration, such as `#[deprecated("...")]`.
pub trait Attribute: Debug {
    /// The spelling used in source and as the serializer registry key.
    fn name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecatedAttr {
    pub message: Option<String>,
}

impl Attribute for DeprecatedAttr {
    fn name(&self) -> &str {
        "deprecated"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Marks a declaration that came from another unit, for example a host
/// intrinsic. Imported declarations are never lowered to definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedAttr {
    pub origin: String,
}

impl Attribute for ImportedAttr {
    fn name(&self) -> &str {
        "imported"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub trait ArchiveWriter {
    fn write_str(&mut self, value: &str);
    fn write_u64(&mut self, value: u64);
    fn write_bool(&mut self, value: bool);
}

pub trait ArchiveReader {
    fn read_str(&mut self) -> Result<String, Error>;
    fn read_u64(&mut self) -> Result<u64, Error>;
    fn read_bool(&mut self) -> Result<bool, Error>;
}

#[derive(Debug, Clone, PartialEq)]
enum ArchiveItem {
    Str(String),
    U64(u64),
    Bool(bool),
}

/// In-memory archive. Values are read back in the order they were written.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    items: Vec<ArchiveItem>,
    cursor: usize,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn next_item(&mut self, expected: &str) -> Result<ArchiveItem, Error> {
        let item = self.items.get(self.cursor).cloned().ok_or_else(|| {
            Error::invariant(format!("archive exhausted while reading a {}", expected))
        })?;
        self.cursor += 1;
        Ok(item)
    }
}

impl ArchiveWriter for MemoryArchive {
    fn write_str(&mut self, value: &str) {
        self.items.push(ArchiveItem::Str(value.to_string()));
    }

    fn write_u64(&mut self, value: u64) {
        self.items.push(ArchiveItem::U64(value));
    }

    fn write_bool(&mut self, value: bool) {
        self.items.push(ArchiveItem::Bool(value));
    }
}

impl ArchiveReader for MemoryArchive {
    fn read_str(&mut self) -> Result<String, Error> {
        match self.next_item("string")? {
            ArchiveItem::Str(value) => Ok(value),
            other => Err(Error::invariant(format!("expected a string, found {:?}", other))),
        }
    }

    fn read_u64(&mut self) -> Result<u64, Error> {
        match self.next_item("u64")? {
            ArchiveItem::U64(value) => Ok(value),
            other => Err(Error::invariant(format!("expected a u64, found {:?}", other))),
        }
    }

    fn read_bool(&mut self) -> Result<bool, Error> {
        match self.next_item("bool")? {
            ArchiveItem::Bool(value) => Ok(value),
            other => Err(Error::invariant(format!("expected a bool, found {:?}", other))),
        }
    }
}

pub trait AttributeSerializer {
    fn serialize(&self, attribute: &dyn Attribute, writer: &mut dyn ArchiveWriter) -> Result<(), Error>;
    fn deserialize(&self, reader: &mut dyn ArchiveReader) -> Result<Rc<dyn Attribute>, Error>;
}

fn downcast<'a, T: 'static>(attribute: &'a dyn Attribute) -> Result<&'a T, Error> {
    attribute.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::invariant(format!(
            "serializer registered for `{}` received another attribute",
            attribute.name()
        ))
    })
}

struct DeprecatedSerializer;

impl AttributeSerializer for DeprecatedSerializer {
    fn serialize(&self, attribute: &dyn Attribute, writer: &mut dyn ArchiveWriter) -> Result<(), Error> {
        let deprecated = downcast::<DeprecatedAttr>(attribute)?;
        writer.write_bool(deprecated.message.is_some());
        if let Some(message) = &deprecated.message {
            writer.write_str(message);
        }
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn ArchiveReader) -> Result<Rc<dyn Attribute>, Error> {
        let message = if reader.read_bool()? {
            Some(reader.read_str()?)
        } else {
            None
        };
        Ok(Rc::new(DeprecatedAttr { message }))
    }
}

struct ImportedSerializer;

impl AttributeSerializer for ImportedSerializer {
    fn serialize(&self, attribute: &dyn Attribute, writer: &mut dyn ArchiveWriter) -> Result<(), Error> {
        writer.write_str(&downcast::<ImportedAttr>(attribute)?.origin);
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn ArchiveReader) -> Result<Rc<dyn Attribute>, Error> {
        Ok(Rc::new(ImportedAttr {
            origin: reader.read_str()?,
        }))
    }
}

/// Attribute name to serializer. Unknown names are reported to the caller
/// so new attribute kinds can be registered without touching the core.
#[derive(Default)]
pub struct AttributeRegistry {
    serializers: HashMap<String, Box<dyn AttributeSerializer>>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = AttributeRegistry::new();
        registry.register("deprecated", Box::new(DeprecatedSerializer));
        registry.register("imported", Box::new(ImportedSerializer));
        registry
    }

    /// Returns the serializer previously registered under `name`, if any.
    pub fn register(
        &mut self,
        name: &str,
        serializer: Box<dyn AttributeSerializer>,
    ) -> Option<Box<dyn AttributeSerializer>> {
        self.serializers.insert(name.to_string(), serializer)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.serializers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn AttributeSerializer> {
        self.serializers.get(name).map(|serializer| serializer.as_ref())
    }

    /// Writes the attribute name followed by its payload.
    pub fn serialize(&self, attribute: &dyn Attribute, writer: &mut dyn ArchiveWriter) -> Result<(), Error> {
        let serializer = self.get(attribute.name()).ok_or_else(|| {
            Error::invariant(format!("no serializer for attribute `{}`", attribute.name()))
        })?;
        writer.write_str(attribute.name());
        serializer.serialize(attribute, writer)
    }

    pub fn deserialize(&self, reader: &mut dyn ArchiveReader) -> Result<Rc<dyn Attribute>, Error> {
        let name = reader.read_str()?;
        let serializer = self
            .get(&name)
            .ok_or_else(|| Error::invariant(format!("no serializer for attribute `{}`", name)))?;
        serializer.deserialize(reader)
    }
}
