/// AST module
/// Contains the declaration/type model and the typed statement tree Sema builds
///
/// Submodules:
/// - attributes: Declaration attributes and their serializer registry
/// - context: The AstContext arena owning declarations and interned types
/// - decls: Declarations, declaration kinds and context capability ranges
/// - stmts: Statement and expression nodes
/// - types: Type variants and builtin classes
/// - visitor: Tag-dispatched visitor protocol with base-class fallback
pub mod attributes;
pub mod context;
pub mod decls;
pub mod stmts;
pub mod types;
pub mod visitor;

#[cfg(test)]
mod tests;
