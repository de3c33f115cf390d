pub mod constant;
pub mod decl;
pub mod declarator;
pub mod expr;
pub mod lookup;
pub mod overload;
pub mod scope;
pub mod sema;
pub mod stmt;
pub mod types;

#[cfg(test)]
mod tests;
