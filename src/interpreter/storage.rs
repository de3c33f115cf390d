use std::collections::HashMap;

use log::debug;

use crate::ast::{context::AstContext, decls::DeclId};

use super::value::Value;

/// Maps declarations to the values they currently hold. Globals live for
/// the whole session; each call pushes a frame for its parameters and
/// locals.
#[derive(Debug, Default)]
pub struct DeclStorage {
    globals: HashMap<DeclId, Value>,
    frames: Vec<HashMap<DeclId, Value>>,
}

impl DeclStorage {
    pub fn new() -> Self {
        DeclStorage::default()
    }

    pub fn in_frame(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Binds `decl` in the innermost frame, or as a global outside calls.
    pub fn declare(&mut self, decl: DeclId, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(decl, value);
            }
            None => self.declare_global(decl, value),
        }
    }

    pub fn declare_global(&mut self, decl: DeclId, value: Value) {
        self.globals.insert(decl, value);
    }

    pub fn is_global(&self, decl: DeclId) -> bool {
        self.globals.contains_key(&decl)
    }

    /// Only the innermost frame is visible: a callee cannot see its
    /// caller's locals.
    pub fn get(&self, decl: DeclId) -> Option<&Value> {
        self.frames
            .last()
            .and_then(|frame| frame.get(&decl))
            .or_else(|| self.globals.get(&decl))
    }

    pub fn get_mut(&mut self, decl: DeclId) -> Option<&mut Value> {
        if let Some(frame) = self.frames.last_mut() {
            if frame.contains_key(&decl) {
                return frame.get_mut(&decl);
            }
        }
        self.globals.get_mut(&decl)
    }

    /// Drops the values of globals whose declaration is no longer reachable
    /// from any live context, such as those of a rolled back REPL statement.
    /// Returns how many were dropped.
    pub fn collect_garbage(&mut self, ast: &AstContext) -> usize {
        let before = self.globals.len();
        self.globals
            .retain(|decl, _| ast.get_decl(*decl).get_context().is_some());

        let dropped = before - self.globals.len();
        if dropped > 0 {
            debug!("interpreter: collected {} dead value(s)", dropped);
        }
        dropped
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }
}
