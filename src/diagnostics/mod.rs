//! Diagnostics collaborator.
//!
//! Sema reports recoverable problems here by [`DiagId`] and source span;
//! the engine formats them with a [`DiagTextMap`], records them, and hands
//! them to a [`DiagnosticConsumer`]. Any error-level diagnostic marks the
//! current attempt as failed until [`DiagnosticsEngine::reset`].
//!
//! [`DiagId`]: diagnostics::DiagId
//! [`DiagTextMap`]: text_map::DiagTextMap
//! [`DiagnosticConsumer`]: diagnostics::DiagnosticConsumer
//! [`DiagnosticsEngine::reset`]: diagnostics::DiagnosticsEngine::reset

pub mod consumer;
pub mod diagnostics;
pub mod source;
pub mod text_map;

#[cfg(test)]
mod tests;
