//! Frame stack for name resolution.

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::trace;

use crate::binding::Binding;

/// What pushed a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The unit's top level; lives as long as the scope
    Main,
    Function,
    Block,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    bindings: IndexMap<SmolStr, Binding>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            bindings: IndexMap::new(),
        }
    }
}

/// An ordered stack of frames, innermost last.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(FrameKind::Main)],
        }
    }

    pub fn enter(&mut self, kind: FrameKind) {
        self.frames.push(Frame::new(kind));
        trace!(?kind, depth = self.frames.len(), "enter frame");
    }

    /// Pop the innermost frame and everything declared in it. The main frame stays.
    pub fn exit(&mut self) -> Option<FrameKind> {
        if self.frames.len() == 1 {
            return None;
        }
        let frame = self.frames.pop()?;
        trace!(kind = ?frame.kind, depth = self.frames.len(), "exit frame");
        Some(frame.kind)
    }

    /// Innermost binding for `name`.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
    }

    /// Write into the innermost frame that already holds `name`, or into the
    /// innermost frame when no frame does.
    pub fn set(&mut self, name: impl Into<SmolStr>, binding: Binding) {
        let name = name.into();
        let index = self
            .frames
            .iter()
            .rposition(|frame| frame.bindings.contains_key(&name))
            .unwrap_or(self.frames.len() - 1);
        self.frames[index].bindings.insert(name, binding);
    }

    /// Install `binding` in the innermost frame, shadowing outer frames.
    /// Returns the binding it replaced when the name was already declared there.
    pub fn declare(&mut self, name: impl Into<SmolStr>, binding: Binding) -> Option<Binding> {
        let index = self.frames.len() - 1;
        self.frames[index].bindings.insert(name.into(), binding)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
