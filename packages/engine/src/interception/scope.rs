// packages/engine/src/interception/scope.rs
//! Nested scope stack
//!
//! Frame 0 is the permanent base frame for registrations made outside any
//! scope. Every other frame mirrors one open scope; frames nest strictly, so
//! closing a frame force-closes everything opened after it.

use crate::interception::plugins::PluginChain;
use crate::interception::registry::MockDescriptor;
use crate::module::key::ModuleKey;
use crate::utils::errors::{EngineError, Result};
use std::fmt;
use tracing::debug;

/// Identity of a scope; ids grow monotonically, so a descendant always has
/// a larger id than its ancestors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// The base frame
    pub const BASE: ScopeId = ScopeId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interception state captured when a scope opens
#[derive(Debug, Clone)]
pub struct ScopeSnapshot {
    /// Whether interception was enabled
    pub was_enabled: bool,

    /// Plugin chain in effect
    pub plugins: PluginChain,
}

/// One frame of the stack
#[derive(Debug)]
pub struct ScopeFrame {
    /// Frame identity
    pub id: ScopeId,

    /// Live descriptors, in registration order
    pub descriptors: Vec<MockDescriptor>,

    /// Descriptors retired by the end of an interception session; kept
    /// only for the required-use check at close
    pub retired: Vec<MockDescriptor>,

    /// State to restore on close (`None` for the base frame)
    pub snapshot: Option<ScopeSnapshot>,
}

impl ScopeFrame {
    fn new(id: ScopeId, snapshot: Option<ScopeSnapshot>) -> Self {
        Self {
            id,
            descriptors: Vec::new(),
            retired: Vec::new(),
            snapshot,
        }
    }

    pub fn find(&self, key: &ModuleKey) -> Option<&MockDescriptor> {
        self.descriptors.iter().find(|descriptor| &descriptor.key == key)
    }

    pub fn find_mut(&mut self, key: &ModuleKey) -> Option<&mut MockDescriptor> {
        self.descriptors
            .iter_mut()
            .find(|descriptor| &descriptor.key == key)
    }

    /// Move every live descriptor to the retired list
    pub fn retire(&mut self) {
        for mut descriptor in self.descriptors.drain(..) {
            descriptor.materialized = None;
            self.retired.push(descriptor);
        }
    }

    /// Keys of required-use descriptors that were never consulted
    pub fn unused_required(&self) -> Vec<ModuleKey> {
        let mut keys: Vec<ModuleKey> = self
            .descriptors
            .iter()
            .chain(self.retired.iter())
            .filter(|descriptor| descriptor.required_use && !descriptor.was_used())
            .map(|descriptor| descriptor.key.clone())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Stack of open scopes on top of the base frame
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
    next_id: u64,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            frames: vec![ScopeFrame::new(ScopeId::BASE, None)],
            next_id: 1,
        }
    }

    /// Push a new frame
    pub fn open(&mut self, snapshot: ScopeSnapshot) -> ScopeId {
        let id = ScopeId(self.next_id);
        self.next_id += 1;
        self.frames.push(ScopeFrame::new(id, Some(snapshot)));
        debug!("Opened scope {} at depth {}", id, self.depth());
        id
    }

    /// Pop `id` and every frame above it, innermost first
    pub fn close(&mut self, id: ScopeId) -> Result<Vec<ScopeFrame>> {
        if id == ScopeId::BASE {
            return Err(EngineError::ScopeNotOpen(id.get()));
        }

        let position = self
            .frames
            .iter()
            .position(|frame| frame.id == id)
            .ok_or(EngineError::ScopeNotOpen(id.get()))?;

        let mut closed = self.frames.split_off(position);
        closed.reverse();

        if closed.len() > 1 {
            debug!("Closing scope {} force-closes {} child scopes", id, closed.len() - 1);
        }

        Ok(closed)
    }

    pub fn is_open(&self, id: ScopeId) -> bool {
        self.frames.iter().any(|frame| frame.id == id)
    }

    /// Innermost frame
    pub fn current(&self) -> &ScopeFrame {
        self.frames
            .last()
            .unwrap_or_else(|| unreachable!("base frame is never popped"))
    }

    pub fn current_mut(&mut self) -> &mut ScopeFrame {
        self.frames
            .last_mut()
            .unwrap_or_else(|| unreachable!("base frame is never popped"))
    }

    /// Number of open scopes, not counting the base frame
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn base_mut(&mut self) -> &mut ScopeFrame {
        &mut self.frames[0]
    }

    pub fn frame_mut(&mut self, id: ScopeId) -> Option<&mut ScopeFrame> {
        self.frames.iter_mut().find(|frame| frame.id == id)
    }

    /// Frames from innermost to outermost
    pub fn innermost_first(&self) -> impl Iterator<Item = &ScopeFrame> {
        self.frames.iter().rev()
    }

    pub fn innermost_first_mut(&mut self) -> impl Iterator<Item = &mut ScopeFrame> {
        self.frames.iter_mut().rev()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ScopeSnapshot {
        ScopeSnapshot {
            was_enabled: false,
            plugins: PluginChain::new(),
        }
    }

    #[test]
    fn test_open_close_nesting() {
        let mut stack = ScopeStack::new();
        let outer = stack.open(snapshot());
        let inner = stack.open(snapshot());
        assert_eq!(stack.depth(), 2);
        assert!(inner > outer);

        let closed = stack.close(outer).unwrap();
        let ids: Vec<_> = closed.iter().map(|frame| frame.id).collect();
        assert_eq!(ids, vec![inner, outer]);
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.current().id, ScopeId::BASE);
    }

    #[test]
    fn test_close_unknown_scope() {
        let mut stack = ScopeStack::new();
        let scope = stack.open(snapshot());
        stack.close(scope).unwrap();

        assert!(matches!(stack.close(scope), Err(EngineError::ScopeNotOpen(_))));
        assert!(matches!(stack.close(ScopeId::BASE), Err(EngineError::ScopeNotOpen(0))));
    }

    #[test]
    fn test_unused_required_includes_retired() {
        let mut stack = ScopeStack::new();
        stack.open(snapshot());

        let frame = stack.current_mut();
        let mut used = MockDescriptor::new(ModuleKey::path("/proj/used.js"));
        used.required_use = true;
        used.mark_used();
        let mut unused = MockDescriptor::new(ModuleKey::path("/proj/unused.js"));
        unused.required_use = true;
        frame.descriptors.push(used);
        frame.descriptors.push(unused);
        frame.retire();

        assert!(frame.descriptors.is_empty());
        assert_eq!(frame.unused_required(), vec![ModuleKey::path("/proj/unused.js")]);
    }

    #[test]
    fn test_unused_required_reports_each_key_once() {
        let mut stack = ScopeStack::new();
        let frame = stack.base_mut();

        // two sessions retire `b` around `c`
        for path in ["/proj/b.js", "/proj/c.js"] {
            let mut descriptor = MockDescriptor::new(ModuleKey::path(path));
            descriptor.required_use = true;
            frame.descriptors.push(descriptor);
        }
        frame.retire();
        let mut again = MockDescriptor::new(ModuleKey::path("/proj/b.js"));
        again.required_use = true;
        frame.descriptors.push(again);
        frame.retire();

        assert_eq!(
            frame.unused_required(),
            vec![ModuleKey::path("/proj/b.js"), ModuleKey::path("/proj/c.js")]
        );
    }
}
