//! Version resolution scope.
//!
//! # Responsibility
//! - Hold the stack of version frames that decides which container versions
//!   a fetch sees and which version new records are pinned to.
//! - Restore the previous frame on every exit path through `VersionScope`.
//!
//! # Invariants
//! - The base frame can never be popped.
//! - A scope guard pops exactly the frame it pushed.

use crate::model::container::Container;
use crate::model::version::ItemVersion;
use crate::schema::content_type::ContentTypeRegistry;
use std::ops::{Deref, DerefMut};

/// How a frame selects versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersioningMode {
    /// Inherit the enclosing frame's version.
    Current,
    /// Pin the given version (overlaid on the enclosing one).
    Specific,
    /// Use exactly the given version, dropping axes pinned further out.
    Widen,
    /// Admit every version.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct VersionFrame {
    mode: VersioningMode,
    version: ItemVersion,
}

/// Explicit version-resolution handle threaded through collator calls.
#[derive(Debug, Clone)]
pub struct VersionContext {
    base: ItemVersion,
    frames: Vec<VersionFrame>,
}

impl Default for VersionContext {
    fn default() -> Self {
        Self::new(ItemVersion::new())
    }
}

impl VersionContext {
    /// Creates a context whose base frame is `base`.
    pub fn new(base: ItemVersion) -> Self {
        Self {
            base,
            frames: Vec::new(),
        }
    }

    pub fn push_state(&mut self, mode: VersioningMode, version: ItemVersion) {
        self.frames.push(VersionFrame { mode, version });
    }

    /// Pops the innermost frame; returns `false` when only the base is left.
    pub fn pop_state(&mut self) -> bool {
        self.frames.pop().is_some()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn mode(&self) -> VersioningMode {
        self.frames
            .iter()
            .rev()
            .map(|frame| frame.mode)
            .find(|mode| *mode != VersioningMode::Current)
            .unwrap_or(VersioningMode::Current)
    }

    /// Version currently in force.
    ///
    /// `All` frames reset to the abstract version, `Widen` frames replace
    /// it and `Specific` frames overlay their axes on what is in force.
    pub fn current_version(&self) -> ItemVersion {
        self.frames
            .iter()
            .fold(self.base.clone(), |current, frame| match frame.mode {
                VersioningMode::Current => current,
                VersioningMode::Specific => current.overlaid_with(&frame.version),
                VersioningMode::Widen => frame.version.clone(),
                VersioningMode::All => ItemVersion::new(),
            })
    }

    /// Pins `container` to `version` restricted to its type's axes.
    pub fn set_version(
        &self,
        registry: &ContentTypeRegistry,
        version: &ItemVersion,
        container: &mut Container,
    ) {
        container.version = registry.applicable_version(&container.data_type, version);
    }

    /// Pushes a frame and returns a guard that pops it when dropped.
    pub fn scoped(&mut self, mode: VersioningMode, version: ItemVersion) -> VersionScope<'_> {
        self.push_state(mode, version);
        VersionScope { ctx: self }
    }

    /// Runs `f` inside a frame; the frame is popped however `f` exits.
    pub fn with_scope<T>(
        &mut self,
        mode: VersioningMode,
        version: ItemVersion,
        f: impl FnOnce(&mut VersionContext) -> T,
    ) -> T {
        let mut scope = self.scoped(mode, version);
        f(&mut *scope)
    }
}

/// Guard over one pushed frame.
#[derive(Debug)]
pub struct VersionScope<'a> {
    ctx: &'a mut VersionContext,
}

impl Deref for VersionScope<'_> {
    type Target = VersionContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for VersionScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for VersionScope<'_> {
    fn drop(&mut self) {
        self.ctx.pop_state();
    }
}

#[cfg(test)]
mod tests {
    use super::{VersionContext, VersioningMode};
    use crate::model::version::ItemVersion;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn lang(value: &str) -> ItemVersion {
        ItemVersion::new().with("lang", value)
    }

    #[test]
    fn specific_frames_overlay_the_base() {
        let mut ctx = VersionContext::new(ItemVersion::new().with("stage", "live"));
        ctx.push_state(VersioningMode::Specific, lang("en"));
        assert_eq!(
            ctx.current_version(),
            ItemVersion::new().with("lang", "en").with("stage", "live")
        );
        assert!(ctx.pop_state());
        assert!(!ctx.pop_state());
        assert_eq!(ctx.current_version(), ItemVersion::new().with("stage", "live"));
    }

    #[test]
    fn widen_frames_replace_the_version_in_force() {
        let mut ctx = VersionContext::new(lang("en").with("stage", "live"));
        ctx.with_scope(VersioningMode::Widen, ItemVersion::new().with("stage", "live"), |wide| {
            assert_eq!(wide.current_version(), ItemVersion::new().with("stage", "live"));
            wide.with_scope(VersioningMode::Specific, lang("fr"), |inner| {
                assert_eq!(inner.current_version(), lang("fr").with("stage", "live"));
            });
        });
        assert_eq!(ctx.current_version(), lang("en").with("stage", "live"));
    }

    #[test]
    fn all_mode_admits_every_version() {
        let mut ctx = VersionContext::new(lang("en"));
        let scope = ctx.scoped(VersioningMode::All, ItemVersion::new());
        assert!(scope.current_version().is_empty());
        assert_eq!(scope.mode(), VersioningMode::All);
    }

    #[test]
    fn scope_guard_pops_on_early_return() {
        fn inner(ctx: &mut VersionContext) -> Result<(), String> {
            let scope = ctx.scoped(VersioningMode::Specific, lang("fr"));
            if scope.current_version().get("lang") == Some("fr") {
                return Err("stop".to_string());
            }
            Ok(())
        }

        let mut ctx = VersionContext::default();
        assert!(inner(&mut ctx).is_err());
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn scope_guard_pops_on_panic() {
        let mut ctx = VersionContext::default();
        let result = catch_unwind(AssertUnwindSafe(|| {
            ctx.with_scope(VersioningMode::Specific, lang("de"), |_| panic!("boom"))
        }));
        assert!(result.is_err());
        assert_eq!(ctx.depth(), 0);
        assert!(ctx.current_version().is_empty());
    }

    #[test]
    fn nested_scopes_stack_and_unwind() {
        let mut ctx = VersionContext::default();
        ctx.with_scope(VersioningMode::Specific, lang("en"), |outer| {
            outer.with_scope(
                VersioningMode::Specific,
                ItemVersion::new().with("stage", "draft"),
                |inner| {
                    assert_eq!(inner.depth(), 2);
                    assert_eq!(inner.current_version().len(), 2);
                },
            );
            assert_eq!(outer.current_version(), lang("en"));
        });
        assert_eq!(ctx.depth(), 0);
    }
}
