use crate::host::{ConstraintHandle, ConstraintKind};

/// Cached host handles, one optional slot per [`ConstraintKind`].
///
/// The cache is advisory: a handle may go stale when the host drops the
/// constraint behind our back, so callers re-check it against the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstraintSlots([Option<ConstraintHandle>; ConstraintKind::COUNT]);

impl ConstraintSlots {
    #[inline]
    #[must_use]
    pub fn get(&self, kind: ConstraintKind) -> Option<ConstraintHandle> {
        self.0[kind.slot()]
    }

    #[inline]
    pub fn set(&mut self, kind: ConstraintKind, handle: ConstraintHandle) {
        self.0[kind.slot()] = Some(handle);
    }

    #[inline]
    pub fn take(&mut self, kind: ConstraintKind) -> Option<ConstraintHandle> {
        self.0[kind.slot()].take()
    }

    pub fn clear(&mut self) {
        self.0 = [None; ConstraintKind::COUNT];
    }

    /// Occupied slots in stack order.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (ConstraintKind, ConstraintHandle)> + '_ {
        ConstraintKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|h| (kind, h)))
    }
}
