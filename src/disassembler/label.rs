//! Branch labels and the provider contract that resolves them.
//!
//! A freshly decoded branch only knows its raw wire displacement; once a whole
//! method body has been decoded, displacements are rewritten into instruction-index
//! labels that stay valid while instructions are inserted, removed or resized.
//! Index labels remember which [`LabelProvider`] issued them so a label can never
//! be resolved against a different method body by accident.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::Result;

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`LabelProvider`] instance.
///
/// Each provider draws a fresh id from a process-wide counter, so two method
/// bodies never share an id even when one is dropped and another reuses its
/// allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId(u64);

impl ProviderId {
    /// Allocates a new, process-unique provider id.
    #[must_use]
    pub fn next() -> Self {
        ProviderId(NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// Raw signed displacement from the end of the branch instruction, as
    /// decoded from the wire. Carries no provider context.
    Offset(i32),
    /// A slot in the owning provider's label table. The slot tracks an
    /// instruction index and survives edits to the instruction list.
    Index {
        /// Slot in the provider's label table
        slot: usize,
        /// The provider that issued this label
        provider: ProviderId,
    },
}

impl Label {
    /// Returns `true` for index-based labels.
    #[must_use]
    pub fn is_index(&self) -> bool {
        matches!(self, Label::Index { .. })
    }

    /// Returns `true` if this label was issued by `provider`.
    #[must_use]
    pub fn issued_by(&self, provider: ProviderId) -> bool {
        matches!(self, Label::Index { provider: p, .. } if *p == provider)
    }
}

/// Resolves index labels against a concrete instruction stream.
///
/// Implemented by method bodies; every lookup validates that the label was
/// issued by this provider and that its slot still points at a live
/// instruction.
pub trait LabelProvider {
    /// The identity checked against [`Label::Index`] labels.
    fn provider_id(&self) -> ProviderId;

    /// Instruction index a label currently refers to.
    ///
    /// ## Errors
    /// Returns [`Error::ForeignLabel`](crate::Error::ForeignLabel) for labels
    /// from another provider and
    /// [`Error::DanglingLabel`](crate::Error::DanglingLabel) when the labeled
    /// instruction has been removed.
    fn index_of(&self, label: Label) -> Result<usize>;

    /// Byte offset of the labeled instruction from the start of the stream.
    fn byte_address(&self, label: Label) -> Result<usize>;

    /// Signed displacement from the end of the instruction at `from_index` to
    /// the labeled instruction, measured in encoded bytes.
    fn relative_address(&self, from_index: usize, label: Label) -> Result<i32>;
}
