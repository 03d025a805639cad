//! Node identifiers for the reactive graph.
//!
//! Signals, computeds and effects live in separate arenas. Edges between
//! them are stored as ids, never as owning pointers, so a disposed node
//! simply leaves behind stale ids that lookups ignore.

use slotmap::new_key_type;

new_key_type! {
    /// Identifier of a plain signal in the signal arena.
    pub struct SignalId;
    /// Identifier of a computed value in the computed arena.
    pub struct ComputedId;
    /// Identifier of an effect in the effect arena.
    pub struct EffectId;
}

/// Something that can be read and therefore depended upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    Signal(SignalId),
    Computed(ComputedId),
}

/// Something that reads sources and must be told when they change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverId {
    Computed(ComputedId),
    Effect(EffectId),
}

/// Freshness of a computed or effect.
///
/// Ordered so that a node is only ever raised, never lowered, by
/// propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeState {
    /// The cached value (or last run) is up to date.
    Clean,

    /// A transitive dependency changed. Need to check the direct
    /// computed sources before deciding.
    MaybeDirty,

    /// A direct dependency changed. Must recompute or rerun.
    Dirty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_ordered_by_staleness() {
        assert!(NodeState::Clean < NodeState::MaybeDirty);
        assert!(NodeState::MaybeDirty < NodeState::Dirty);
    }
}
