//! Core types for spark-dom.
//!
//! Identifiers shared by the descriptor model, the engine and the document
//! layer. They are small `Copy` handles; the data they point at lives in the
//! engine's fiber arena or in the [`Document`](crate::renderer::Document).

use std::any::TypeId;
use std::fmt;

// =============================================================================
// Fiber Identity
// =============================================================================

/// Identity of one committed node in the engine's tree.
///
/// Component instances are fibers, so this is also the instance id handed to
/// the scheduler. Ids are allocated from a monotonic counter and never reused:
/// a handle that outlives its instance can always be recognized as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId(pub(crate) u64);

impl FiberId {
    /// Raw numeric value (for logging).
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

// =============================================================================
// Document Node Handle
// =============================================================================

/// Handle to a node owned by a [`Document`](crate::renderer::Document).
///
/// The renderer never looks inside a node; it only passes handles back to the
/// document that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(pub u64);

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// =============================================================================
// Component Identity
// =============================================================================

/// Identity of a component function.
///
/// Every Rust function item and closure has its own type, so the `TypeId` of
/// the render function is a stable identity across renders. Function pointers
/// all share one type and are told apart by address. Two descriptors at the
/// same position with the same `ComponentId` reuse the same instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId {
    ty: TypeId,
    address: Option<usize>,
}

impl ComponentId {
    /// Identity of the function type `F`.
    pub fn of<F: 'static>() -> Self {
        Self {
            ty: TypeId::of::<F>(),
            address: None,
        }
    }

    /// Identity of a function pointer of type `F` at `address`.
    pub fn of_pointer<F: 'static>(address: usize) -> Self {
        Self {
            ty: TypeId::of::<F>(),
            address: Some(address),
        }
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Explicit reconciliation key for elements and components.
///
/// Keyed children are matched by key instead of by position, which lets the
/// engine move an existing subtree instead of rebuilding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key(value)
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first() {}
    fn second() {}

    #[test]
    fn test_component_id_distinguishes_functions() {
        fn id_of<F: 'static>(_: F) -> ComponentId {
            ComponentId::of::<F>()
        }

        assert_eq!(id_of(first), id_of(first));
        assert_ne!(id_of(first), id_of(second));
    }

    #[test]
    fn test_component_id_of_pointer_uses_address() {
        type Pointer = fn();
        let first_ptr: Pointer = first;
        let second_ptr: Pointer = second;

        assert_eq!(ComponentId::of::<Pointer>(), ComponentId::of::<Pointer>());
        assert_ne!(
            ComponentId::of_pointer::<Pointer>(first_ptr as usize),
            ComponentId::of_pointer::<Pointer>(second_ptr as usize)
        );
        assert_ne!(
            ComponentId::of::<Pointer>(),
            ComponentId::of_pointer::<Pointer>(first_ptr as usize)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(FiberId(7).to_string(), "f7");
        assert_eq!(NodeRef(3).to_string(), "n3");
        assert_eq!(Key::from("row-1").as_str(), "row-1");
    }
}
