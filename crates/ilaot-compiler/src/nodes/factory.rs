//! Node interning.
//!
//! Interning is what makes "one node per kind" hold: asking for the same kind
//! twice returns the same [`NodeId`], and the graph dedups by handle.

use std::cell::RefCell;

use indexmap::IndexSet;

use ilaot_core::{MethodId, TypeFlavor, TypeId, TypeSystem};

use super::{Helper, NodeId, NodeKind};
use crate::invariants::ensure_node;

#[derive(Debug, Default)]
pub struct NodeFactory {
    nodes: RefCell<IndexSet<NodeKind>>,
}

impl NodeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, kind: NodeKind) -> NodeId {
        let (index, _) = self.nodes.borrow_mut().insert_full(kind);
        NodeId::from_raw(index as u32)
    }

    /// Look up a node without creating it.
    pub fn get(&self, kind: &NodeKind) -> Option<NodeId> {
        self.nodes
            .borrow()
            .get_index_of(kind)
            .map(|index| NodeId::from_raw(index as u32))
    }

    pub fn kind(&self, node: NodeId) -> NodeKind {
        ensure_node(self.nodes.borrow().get_index(node.index()).copied(), node)
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub fn constructed_type(&self, ty: TypeId) -> NodeId {
        self.intern(NodeKind::ConstructedType(ty))
    }

    pub fn helper(&self, helper: Helper) -> NodeId {
        self.intern(NodeKind::Helper(helper))
    }

    pub fn indirection(&self, target: NodeId) -> NodeId {
        self.intern(NodeKind::Indirection(target))
    }

    /// Callable address of `method`.
    ///
    /// Shared code that needs its generic context passed explicitly is
    /// reached through a fat function pointer; everything else through the
    /// canonical entry point.
    pub fn method_entry(&self, types: &dyn TypeSystem, method: MethodId, unboxing: bool) -> NodeId {
        if types.requires_instantiation_argument(method) {
            self.intern(NodeKind::FatFunctionPointer { method, unboxing })
        } else {
            self.intern(NodeKind::MethodEntrypoint {
                method: types.canonical_method(method),
                unboxing,
            })
        }
    }

    /// Entry point a vtable slot of `owner` points at. Slots never carry a
    /// fat pointer: the generic context comes from `this`.
    pub fn vtable_slot_target(
        &self,
        types: &dyn TypeSystem,
        owner: TypeId,
        implementation: MethodId,
    ) -> NodeId {
        let unboxing = types.flavor(owner) == TypeFlavor::ValueType;
        self.intern(NodeKind::MethodEntrypoint {
            method: types.canonical_method(implementation),
            unboxing,
        })
    }

    /// Use of the slot `decl` occupies, keyed canonically so shared and
    /// exact callers meet on the same node.
    pub fn virtual_method_use(&self, types: &dyn TypeSystem, decl: MethodId) -> NodeId {
        let slot = types.slot_defining_method(decl);
        self.intern(NodeKind::VirtualMethodUse(types.canonical_method(slot)))
    }

    /// Generic context shared code of `method` receives: its own method
    /// dictionary when it has a method instantiation, else the owning type.
    pub fn generic_context(&self, types: &dyn TypeSystem, method: MethodId) -> NodeId {
        if types.method_instantiation(method).is_empty() {
            self.constructed_type(types.owning_type(method))
        } else {
            self.intern(NodeKind::MethodDictionary(method))
        }
    }
}
