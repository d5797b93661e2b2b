//! Dependency nodes: every artifact the back end can emit or reference.
//!
//! - `factory` - interning of node kinds into stable handles
//! - `dependencies` - what each node kind pulls into the graph
//! - `vtable` - lazily grown vtable layouts
//! - `emit` - object data for every data-bearing node

mod dependencies;
mod emit;
mod factory;
mod vtable;


use std::cmp::Ordering;
use std::fmt;

use ilaot_core::{FieldId, MethodId, TypeId, TypeSystem};

pub use dependencies::{GraphContext, GraphEvent};
pub use emit::{EmitContext, SymbolTable};
pub use factory::NodeFactory;
pub use vtable::{VTableLayouts, declared_slots, vtable_start};

/// Stable handle of an interned node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) fn from_raw(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Runtime helpers referenced by generated data. Always external.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum Helper {
    NewObject,
    NewArray,
    InterfaceDispatch,
    VirtualResolve,
    ThreadStaticBase,
    MissingDefaultConstructor,
}

impl Helper {
    pub fn name(self) -> &'static str {
        match self {
            Self::NewObject => "RhpNewObject",
            Self::NewArray => "RhpNewArray",
            Self::InterfaceDispatch => "RhpInterfaceDispatch",
            Self::VirtualResolve => "RhpResolveVirtual",
            Self::ThreadStaticBase => "RhpGetThreadStaticBase",
            Self::MissingDefaultConstructor => "RhpThrowMissingDefaultConstructor",
        }
    }
}

/// What a node is. One node per distinct kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    ConstructedType(TypeId),
    VTable(TypeId),
    /// A virtual or interface slot is called somewhere. Keyed by the
    /// canonical slot-defining method.
    VirtualMethodUse(MethodId),
    TypeDictionary(TypeId),
    MethodDictionary(MethodId),
    MethodEntrypoint { method: MethodId, unboxing: bool },
    FatFunctionPointer { method: MethodId, unboxing: bool },
    InterfaceDispatchCell(MethodId),
    VirtualResolveStub(MethodId),
    NonGcStatics(TypeId),
    GcStatics(TypeId),
    ThreadStaticIndex(TypeId),
    ThreadStaticOffset(TypeId),
    ObjectAllocator(TypeId),
    ArrayAllocator(TypeId),
    MethodHandle(MethodId),
    FieldHandle(FieldId),
    Indirection(NodeId),
    Helper(Helper),
}

impl NodeKind {
    /// Total-order class tag: declaration order.
    pub fn class(&self) -> u8 {
        match self {
            Self::ConstructedType(_) => 0,
            Self::VTable(_) => 1,
            Self::VirtualMethodUse(_) => 2,
            Self::TypeDictionary(_) => 3,
            Self::MethodDictionary(_) => 4,
            Self::MethodEntrypoint { .. } => 5,
            Self::FatFunctionPointer { .. } => 6,
            Self::InterfaceDispatchCell(_) => 7,
            Self::VirtualResolveStub(_) => 8,
            Self::NonGcStatics(_) => 9,
            Self::GcStatics(_) => 10,
            Self::ThreadStaticIndex(_) => 11,
            Self::ThreadStaticOffset(_) => 12,
            Self::ObjectAllocator(_) => 13,
            Self::ArrayAllocator(_) => 14,
            Self::MethodHandle(_) => 15,
            Self::FieldHandle(_) => 16,
            Self::Indirection(_) => 17,
            Self::Helper(_) => 18,
        }
    }

    /// Whether the node produces object data of its own.
    pub fn has_data(&self) -> bool {
        !matches!(
            self,
            Self::VTable(_) | Self::VirtualMethodUse(_) | Self::Helper(_)
        )
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::Helper(_))
    }
}

/// Deterministic node order: class tag, then descriptors through the
/// oracle. Never by handle.
pub fn compare_nodes(
    factory: &NodeFactory,
    types: &dyn TypeSystem,
    a: NodeId,
    b: NodeId,
) -> Ordering {
    use NodeKind as K;

    if a == b {
        return Ordering::Equal;
    }
    let (ka, kb) = (factory.kind(a), factory.kind(b));
    ka.class().cmp(&kb.class()).then_with(|| {
        match (ka, kb) {
            (K::ConstructedType(x), K::ConstructedType(y))
            | (K::VTable(x), K::VTable(y))
            | (K::TypeDictionary(x), K::TypeDictionary(y))
            | (K::NonGcStatics(x), K::NonGcStatics(y))
            | (K::GcStatics(x), K::GcStatics(y))
            | (K::ThreadStaticIndex(x), K::ThreadStaticIndex(y))
            | (K::ThreadStaticOffset(x), K::ThreadStaticOffset(y))
            | (K::ObjectAllocator(x), K::ObjectAllocator(y))
            | (K::ArrayAllocator(x), K::ArrayAllocator(y)) => types.compare_types(x, y),
            (K::VirtualMethodUse(x), K::VirtualMethodUse(y))
            | (K::MethodDictionary(x), K::MethodDictionary(y))
            | (K::InterfaceDispatchCell(x), K::InterfaceDispatchCell(y))
            | (K::VirtualResolveStub(x), K::VirtualResolveStub(y))
            | (K::MethodHandle(x), K::MethodHandle(y)) => types.compare_methods(x, y),
            (
                K::MethodEntrypoint {
                    method: x,
                    unboxing: ux,
                },
                K::MethodEntrypoint {
                    method: y,
                    unboxing: uy,
                },
            )
            | (
                K::FatFunctionPointer {
                    method: x,
                    unboxing: ux,
                },
                K::FatFunctionPointer {
                    method: y,
                    unboxing: uy,
                },
            ) => types.compare_methods(x, y).then(ux.cmp(&uy)),
            (K::FieldHandle(x), K::FieldHandle(y)) => types.compare_fields(x, y),
            (K::Indirection(x), K::Indirection(y)) => compare_nodes(factory, types, x, y),
            (K::Helper(x), K::Helper(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        }
    })
}

/// Symbol name of a node. Deterministic and collision-free.
pub fn mangled_name(factory: &NodeFactory, types: &dyn TypeSystem, node: NodeId) -> String {
    match factory.kind(node) {
        NodeKind::ConstructedType(t) => format!("type:{}", types.type_name(t)),
        NodeKind::VTable(t) => format!("vtable:{}", types.type_name(t)),
        NodeKind::VirtualMethodUse(m) => format!("vuse:{}", types.method_name(m)),
        NodeKind::TypeDictionary(t) => format!("dict:{}", types.type_name(t)),
        NodeKind::MethodDictionary(m) => format!("mdict:{}", types.method_name(m)),
        NodeKind::MethodEntrypoint { method, unboxing } => {
            let prefix = if unboxing { "unbox" } else { "entry" };
            format!("{prefix}:{}", types.method_name(method))
        }
        NodeKind::FatFunctionPointer { method, unboxing } => {
            let prefix = if unboxing { "fatunbox" } else { "fat" };
            format!("{prefix}:{}", types.method_name(method))
        }
        NodeKind::InterfaceDispatchCell(m) => format!("dispatch:{}", types.method_name(m)),
        NodeKind::VirtualResolveStub(m) => format!("vresolve:{}", types.method_name(m)),
        NodeKind::NonGcStatics(t) => format!("statics:{}", types.type_name(t)),
        NodeKind::GcStatics(t) => format!("gcstatics:{}", types.type_name(t)),
        NodeKind::ThreadStaticIndex(t) => format!("tlsindex:{}", types.type_name(t)),
        NodeKind::ThreadStaticOffset(t) => format!("tlsoffset:{}", types.type_name(t)),
        NodeKind::ObjectAllocator(t) => format!("alloc:{}", types.type_name(t)),
        NodeKind::ArrayAllocator(t) => format!("newarr:{}", types.type_name(t)),
        NodeKind::MethodHandle(m) => format!("mhandle:{}", types.method_name(m)),
        NodeKind::FieldHandle(f) => format!("fhandle:{}", types.field_name(f)),
        NodeKind::Indirection(target) => {
            format!("indirect:{}", mangled_name(factory, types, target))
        }
        NodeKind::Helper(h) => h.name().to_owned(),
    }
}
