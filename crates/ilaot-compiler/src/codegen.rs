//! Seam to the external code generator.
//!
//! The generator compiles one canonical method at a time and reports what the
//! code refers to. Concrete references become graph edges. Generic lookups
//! grow the dictionary layout of the method's generic context.

use ilaot_core::{MethodId, TypeId, TypeSystem};
use ilaot_object::RelocKind;

use crate::generic::GenericLookupResult;
use crate::nodes::{Helper, NodeFactory, NodeId, NodeKind};

/// Something compiled code refers to. Descriptors are concrete.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Reference {
    /// Direct call.
    Call(MethodId),
    /// Call through a vtable slot. Not addressable.
    VirtualCall(MethodId),
    /// Call through an interface dispatch cell.
    InterfaceCall(MethodId),
    /// Address of a method, e.g. for a delegate.
    AddressOf(MethodId),
    TypeHandle(TypeId),
    NewObject(TypeId),
    /// Allocation of the array type given.
    NewArray(TypeId),
    NonGcStatics(TypeId),
    GcStatics(TypeId),
    ThreadStatics(TypeId),
}

impl Reference {
    /// Node a relocation against this reference points at.
    pub fn target(&self, factory: &NodeFactory, types: &dyn TypeSystem) -> Option<NodeId> {
        Some(match *self {
            Self::Call(m) => factory.intern(NodeKind::MethodEntrypoint {
                method: types.canonical_method(m),
                unboxing: false,
            }),
            Self::AddressOf(m) => factory.method_entry(types, m, false),
            Self::VirtualCall(_) => return None,
            Self::InterfaceCall(m) => factory.intern(NodeKind::InterfaceDispatchCell(m)),
            Self::TypeHandle(t) | Self::NewObject(t) | Self::NewArray(t) => {
                factory.constructed_type(t)
            }
            Self::NonGcStatics(t) => factory.intern(NodeKind::NonGcStatics(t)),
            Self::GcStatics(t) => factory.intern(NodeKind::GcStatics(t)),
            Self::ThreadStatics(t) => factory.intern(NodeKind::ThreadStaticIndex(t)),
        })
    }

    /// Every node the reference forces into the graph.
    pub fn dependencies(&self, factory: &NodeFactory, types: &dyn TypeSystem) -> Vec<NodeId> {
        let mut deps: Vec<NodeId> = self.target(factory, types).into_iter().collect();
        match *self {
            Self::Call(m) if types.requires_instantiation_argument(m) => {
                deps.push(factory.generic_context(types, m));
            }
            Self::VirtualCall(m) | Self::InterfaceCall(m) => {
                deps.push(factory.virtual_method_use(types, m));
            }
            Self::NewObject(_) => deps.push(factory.helper(Helper::NewObject)),
            Self::NewArray(_) => deps.push(factory.helper(Helper::NewArray)),
            _ => {}
        }
        deps
    }

    pub fn describe(&self, types: &dyn TypeSystem) -> String {
        match *self {
            Self::Call(m) => format!("call {}", types.method_name(m)),
            Self::VirtualCall(m) => format!("callvirt {}", types.method_name(m)),
            Self::InterfaceCall(m) => format!("callinterface {}", types.method_name(m)),
            Self::AddressOf(m) => format!("ldftn {}", types.method_name(m)),
            Self::TypeHandle(t) => format!("ldtoken {}", types.type_name(t)),
            Self::NewObject(t) => format!("newobj {}", types.type_name(t)),
            Self::NewArray(t) => format!("newarr {}", types.type_name(t)),
            Self::NonGcStatics(t) => format!("statics {}", types.type_name(t)),
            Self::GcStatics(t) => format!("gcstatics {}", types.type_name(t)),
            Self::ThreadStatics(t) => format!("tls {}", types.type_name(t)),
        }
    }
}

/// Relocation inside a compiled body, relative to the start of its code.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BodyRelocation {
    pub offset: u32,
    pub kind: RelocKind,
    pub target: Reference,
    pub addend: i64,
}

/// Output of compiling one method.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodBody {
    pub code: Vec<u8>,
    pub alignment: u32,
    pub relocations: Vec<BodyRelocation>,
    /// References with no relocation of their own (e.g. virtual calls).
    pub references: Vec<Reference>,
    /// Lookups the shared code reads from its generic dictionary.
    pub generic_lookups: Vec<GenericLookupResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CodegenError {
    message: String,
}

impl CodegenError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// External code generator.
pub trait MethodCompiler {
    /// Compile the canonical form of a method.
    fn compile(&mut self, types: &dyn TypeSystem, method: MethodId)
    -> Result<MethodBody, CodegenError>;
}
