//! What each node kind pulls into the graph.
//!
//! Static edges are fixed by the node kind. A constructed type's vtable slot
//! targets are conditional on the slot being used somewhere. Dictionaries
//! are dynamic: their contents grow as shared code is compiled.

use std::collections::HashMap;

use tracing::trace;

use ilaot_core::{CompilationOptions, MethodId, TypeFlavor, TypeId, TypeSystem, VTablePolicy};

use super::vtable::declared_slots;
use super::{Helper, NodeFactory, NodeId, NodeKind, VTableLayouts, mangled_name};
use crate::codegen::{MethodBody, MethodCompiler};
use crate::generic::{DictionaryLayouts, GenericContextOwner, LookupContext};
use crate::graph::DependencyContext;
use crate::Error;

/// Side effect of marking a node, applied between marking steps.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GraphEvent {
    /// A canonical slot-defining method is called through a vtable.
    VirtualSlotUsed(MethodId),
}

/// Whether instances of `ty` run shared code that reads a type dictionary.
pub(crate) fn shares_code(types: &dyn TypeSystem, ty: TypeId) -> bool {
    !types.type_instantiation(ty).is_empty() && types.canonical_type(ty) != ty
}

/// Mutable state of one analysis: node interning, vtable and dictionary
/// layouts, and every compiled body.
pub struct GraphContext<'a> {
    pub(crate) types: &'a dyn TypeSystem,
    pub(crate) options: CompilationOptions,
    pub(crate) factory: NodeFactory,
    pub(crate) vtables: VTableLayouts,
    pub(crate) layouts: DictionaryLayouts,
    pub(crate) bodies: HashMap<NodeId, MethodBody>,
    codegen: &'a mut dyn MethodCompiler,
}

impl<'a> GraphContext<'a> {
    pub fn new(
        types: &'a dyn TypeSystem,
        codegen: &'a mut dyn MethodCompiler,
        options: CompilationOptions,
    ) -> Self {
        Self {
            types,
            vtables: VTableLayouts::new(options.vtable_policy),
            options,
            factory: NodeFactory::new(),
            layouts: DictionaryLayouts::new(),
            bodies: HashMap::new(),
            codegen,
        }
    }

    pub fn lookup_context(&self) -> LookupContext<'_> {
        LookupContext {
            types: self.types,
            options: &self.options,
            factory: &self.factory,
            vtables: &self.vtables,
        }
    }

    fn full_vtables(&self) -> bool {
        self.options.vtable_policy == VTablePolicy::Full
    }

    /// Every slot implementation of `ty` paired with the use that makes it
    /// reachable: vtable slots down the base chain, then interface methods.
    fn implementations(&self, ty: TypeId) -> Vec<(NodeId, NodeId)> {
        let types = self.types;
        let f = &self.factory;
        declared_slots(types, ty)
            .into_iter()
            .chain(types.interface_methods(ty))
            .filter_map(|decl| {
                let implementation = types.resolve_virtual(ty, decl)?;
                Some((
                    f.vtable_slot_target(types, ty, implementation),
                    f.virtual_method_use(types, decl),
                ))
            })
            .collect()
    }

    fn compile_method(&mut self, node: NodeId, method: MethodId) -> Result<Vec<NodeId>, Error> {
        let types = self.types;
        let body = self
            .codegen
            .compile(types, method)
            .map_err(|source| Error::Codegen {
                method: types.method_name(method),
                source,
            })?;

        let f = &self.factory;
        let mut deps = Vec::new();
        for reloc in &body.relocations {
            if reloc.target.target(f, types).is_none() {
                return Err(Error::UnaddressableReference {
                    method: types.method_name(method),
                    reference: reloc.target.describe(types),
                });
            }
            deps.extend(reloc.target.dependencies(f, types));
        }
        for reference in &body.references {
            deps.extend(reference.dependencies(f, types));
        }

        if types.is_shared_method(method) {
            let owner = GenericContextOwner::for_shared_method(types, method);
            for &lookup in &body.generic_lookups {
                self.layouts.register(types, owner, lookup);
            }
        }

        trace!(
            method = %types.method_name(method),
            bytes = body.code.len(),
            relocs = body.relocations.len(),
            lookups = body.generic_lookups.len(),
            "compiled"
        );
        self.bodies.insert(node, body);
        Ok(deps)
    }
}

impl DependencyContext for GraphContext<'_> {
    type Node = NodeId;
    type Event = GraphEvent;
    type Error = Error;

    fn on_marked(&self, node: NodeId, events: &mut Vec<GraphEvent>) {
        if let NodeKind::VirtualMethodUse(slot) = self.factory.kind(node) {
            events.push(GraphEvent::VirtualSlotUsed(slot));
        }
    }

    fn apply_event(&mut self, event: GraphEvent) {
        match event {
            GraphEvent::VirtualSlotUsed(slot) => {
                self.vtables.use_slot(self.types, slot);
            }
        }
    }

    fn static_dependencies(&mut self, node: NodeId) -> Result<Vec<NodeId>, Error> {
        let types = self.types;
        let kind = self.factory.kind(node);
        if let NodeKind::MethodEntrypoint {
            method,
            unboxing: false,
        } = kind
        {
            return self.compile_method(node, method);
        }

        let f = &self.factory;
        let deps = match kind {
            NodeKind::ConstructedType(t) => {
                let mut deps = vec![f.intern(NodeKind::VTable(t))];
                if let Some(base) = types.base_type(t) {
                    deps.push(f.constructed_type(base));
                }
                if shares_code(types, t) {
                    deps.push(f.intern(NodeKind::TypeDictionary(t)));
                }
                if self.full_vtables() {
                    deps.extend(self.implementations(t).into_iter().map(|(target, _)| target));
                }
                deps
            }
            NodeKind::VirtualMethodUse(slot) => {
                let owner = types.owning_type(slot);
                if types.flavor(owner) == TypeFlavor::Interface {
                    Vec::new()
                } else {
                    vec![f.intern(NodeKind::VTable(owner))]
                }
            }
            NodeKind::MethodDictionary(m) => vec![f.intern(NodeKind::MethodEntrypoint {
                method: types.canonical_method(m),
                unboxing: false,
            })],
            NodeKind::MethodEntrypoint { method, .. } => {
                vec![f.intern(NodeKind::MethodEntrypoint {
                    method,
                    unboxing: false,
                })]
            }
            NodeKind::FatFunctionPointer { method, unboxing } => vec![
                f.intern(NodeKind::MethodEntrypoint {
                    method: types.canonical_method(method),
                    unboxing,
                }),
                f.generic_context(types, method),
            ],
            NodeKind::InterfaceDispatchCell(_) => vec![f.helper(Helper::InterfaceDispatch)],
            NodeKind::VirtualResolveStub(_) => vec![f.helper(Helper::VirtualResolve)],
            NodeKind::ThreadStaticIndex(_) => vec![f.helper(Helper::ThreadStaticBase)],
            NodeKind::ThreadStaticOffset(t) => vec![f.intern(NodeKind::ThreadStaticIndex(t))],
            NodeKind::ObjectAllocator(t) => {
                vec![f.constructed_type(t), f.helper(Helper::NewObject)]
            }
            NodeKind::ArrayAllocator(t) => vec![f.constructed_type(t), f.helper(Helper::NewArray)],
            NodeKind::MethodHandle(m) => vec![f.constructed_type(types.owning_type(m))],
            NodeKind::FieldHandle(field) => vec![f.constructed_type(types.field_owner(field))],
            NodeKind::Indirection(target) => vec![target],
            NodeKind::VTable(_)
            | NodeKind::TypeDictionary(_)
            | NodeKind::NonGcStatics(_)
            | NodeKind::GcStatics(_)
            | NodeKind::Helper(_) => Vec::new(),
        };
        Ok(deps)
    }

    fn conditional_dependencies(&mut self, node: NodeId) -> Result<Vec<(NodeId, NodeId)>, Error> {
        Ok(match self.factory.kind(node) {
            NodeKind::ConstructedType(t) if !self.full_vtables() => self.implementations(t),
            _ => Vec::new(),
        })
    }

    fn has_dynamic_dependencies(&self, node: NodeId) -> bool {
        matches!(
            self.factory.kind(node),
            NodeKind::TypeDictionary(_) | NodeKind::MethodDictionary(_)
        )
    }

    fn search_dynamic_dependencies(
        &mut self,
        node: NodeId,
        _marked: &[NodeId],
    ) -> Result<Vec<NodeId>, Error> {
        let types = self.types;
        let Some((owner, inst)) = GenericContextOwner::of_dictionary(types, self.factory.kind(node))
        else {
            return Ok(Vec::new());
        };
        let Some(layout) = self.layouts.get(owner) else {
            return Ok(Vec::new());
        };
        let cx = self.lookup_context();
        let deps: Vec<NodeId> = layout
            .entries()
            .flat_map(|lookup| lookup.dictionary_dependencies(&cx, &inst))
            .collect();
        trace!(
            dictionary = %mangled_name(&self.factory, types, node),
            deps = deps.len(),
            "dictionary searched"
        );
        Ok(deps)
    }
}
