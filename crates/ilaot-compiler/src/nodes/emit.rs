//! Object data for every data-bearing node.
//!
//! Layouts written here:
//!
//! - constructed type: `u32` instance size, `u16` vtable slot count, `u16`
//!   interface entry count, base type pointer, dictionary pointer, vtable
//!   slots, then `(u32 token, pointer)` interface entries
//! - dictionary: one pointer-sized slot per lookup, in layout order
//! - fat function pointer: entry point, generic context
//! - dispatch cell and resolve stub: helper pointer, natural-width method token
//! - allocator: helper pointer, type pointer
//! - handle: type pointer, `u32` token, padded to a pointer

use std::collections::HashMap;

use indexmap::IndexMap;

use ilaot_core::{Architecture, TypeId, TypeSystem, VTablePolicy};
use ilaot_object::{ObjectData, ObjectDataBuilder, RelocKind, SymbolRef};

use super::dependencies::shares_code;
use super::{Helper, NodeId, NodeKind, VTableLayouts, mangled_name};
use crate::codegen::MethodBody;
use crate::generic::{DictionaryLayouts, GenericContextOwner, GenericDictionary, LookupContext};
use crate::graph::DependencyAnalyzer;
use crate::invariants::{assert_has_data, ensure_compiled, ensure_symbol, ensure_u16_count};

/// Symbols of one compilation. Indices follow the deterministic node order,
/// so a [`SymbolRef`] means the same thing in every run over the same input.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: IndexMap<NodeId, String>,
}

impl SymbolTable {
    /// Symbols in the order given.
    pub fn new(entries: impl IntoIterator<Item = (NodeId, String)>) -> Self {
        Self {
            symbols: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, node: NodeId) -> Option<SymbolRef> {
        self.symbols
            .get_index_of(&node)
            .map(|index| SymbolRef::from_raw(index as u32))
    }

    /// # Panics
    /// Panics if `node` has no symbol.
    pub fn symbol(&self, node: NodeId) -> SymbolRef {
        ensure_symbol(self.symbols.get_index_of(&node), node)
    }

    pub fn name(&self, symbol: SymbolRef) -> Option<&str> {
        self.symbols
            .get_index(symbol.as_u32() as usize)
            .map(|(_, name)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolRef, NodeId, &str)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(index, (&node, name))| (SymbolRef::from_raw(index as u32), node, name.as_str()))
    }
}

/// Everything emission reads. Analysis is over; nothing here changes.
pub struct EmitContext<'a> {
    pub lookup: LookupContext<'a>,
    pub layouts: &'a DictionaryLayouts,
    pub bodies: &'a HashMap<NodeId, MethodBody>,
    pub analyzer: &'a DependencyAnalyzer<NodeId>,
    pub symbols: &'a SymbolTable,
    /// Offset of each type's thread statics within the thread static block.
    pub tls_offsets: &'a HashMap<TypeId, u32>,
}

impl EmitContext<'_> {
    fn types(&self) -> &dyn TypeSystem {
        self.lookup.types
    }

    fn vtables(&self) -> &VTableLayouts {
        self.lookup.vtables
    }

    fn pointer_size(&self) -> u32 {
        u32::from(self.lookup.options.target.pointer_size())
    }

    fn pointer_to(&self, builder: &mut ObjectDataBuilder, node: NodeId) {
        builder.emit_pointer_reloc(self.symbols.symbol(node), 0);
    }

    /// Object data of a marked, data-bearing node.
    ///
    /// # Panics
    /// Panics on nodes without data of their own.
    pub fn emit(&self, node: NodeId) -> ObjectData {
        let types = self.types();
        let f = self.lookup.factory;
        let kind = f.kind(node);
        assert_has_data(kind.has_data(), &mangled_name(f, types, node));

        let mut builder = ObjectDataBuilder::new(self.lookup.options.target);
        builder.require_initial_alignment(self.alignment_of(node, kind));
        builder.add_symbol(self.symbols.symbol(node));
        let b = &mut builder;

        match kind {
            NodeKind::ConstructedType(t) => self.emit_type(b, t),
            NodeKind::TypeDictionary(_) | NodeKind::MethodDictionary(_) => {
                if let Some(dictionary) = self.dictionary(kind) {
                    dictionary.emit(b, self.symbols);
                }
            }
            NodeKind::MethodEntrypoint {
                unboxing: false, ..
            } => self.emit_body(b, node),
            NodeKind::MethodEntrypoint {
                method,
                unboxing: true,
            } => {
                let target = f.intern(NodeKind::MethodEntrypoint {
                    method,
                    unboxing: false,
                });
                self.emit_unboxing_stub(b, self.symbols.symbol(target));
            }
            NodeKind::FatFunctionPointer { method, unboxing } => {
                let entry = f.intern(NodeKind::MethodEntrypoint {
                    method: types.canonical_method(method),
                    unboxing,
                });
                self.pointer_to(b, entry);
                self.pointer_to(b, f.generic_context(types, method));
            }
            NodeKind::InterfaceDispatchCell(m) => {
                self.pointer_to(b, f.helper(Helper::InterfaceDispatch));
                b.emit_natural_uint(u64::from(types.method_token(m)));
            }
            NodeKind::VirtualResolveStub(m) => {
                self.pointer_to(b, f.helper(Helper::VirtualResolve));
                b.emit_natural_uint(u64::from(types.method_token(m)));
            }
            NodeKind::NonGcStatics(t) => b.emit_zeros(types.non_gc_static_size(t) as usize),
            NodeKind::GcStatics(t) => {
                for _ in 0..types.gc_static_count(t) {
                    b.emit_zero_pointer();
                }
            }
            NodeKind::ThreadStaticIndex(_) => b.emit_zero_pointer(),
            NodeKind::ThreadStaticOffset(t) => {
                b.emit_uint(self.tls_offsets.get(&t).copied().unwrap_or_default())
            }
            NodeKind::ObjectAllocator(t) => {
                self.pointer_to(b, f.helper(Helper::NewObject));
                self.pointer_to(b, f.constructed_type(t));
            }
            NodeKind::ArrayAllocator(t) => {
                self.pointer_to(b, f.helper(Helper::NewArray));
                self.pointer_to(b, f.constructed_type(t));
            }
            NodeKind::MethodHandle(m) => {
                self.pointer_to(b, f.constructed_type(types.owning_type(m)));
                b.emit_uint(types.method_token(m));
                b.pad_alignment(self.pointer_size());
            }
            NodeKind::FieldHandle(field) => {
                self.pointer_to(b, f.constructed_type(types.field_owner(field)));
                b.emit_uint(types.field_token(field));
                b.pad_alignment(self.pointer_size());
            }
            NodeKind::Indirection(target) => self.pointer_to(b, target),
            NodeKind::VTable(_) | NodeKind::VirtualMethodUse(_) | NodeKind::Helper(_) => {}
        }
        builder.finalize()
    }

    fn alignment_of(&self, node: NodeId, kind: NodeKind) -> u32 {
        match kind {
            NodeKind::MethodEntrypoint {
                method,
                unboxing: false,
            } => {
                let body = ensure_compiled(self.bodies.get(&node), &self.types().method_name(method));
                body.alignment.max(1)
            }
            NodeKind::MethodEntrypoint { unboxing: true, .. } | NodeKind::ThreadStaticOffset(_) => 4,
            NodeKind::NonGcStatics(_) => 8,
            _ => self.pointer_size(),
        }
    }

    fn emit_type(&self, b: &mut ObjectDataBuilder, ty: TypeId) {
        let types = self.types();
        let f = self.lookup.factory;
        let full = self.vtables().policy() == VTablePolicy::Full;

        let slots = self.vtables().slots(types, ty);
        let mut interfaces: Vec<_> = types
            .interface_methods(ty)
            .into_iter()
            .filter(|&decl| full || self.analyzer.is_marked(f.virtual_method_use(types, decl)))
            .filter_map(|decl| Some((decl, types.resolve_virtual(ty, decl)?)))
            .collect();
        interfaces.sort_by(|&(a, _), &(b, _)| types.compare_methods(a, b));

        b.emit_uint(types.instance_size(ty));
        let name = types.type_name(ty);
        b.emit_ushort(ensure_u16_count(slots.len(), "vtable slots", &name));
        b.emit_ushort(ensure_u16_count(interfaces.len(), "interface entries", &name));
        match types.base_type(ty) {
            Some(base) => self.pointer_to(b, f.constructed_type(base)),
            None => b.emit_zero_pointer(),
        }
        if shares_code(types, ty) {
            self.pointer_to(b, f.intern(NodeKind::TypeDictionary(ty)));
        } else {
            b.emit_zero_pointer();
        }

        for slot in slots {
            match types.resolve_virtual(ty, slot) {
                Some(implementation) => {
                    self.pointer_to(b, f.vtable_slot_target(types, ty, implementation))
                }
                None => b.emit_zero_pointer(),
            }
        }
        for (decl, implementation) in interfaces {
            b.emit_uint(types.method_token(decl));
            b.pad_alignment(self.pointer_size());
            self.pointer_to(b, f.vtable_slot_target(types, ty, implementation));
        }
    }

    fn emit_body(&self, b: &mut ObjectDataBuilder, node: NodeId) {
        let types = self.types();
        let f = self.lookup.factory;
        let body = ensure_compiled(self.bodies.get(&node), &mangled_name(f, types, node));
        b.emit_bytes(&body.code);
        for reloc in &body.relocations {
            // Unaddressable references fail analysis; every target here exists.
            if let Some(target) = reloc.target.target(f, types) {
                b.add_reloc_at(reloc.offset, self.symbols.symbol(target), reloc.kind, reloc.addend);
            }
        }
    }

    /// Tail jump to the unboxed entry point.
    fn emit_unboxing_stub(&self, b: &mut ObjectDataBuilder, target: SymbolRef) {
        match self.lookup.options.target.architecture {
            Architecture::X64 | Architecture::X86 => {
                b.emit_byte(0xE9);
                b.emit_reloc(target, RelocKind::Rel32, -4);
            }
            Architecture::Arm64 => {
                b.emit_reloc(target, RelocKind::Arm64Branch26, 0);
                b.emit_uint(0x1400_0000);
            }
            Architecture::Arm => {
                b.emit_reloc(target, RelocKind::ThumbBranch24, 0);
                b.emit_uint(0xB800_F000);
            }
        }
    }

    /// Concrete dictionary for a dictionary node. Owners whose shared code
    /// performs no lookups get an empty one.
    pub fn dictionary(&self, kind: NodeKind) -> Option<GenericDictionary> {
        let (owner, inst) = GenericContextOwner::of_dictionary(self.types(), kind)?;
        Some(match self.layouts.get(owner) {
            Some(layout) => GenericDictionary::build(layout, &self.lookup, inst),
            None => GenericDictionary::empty(owner, inst),
        })
    }
}
