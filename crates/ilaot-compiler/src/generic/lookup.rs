//! Generic lookup results: one piece of instantiation-specific information
//! a dictionary slot can hold.
//!
//! Each variant wraps runtime-determined descriptors. Given a total
//! substitution it either resolves to a node (pointer-valued variants) or
//! computes a scalar.

use std::cmp::Ordering;

use ilaot_core::{
    CompilationOptions, FieldId, Instantiation, MethodId, TypeId, TypeSystem, VTablePolicy,
};
use ilaot_object::ObjectDataBuilder;

use super::LookupContext;
use crate::invariants::{
    debug_assert_runtime_determined, ensure_concrete_substitution, ensure_vtable_slot,
    panic_not_pointer_valued, panic_not_scalar,
};
use crate::nodes::{Helper, NodeId, NodeKind, SymbolTable};

/// Addend tag on a pointer to a [`NodeKind::FatFunctionPointer`].
pub const FAT_POINTER_TAG: i64 = 2;
/// Addend tag on a conditionally-indirect pointer that goes through a cell.
pub const INDIRECTION_TAG: i64 = 1;

/// How a dictionary slot refers to its target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ReferenceKind {
    Direct,
    /// Pointer to an indirection cell holding the target's address.
    Indirect,
    /// Indirect, with [`INDIRECTION_TAG`] set so consumers can tell.
    ConditionalIndirect,
}

/// Direction of a calling-convention converter thunk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum ConverterKind {
    StandardToGeneric,
    GenericToStandard,
}

impl ConverterKind {
    fn bit(self) -> i64 {
        match self {
            Self::StandardToGeneric => 0,
            Self::GenericToStandard => 1,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::StandardToGeneric => "StandardToGeneric",
            Self::GenericToStandard => "GenericToStandard",
        }
    }
}

/// Resolved value of one dictionary slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DictionaryEntry {
    Pointer { target: NodeId, addend: i64 },
    Scalar(i64),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GenericLookupResult {
    TypeHandle(TypeId),
    UnwrapNullableType(TypeId),
    FieldOffset(FieldId),
    VTableOffset(MethodId),
    MethodHandle(MethodId),
    FieldHandle(FieldId),
    MethodDictionary(MethodId),
    MethodEntry {
        method: MethodId,
        unboxing: bool,
    },
    VirtualDispatchCell(MethodId),
    VirtualResolve(MethodId),
    NonGcStaticBase(TypeId),
    GcStaticBase(TypeId),
    ThreadStaticIndex(TypeId),
    ThreadStaticOffset(TypeId),
    ObjectAllocator(TypeId),
    ArrayAllocator(TypeId),
    DefaultConstructor(TypeId),
    CallingConventionConverter {
        kind: ConverterKind,
        method: MethodId,
    },
    TypeSize(TypeId),
    ConstrainedMethodUse {
        constrained: TypeId,
        method: MethodId,
        direct_call: bool,
    },
}

fn rd_type(types: &dyn TypeSystem, ty: TypeId, variant: &str) -> TypeId {
    debug_assert_runtime_determined(types.is_runtime_determined_type(ty), variant);
    ty
}

fn rd_method(types: &dyn TypeSystem, method: MethodId, variant: &str) -> MethodId {
    debug_assert_runtime_determined(types.is_runtime_determined_method(method), variant);
    method
}

fn rd_field(types: &dyn TypeSystem, field: FieldId, variant: &str) -> FieldId {
    debug_assert_runtime_determined(types.is_runtime_determined_field(field), variant);
    field
}

impl GenericLookupResult {
    pub fn type_handle(types: &dyn TypeSystem, ty: TypeId) -> Self {
        Self::TypeHandle(rd_type(types, ty, "TypeHandle"))
    }

    pub fn unwrap_nullable_type(types: &dyn TypeSystem, ty: TypeId) -> Self {
        Self::UnwrapNullableType(rd_type(types, ty, "UnwrapNullableType"))
    }

    pub fn field_offset(types: &dyn TypeSystem, field: FieldId) -> Self {
        Self::FieldOffset(rd_field(types, field, "FieldOffset"))
    }

    pub fn vtable_offset(types: &dyn TypeSystem, method: MethodId) -> Self {
        Self::VTableOffset(rd_method(types, method, "VTableOffset"))
    }

    pub fn method_handle(types: &dyn TypeSystem, method: MethodId) -> Self {
        Self::MethodHandle(rd_method(types, method, "MethodHandle"))
    }

    pub fn field_handle(types: &dyn TypeSystem, field: FieldId) -> Self {
        Self::FieldHandle(rd_field(types, field, "FieldHandle"))
    }

    pub fn method_dictionary(types: &dyn TypeSystem, method: MethodId) -> Self {
        Self::MethodDictionary(rd_method(types, method, "MethodDictionary"))
    }

    pub fn method_entry(types: &dyn TypeSystem, method: MethodId, unboxing: bool) -> Self {
        Self::MethodEntry {
            method: rd_method(types, method, "MethodEntry"),
            unboxing,
        }
    }

    pub fn virtual_dispatch_cell(types: &dyn TypeSystem, method: MethodId) -> Self {
        Self::VirtualDispatchCell(rd_method(types, method, "VirtualDispatchCell"))
    }

    pub fn virtual_resolve(types: &dyn TypeSystem, method: MethodId) -> Self {
        Self::VirtualResolve(rd_method(types, method, "VirtualResolve"))
    }

    pub fn non_gc_static_base(types: &dyn TypeSystem, ty: TypeId) -> Self {
        Self::NonGcStaticBase(rd_type(types, ty, "NonGcStaticBase"))
    }

    pub fn gc_static_base(types: &dyn TypeSystem, ty: TypeId) -> Self {
        Self::GcStaticBase(rd_type(types, ty, "GcStaticBase"))
    }

    pub fn thread_static_index(types: &dyn TypeSystem, ty: TypeId) -> Self {
        Self::ThreadStaticIndex(rd_type(types, ty, "ThreadStaticIndex"))
    }

    pub fn thread_static_offset(types: &dyn TypeSystem, ty: TypeId) -> Self {
        Self::ThreadStaticOffset(rd_type(types, ty, "ThreadStaticOffset"))
    }

    pub fn object_allocator(types: &dyn TypeSystem, ty: TypeId) -> Self {
        Self::ObjectAllocator(rd_type(types, ty, "ObjectAllocator"))
    }

    pub fn array_allocator(types: &dyn TypeSystem, array: TypeId) -> Self {
        Self::ArrayAllocator(rd_type(types, array, "ArrayAllocator"))
    }

    pub fn default_constructor(types: &dyn TypeSystem, ty: TypeId) -> Self {
        Self::DefaultConstructor(rd_type(types, ty, "DefaultConstructor"))
    }

    pub fn calling_convention_converter(
        types: &dyn TypeSystem,
        kind: ConverterKind,
        method: MethodId,
    ) -> Self {
        Self::CallingConventionConverter {
            kind,
            method: rd_method(types, method, "CallingConventionConverter"),
        }
    }

    pub fn type_size(types: &dyn TypeSystem, ty: TypeId) -> Self {
        Self::TypeSize(rd_type(types, ty, "TypeSize"))
    }

    pub fn constrained_method_use(
        types: &dyn TypeSystem,
        constrained: TypeId,
        method: MethodId,
        direct_call: bool,
    ) -> Self {
        debug_assert_runtime_determined(
            types.is_runtime_determined_type(constrained)
                || types.is_runtime_determined_method(method),
            "ConstrainedMethodUse",
        );
        Self::ConstrainedMethodUse {
            constrained,
            method,
            direct_call,
        }
    }

    /// Total-order class tag: declaration order.
    pub fn class(&self) -> u8 {
        match self {
            Self::TypeHandle(_) => 0,
            Self::UnwrapNullableType(_) => 1,
            Self::FieldOffset(_) => 2,
            Self::VTableOffset(_) => 3,
            Self::MethodHandle(_) => 4,
            Self::FieldHandle(_) => 5,
            Self::MethodDictionary(_) => 6,
            Self::MethodEntry { .. } => 7,
            Self::VirtualDispatchCell(_) => 8,
            Self::VirtualResolve(_) => 9,
            Self::NonGcStaticBase(_) => 10,
            Self::GcStaticBase(_) => 11,
            Self::ThreadStaticIndex(_) => 12,
            Self::ThreadStaticOffset(_) => 13,
            Self::ObjectAllocator(_) => 14,
            Self::ArrayAllocator(_) => 15,
            Self::DefaultConstructor(_) => 16,
            Self::CallingConventionConverter { .. } => 17,
            Self::TypeSize(_) => 18,
            Self::ConstrainedMethodUse { .. } => 19,
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Self::TypeHandle(_) => "TypeHandle",
            Self::UnwrapNullableType(_) => "UnwrapNullableType",
            Self::FieldOffset(_) => "FieldOffset",
            Self::VTableOffset(_) => "VTableOffset",
            Self::MethodHandle(_) => "MethodHandle",
            Self::FieldHandle(_) => "FieldHandle",
            Self::MethodDictionary(_) => "MethodDictionary",
            Self::MethodEntry { .. } => "MethodEntry",
            Self::VirtualDispatchCell(_) => "VirtualDispatchCell",
            Self::VirtualResolve(_) => "VirtualResolve",
            Self::NonGcStaticBase(_) => "NonGcStaticBase",
            Self::GcStaticBase(_) => "GcStaticBase",
            Self::ThreadStaticIndex(_) => "ThreadStaticIndex",
            Self::ThreadStaticOffset(_) => "ThreadStaticOffset",
            Self::ObjectAllocator(_) => "ObjectAllocator",
            Self::ArrayAllocator(_) => "ArrayAllocator",
            Self::DefaultConstructor(_) => "DefaultConstructor",
            Self::CallingConventionConverter { .. } => "CallingConventionConverter",
            Self::TypeSize(_) => "TypeSize",
            Self::ConstrainedMethodUse { .. } => "ConstrainedMethodUse",
        }
    }

    /// Structural order: class tag first, then fields through the oracle.
    /// `Equal` only for equal values.
    pub fn compare(&self, other: &Self, types: &dyn TypeSystem) -> Ordering {
        use GenericLookupResult as L;

        self.class().cmp(&other.class()).then_with(|| match (*self, *other) {
            (L::TypeHandle(a), L::TypeHandle(b))
            | (L::UnwrapNullableType(a), L::UnwrapNullableType(b))
            | (L::NonGcStaticBase(a), L::NonGcStaticBase(b))
            | (L::GcStaticBase(a), L::GcStaticBase(b))
            | (L::ThreadStaticIndex(a), L::ThreadStaticIndex(b))
            | (L::ThreadStaticOffset(a), L::ThreadStaticOffset(b))
            | (L::ObjectAllocator(a), L::ObjectAllocator(b))
            | (L::ArrayAllocator(a), L::ArrayAllocator(b))
            | (L::DefaultConstructor(a), L::DefaultConstructor(b))
            | (L::TypeSize(a), L::TypeSize(b)) => types.compare_types(a, b),
            (L::FieldOffset(a), L::FieldOffset(b)) | (L::FieldHandle(a), L::FieldHandle(b)) => {
                types.compare_fields(a, b)
            }
            (L::VTableOffset(a), L::VTableOffset(b))
            | (L::MethodHandle(a), L::MethodHandle(b))
            | (L::MethodDictionary(a), L::MethodDictionary(b))
            | (L::VirtualDispatchCell(a), L::VirtualDispatchCell(b))
            | (L::VirtualResolve(a), L::VirtualResolve(b)) => types.compare_methods(a, b),
            (
                L::MethodEntry {
                    method: a,
                    unboxing: ua,
                },
                L::MethodEntry {
                    method: b,
                    unboxing: ub,
                },
            ) => types.compare_methods(a, b).then(ua.cmp(&ub)),
            (
                L::CallingConventionConverter { kind: ka, method: a },
                L::CallingConventionConverter { kind: kb, method: b },
            ) => ka.cmp(&kb).then_with(|| types.compare_methods(a, b)),
            (
                L::ConstrainedMethodUse {
                    constrained: ta,
                    method: ma,
                    direct_call: da,
                },
                L::ConstrainedMethodUse {
                    constrained: tb,
                    method: mb,
                    direct_call: db,
                },
            ) => da
                .cmp(&db)
                .then_with(|| types.compare_types(ta, tb))
                .then_with(|| types.compare_methods(ma, mb)),
            _ => Ordering::Equal,
        })
    }

    /// Identifier built from the variant and its fields. Also the debug
    /// label of the slot.
    pub fn mangled_name(&self, types: &dyn TypeSystem) -> String {
        let variant = self.variant_name();
        match *self {
            Self::TypeHandle(t)
            | Self::UnwrapNullableType(t)
            | Self::NonGcStaticBase(t)
            | Self::GcStaticBase(t)
            | Self::ThreadStaticIndex(t)
            | Self::ThreadStaticOffset(t)
            | Self::ObjectAllocator(t)
            | Self::ArrayAllocator(t)
            | Self::DefaultConstructor(t)
            | Self::TypeSize(t) => format!("{variant}:{}", types.type_name(t)),
            Self::FieldOffset(f) | Self::FieldHandle(f) => {
                format!("{variant}:{}", types.field_name(f))
            }
            Self::VTableOffset(m)
            | Self::MethodHandle(m)
            | Self::MethodDictionary(m)
            | Self::VirtualDispatchCell(m)
            | Self::VirtualResolve(m) => format!("{variant}:{}", types.method_name(m)),
            Self::MethodEntry { method, unboxing } => {
                let flavor = if unboxing { "unboxing" } else { "exact" };
                format!("{variant}:{}:{flavor}", types.method_name(method))
            }
            Self::CallingConventionConverter { kind, method } => {
                format!("{variant}:{}:{}", kind.name(), types.method_name(method))
            }
            Self::ConstrainedMethodUse {
                constrained,
                method,
                direct_call,
            } => {
                let usage = if direct_call { "call" } else { "ldftn" };
                format!(
                    "{variant}:{}:{}:{usage}",
                    types.type_name(constrained),
                    types.method_name(method)
                )
            }
        }
    }

    /// Scalar variants write a computed value instead of a relocation.
    pub fn is_pointer_valued(&self) -> bool {
        !matches!(
            self,
            Self::FieldOffset(_)
                | Self::VTableOffset(_)
                | Self::CallingConventionConverter { .. }
                | Self::TypeSize(_)
        )
    }

    pub fn reference_kind(&self, options: &CompilationOptions) -> ReferenceKind {
        match self {
            Self::TypeHandle(_) | Self::UnwrapNullableType(_) | Self::MethodDictionary(_)
                if options.cross_module_generics =>
            {
                ReferenceKind::ConditionalIndirect
            }
            Self::NonGcStaticBase(_)
            | Self::GcStaticBase(_)
            | Self::ThreadStaticIndex(_)
            | Self::ThreadStaticOffset(_)
            | Self::ObjectAllocator(_)
            | Self::ArrayAllocator(_) => ReferenceKind::Indirect,
            _ => ReferenceKind::Direct,
        }
    }

    /// Node this lookup stands for under `inst`.
    ///
    /// # Panics
    /// Panics on scalar variants.
    pub fn resolve(&self, cx: &LookupContext<'_>, inst: &Instantiation) -> NodeId {
        let f = cx.factory;
        let types = cx.types;
        match *self {
            Self::TypeHandle(t) => f.constructed_type(cx.instantiate_type(t, inst)),
            Self::UnwrapNullableType(t) => {
                let t = cx.instantiate_type(t, inst);
                f.constructed_type(types.nullable_underlying(t).unwrap_or(t))
            }
            Self::MethodHandle(m) => f.intern(NodeKind::MethodHandle(cx.instantiate_method(m, inst))),
            Self::FieldHandle(fld) => f.intern(NodeKind::FieldHandle(cx.instantiate_field(fld, inst))),
            Self::MethodDictionary(m) => {
                f.intern(NodeKind::MethodDictionary(cx.instantiate_method(m, inst)))
            }
            Self::MethodEntry { method, unboxing } => {
                f.method_entry(types, cx.instantiate_method(method, inst), unboxing)
            }
            Self::VirtualDispatchCell(m) => {
                f.intern(NodeKind::InterfaceDispatchCell(cx.instantiate_method(m, inst)))
            }
            Self::VirtualResolve(m) => {
                f.intern(NodeKind::VirtualResolveStub(cx.instantiate_method(m, inst)))
            }
            Self::NonGcStaticBase(t) => f.intern(NodeKind::NonGcStatics(cx.instantiate_type(t, inst))),
            Self::GcStaticBase(t) => f.intern(NodeKind::GcStatics(cx.instantiate_type(t, inst))),
            Self::ThreadStaticIndex(t) => {
                f.intern(NodeKind::ThreadStaticIndex(cx.instantiate_type(t, inst)))
            }
            Self::ThreadStaticOffset(t) => {
                f.intern(NodeKind::ThreadStaticOffset(cx.instantiate_type(t, inst)))
            }
            Self::ObjectAllocator(t) => {
                f.intern(NodeKind::ObjectAllocator(cx.instantiate_type(t, inst)))
            }
            Self::ArrayAllocator(t) => f.intern(NodeKind::ArrayAllocator(cx.instantiate_type(t, inst))),
            Self::DefaultConstructor(t) => {
                let t = cx.instantiate_type(t, inst);
                match types.default_constructor(t) {
                    Some(ctor) => f.method_entry(types, ctor, false),
                    None => f.helper(Helper::MissingDefaultConstructor),
                }
            }
            Self::ConstrainedMethodUse {
                constrained,
                method,
                ..
            } => {
                let t = cx.instantiate_type(constrained, inst);
                let m = cx.instantiate_method(method, inst);
                match types.resolve_constrained(t, m) {
                    Some(implementation) => f.method_entry(types, implementation, false),
                    None => f.intern(NodeKind::InterfaceDispatchCell(m)),
                }
            }
            Self::FieldOffset(_)
            | Self::VTableOffset(_)
            | Self::CallingConventionConverter { .. }
            | Self::TypeSize(_) => panic_not_pointer_valued(&self.mangled_name(types)),
        }
    }

    /// Value of a scalar variant under `inst`.
    ///
    /// # Panics
    /// Panics on pointer-valued variants.
    pub fn scalar_value(&self, cx: &LookupContext<'_>, inst: &Instantiation) -> i64 {
        let types = cx.types;
        match *self {
            Self::FieldOffset(field) => i64::from(types.field_offset(cx.instantiate_field(field, inst))),
            Self::VTableOffset(method) => {
                let m = cx.instantiate_method(method, inst);
                let pointer_size = cx.options.target.pointer_size();
                let offset = cx.vtables.slot_offset(types, m, pointer_size);
                i64::from(ensure_vtable_slot(offset, &types.method_name(m)))
            }
            Self::CallingConventionConverter { kind, method } => {
                let m = cx.instantiate_method(method, inst);
                (i64::from(types.parameter_count(m)) << 1) | kind.bit()
            }
            Self::TypeSize(t) => i64::from(types.instance_size(cx.instantiate_type(t, inst))),
            _ => panic_not_scalar(&self.mangled_name(types)),
        }
    }

    /// Dependencies implied by the lookup's use, beyond what its slot points at.
    pub fn non_relocation_dependencies(
        &self,
        cx: &LookupContext<'_>,
        inst: &Instantiation,
    ) -> Vec<NodeId> {
        let types = cx.types;
        let full = cx.options.vtable_policy == VTablePolicy::Full;
        match *self {
            Self::VirtualDispatchCell(m) | Self::VirtualResolve(m) | Self::VTableOffset(m)
                if !full =>
            {
                let m = cx.instantiate_method(m, inst);
                vec![cx.factory.virtual_method_use(types, m)]
            }
            Self::ConstrainedMethodUse {
                constrained,
                method,
                ..
            } => {
                let t = cx.instantiate_type(constrained, inst);
                let m = cx.instantiate_method(method, inst);
                if types.resolve_constrained(t, m).is_none() && !full {
                    vec![cx.factory.virtual_method_use(types, m)]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    /// Resolved slot value under `inst`.
    pub fn dictionary_entry(&self, cx: &LookupContext<'_>, inst: &Instantiation) -> DictionaryEntry {
        if !self.is_pointer_valued() {
            return DictionaryEntry::Scalar(self.scalar_value(cx, inst));
        }
        let target = self.resolve(cx, inst);
        match self.reference_kind(cx.options) {
            ReferenceKind::Direct => {
                let fat = matches!(cx.factory.kind(target), NodeKind::FatFunctionPointer { .. });
                DictionaryEntry::Pointer {
                    target,
                    addend: if fat { FAT_POINTER_TAG } else { 0 },
                }
            }
            ReferenceKind::Indirect => DictionaryEntry::Pointer {
                target: cx.factory.indirection(target),
                addend: 0,
            },
            ReferenceKind::ConditionalIndirect => DictionaryEntry::Pointer {
                target: cx.factory.indirection(target),
                addend: INDIRECTION_TAG,
            },
        }
    }

    /// Everything a dictionary slot holding this lookup forces into the graph.
    pub fn dictionary_dependencies(&self, cx: &LookupContext<'_>, inst: &Instantiation) -> Vec<NodeId> {
        let mut deps = Vec::new();
        if self.is_pointer_valued()
            && let DictionaryEntry::Pointer { target, .. } = self.dictionary_entry(cx, inst)
        {
            deps.push(target);
        }
        deps.extend(self.non_relocation_dependencies(cx, inst));
        deps
    }

    /// Write the slot: a natural-width scalar or a pointer relocation.
    pub fn emit_dictionary_entry(
        &self,
        builder: &mut ObjectDataBuilder,
        cx: &LookupContext<'_>,
        symbols: &SymbolTable,
        inst: &Instantiation,
    ) {
        write_entry(builder, symbols, self.dictionary_entry(cx, inst));
    }
}

pub(crate) fn write_entry(builder: &mut ObjectDataBuilder, symbols: &SymbolTable, entry: DictionaryEntry) {
    match entry {
        DictionaryEntry::Scalar(value) => builder.emit_natural_int(value),
        DictionaryEntry::Pointer { target, addend } => {
            builder.emit_pointer_reloc(symbols.symbol(target), addend)
        }
    }
}

impl LookupContext<'_> {
    pub(crate) fn instantiate_type(&self, ty: TypeId, inst: &Instantiation) -> TypeId {
        let result = self.types.instantiate_type(ty, inst);
        ensure_concrete_substitution(!self.types.is_runtime_determined_type(result), || {
            self.types.type_name(result)
        });
        result
    }

    pub(crate) fn instantiate_method(&self, method: MethodId, inst: &Instantiation) -> MethodId {
        let result = self.types.instantiate_method(method, inst);
        ensure_concrete_substitution(!self.types.is_runtime_determined_method(result), || {
            self.types.method_name(result)
        });
        result
    }

    pub(crate) fn instantiate_field(&self, field: FieldId, inst: &Instantiation) -> FieldId {
        let result = self.types.instantiate_field(field, inst);
        ensure_concrete_substitution(!self.types.is_runtime_determined_field(result), || {
            self.types.field_name(result)
        });
        result
    }
}
