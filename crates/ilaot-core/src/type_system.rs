//! Descriptor handles and the type-system oracle.
//!
//! The back end never inspects managed types itself. It holds opaque
//! descriptor handles and asks a [`TypeSystem`] everything it needs to know:
//! identity, substitution, canonical forms, ordering, and a small set of
//! capability queries (vtable slots, static sizes, constructors).

use std::cmp::Ordering;

macro_rules! descriptor_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            #[inline]
            pub fn as_u32(self) -> u32 {
                self.0
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

descriptor_id!(
    /// Handle to a type descriptor. One handle per distinct type.
    TypeId
);
descriptor_id!(
    /// Handle to a method descriptor (owning type + method instantiation).
    MethodId
);
descriptor_id!(
    /// Handle to a field descriptor on a specific owning type.
    FieldId
);

/// Broad shape of a type, as far as the back end cares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeFlavor {
    #[default]
    Class,
    ValueType,
    Interface,
}

/// Substitution for generic parameters.
///
/// `type_args[i]` replaces type parameter `!i`, `method_args[i]` replaces
/// method parameter `!!i`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Instantiation {
    pub type_args: Vec<TypeId>,
    pub method_args: Vec<TypeId>,
}

impl Instantiation {
    pub fn new(type_args: Vec<TypeId>, method_args: Vec<TypeId>) -> Self {
        Self {
            type_args,
            method_args,
        }
    }

    /// Instantiation carrying only type arguments.
    pub fn for_type(type_args: Vec<TypeId>) -> Self {
        Self::new(type_args, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.type_args.is_empty() && self.method_args.is_empty()
    }
}

/// The type-system oracle.
///
/// Implementations must keep descriptor identity stable: instantiating the
/// same shape twice returns the same handle. The comparators are structural
/// and total; they return `Equal` only for identical descriptors.
pub trait TypeSystem {
    fn type_name(&self, ty: TypeId) -> String;
    fn method_name(&self, method: MethodId) -> String;
    fn field_name(&self, field: FieldId) -> String;

    fn compare_types(&self, a: TypeId, b: TypeId) -> Ordering;
    fn compare_methods(&self, a: MethodId, b: MethodId) -> Ordering;
    fn compare_fields(&self, a: FieldId, b: FieldId) -> Ordering;

    /// Whether the type still mentions an unresolved generic parameter.
    fn is_runtime_determined_type(&self, ty: TypeId) -> bool;
    fn is_runtime_determined_method(&self, method: MethodId) -> bool;
    fn is_runtime_determined_field(&self, field: FieldId) -> bool;

    fn instantiate_type(&self, ty: TypeId, inst: &Instantiation) -> TypeId;
    fn instantiate_method(&self, method: MethodId, inst: &Instantiation) -> MethodId;
    fn instantiate_field(&self, field: FieldId, inst: &Instantiation) -> FieldId;

    /// Shared canonical form: reference-type arguments collapse to `__Canon`.
    fn canonical_type(&self, ty: TypeId) -> TypeId;
    fn canonical_method(&self, method: MethodId) -> MethodId;

    /// Whether the canonical body of the method is shared across
    /// instantiations (it mentions `__Canon`).
    fn is_shared_method(&self, method: MethodId) -> bool;
    /// Whether shared code for this method needs its generic context passed
    /// explicitly rather than recovered from `this`.
    fn requires_instantiation_argument(&self, method: MethodId) -> bool;

    fn flavor(&self, ty: TypeId) -> TypeFlavor;
    fn base_type(&self, ty: TypeId) -> Option<TypeId>;
    fn type_instantiation(&self, ty: TypeId) -> Vec<TypeId>;
    /// `Some(X)` when `ty` is `Nullable<X>`.
    fn nullable_underlying(&self, ty: TypeId) -> Option<TypeId>;
    fn instance_size(&self, ty: TypeId) -> u32;
    fn non_gc_static_size(&self, ty: TypeId) -> u32;
    fn gc_static_count(&self, ty: TypeId) -> u32;
    fn thread_static_size(&self, ty: TypeId) -> u32;

    fn owning_type(&self, method: MethodId) -> TypeId;
    fn method_instantiation(&self, method: MethodId) -> Vec<TypeId>;
    fn parameter_count(&self, method: MethodId) -> u16;
    fn method_token(&self, method: MethodId) -> u32;

    /// Virtual slots introduced by `ty` itself, in declaration order.
    fn virtual_slots(&self, ty: TypeId) -> Vec<MethodId>;
    /// Interface methods `ty` (or any base) promises to implement.
    fn interface_methods(&self, ty: TypeId) -> Vec<MethodId>;
    /// The method that introduced the vtable slot `method` occupies.
    fn slot_defining_method(&self, method: MethodId) -> MethodId;
    /// Implementation of `decl` used by instances of `ty`.
    fn resolve_virtual(&self, ty: TypeId, decl: MethodId) -> Option<MethodId>;
    /// Implementation of interface method `decl` on value type `ty`.
    fn resolve_constrained(&self, ty: TypeId, decl: MethodId) -> Option<MethodId>;
    fn default_constructor(&self, ty: TypeId) -> Option<MethodId>;

    fn field_owner(&self, field: FieldId) -> TypeId;
    fn field_offset(&self, field: FieldId) -> u32;
    fn field_token(&self, field: FieldId) -> u32;
}
