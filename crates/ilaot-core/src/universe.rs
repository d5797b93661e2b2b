//! An in-memory type system implementing [`TypeSystem`].
//!
//! Definitions (types, methods, fields) are registered up front. Constructed
//! descriptors are interned lazily, so an instantiation reached two different
//! ways still yields one handle.

use std::cell::RefCell;
use std::cmp::Ordering;

use indexmap::IndexSet;

use crate::interner::{Interner, Name};
use crate::invariants::{ensure_descriptor, ensure_substitution, panic_missing_slot_owner};
use crate::type_system::{FieldId, Instantiation, MethodId, TypeFlavor, TypeId, TypeSystem};

/// Index of a registered type definition.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TypeDefId(u32);

/// Index of a registered method definition.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MethodDefId(u32);

/// Index of a registered field definition.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FieldDefId(u32);

/// Description of a type definition to register.
#[derive(Clone, Debug, Default)]
pub struct TypeSpec<'a> {
    pub name: &'a str,
    pub generic_arity: u16,
    pub flavor: TypeFlavor,
    /// May mention the definition's own type parameters (`!i`).
    pub base: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub instance_size: u32,
    pub is_nullable: bool,
}

/// Description of a method definition to register.
#[derive(Clone, Debug, Default)]
pub struct MethodSpec<'a> {
    pub name: &'a str,
    pub generic_arity: u16,
    pub parameters: u16,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    pub is_constructor: bool,
    /// Virtual method this one overrides (no new slot).
    pub overrides: Option<MethodDefId>,
    /// Interface method this one implements.
    pub implements: Option<MethodDefId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FieldStorage {
    #[default]
    Instance,
    Static,
    GcStatic,
    ThreadStatic,
}

/// Description of a field definition to register.
#[derive(Clone, Debug, Default)]
pub struct FieldSpec<'a> {
    pub name: &'a str,
    pub storage: FieldStorage,
    pub size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum TypeShape {
    Named { def: TypeDefId, args: Box<[TypeId]> },
    TypeVar(u16),
    MethodVar(u16),
    Array(TypeId),
    Canon,
}

impl TypeShape {
    fn tag(&self) -> u8 {
        match self {
            Self::Named { .. } => 0,
            Self::TypeVar(_) => 1,
            Self::MethodVar(_) => 2,
            Self::Array(_) => 3,
            Self::Canon => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MethodShape {
    def: MethodDefId,
    owner: TypeId,
    args: Box<[TypeId]>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct FieldShape {
    def: FieldDefId,
    owner: TypeId,
}

#[derive(Debug)]
struct TypeDef {
    name: Name,
    arity: u16,
    flavor: TypeFlavor,
    base: Option<TypeId>,
    interfaces: Vec<TypeId>,
    instance_size: u32,
    is_nullable: bool,
    methods: Vec<MethodDefId>,
    fields: Vec<FieldDefId>,
}

#[derive(Debug)]
struct MethodDef {
    owner: TypeDefId,
    name: Name,
    arity: u16,
    parameters: u16,
    is_static: bool,
    is_virtual: bool,
    is_abstract: bool,
    is_constructor: bool,
    overrides: Option<MethodDefId>,
    implements: Option<MethodDefId>,
}

#[derive(Debug)]
struct FieldDef {
    name: Name,
    storage: FieldStorage,
    size: u32,
    offset: u32,
}

/// In-memory type system.
#[derive(Debug, Default)]
pub struct TypeUniverse {
    names: Interner,
    type_defs: Vec<TypeDef>,
    method_defs: Vec<MethodDef>,
    field_defs: Vec<FieldDef>,
    types: RefCell<IndexSet<TypeShape>>,
    methods: RefCell<IndexSet<MethodShape>>,
    fields: RefCell<IndexSet<FieldShape>>,
}

impl TypeUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_type(&mut self, spec: TypeSpec<'_>) -> TypeDefId {
        let id = TypeDefId(self.type_defs.len() as u32);
        let name = self.names.intern(spec.name);
        self.type_defs.push(TypeDef {
            name,
            arity: spec.generic_arity,
            flavor: spec.flavor,
            base: spec.base,
            interfaces: spec.interfaces,
            instance_size: spec.instance_size,
            is_nullable: spec.is_nullable,
            methods: Vec::new(),
            fields: Vec::new(),
        });
        id
    }

    pub fn define_method(&mut self, owner: TypeDefId, spec: MethodSpec<'_>) -> MethodDefId {
        let id = MethodDefId(self.method_defs.len() as u32);
        let name = self.names.intern(spec.name);
        self.method_defs.push(MethodDef {
            owner,
            name,
            arity: spec.generic_arity,
            parameters: spec.parameters,
            is_static: spec.is_static,
            is_virtual: spec.is_virtual,
            is_abstract: spec.is_abstract,
            is_constructor: spec.is_constructor,
            overrides: spec.overrides,
            implements: spec.implements,
        });
        self.type_defs[owner.0 as usize].methods.push(id);
        id
    }

    /// Register a field. Offsets are assigned sequentially per storage
    /// class, aligned to the field size (capped at 8).
    pub fn define_field(&mut self, owner: TypeDefId, spec: FieldSpec<'_>) -> FieldDefId {
        let id = FieldDefId(self.field_defs.len() as u32);
        let name = self.names.intern(spec.name);
        let end = self.type_defs[owner.0 as usize]
            .fields
            .iter()
            .map(|f| &self.field_defs[f.0 as usize])
            .filter(|f| f.storage == spec.storage)
            .map(|f| f.offset + f.size)
            .max()
            .unwrap_or(0);
        let align = spec.size.clamp(1, 8);
        let offset = end.div_ceil(align) * align;
        self.field_defs.push(FieldDef {
            name,
            storage: spec.storage,
            size: spec.size,
            offset,
        });
        self.type_defs[owner.0 as usize].fields.push(id);
        id
    }

    /// The type `def<args>`. Non-generic definitions take no arguments.
    pub fn named(&self, def: TypeDefId, args: &[TypeId]) -> TypeId {
        let arity = self.type_def(def).arity as usize;
        assert_eq!(
            args.len(),
            arity,
            "TypeUniverse: expected {arity} type arguments for {}",
            self.names.resolve(self.type_def(def).name)
        );
        self.intern_type(TypeShape::Named {
            def,
            args: args.into(),
        })
    }

    /// The definition instantiated over its own parameters (`List<!0>`).
    pub fn open(&self, def: TypeDefId) -> TypeId {
        let args: Vec<TypeId> = (0..self.type_def(def).arity)
            .map(|i| self.type_var(i))
            .collect();
        self.named(def, &args)
    }

    pub fn type_var(&self, index: u16) -> TypeId {
        self.intern_type(TypeShape::TypeVar(index))
    }

    pub fn method_var(&self, index: u16) -> TypeId {
        self.intern_type(TypeShape::MethodVar(index))
    }

    pub fn array_of(&self, element: TypeId) -> TypeId {
        self.intern_type(TypeShape::Array(element))
    }

    /// The universal canonical type standing in for any reference type.
    pub fn canon(&self) -> TypeId {
        self.intern_type(TypeShape::Canon)
    }

    pub fn method(&self, def: MethodDefId, owner: TypeId, args: &[TypeId]) -> MethodId {
        let arity = self.method_def(def).arity as usize;
        assert_eq!(args.len(), arity, "TypeUniverse: method arity mismatch");
        let mut methods = self.methods.borrow_mut();
        let (index, _) = methods.insert_full(MethodShape {
            def,
            owner,
            args: args.into(),
        });
        MethodId::from_raw(index as u32)
    }

    pub fn field(&self, def: FieldDefId, owner: TypeId) -> FieldId {
        let mut fields = self.fields.borrow_mut();
        let (index, _) = fields.insert_full(FieldShape { def, owner });
        FieldId::from_raw(index as u32)
    }

    fn intern_type(&self, shape: TypeShape) -> TypeId {
        let mut types = self.types.borrow_mut();
        let (index, _) = types.insert_full(shape);
        TypeId::from_raw(index as u32)
    }

    fn shape(&self, ty: TypeId) -> TypeShape {
        let found = self.types.borrow().get_index(ty.index()).cloned();
        ensure_descriptor(found, "type", ty.as_u32())
    }

    fn method_shape(&self, method: MethodId) -> MethodShape {
        let found = self.methods.borrow().get_index(method.index()).cloned();
        ensure_descriptor(found, "method", method.as_u32())
    }

    fn field_shape(&self, field: FieldId) -> FieldShape {
        let found = self.fields.borrow().get_index(field.index()).cloned();
        ensure_descriptor(found, "field", field.as_u32())
    }

    fn type_def(&self, def: TypeDefId) -> &TypeDef {
        &self.type_defs[def.0 as usize]
    }

    fn method_def(&self, def: MethodDefId) -> &MethodDef {
        &self.method_defs[def.0 as usize]
    }

    fn field_def(&self, def: FieldDefId) -> &FieldDef {
        &self.field_defs[def.0 as usize]
    }

    fn named_def(&self, ty: TypeId) -> Option<(TypeDefId, Box<[TypeId]>)> {
        match self.shape(ty) {
            TypeShape::Named { def, args } => Some((def, args)),
            _ => None,
        }
    }

    fn mentions(&self, ty: TypeId, pred: &dyn Fn(&TypeShape) -> bool) -> bool {
        let shape = self.shape(ty);
        if pred(&shape) {
            return true;
        }
        match shape {
            TypeShape::Named { args, .. } => args.iter().any(|&a| self.mentions(a, pred)),
            TypeShape::Array(element) => self.mentions(element, pred),
            _ => false,
        }
    }

    fn is_value_type(&self, ty: TypeId) -> bool {
        self.flavor(ty) == TypeFlavor::ValueType
    }

    fn contains_canon(&self, ty: TypeId) -> bool {
        self.mentions(ty, &|s: &TypeShape| matches!(s, TypeShape::Canon))
    }

    fn canonical_arg(&self, ty: TypeId) -> TypeId {
        if self.is_runtime_determined_type(ty) || self.is_value_type(ty) {
            self.canonical_type(ty)
        } else {
            self.canon()
        }
    }

    fn statics_size(&self, ty: TypeId, storage: FieldStorage) -> u32 {
        let Some((def, _)) = self.named_def(ty) else {
            return 0;
        };
        self.type_def(def)
            .fields
            .iter()
            .map(|&f| self.field_def(f))
            .filter(|f| f.storage == storage)
            .map(|f| f.offset + f.size)
            .max()
            .unwrap_or(0)
    }

    fn type_args_of(&self, ty: TypeId) -> Instantiation {
        Instantiation::for_type(self.type_instantiation(ty))
    }

    /// Whether `def` is `target` or reaches it through its override chain.
    fn overrides_transitively(&self, def: MethodDefId, target: MethodDefId) -> bool {
        let mut current = Some(def);
        while let Some(d) = current {
            if d == target {
                return true;
            }
            current = self.method_def(d).overrides;
        }
        false
    }

    fn compare_type_lists(&self, a: &[TypeId], b: &[TypeId]) -> Ordering {
        for (&x, &y) in a.iter().zip(b) {
            let ord = self.compare_types(x, y);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.len().cmp(&b.len())
    }

    fn write_type_list(&self, out: &mut String, args: &[TypeId]) {
        if args.is_empty() {
            return;
        }
        out.push('<');
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&self.type_name(arg));
        }
        out.push('>');
    }
}

impl TypeSystem for TypeUniverse {
    fn type_name(&self, ty: TypeId) -> String {
        match self.shape(ty) {
            TypeShape::Named { def, args } => {
                let mut out = self.names.resolve(self.type_def(def).name).to_owned();
                self.write_type_list(&mut out, &args);
                out
            }
            TypeShape::TypeVar(i) => format!("!{i}"),
            TypeShape::MethodVar(i) => format!("!!{i}"),
            TypeShape::Array(element) => format!("{}[]", self.type_name(element)),
            TypeShape::Canon => "__Canon".to_owned(),
        }
    }

    fn method_name(&self, method: MethodId) -> String {
        let shape = self.method_shape(method);
        let mut out = self.type_name(shape.owner);
        out.push_str("::");
        out.push_str(self.names.resolve(self.method_def(shape.def).name));
        self.write_type_list(&mut out, &shape.args);
        out
    }

    fn field_name(&self, field: FieldId) -> String {
        let shape = self.field_shape(field);
        format!(
            "{}::{}",
            self.type_name(shape.owner),
            self.names.resolve(self.field_def(shape.def).name)
        )
    }

    fn compare_types(&self, a: TypeId, b: TypeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (sa, sb) = (self.shape(a), self.shape(b));
        sa.tag().cmp(&sb.tag()).then_with(|| match (&sa, &sb) {
            (
                TypeShape::Named { def: da, args: aa },
                TypeShape::Named { def: db, args: ab },
            ) => {
                let na = self.names.resolve(self.type_def(*da).name);
                let nb = self.names.resolve(self.type_def(*db).name);
                na.cmp(nb)
                    .then_with(|| da.0.cmp(&db.0))
                    .then_with(|| self.compare_type_lists(aa, ab))
            }
            (TypeShape::TypeVar(x), TypeShape::TypeVar(y))
            | (TypeShape::MethodVar(x), TypeShape::MethodVar(y)) => x.cmp(y),
            (TypeShape::Array(x), TypeShape::Array(y)) => self.compare_types(*x, *y),
            _ => Ordering::Equal,
        })
    }

    fn compare_methods(&self, a: MethodId, b: MethodId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (ma, mb) = (self.method_shape(a), self.method_shape(b));
        let na = self.names.resolve(self.method_def(ma.def).name);
        let nb = self.names.resolve(self.method_def(mb.def).name);
        self.compare_types(ma.owner, mb.owner)
            .then_with(|| na.cmp(nb))
            .then_with(|| ma.def.0.cmp(&mb.def.0))
            .then_with(|| self.compare_type_lists(&ma.args, &mb.args))
    }

    fn compare_fields(&self, a: FieldId, b: FieldId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (fa, fb) = (self.field_shape(a), self.field_shape(b));
        let na = self.names.resolve(self.field_def(fa.def).name);
        let nb = self.names.resolve(self.field_def(fb.def).name);
        self.compare_types(fa.owner, fb.owner)
            .then_with(|| na.cmp(nb))
            .then_with(|| fa.def.0.cmp(&fb.def.0))
    }

    fn is_runtime_determined_type(&self, ty: TypeId) -> bool {
        self.mentions(ty, &|s: &TypeShape| {
            matches!(s, TypeShape::TypeVar(_) | TypeShape::MethodVar(_))
        })
    }

    fn is_runtime_determined_method(&self, method: MethodId) -> bool {
        let shape = self.method_shape(method);
        self.is_runtime_determined_type(shape.owner)
            || shape.args.iter().any(|&a| self.is_runtime_determined_type(a))
    }

    fn is_runtime_determined_field(&self, field: FieldId) -> bool {
        self.is_runtime_determined_type(self.field_shape(field).owner)
    }

    fn instantiate_type(&self, ty: TypeId, inst: &Instantiation) -> TypeId {
        match self.shape(ty) {
            TypeShape::Named { def, args } => {
                if args.is_empty() {
                    return ty;
                }
                let args: Vec<TypeId> = args
                    .iter()
                    .map(|&a| self.instantiate_type(a, inst))
                    .collect();
                self.named(def, &args)
            }
            TypeShape::TypeVar(i) => ensure_substitution(&inst.type_args, i, "!"),
            TypeShape::MethodVar(i) => ensure_substitution(&inst.method_args, i, "!!"),
            TypeShape::Array(element) => self.array_of(self.instantiate_type(element, inst)),
            TypeShape::Canon => ty,
        }
    }

    fn instantiate_method(&self, method: MethodId, inst: &Instantiation) -> MethodId {
        let shape = self.method_shape(method);
        let owner = self.instantiate_type(shape.owner, inst);
        let args: Vec<TypeId> = shape
            .args
            .iter()
            .map(|&a| self.instantiate_type(a, inst))
            .collect();
        self.method(shape.def, owner, &args)
    }

    fn instantiate_field(&self, field: FieldId, inst: &Instantiation) -> FieldId {
        let shape = self.field_shape(field);
        self.field(shape.def, self.instantiate_type(shape.owner, inst))
    }

    fn canonical_type(&self, ty: TypeId) -> TypeId {
        match self.shape(ty) {
            TypeShape::Named { def, args } if !args.is_empty() => {
                let args: Vec<TypeId> = args.iter().map(|&a| self.canonical_arg(a)).collect();
                self.named(def, &args)
            }
            TypeShape::Array(element) => self.array_of(self.canonical_arg(element)),
            _ => ty,
        }
    }

    fn canonical_method(&self, method: MethodId) -> MethodId {
        let shape = self.method_shape(method);
        let owner = self.canonical_type(shape.owner);
        let args: Vec<TypeId> = shape.args.iter().map(|&a| self.canonical_arg(a)).collect();
        self.method(shape.def, owner, &args)
    }

    fn is_shared_method(&self, method: MethodId) -> bool {
        let shape = self.method_shape(self.canonical_method(method));
        self.contains_canon(shape.owner) || shape.args.iter().any(|&a| self.contains_canon(a))
    }

    fn requires_instantiation_argument(&self, method: MethodId) -> bool {
        if !self.is_shared_method(method) {
            return false;
        }
        let shape = self.method_shape(method);
        let def = self.method_def(shape.def);
        !shape.args.is_empty() || def.is_static || self.is_value_type(shape.owner)
    }

    fn flavor(&self, ty: TypeId) -> TypeFlavor {
        match self.shape(ty) {
            TypeShape::Named { def, .. } => self.type_def(def).flavor,
            _ => TypeFlavor::Class,
        }
    }

    fn base_type(&self, ty: TypeId) -> Option<TypeId> {
        let (def, _) = self.named_def(ty)?;
        let base = self.type_def(def).base?;
        Some(self.instantiate_type(base, &self.type_args_of(ty)))
    }

    fn type_instantiation(&self, ty: TypeId) -> Vec<TypeId> {
        self.named_def(ty)
            .map(|(_, args)| args.into_vec())
            .unwrap_or_default()
    }

    fn nullable_underlying(&self, ty: TypeId) -> Option<TypeId> {
        let (def, args) = self.named_def(ty)?;
        if self.type_def(def).is_nullable {
            args.first().copied()
        } else {
            None
        }
    }

    fn instance_size(&self, ty: TypeId) -> u32 {
        match self.shape(ty) {
            TypeShape::Named { def, .. } => self.type_def(def).instance_size,
            _ => 0,
        }
    }

    fn non_gc_static_size(&self, ty: TypeId) -> u32 {
        self.statics_size(ty, FieldStorage::Static)
    }

    fn gc_static_count(&self, ty: TypeId) -> u32 {
        let Some((def, _)) = self.named_def(ty) else {
            return 0;
        };
        self.type_def(def)
            .fields
            .iter()
            .filter(|&&f| self.field_def(f).storage == FieldStorage::GcStatic)
            .count() as u32
    }

    fn thread_static_size(&self, ty: TypeId) -> u32 {
        self.statics_size(ty, FieldStorage::ThreadStatic)
    }

    fn owning_type(&self, method: MethodId) -> TypeId {
        self.method_shape(method).owner
    }

    fn method_instantiation(&self, method: MethodId) -> Vec<TypeId> {
        self.method_shape(method).args.into_vec()
    }

    fn parameter_count(&self, method: MethodId) -> u16 {
        self.method_def(self.method_shape(method).def).parameters
    }

    fn method_token(&self, method: MethodId) -> u32 {
        0x0600_0000 | (self.method_shape(method).def.0 + 1)
    }

    fn virtual_slots(&self, ty: TypeId) -> Vec<MethodId> {
        let Some((def, _)) = self.named_def(ty) else {
            return Vec::new();
        };
        let td = self.type_def(def);
        if td.flavor == TypeFlavor::Interface {
            return Vec::new();
        }
        td.methods
            .iter()
            .copied()
            .filter(|&m| {
                let md = self.method_def(m);
                md.is_virtual && !md.is_static && md.overrides.is_none() && md.arity == 0
            })
            .map(|m| self.method(m, ty, &[]))
            .collect()
    }

    fn interface_methods(&self, ty: TypeId) -> Vec<MethodId> {
        let mut out = Vec::new();
        let mut current = Some(ty);
        while let Some(t) = current {
            if let Some((def, _)) = self.named_def(t) {
                let inst = self.type_args_of(t);
                for &iface in &self.type_def(def).interfaces {
                    let iface = self.instantiate_type(iface, &inst);
                    let Some((iface_def, _)) = self.named_def(iface) else {
                        continue;
                    };
                    for &m in &self.type_def(iface_def).methods {
                        let method = self.method(m, iface, &[]);
                        if !out.contains(&method) {
                            out.push(method);
                        }
                    }
                }
            }
            current = self.base_type(t);
        }
        out
    }

    fn slot_defining_method(&self, method: MethodId) -> MethodId {
        let shape = self.method_shape(method);
        let mut root = shape.def;
        while let Some(parent) = self.method_def(root).overrides {
            root = parent;
        }
        if root == shape.def {
            return method;
        }
        let root_owner = self.method_def(root).owner;
        let mut current = self.base_type(shape.owner);
        while let Some(t) = current {
            if let Some((def, _)) = self.named_def(t)
                && def == root_owner
            {
                return self.method(root, t, &shape.args);
            }
            current = self.base_type(t);
        }
        panic_missing_slot_owner(&self.method_name(method))
    }

    fn resolve_virtual(&self, ty: TypeId, decl: MethodId) -> Option<MethodId> {
        let decl_shape = self.method_shape(decl);
        let mut current = Some(ty);
        while let Some(t) = current {
            if let Some((def, _)) = self.named_def(t) {
                for &m in &self.type_def(def).methods {
                    let md = self.method_def(m);
                    let matches = self.overrides_transitively(m, decl_shape.def)
                        || md.implements == Some(decl_shape.def);
                    if matches && !md.is_abstract {
                        return Some(self.method(m, t, &decl_shape.args));
                    }
                }
            }
            current = self.base_type(t);
        }
        None
    }

    fn resolve_constrained(&self, ty: TypeId, decl: MethodId) -> Option<MethodId> {
        if !self.is_value_type(ty) {
            return None;
        }
        self.resolve_virtual(ty, decl)
    }

    fn default_constructor(&self, ty: TypeId) -> Option<MethodId> {
        let (def, _) = self.named_def(ty)?;
        self.type_def(def)
            .methods
            .iter()
            .copied()
            .find(|&m| {
                let md = self.method_def(m);
                md.is_constructor && !md.is_static && md.parameters == 0
            })
            .map(|m| self.method(m, ty, &[]))
    }

    fn field_owner(&self, field: FieldId) -> TypeId {
        self.field_shape(field).owner
    }

    fn field_offset(&self, field: FieldId) -> u32 {
        self.field_def(self.field_shape(field).def).offset
    }

    fn field_token(&self, field: FieldId) -> u32 {
        0x0400_0000 | (self.field_shape(field).def.0 + 1)
    }
}
