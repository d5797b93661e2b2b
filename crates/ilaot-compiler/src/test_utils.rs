//! Fixture type universe and a scripted code generator.

use std::collections::HashMap;

use ilaot_core::universe::{
    FieldDefId, FieldSpec, FieldStorage, MethodDefId, MethodSpec, TypeDefId, TypeSpec,
};
use ilaot_core::{
    CompilationOptions, FieldId, MethodId, TypeFlavor, TypeId, TypeSystem, TypeUniverse,
};
use ilaot_object::RelocKind;

use crate::codegen::{BodyRelocation, CodegenError, MethodBody, MethodCompiler, Reference};
use crate::compilation::Compilation;
use crate::nodes::{NodeId, NodeKind};

/// A small class hierarchy, an interface, a value type, statics and two
/// generic definitions.
///
/// ```text
/// Object
/// ├── String
/// ├── Base { virtual Run, virtual Idle }
/// │   └── Derived { override Run }
/// ├── List<T> { size, items, Get(1), virtual Count }
/// ├── Util { static Make<T> }
/// ├── Counter { static total, static gc cache, thread static depth }
/// └── Program { static Main }
/// Int32, Point : IDisposable { Dispose }, Nullable<T>    (value types)
/// ```
pub struct Fixture {
    pub u: TypeUniverse,
    pub object: TypeId,
    pub string: TypeId,
    pub int32: TypeId,
    pub base: TypeId,
    pub derived: TypeId,
    pub disposable: TypeId,
    pub point: TypeId,
    pub counter: TypeId,
    pub program: TypeId,
    pub util: TypeId,
    pub list_def: TypeDefId,
    pub nullable_def: TypeDefId,
    pub base_run: MethodId,
    pub base_idle: MethodId,
    pub derived_run: MethodId,
    pub dispose: MethodId,
    pub point_dispose: MethodId,
    pub main: MethodId,
    pub list_get_def: MethodDefId,
    pub list_count_def: MethodDefId,
    pub list_items_def: FieldDefId,
    pub make_def: MethodDefId,
    pub counter_total: FieldId,
    pub counter_depth: FieldId,
}

impl Fixture {
    pub fn new() -> Self {
        let mut u = TypeUniverse::new();
        let object_def = u.define_type(TypeSpec {
            name: "Object",
            instance_size: 8,
            ..Default::default()
        });
        let object = u.named(object_def, &[]);

        let string_def = u.define_type(class("String", object, 16));
        let int32_def = u.define_type(TypeSpec {
            name: "Int32",
            flavor: TypeFlavor::ValueType,
            instance_size: 4,
            ..Default::default()
        });

        let base_def = u.define_type(class("Base", object, 16));
        let base_run_def = u.define_method(base_def, virtual_method("Run"));
        let base_idle_def = u.define_method(base_def, virtual_method("Idle"));
        let base = u.named(base_def, &[]);

        let derived_def = u.define_type(TypeSpec {
            name: "Derived",
            base: Some(base),
            instance_size: 24,
            ..Default::default()
        });
        let derived_run_def = u.define_method(
            derived_def,
            MethodSpec {
                overrides: Some(base_run_def),
                ..virtual_method("Run")
            },
        );

        let disposable_def = u.define_type(TypeSpec {
            name: "IDisposable",
            flavor: TypeFlavor::Interface,
            ..Default::default()
        });
        let dispose_def = u.define_method(
            disposable_def,
            MethodSpec {
                is_abstract: true,
                ..virtual_method("Dispose")
            },
        );
        let disposable = u.named(disposable_def, &[]);

        let point_def = u.define_type(TypeSpec {
            name: "Point",
            flavor: TypeFlavor::ValueType,
            interfaces: vec![disposable],
            instance_size: 8,
            ..Default::default()
        });
        let point_dispose_def = u.define_method(
            point_def,
            MethodSpec {
                name: "Dispose",
                implements: Some(dispose_def),
                ..Default::default()
            },
        );

        let counter_def = u.define_type(class("Counter", object, 8));
        let total_def = u.define_field(
            counter_def,
            FieldSpec {
                name: "total",
                storage: FieldStorage::Static,
                size: 8,
            },
        );
        u.define_field(
            counter_def,
            FieldSpec {
                name: "cache",
                storage: FieldStorage::GcStatic,
                size: 8,
            },
        );
        let depth_def = u.define_field(
            counter_def,
            FieldSpec {
                name: "depth",
                storage: FieldStorage::ThreadStatic,
                size: 4,
            },
        );

        let list_def = u.define_type(TypeSpec {
            name: "List",
            generic_arity: 1,
            base: Some(object),
            instance_size: 24,
            ..Default::default()
        });
        let list_get_def = u.define_method(
            list_def,
            MethodSpec {
                name: "Get",
                parameters: 1,
                ..Default::default()
            },
        );
        let list_count_def = u.define_method(list_def, virtual_method("Count"));
        u.define_field(
            list_def,
            FieldSpec {
                name: "size",
                size: 4,
                ..Default::default()
            },
        );
        let list_items_def = u.define_field(
            list_def,
            FieldSpec {
                name: "items",
                size: 8,
                ..Default::default()
            },
        );

        let util_def = u.define_type(class("Util", object, 8));
        let make_def = u.define_method(
            util_def,
            MethodSpec {
                name: "Make",
                generic_arity: 1,
                is_static: true,
                ..Default::default()
            },
        );

        let program_def = u.define_type(class("Program", object, 8));
        let main_def = u.define_method(
            program_def,
            MethodSpec {
                name: "Main",
                is_static: true,
                ..Default::default()
            },
        );

        let nullable_def = u.define_type(TypeSpec {
            name: "Nullable",
            flavor: TypeFlavor::ValueType,
            generic_arity: 1,
            is_nullable: true,
            instance_size: 8,
            ..Default::default()
        });

        let string = u.named(string_def, &[]);
        let int32 = u.named(int32_def, &[]);
        let derived = u.named(derived_def, &[]);
        let point = u.named(point_def, &[]);
        let counter = u.named(counter_def, &[]);
        let program = u.named(program_def, &[]);
        let util = u.named(util_def, &[]);

        Self {
            base_run: u.method(base_run_def, base, &[]),
            base_idle: u.method(base_idle_def, base, &[]),
            derived_run: u.method(derived_run_def, derived, &[]),
            dispose: u.method(dispose_def, disposable, &[]),
            point_dispose: u.method(point_dispose_def, point, &[]),
            main: u.method(main_def, program, &[]),
            counter_total: u.field(total_def, counter),
            counter_depth: u.field(depth_def, counter),
            u,
            object,
            string,
            int32,
            base,
            derived,
            disposable,
            point,
            counter,
            program,
            util,
            list_def,
            nullable_def,
            list_get_def,
            list_count_def,
            list_items_def,
            make_def,
        }
    }

    pub fn list_of(&self, element: TypeId) -> TypeId {
        self.u.named(self.list_def, &[element])
    }

    pub fn nullable_of(&self, arg: TypeId) -> TypeId {
        self.u.named(self.nullable_def, &[arg])
    }

    /// `List<!0>`.
    pub fn open_list(&self) -> TypeId {
        self.u.open(self.list_def)
    }

    pub fn list_get(&self, list: TypeId) -> MethodId {
        self.u.method(self.list_get_def, list, &[])
    }

    pub fn list_count(&self, list: TypeId) -> MethodId {
        self.u.method(self.list_count_def, list, &[])
    }

    /// `List<T>::items`, at offset 8.
    pub fn list_items(&self, list: TypeId) -> FieldId {
        self.u.field(self.list_items_def, list)
    }

    pub fn make(&self, arg: TypeId) -> MethodId {
        self.u.method(self.make_def, self.util, &[arg])
    }

    pub fn name(&self, method: MethodId) -> String {
        self.u.method_name(method)
    }

    /// Compilation rooted at `Program::Main`.
    pub fn compile_main<'a>(
        &'a self,
        codegen: &'a mut ScriptedCompiler,
        options: CompilationOptions,
    ) -> Compilation<'a> {
        let mut compilation = Compilation::new(&self.u, codegen, options);
        compilation.add_root(self.entry(self.main), "main");
        compilation
    }

    pub fn entry(&self, method: MethodId) -> NodeKind {
        NodeKind::MethodEntrypoint {
            method: self.u.canonical_method(method),
            unboxing: false,
        }
    }
}

fn class(name: &str, base: TypeId, instance_size: u32) -> TypeSpec<'_> {
    TypeSpec {
        name,
        base: Some(base),
        instance_size,
        ..Default::default()
    }
}

fn virtual_method(name: &str) -> MethodSpec<'_> {
    MethodSpec {
        name,
        is_virtual: true,
        ..Default::default()
    }
}

/// A `call rel32` relocation at `offset`.
pub fn call_at(offset: u32, target: Reference) -> BodyRelocation {
    BodyRelocation {
        offset,
        kind: RelocKind::Rel32,
        target,
        addend: -4,
    }
}

/// One five-byte call per target, then a return.
pub fn calls(targets: &[Reference]) -> MethodBody {
    let mut code = Vec::new();
    let mut relocations = Vec::new();
    for &target in targets {
        code.push(0xE8);
        relocations.push(call_at(code.len() as u32, target));
        code.extend([0; 4]);
    }
    code.push(0xC3);
    MethodBody {
        code,
        alignment: 16,
        relocations,
        ..Default::default()
    }
}

/// Code generator answering from a script keyed by canonical method name.
/// Unscripted methods compile to a single `ret`.
#[derive(Default)]
pub struct ScriptedCompiler {
    bodies: HashMap<String, MethodBody>,
    failures: HashMap<String, String>,
    compiled: Vec<String>,
}

impl ScriptedCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, method: &str, body: MethodBody) -> Self {
        self.bodies.insert(method.to_owned(), body);
        self
    }

    pub fn with_failure(mut self, method: &str, message: &str) -> Self {
        self.failures.insert(method.to_owned(), message.to_owned());
        self
    }

    /// Methods compiled so far, in request order.
    pub fn compiled(&self) -> &[String] {
        &self.compiled
    }
}

impl MethodCompiler for ScriptedCompiler {
    fn compile(
        &mut self,
        types: &dyn TypeSystem,
        method: MethodId,
    ) -> Result<MethodBody, CodegenError> {
        let name = types.method_name(method);
        self.compiled.push(name.clone());
        if let Some(message) = self.failures.get(&name) {
            return Err(CodegenError::new(message.clone()));
        }
        Ok(self.bodies.get(&name).cloned().unwrap_or_else(|| MethodBody {
            code: vec![0xC3],
            alignment: 16,
            ..Default::default()
        }))
    }
}

/// Names of marked nodes in node order.
pub fn marked_names(compilation: &Compilation<'_>) -> Vec<String> {
    compilation
        .marked_nodes()
        .into_iter()
        .map(|node: NodeId| compilation.name(node))
        .collect()
}
