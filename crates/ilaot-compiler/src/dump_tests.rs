use indoc::indoc;

use ilaot_core::CompilationOptions;

use crate::codegen::{MethodBody, Reference};
use crate::dump::{dump_graph, dump_output};
use crate::test_utils::{Fixture, ScriptedCompiler, calls};

#[test]
fn graph_dump_names_every_mark_reason() {
    let fx = Fixture::new();
    let mut codegen = ScriptedCompiler::new().with_body(
        "Program::Main",
        MethodBody {
            references: vec![Reference::VirtualCall(fx.base_run)],
            ..calls(&[Reference::NewObject(fx.derived)])
        },
    );
    let mut c = fx.compile_main(&mut codegen, CompilationOptions::default());
    c.analyze().unwrap();

    insta::assert_snapshot!(dump_graph(&c), @r"
    type:Base <- static type:Derived
    type:Derived <- static entry:Program::Main
    type:Object <- static type:Base
    vtable:Base <- static vuse:Base::Run
    vtable:Derived <- static type:Derived
    vtable:Object <- static type:Object
    vuse:Base::Run <- static entry:Program::Main
    entry:Base::Run <- conditional type:Base if vuse:Base::Run
    entry:Derived::Run <- conditional type:Derived if vuse:Base::Run
    entry:Program::Main <- root (main)
    RhpNewObject <- static entry:Program::Main
    ");
}

#[test]
fn shared_code_dump_shows_dynamic_edges() {
    let fx = Fixture::new();
    let u = &fx.u;
    let mut codegen = ScriptedCompiler::new()
        .with_body("Program::Main", calls(&[Reference::Call(fx.make(fx.string))]))
        .with_body(
            "Util::Make<__Canon>",
            MethodBody {
                generic_lookups: vec![crate::GenericLookupResult::type_handle(
                    u,
                    u.method_var(0),
                )],
                ..calls(&[])
            },
        );
    let mut c = fx.compile_main(&mut codegen, CompilationOptions::default());
    c.analyze().unwrap();

    let dump = dump_graph(&c);
    assert!(dump.contains("type:String <- dynamic mdict:Util::Make<String>\n"));
    assert!(dump.contains("mdict:Util::Make<String> <- static entry:Program::Main\n"));
}

#[test]
fn output_dump_lists_objects_relocations_and_externs() {
    let fx = Fixture::new();
    let mut codegen = ScriptedCompiler::new().with_body(
        "Program::Main",
        calls(&[
            Reference::NewObject(fx.object),
            Reference::NonGcStatics(fx.counter),
        ]),
    );
    let output = fx
        .compile_main(&mut codegen, CompilationOptions::default())
        .compile()
        .unwrap();

    assert_eq!(
        dump_output(&output),
        indoc! {"
            type:Object (align 8, 24 bytes)
              0000  08 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
              0010  00 00 00 00 00 00 00 00
            entry:Program::Main (align 16, 11 bytes)
              0000  e8 00 00 00 00 e8 00 00 00 00 c3
              @0001 rel32 type:Object -4
              @0006 rel32 statics:Counter -4
            statics:Counter (align 8, 8 bytes)
              0000  00 00 00 00 00 00 00 00
            externs:
              RhpNewObject
        "}
    );
}
