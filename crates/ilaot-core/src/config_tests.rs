use crate::{Architecture, CompilationOptions, VTablePolicy};

#[test]
fn empty_json_yields_defaults() {
    let options = CompilationOptions::from_json("{}").unwrap();

    assert_eq!(options, CompilationOptions::default());
    assert_eq!(options.target.architecture, Architecture::X64);
    assert_eq!(options.vtable_policy, VTablePolicy::Lazy);
    assert!(!options.cross_module_generics);
}

#[test]
fn parses_kebab_case_fields() {
    let json = r#"{
        "target": { "architecture": "arm64" },
        "vtable-policy": "full",
        "cross-module-generics": true
    }"#;

    let options = CompilationOptions::from_json(json).unwrap();

    assert_eq!(options.target.architecture, Architecture::Arm64);
    assert_eq!(options.vtable_policy, VTablePolicy::Full);
    assert!(options.cross_module_generics);
}

#[test]
fn rejects_unknown_architecture() {
    let err = CompilationOptions::from_json(r#"{ "target": { "architecture": "mips" } }"#);
    assert!(err.is_err());
}

#[test]
fn pointer_size_follows_architecture() {
    assert_eq!(Architecture::X64.pointer_size(), 8);
    assert_eq!(Architecture::Arm64.pointer_size(), 8);
    assert_eq!(Architecture::X86.pointer_size(), 4);
    assert_eq!(Architecture::Arm.pointer_size(), 4);

    let options = CompilationOptions::default().with_target(Architecture::Arm);
    assert_eq!(options.target.pointer_size(), 4);
}

#[test]
fn serializes_back_to_same_options() {
    let options = CompilationOptions::default()
        .with_target(Architecture::X86)
        .with_vtable_policy(VTablePolicy::Full)
        .with_cross_module_generics(true);

    let json = serde_json::to_string(&options).unwrap();
    assert_eq!(CompilationOptions::from_json(&json).unwrap(), options);
}
