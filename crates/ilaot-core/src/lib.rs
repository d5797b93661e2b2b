#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core model shared by the ilaot back end.
//!
//! - `type_system` - descriptor handles and the oracle the back end queries
//! - `universe` - an in-memory type system implementing the oracle
//! - `config` - compilation options and target description
//! - `interner` - name interning for descriptor names

mod config;
mod interner;
mod invariants;
pub mod type_system;
pub mod universe;

#[cfg(test)]
mod config_tests;

pub use config::{Architecture, CompilationOptions, TargetDetails, VTablePolicy};
pub use interner::{Interner, Name};
pub use type_system::{FieldId, Instantiation, MethodId, TypeFlavor, TypeId, TypeSystem};
pub use universe::TypeUniverse;
