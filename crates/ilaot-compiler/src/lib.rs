//! ilaot compiler: dependency analysis, generic dictionaries and object
//! emission.
//!
//! - `graph` - generic mark-and-sweep dependency analyzer
//! - `nodes` - node kinds, interning, vtable layouts and emission
//! - `generic` - generic lookup results and dictionary layouts
//! - `codegen` - seam to the external code generator
//! - `compilation` - the driver tying analysis and emission together
//! - `dump` - textual dumps of graphs and output

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod codegen;
pub mod compilation;
pub mod dump;
pub mod generic;
pub mod graph;
mod invariants;
pub mod nodes;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod dump_tests;

pub use codegen::{BodyRelocation, CodegenError, MethodBody, MethodCompiler, Reference};
pub use compilation::{Compilation, CompilationOutput, EmittedObject};
pub use generic::{GenericContextOwner, GenericLookupResult};
pub use nodes::{NodeId, NodeKind};

/// Errors that abort a compilation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The code generator rejected a method.
    #[error("failed to compile {method}: {source}")]
    Codegen {
        method: String,
        #[source]
        source: CodegenError,
    },

    /// A relocation targets something code cannot hold an address of.
    #[error("{method}: relocation against unaddressable reference `{reference}`")]
    UnaddressableReference { method: String, reference: String },

    #[error("invalid compilation options: {0}")]
    InvalidOptions(#[from] serde_json::Error),
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, Error>;
