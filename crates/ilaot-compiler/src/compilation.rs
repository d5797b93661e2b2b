//! Compilation driver.
//!
//! Roots go in, the graph runs to its fixed point, then every data-bearing
//! node is emitted in node-comparer order. Nothing about the output depends
//! on the order roots were added or nodes were discovered.

use std::collections::HashMap;

use tracing::debug;

use ilaot_core::{CompilationOptions, TypeId, TypeSystem};
use ilaot_object::{ObjectData, SymbolRef};

use crate::codegen::MethodCompiler;
use crate::generic::{DictionaryLayout, GenericContextOwner, GenericDictionary};
use crate::graph::{DependencyAnalyzer, MarkReason};
use crate::nodes::{
    EmitContext, GraphContext, NodeFactory, NodeId, NodeKind, SymbolTable, VTableLayouts,
    compare_nodes, mangled_name,
};
use crate::Result;

pub struct Compilation<'a> {
    analyzer: DependencyAnalyzer<NodeId>,
    graph: GraphContext<'a>,
    frozen: bool,
}

impl<'a> Compilation<'a> {
    pub fn new(
        types: &'a dyn TypeSystem,
        codegen: &'a mut dyn MethodCompiler,
        options: CompilationOptions,
    ) -> Self {
        Self {
            analyzer: DependencyAnalyzer::new(),
            graph: GraphContext::new(types, codegen, options),
            frozen: false,
        }
    }

    /// Like [`new`](Self::new), with options parsed from JSON.
    pub fn from_json_options(
        types: &'a dyn TypeSystem,
        codegen: &'a mut dyn MethodCompiler,
        options: &str,
    ) -> Result<Self> {
        Ok(Self::new(types, codegen, CompilationOptions::from_json(options)?))
    }

    pub fn options(&self) -> &CompilationOptions {
        &self.graph.options
    }

    pub fn factory(&self) -> &NodeFactory {
        &self.graph.factory
    }

    pub fn vtables(&self) -> &VTableLayouts {
        &self.graph.vtables
    }

    pub fn add_root(&mut self, kind: NodeKind, reason: &'static str) -> NodeId {
        let node = self.graph.factory.intern(kind);
        self.analyzer.add_root(node, reason);
        node
    }

    /// Run the graph to its fixed point. Returns the number of marked nodes.
    pub fn analyze(&mut self) -> Result<usize> {
        Ok(self.analyzer.compute(&mut self.graph)?.len())
    }

    pub fn is_marked(&self, kind: NodeKind) -> bool {
        self.graph
            .factory
            .get(&kind)
            .is_some_and(|node| self.analyzer.is_marked(node))
    }

    pub fn mark_reason(&self, node: NodeId) -> Option<MarkReason<NodeId>> {
        self.analyzer.mark_reason(node)
    }

    /// Marked nodes in node-comparer order.
    pub fn marked_nodes(&self) -> Vec<NodeId> {
        let f = &self.graph.factory;
        let types = self.graph.types;
        let mut nodes = self.analyzer.marked_nodes().to_vec();
        nodes.sort_by(|&a, &b| compare_nodes(f, types, a, b));
        nodes
    }

    pub fn name(&self, node: NodeId) -> String {
        mangled_name(&self.graph.factory, self.graph.types, node)
    }

    pub fn layout(&self, owner: GenericContextOwner) -> Option<&DictionaryLayout> {
        self.graph.layouts.get(owner)
    }

    /// Freeze dictionary layouts into slot order. Analysis may not grow them
    /// afterwards.
    pub fn freeze(&mut self) {
        if !self.frozen {
            self.graph.layouts.freeze_all(self.graph.types);
            self.frozen = true;
        }
    }

    /// Concrete dictionary of a dictionary node. Freezes the layouts.
    pub fn dictionary(&mut self, node: NodeId) -> Option<GenericDictionary> {
        self.freeze();
        let kind = self.graph.factory.kind(node);
        let (owner, inst) = GenericContextOwner::of_dictionary(self.graph.types, kind)?;
        let cx = self.graph.lookup_context();
        Some(match self.graph.layouts.get(owner) {
            Some(layout) => GenericDictionary::build(layout, &cx, inst),
            None => GenericDictionary::empty(owner, inst),
        })
    }

    /// Analyze, freeze and emit. Either the whole output or the first error.
    pub fn compile(mut self) -> Result<CompilationOutput> {
        self.analyze()?;
        self.freeze();

        let types = self.graph.types;
        let f = &self.graph.factory;
        let nodes = self.marked_nodes();
        let symbols = SymbolTable::new(
            nodes
                .iter()
                .filter(|&&node| {
                    let kind = f.kind(node);
                    kind.has_data() || kind.is_external()
                })
                .map(|&node| (node, mangled_name(f, types, node))),
        );
        let tls_offsets = thread_static_offsets(f, types, &nodes);

        let cx = EmitContext {
            lookup: self.graph.lookup_context(),
            layouts: &self.graph.layouts,
            bodies: &self.graph.bodies,
            analyzer: &self.analyzer,
            symbols: &symbols,
            tls_offsets: &tls_offsets,
        };
        let mut objects = Vec::new();
        let mut externs = Vec::new();
        for &node in &nodes {
            let kind = f.kind(node);
            if kind.is_external() {
                externs.push(symbols.symbol(node));
            } else if kind.has_data() {
                objects.push(EmittedObject {
                    symbol: symbols.symbol(node),
                    data: cx.emit(node),
                });
            }
        }
        debug!(
            objects = objects.len(),
            externs = externs.len(),
            bytes = objects.iter().map(|o| o.data.len()).sum::<usize>(),
            "emitted"
        );
        Ok(CompilationOutput {
            symbols,
            objects,
            externs,
        })
    }
}

/// Thread statics are laid out back to back, 8-aligned, in node order.
fn thread_static_offsets(
    factory: &NodeFactory,
    types: &dyn TypeSystem,
    nodes: &[NodeId],
) -> HashMap<TypeId, u32> {
    let mut offsets = HashMap::new();
    let mut next = 0u32;
    for &node in nodes {
        if let NodeKind::ThreadStaticOffset(t) = factory.kind(node) {
            offsets.insert(t, next);
            next += types.thread_static_size(t).next_multiple_of(8);
        }
    }
    offsets
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedObject {
    pub symbol: SymbolRef,
    pub data: ObjectData,
}

#[derive(Debug)]
pub struct CompilationOutput {
    symbols: SymbolTable,
    objects: Vec<EmittedObject>,
    externs: Vec<SymbolRef>,
}

impl CompilationOutput {
    pub fn objects(&self) -> &[EmittedObject] {
        &self.objects
    }

    /// Symbols the object writer must import.
    pub fn externs(&self) -> &[SymbolRef] {
        &self.externs
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbol_name(&self, symbol: SymbolRef) -> Option<&str> {
        self.symbols.name(symbol)
    }

    pub fn object(&self, name: &str) -> Option<&EmittedObject> {
        self.objects
            .iter()
            .find(|o| self.symbol_name(o.symbol) == Some(name))
    }

    /// CRC32 over names, alignment, bytes and relocations with targets
    /// named. Stable across runs over the same input.
    pub fn checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for object in &self.objects {
            hash_name(&mut hasher, self.symbol_name(object.symbol));
            let data = &object.data;
            hasher.update(&data.alignment().to_le_bytes());
            hasher.update(&(data.len() as u32).to_le_bytes());
            hasher.update(data.bytes());
            for reloc in data.relocs() {
                hasher.update(&[reloc.kind.code()]);
                hasher.update(&reloc.offset.to_le_bytes());
                hasher.update(&reloc.addend.to_le_bytes());
                hash_name(&mut hasher, self.symbol_name(reloc.target));
            }
        }
        for &symbol in &self.externs {
            hash_name(&mut hasher, self.symbol_name(symbol));
        }
        hasher.finalize()
    }
}

fn hash_name(hasher: &mut crc32fast::Hasher, name: Option<&str>) {
    let name = name.unwrap_or_default();
    hasher.update(&(name.len() as u32).to_le_bytes());
    hasher.update(name.as_bytes());
}
