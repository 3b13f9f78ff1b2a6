//! Capability graph: which handler can turn which format into which.
//!
//! Nodes are conversion options (advanced mode) or format-equivalence classes
//! (simple mode). An edge `X → Y` labelled with handler `H` means "H accepts
//! X's format and produces Y's format". Every edge also remembers the exact
//! option H declared for Y, so collapsing nodes in simple mode never loses
//! which descriptor the hop must ask for.
//!
//! ## Edge rules
//!
//! * For every handler, the cross product of its input-capable and
//!   output-capable declarations, excluding a format paired with itself.
//! * A handler flagged [`FormatHandler::supports_any_input`] additionally gets
//!   an edge from every other node to each of its outputs.
//!
//! Adjacency lists are filled in handler registry order, then declaration
//! order, which is what gives path search its deterministic tie-breaking.
//!
//! [`FormatHandler::supports_any_input`]: crate::handler::FormatHandler::supports_any_input

use crate::config::GraphMode;
use crate::format::{ConversionOption, FormatKey, NodeKey};
use crate::search::PathSearch;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Index of a node in the graph.
pub type NodeId = usize;

/// A directed, handler-labelled edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Target node.
    pub to: NodeId,
    /// Index of the option the handler declared for the target format.
    pub option: usize,
}

/// One graph vertex.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub key: NodeKey,
    /// First option that produced this node.
    pub representative: usize,
}

/// The routing graph built from a catalog's options.
#[derive(Debug, Clone, Default)]
pub struct CapabilityGraph {
    mode: GraphMode,
    options: Vec<ConversionOption>,
    nodes: Vec<GraphNode>,
    index: HashMap<NodeKey, NodeId>,
    adjacency: Vec<Vec<Edge>>,
    edge_count: usize,
}

impl CapabilityGraph {
    /// Build the graph for `options` under `mode`.
    pub fn build(options: &[ConversionOption], mode: GraphMode) -> Self {
        let mut nodes: Vec<GraphNode> = Vec::new();
        let mut index: HashMap<NodeKey, NodeId> = HashMap::new();
        let mut node_of_option = Vec::with_capacity(options.len());

        for (i, option) in options.iter().enumerate() {
            let key = option.node_key(mode);
            let id = *index.entry(key.clone()).or_insert_with(|| {
                nodes.push(GraphNode {
                    key,
                    representative: i,
                });
                nodes.len() - 1
            });
            node_of_option.push(id);
        }

        // Nodes sharing a format class; one per class in simple mode.
        let mut by_format: HashMap<&FormatKey, Vec<NodeId>> = HashMap::new();
        for (id, node) in nodes.iter().enumerate() {
            by_format.entry(&node.key.format).or_default().push(id);
        }

        // Group option indices by handler, keeping discovery order.
        let mut handler_order: Vec<&str> = Vec::new();
        let mut by_handler: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, option) in options.iter().enumerate() {
            let name = option.handler.name();
            by_handler
                .entry(name)
                .or_insert_with(|| {
                    handler_order.push(name);
                    Vec::new()
                })
                .push(i);
        }

        let mut adjacency: Vec<Vec<Edge>> = vec![Vec::new(); nodes.len()];
        let mut seen: HashSet<(NodeId, NodeId, usize)> = HashSet::new();
        let mut edge_count = 0usize;

        for (handler_idx, name) in handler_order.iter().enumerate() {
            let owned = &by_handler[name];
            let any_input = options[owned[0]].handler.supports_any_input();

            let mut sources: Vec<NodeId> = Vec::new();
            if any_input {
                sources.extend(0..nodes.len());
            } else {
                let mut source_set = HashSet::new();
                for &i in owned.iter().filter(|&&i| options[i].format.accepts_input) {
                    for &id in by_format.get(&options[i].format.key()).into_iter().flatten() {
                        if source_set.insert(id) {
                            sources.push(id);
                        }
                    }
                }
            }

            for &out in owned.iter().filter(|&&i| options[i].format.produces_output) {
                let target = node_of_option[out];
                let target_format = &nodes[target].key.format;
                for &source in &sources {
                    if source == target || &nodes[source].key.format == target_format {
                        continue;
                    }
                    if seen.insert((source, target, handler_idx)) {
                        adjacency[source].push(Edge {
                            to: target,
                            option: out,
                        });
                        edge_count += 1;
                    }
                }
            }
        }

        debug!(
            "Capability graph ({} mode): {} nodes, {} edges, {} handlers",
            mode,
            nodes.len(),
            edge_count,
            handler_order.len()
        );

        Self {
            mode,
            options: options.to_vec(),
            nodes,
            index,
            adjacency,
            edge_count,
        }
    }

    pub fn mode(&self) -> GraphMode {
        self.mode
    }

    pub fn options(&self) -> &[ConversionOption] {
        &self.options
    }

    pub fn option(&self, idx: usize) -> &ConversionOption {
        &self.options[idx]
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Node an option maps to under this graph's mode.
    pub fn node_of(&self, option: &ConversionOption) -> Option<NodeId> {
        self.index.get(&option.node_key(self.mode)).copied()
    }

    /// Outgoing edges of `node`, in discovery order.
    pub fn neighbors(&self, node: NodeId) -> &[Edge] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lazily enumerate candidate paths from `from` to `to`, shortest first.
    ///
    /// Each call starts a fresh traversal. An option absent from the graph
    /// yields an empty sequence.
    pub fn search_path(
        &self,
        from: &ConversionOption,
        to: &ConversionOption,
        max_hops: usize,
    ) -> PathSearch<'_> {
        PathSearch::new(self, from, to, max_hops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::format::{FileRecord, FormatDescriptor};
    use crate::handler::{FormatHandler, HandlerRef};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Stub {
        name: &'static str,
        any: bool,
    }

    #[async_trait]
    impl FormatHandler for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn supports_any_input(&self) -> bool {
            self.any
        }

        async fn init(&self) -> Result<Vec<FormatDescriptor>, HandlerError> {
            Ok(vec![])
        }

        async fn convert(
            &self,
            files: Vec<FileRecord>,
            _input: &FormatDescriptor,
            _output: &FormatDescriptor,
            _args: Option<&[String]>,
        ) -> Result<Vec<FileRecord>, HandlerError> {
            Ok(files)
        }
    }

    fn fmt(code: &str) -> FormatDescriptor {
        FormatDescriptor::new(code.to_uppercase(), code, code, format!("x/{code}"))
    }

    fn opts(handler: &HandlerRef, formats: Vec<FormatDescriptor>) -> Vec<ConversionOption> {
        formats
            .into_iter()
            .map(|f| ConversionOption::new(f, Arc::clone(handler)))
            .collect()
    }

    #[test]
    fn cross_product_excludes_self_pairs() {
        let h: HandlerRef = Arc::new(Stub { name: "h", any: false });
        let options = opts(
            &h,
            vec![
                fmt("a").readable().writable(),
                fmt("b").readable().writable(),
            ],
        );
        let g = CapabilityGraph::build(&options, GraphMode::Simple);

        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.neighbors(0), &[Edge { to: 1, option: 1 }]);
        assert_eq!(g.neighbors(1), &[Edge { to: 0, option: 0 }]);
    }

    #[test]
    fn simple_mode_collapses_shared_formats() {
        let h1: HandlerRef = Arc::new(Stub { name: "h1", any: false });
        let h2: HandlerRef = Arc::new(Stub { name: "h2", any: false });
        let mut options = opts(&h1, vec![fmt("a").readable(), fmt("b").writable()]);
        options.extend(opts(&h2, vec![fmt("b").readable(), fmt("c").writable()]));

        let simple = CapabilityGraph::build(&options, GraphMode::Simple);
        assert_eq!(simple.node_count(), 3);
        assert_eq!(simple.edge_count(), 2);

        let advanced = CapabilityGraph::build(&options, GraphMode::Advanced);
        assert_eq!(advanced.node_count(), 4);
        // b[h1] and b[h2] both feed h2's c output.
        assert_eq!(advanced.edge_count(), 3);
        let b_h1 = advanced.node_of(&options[1]).unwrap();
        assert_eq!(advanced.neighbors(b_h1).len(), 1);
    }

    #[test]
    fn any_input_handler_reaches_from_every_node() {
        let h: HandlerRef = Arc::new(Stub { name: "h", any: false });
        let wild: HandlerRef = Arc::new(Stub { name: "wild", any: true });
        let mut options = opts(&h, vec![fmt("a").readable(), fmt("b").writable()]);
        options.extend(opts(&wild, vec![fmt("d").writable()]));

        let g = CapabilityGraph::build(&options, GraphMode::Simple);
        let a = g.node_of(&options[0]).unwrap();
        let b = g.node_of(&options[1]).unwrap();
        let d = g.node_of(&options[2]).unwrap();

        assert!(g.neighbors(a).iter().any(|e| e.to == d));
        assert!(g.neighbors(b).iter().any(|e| e.to == d));
        assert!(g.neighbors(d).is_empty());
    }

    #[test]
    fn duplicate_declarations_do_not_duplicate_edges() {
        let h: HandlerRef = Arc::new(Stub { name: "h", any: false });
        let options = opts(
            &h,
            vec![
                fmt("a").readable(),
                fmt("a").readable(),
                fmt("b").writable(),
            ],
        );
        let g = CapabilityGraph::build(&options, GraphMode::Simple);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn unknown_option_has_no_node() {
        let h: HandlerRef = Arc::new(Stub { name: "h", any: false });
        let options = opts(&h, vec![fmt("a").readable(), fmt("b").writable()]);
        let g = CapabilityGraph::build(&options, GraphMode::Simple);

        let stranger = ConversionOption::new(fmt("zzz").readable(), Arc::clone(&h));
        assert_eq!(g.node_of(&stranger), None);
        assert!(g.neighbors(99).is_empty());
    }
}
