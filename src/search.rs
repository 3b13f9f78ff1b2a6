//! Lazy path search over the capability graph.
//!
//! [`PathSearch`] is a pull-based iterator: nothing beyond the next candidate
//! is explored until the caller asks for it, and dropping the iterator
//! abandons the rest of the search space. Candidates come out breadth-first,
//! so hop counts never decrease: a one-hop route is always offered before any
//! two-hop route, and equal-length routes keep handler discovery order.
//!
//! Partial paths share their prefixes through `Arc`-linked trails, so the
//! frontier costs one small allocation per explored edge rather than a copy
//! of the whole path.

use crate::format::ConversionOption;
use crate::graph::{CapabilityGraph, Edge, NodeId};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A candidate chain of hops from a start option to a goal format.
///
/// `hops[i]` is the handler used for hop `i` together with the exact format
/// it must produce.
#[derive(Debug, Clone)]
pub struct ConversionPath {
    pub start: ConversionOption,
    pub hops: Vec<ConversionOption>,
    nodes: Vec<NodeId>,
}

impl ConversionPath {
    /// Number of hops.
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Graph nodes visited, start included.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// The option the final hop produces.
    pub fn goal(&self) -> &ConversionOption {
        self.hops.last().unwrap_or(&self.start)
    }

    /// Serialisable description of each step.
    pub fn steps(&self) -> Vec<PathStep> {
        std::iter::once(&self.start)
            .chain(self.hops.iter())
            .map(|o| PathStep {
                format: o.format.format.clone(),
                mime: o.format.media_type.clone(),
                handler: o.handler.name().to_string(),
            })
            .collect()
    }
}

impl fmt::Display for ConversionPath {
    /// `png → jpeg [image] → base64 [base64]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start.format.format)?;
        for hop in &self.hops {
            write!(f, " → {} [{}]", hop.format.format, hop.handler.name())?;
        }
        Ok(())
    }
}

/// One step of a [`ConversionPath`] in serialisable form.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PathStep {
    pub format: String,
    pub mime: String,
    pub handler: String,
}

/// A partial path: the node reached plus the edge that reached it.
struct Trail {
    node: NodeId,
    edge: Option<Edge>,
    parent: Option<Arc<Trail>>,
    hops: usize,
}

impl Trail {
    fn contains(&self, node: NodeId) -> bool {
        let mut cursor = Some(self);
        while let Some(trail) = cursor {
            if trail.node == node {
                return true;
            }
            cursor = trail.parent.as_deref();
        }
        false
    }

    /// Edges and nodes from the start, in order.
    fn unwind(&self) -> (Vec<Edge>, Vec<NodeId>) {
        let mut edges = Vec::with_capacity(self.hops);
        let mut nodes = Vec::with_capacity(self.hops + 1);
        let mut cursor = Some(self);
        while let Some(trail) = cursor {
            nodes.push(trail.node);
            if let Some(edge) = trail.edge {
                edges.push(edge);
            }
            cursor = trail.parent.as_deref();
        }
        edges.reverse();
        nodes.reverse();
        (edges, nodes)
    }
}

/// Breadth-first enumeration of simple paths between two options.
///
/// Produced by [`CapabilityGraph::search_path`]. Finite and not restartable.
pub struct PathSearch<'g> {
    graph: &'g CapabilityGraph,
    start: ConversionOption,
    goal: ConversionOption,
    goal_node: Option<NodeId>,
    max_hops: usize,
    queue: VecDeque<Arc<Trail>>,
    yielded: usize,
    /// Hop sequences already offered, as (node, handler) pairs.
    seen: HashSet<Vec<(NodeId, String)>>,
}

impl<'g> PathSearch<'g> {
    pub(crate) fn new(
        graph: &'g CapabilityGraph,
        from: &ConversionOption,
        to: &ConversionOption,
        max_hops: usize,
    ) -> Self {
        let mut queue = VecDeque::new();
        let goal_node = graph.node_of(to);
        if let (Some(start), Some(_)) = (graph.node_of(from), goal_node) {
            queue.push_back(Arc::new(Trail {
                node: start,
                edge: None,
                parent: None,
                hops: 0,
            }));
        }
        Self {
            graph,
            start: from.clone(),
            goal: to.clone(),
            goal_node,
            max_hops,
            queue,
            yielded: 0,
            seen: HashSet::new(),
        }
    }

    /// Candidates produced so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn materialise(&self, trail: &Trail) -> ConversionPath {
        let (edges, nodes) = trail.unwind();
        let mut hops: Vec<ConversionOption> = edges
            .iter()
            .map(|e| self.graph.option(e.option).clone())
            .collect();

        // The goal class may be reachable through several handlers. When the
        // requested handler has its own edge into it from the same node, the
        // final hop runs on that handler with exactly the requested descriptor.
        if let (Some(last), Some(&last_edge)) = (hops.last_mut(), edges.last()) {
            let penultimate = nodes[nodes.len() - 2];
            let wanted = self.goal.handler.name();
            let reachable = last.handler.name() == wanted
                || self.graph.neighbors(penultimate).iter().any(|e| {
                    e.to == last_edge.to && self.graph.option(e.option).handler.name() == wanted
                });
            if reachable {
                *last = self.goal.clone();
            }
        }

        ConversionPath {
            start: self.start.clone(),
            hops,
            nodes,
        }
    }
}

impl Iterator for PathSearch<'_> {
    type Item = ConversionPath;

    fn next(&mut self) -> Option<ConversionPath> {
        let goal = self.goal_node?;

        while let Some(trail) = self.queue.pop_front() {
            if trail.node == goal && trail.hops > 0 {
                let path = self.materialise(&trail);
                if !self.seen.insert(signature(&path)) {
                    trace!("Skipping duplicate candidate: {}", path);
                    continue;
                }
                self.yielded += 1;
                trace!("Candidate #{}: {}", self.yielded, path);
                return Some(path);
            }
            if trail.hops >= self.max_hops {
                continue;
            }
            for edge in self.graph.neighbors(trail.node) {
                if trail.contains(edge.to) {
                    continue;
                }
                self.queue.push_back(Arc::new(Trail {
                    node: edge.to,
                    edge: Some(*edge),
                    parent: Some(Arc::clone(&trail)),
                    hops: trail.hops + 1,
                }));
            }
        }
        None
    }
}

fn signature(path: &ConversionPath) -> Vec<(NodeId, String)> {
    path.nodes[1..]
        .iter()
        .zip(&path.hops)
        .map(|(node, hop)| (*node, hop.handler.name().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphMode;
    use crate::error::HandlerError;
    use crate::format::{FileRecord, FormatDescriptor};
    use crate::handler::{FormatHandler, HandlerRef};
    use async_trait::async_trait;

    struct Stub(&'static str);

    #[async_trait]
    impl FormatHandler for Stub {
        fn name(&self) -> &str {
            self.0
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
        FormatDescriptor::new(code, code, code, format!("x/{code}"))
    }

    /// Every handler converts between all of its formats.
    fn mesh(handlers: &[(&'static str, &[&str])]) -> Vec<ConversionOption> {
        let mut options = Vec::new();
        for (name, codes) in handlers {
            let h: HandlerRef = Arc::new(Stub(*name));
            for code in *codes {
                options.push(ConversionOption::new(
                    fmt(code).readable().writable(),
                    Arc::clone(&h),
                ));
            }
        }
        options
    }

    fn find<'a>(options: &'a [ConversionOption], code: &str, handler: &str) -> &'a ConversionOption {
        options
            .iter()
            .find(|o| o.format.format == code && o.handler.name() == handler)
            .unwrap()
    }

    #[test]
    fn hop_counts_never_decrease() {
        let options = mesh(&[
            ("h1", &["a", "b", "c"]),
            ("h2", &["b", "d"]),
            ("h3", &["c", "d", "e"]),
            ("h4", &["a", "e"]),
        ]);
        let g = CapabilityGraph::build(&options, GraphMode::Simple);
        let from = find(&options, "a", "h1");
        let to = find(&options, "d", "h2");

        let lens: Vec<usize> = g.search_path(from, to, 6).map(|p| p.len()).collect();
        assert!(!lens.is_empty());
        assert!(lens.windows(2).all(|w| w[0] <= w[1]), "lens: {lens:?}");
    }

    #[test]
    fn paths_never_repeat_nodes() {
        let options = mesh(&[("h1", &["a", "b", "c"]), ("h2", &["b", "c", "d"])]);
        let g = CapabilityGraph::build(&options, GraphMode::Simple);
        let from = find(&options, "a", "h1");
        let to = find(&options, "d", "h2");

        for path in g.search_path(from, to, 8) {
            let mut nodes = path.nodes().to_vec();
            nodes.sort_unstable();
            nodes.dedup();
            assert_eq!(nodes.len(), path.nodes().len(), "repeated node in {path}");
        }
    }

    #[test]
    fn max_hops_bounds_the_search() {
        let options = mesh(&[("h1", &["a", "b"]), ("h2", &["b", "c"]), ("h3", &["c", "d"])]);
        let g = CapabilityGraph::build(&options, GraphMode::Simple);
        let from = find(&options, "a", "h1");
        let to = find(&options, "d", "h3");

        assert_eq!(g.search_path(from, to, 2).count(), 0);
        assert_eq!(g.search_path(from, to, 3).count(), 1);
    }

    #[test]
    fn same_node_yields_nothing() {
        let options = mesh(&[("h1", &["a", "b"])]);
        let g = CapabilityGraph::build(&options, GraphMode::Simple);
        let a = find(&options, "a", "h1");
        assert_eq!(g.search_path(a, a, 6).count(), 0);
    }

    #[test]
    fn final_hop_uses_requested_descriptor() {
        let h: HandlerRef = Arc::new(Stub("h"));
        let options = vec![
            ConversionOption::new(fmt("a").readable(), Arc::clone(&h)),
            ConversionOption::new(
                FormatDescriptor::new("B (generic)", "b", "b", "x/b").writable(),
                Arc::clone(&h),
            ),
            ConversionOption::new(
                FormatDescriptor::new("B (tuned)", "b", "b", "x/b")
                    .writable()
                    .internal("tuned"),
                Arc::clone(&h),
            ),
        ];
        let g = CapabilityGraph::build(&options, GraphMode::Simple);

        let path = g.search_path(&options[0], &options[2], 6).next().unwrap();
        assert_eq!(path.hops[0].format.name, "B (tuned)");
        assert_eq!(path.hops[0].format.internal.as_deref(), Some("tuned"));
    }

    #[test]
    fn final_hop_switches_to_requested_handler() {
        let options = mesh(&[("h1", &["a", "c"]), ("h2", &["a", "c"])]);
        let g = CapabilityGraph::build(&options, GraphMode::Simple);
        let from = find(&options, "a", "h1");
        let to = find(&options, "c", "h2");

        let paths: Vec<ConversionPath> = g.search_path(from, to, 6).collect();
        assert_eq!(paths[0].to_string(), "a → c [h2]");
        assert!(
            paths.iter().skip(1).all(|p| p.len() > 1),
            "direct route offered twice: {:?}",
            paths.iter().map(ToString::to_string).collect::<Vec<_>>()
        );
    }

    #[test]
    fn final_hop_keeps_handler_without_its_own_edge() {
        let options = mesh(&[("h1", &["a", "c"]), ("h2", &["b", "c"])]);
        let g = CapabilityGraph::build(&options, GraphMode::Simple);
        let from = find(&options, "a", "h1");
        let to = find(&options, "c", "h2");

        let first = g.search_path(from, to, 6).next().unwrap();
        assert_eq!(first.to_string(), "a → c [h1]");
    }

    #[test]
    fn display_lists_handlers() {
        let options = mesh(&[("h1", &["a", "b"]), ("h2", &["b", "c"])]);
        let g = CapabilityGraph::build(&options, GraphMode::Simple);
        let path = g
            .search_path(find(&options, "a", "h1"), find(&options, "c", "h2"), 6)
            .next()
            .unwrap();
        assert_eq!(path.to_string(), "a → b [h1] → c [h2]");
        assert_eq!(path.steps().len(), 3);
        assert_eq!(path.goal().format.format, "c");
    }
}
