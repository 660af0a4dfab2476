//! Layered layout
//!
//! Sugiyama-style pipeline over uniform node boxes:
//! 1. break cycles by reversing DFS back edges
//! 2. assign ranks by longest path, then pull sources down next to their
//!    first successor
//! 3. order each rank with alternating barycenter sweeps
//! 4. place ranks along the flow axis, centre each rank across it
//!
//! Every step iterates in input order and breaks ties by index, so the
//! same `(nodes, edges, direction)` always yields the same coordinates.

use crate::model::{Edge, Node, Position};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction as Flow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Barycenter sweeps per layout (down + up counts as two)
const ORDERING_SWEEPS: usize = 4;

/// Flow direction of the arranged graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Top to bottom
    #[default]
    #[serde(rename = "TB")]
    TopBottom,
    /// Bottom to top
    #[serde(rename = "BT")]
    BottomTop,
    /// Left to right
    #[serde(rename = "LR")]
    LeftRight,
    /// Right to left
    #[serde(rename = "RL")]
    RightLeft,
}

impl Direction {
    /// Whether ranks advance along the x axis
    #[inline]
    #[must_use]
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftRight | Self::RightLeft)
    }

    fn is_reversed(self) -> bool {
        matches!(self, Self::BottomTop | Self::RightLeft)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TB" => Ok(Self::TopBottom),
            "BT" => Ok(Self::BottomTop),
            "LR" => Ok(Self::LeftRight),
            "RL" => Ok(Self::RightLeft),
            other => Err(format!("unknown layout direction: {other}")),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TopBottom => "TB",
            Self::BottomTop => "BT",
            Self::LeftRight => "LR",
            Self::RightLeft => "RL",
        };
        f.write_str(s)
    }
}

/// Layout geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Uniform node width
    pub node_width: f64,
    /// Uniform node height
    pub node_height: f64,
    /// Gap between nodes of one rank
    pub node_sep: f64,
    /// Gap between ranks
    pub rank_sep: f64,
    /// Horizontal margin
    pub margin_x: f64,
    /// Vertical margin
    pub margin_y: f64,
    /// Shift applied to every position so the arranged subgraph clears
    /// the fixed nodes at the canvas origin
    pub offset: Position,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 180.0,
            node_height: 100.0,
            node_sep: 50.0,
            rank_sep: 50.0,
            margin_x: 50.0,
            margin_y: 50.0,
            offset: Position::new(100.0, 450.0),
        }
    }
}

/// Deterministic layered layout
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    /// Create engine with custom geometry
    #[inline]
    #[must_use]
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Geometry in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Assign positions to every node
    ///
    /// Edges whose endpoints are not in `nodes` are ignored. Output order
    /// matches input order.
    #[must_use]
    pub fn layout(&self, nodes: Vec<Node>, edges: &[Edge], direction: Direction) -> Vec<Node> {
        if nodes.is_empty() {
            return nodes;
        }

        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .rev()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut links: Vec<(usize, usize)> = edges
            .iter()
            .filter_map(|e| Some((*index.get(e.source.as_str())?, *index.get(e.target.as_str())?)))
            .filter(|(s, t)| s != t)
            .collect();
        links.sort_unstable();
        links.dedup();

        let acyclic = break_cycles(nodes.len(), &links);
        let ranks = assign_ranks(nodes.len(), &acyclic);
        let layers = order_layers(&ranks, &acyclic);
        let centers = self.place(&layers, direction);

        tracing::debug!(
            "Laid out {} nodes in {} ranks ({})",
            nodes.len(),
            layers.len(),
            direction
        );

        let half = Position::new(self.config.node_width / 2.0, self.config.node_height / 2.0);
        nodes
            .into_iter()
            .enumerate()
            .map(|(i, node)| {
                let c = centers[i];
                Node {
                    position: Position::new(c.x - half.x, c.y - half.y).offset_by(self.config.offset),
                    ..node
                }
            })
            .collect()
    }

    /// Lay out only the nodes the user has not positioned by hand
    ///
    /// User-positioned nodes pass through with their coordinates intact;
    /// the rest are arranged among themselves.
    #[must_use]
    pub fn arrange(&self, nodes: Vec<Node>, edges: &[Edge], direction: Direction) -> Vec<Node> {
        let (pinned, free): (Vec<_>, Vec<_>) =
            nodes.into_iter().enumerate().partition(|(_, n)| n.user_positioned);
        if free.is_empty() {
            return pinned.into_iter().map(|(_, n)| n).collect();
        }

        let (order, free_nodes): (Vec<usize>, Vec<Node>) = free.into_iter().unzip();
        let placed = self.layout(free_nodes, edges, direction);

        let mut merged: Vec<(usize, Node)> = order.into_iter().zip(placed).chain(pinned).collect();
        merged.sort_by_key(|(i, _)| *i);
        merged.into_iter().map(|(_, n)| n).collect()
    }

    /// Centre coordinate of every node, indexed like the input
    fn place(&self, layers: &[Vec<usize>], direction: Direction) -> Vec<Position> {
        let cfg = &self.config;
        let (along, across) = if direction.is_horizontal() {
            (cfg.node_width, cfg.node_height)
        } else {
            (cfg.node_height, cfg.node_width)
        };

        let span = |n: usize| -> f64 {
            let n = n as f64;
            n * across + (n - 1.0).max(0.0) * cfg.node_sep
        };
        let widest = layers.iter().map(|l| span(l.len())).fold(0.0, f64::max);
        let last_rank = layers.len().saturating_sub(1);
        let count = layers.iter().map(Vec::len).sum();
        let mut centers = vec![Position::default(); count];

        for (rank, layer) in layers.iter().enumerate() {
            let rank = if direction.is_reversed() {
                last_rank - rank
            } else {
                rank
            };
            let flow = rank as f64 * (along + cfg.rank_sep) + along / 2.0;
            let start = (widest - span(layer.len())) / 2.0;

            for (slot, &node) in layer.iter().enumerate() {
                let cross = start + slot as f64 * (across + cfg.node_sep) + across / 2.0;
                centers[node] = if direction.is_horizontal() {
                    Position::new(cfg.margin_x + flow, cfg.margin_y + cross)
                } else {
                    Position::new(cfg.margin_x + cross, cfg.margin_y + flow)
                };
            }
        }
        centers
    }
}

/// Reverse every DFS back edge so the remaining graph is acyclic
fn break_cycles(count: usize, links: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut adjacency = vec![Vec::new(); count];
    for &(s, t) in links {
        adjacency[s].push(t);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Open,
        Done,
    }

    let mut marks = vec![Mark::New; count];
    let mut back_edges = Vec::new();

    for root in 0..count {
        if marks[root] != Mark::New {
            continue;
        }
        let mut stack = vec![(root, 0usize)];
        marks[root] = Mark::Open;

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            if let Some(&child) = adjacency[node].get(next) {
                top.1 += 1;
                match marks[child] {
                    Mark::New => {
                        marks[child] = Mark::Open;
                        stack.push((child, 0));
                    }
                    Mark::Open => back_edges.push((node, child)),
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }

    let mut acyclic: Vec<(usize, usize)> = links
        .iter()
        .map(|&(s, t)| if back_edges.contains(&(s, t)) { (t, s) } else { (s, t) })
        .collect();
    acyclic.sort_unstable();
    acyclic.dedup();
    acyclic
}

/// Longest-path ranking with sources pulled toward their successors
fn assign_ranks(count: usize, links: &[(usize, usize)]) -> Vec<usize> {
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(count, links.len());
    let indices: Vec<NodeIndex> = (0..count).map(|i| graph.add_node(i)).collect();
    for &(s, t) in links {
        graph.add_edge(indices[s], indices[t], ());
    }

    // Back edges were reversed, so a cycle here is impossible; fall back to
    // input order if it ever happens.
    let order: Vec<usize> = toposort(&graph, None)
        .map(|o| o.into_iter().map(|ix| graph[ix]).collect())
        .unwrap_or_else(|_| (0..count).collect());

    let mut ranks = vec![0usize; count];
    for &node in &order {
        let rank = graph
            .neighbors_directed(indices[node], Flow::Incoming)
            .map(|p| ranks[graph[p]] + 1)
            .max()
            .unwrap_or(0);
        ranks[node] = rank;
    }

    for &node in order.iter().rev() {
        let ix = indices[node];
        let is_source = graph.neighbors_directed(ix, Flow::Incoming).next().is_none();
        if !is_source {
            continue;
        }
        if let Some(min_succ) = graph
            .neighbors_directed(ix, Flow::Outgoing)
            .map(|s| ranks[graph[s]])
            .min()
        {
            ranks[node] = min_succ.saturating_sub(1);
        }
    }
    ranks
}

/// Group nodes by rank and reduce crossings with barycenter sweeps
fn order_layers(ranks: &[usize], links: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let depth = ranks.iter().copied().max().map_or(0, |m| m + 1);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for (node, &rank) in ranks.iter().enumerate() {
        layers[rank].push(node);
    }

    let mut preds = vec![Vec::new(); ranks.len()];
    let mut succs = vec![Vec::new(); ranks.len()];
    for &(s, t) in links {
        preds[t].push(s);
        succs[s].push(t);
    }

    let mut slot = vec![0usize; ranks.len()];
    let reindex = |layers: &[Vec<usize>], slot: &mut [usize]| {
        for layer in layers {
            for (i, &n) in layer.iter().enumerate() {
                slot[n] = i;
            }
        }
    };
    reindex(&layers, &mut slot);

    for sweep in 0..ORDERING_SWEEPS {
        let downward = sweep % 2 == 0;
        let ranks_in_order: Vec<usize> = if downward {
            (1..depth).collect()
        } else {
            (0..depth.saturating_sub(1)).rev().collect()
        };

        for rank in ranks_in_order {
            let neighbours = if downward { &preds } else { &succs };
            let mut keyed: Vec<(f64, usize, usize)> = layers[rank]
                .iter()
                .map(|&n| {
                    let adjacent = &neighbours[n];
                    let weight = if adjacent.is_empty() {
                        slot[n] as f64
                    } else {
                        adjacent.iter().map(|&a| slot[a] as f64).sum::<f64>()
                            / adjacent.len() as f64
                    };
                    (weight, slot[n], n)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            layers[rank] = keyed.into_iter().map(|(_, _, n)| n).collect();
            for (i, &n) in layers[rank].iter().enumerate() {
                slot[n] = i;
            }
        }
    }

    layers
}
