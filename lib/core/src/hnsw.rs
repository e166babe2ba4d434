//! Approximate nearest-neighbor graph over parcel feature vectors.
//!
//! A compact HNSW: layered greedy descent, heap-based frontier, bitset
//! visited tracking. Distances come from the metric the graph was built
//! under; callers never pass a metric per query.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use ahash::AHashMap;

use crate::index::IndexRecord;
use crate::metric::Metric;
use crate::parcel::ParcelId;

/// Per-query bitset for visited-node tracking.
struct VisitedSet {
    words: Vec<u64>,
}

impl VisitedSet {
    fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity / 64 + 1],
        }
    }

    /// Marks a node visited; returns true if it was not visited before.
    #[inline]
    fn insert(&mut self, idx: usize) -> bool {
        let (word, bit) = (idx / 64, idx % 64);
        let mask = 1u64 << bit;
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }
}

/// Frontier candidate: min-heap by distance.
#[derive(Clone, Copy, PartialEq)]
struct Near {
    idx: usize,
    dist: f32,
}

impl Eq for Near {}

impl Ord for Near {
    fn cmp(&self, other: &Self) -> Ordering {
        other.dist.partial_cmp(&self.dist).unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Near {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result-set candidate: max-heap by distance so the worst result pops first.
#[derive(Clone, Copy, PartialEq)]
struct Far {
    idx: usize,
    dist: f32,
}

impl Eq for Far {}

impl Ord for Far {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.partial_cmp(&other.dist).unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Far {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct HnswNode {
    /// `None` marks a tombstone: the parcel was removed or superseded and the
    /// slot is reclaimed at the next rebuild.
    record: Option<Arc<IndexRecord>>,
    layers: Vec<Vec<usize>>,
}

pub(crate) struct HnswGraph {
    nodes: Vec<HnswNode>,
    id_to_index: AHashMap<ParcelId, usize>,
    metric: Metric,
    max_connections: usize,
    max_layers: usize,
    ef_construction: usize,
    live: usize,
}

impl HnswGraph {
    pub(crate) fn new(metric: Metric, max_connections: usize, max_layers: usize) -> Self {
        Self {
            nodes: Vec::new(),
            id_to_index: AHashMap::new(),
            metric,
            max_connections,
            max_layers,
            ef_construction: 200,
            live: 0,
        }
    }

    #[inline]
    pub(crate) fn metric(&self) -> Metric {
        self.metric
    }

    #[inline]
    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    fn select_layer(&self) -> usize {
        let mut layer = 0;
        while layer < self.max_layers - 1 && rand::random::<f32>() < 0.5 {
            layer += 1;
        }
        layer
    }

    #[inline]
    fn distance_to_node(&self, query: &[f32], idx: usize) -> f32 {
        match &self.nodes[idx].record {
            Some(record) => self.metric.distance(query, record.vector.as_slice()),
            None => f32::INFINITY,
        }
    }

    /// First non-tombstoned node, used as the fixed entry point.
    fn entry_point(&self) -> Option<usize> {
        self.nodes.iter().position(|n| n.record.is_some())
    }

    /// Greedy beam search within one layer; returns (idx, dist) ascending.
    fn search_layer(
        &self,
        query: &[f32],
        entry: usize,
        ef: usize,
        layer: usize,
        visited: &mut VisitedSet,
    ) -> Vec<(usize, f32)> {
        let mut frontier: BinaryHeap<Near> = BinaryHeap::with_capacity(ef * 2);
        let mut results: BinaryHeap<Far> = BinaryHeap::with_capacity(ef + 1);

        let entry_dist = self.distance_to_node(query, entry);
        frontier.push(Near { idx: entry, dist: entry_dist });
        results.push(Far { idx: entry, dist: entry_dist });
        visited.insert(entry);

        let mut worst = entry_dist;

        while let Some(Near { idx, dist }) = frontier.pop() {
            if results.len() >= ef && dist > worst {
                break;
            }
            let Some(neighbors) = self.nodes[idx].layers.get(layer) else {
                continue;
            };
            for &neighbor in neighbors.iter() {
                if !visited.insert(neighbor) {
                    continue;
                }
                let d = self.distance_to_node(query, neighbor);
                if results.len() < ef || d < worst {
                    frontier.push(Near { idx: neighbor, dist: d });
                    results.push(Far { idx: neighbor, dist: d });
                    if results.len() > ef {
                        results.pop();
                    }
                    if let Some(far) = results.peek() {
                        worst = far.dist;
                    }
                }
            }
        }

        let mut out: Vec<(usize, f32)> = results.into_iter().map(|c| (c.idx, c.dist)).collect();
        out.sort_unstable_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        out
    }

    /// Insert an entry, replacing any live entry for the same parcel.
    pub(crate) fn insert(&mut self, record: Arc<IndexRecord>) {
        if self.id_to_index.contains_key(&record.id) {
            self.remove(&record.id);
        }

        let top_layer = self.select_layer();
        let query = record.vector.as_slice().to_vec();
        let id = record.id.clone();

        let mut node = HnswNode {
            record: Some(record),
            layers: vec![Vec::new(); top_layer + 1],
        };

        let Some(entry) = self.entry_point() else {
            self.id_to_index.insert(id, self.nodes.len());
            self.nodes.push(node);
            self.live += 1;
            return;
        };

        // Connect at every layer the node participates in.
        let mut links: Vec<Vec<usize>> = Vec::with_capacity(top_layer + 1);
        for layer in 0..=top_layer {
            let mut visited = VisitedSet::new(self.nodes.len());
            let candidates = self.search_layer(&query, entry, self.ef_construction, layer, &mut visited);
            links.push(
                candidates
                    .iter()
                    .take(self.max_connections)
                    .map(|(idx, _)| *idx)
                    .collect(),
            );
        }
        for (layer, neighbors) in links.iter().enumerate() {
            node.layers[layer] = neighbors.clone();
        }

        let node_idx = self.nodes.len();
        self.nodes.push(node);
        self.live += 1;
        self.id_to_index.insert(id, node_idx);

        // Backlinks, pruned to the closest when a neighbor grows too dense.
        for (layer, neighbors) in links.iter().enumerate() {
            for &neighbor in neighbors {
                if layer >= self.nodes[neighbor].layers.len() {
                    continue;
                }
                self.nodes[neighbor].layers[layer].push(node_idx);
                if self.nodes[neighbor].layers[layer].len() > self.max_connections * 2 {
                    let base = match &self.nodes[neighbor].record {
                        Some(r) => r.vector.as_slice().to_vec(),
                        None => continue,
                    };
                    let mut connections = self.nodes[neighbor].layers[layer].clone();
                    connections.sort_by(|&a, &b| {
                        let da = self.distance_to_node(&base, a);
                        let db = self.distance_to_node(&base, b);
                        da.partial_cmp(&db).unwrap_or(Ordering::Equal)
                    });
                    connections.truncate(self.max_connections * 2);
                    self.nodes[neighbor].layers[layer] = connections;
                }
            }
        }
    }

    /// Tombstone a parcel's entry. Links stay in place until the next
    /// rebuild; searches skip dead slots.
    pub(crate) fn remove(&mut self, id: &ParcelId) -> bool {
        match self.id_to_index.remove(id) {
            Some(idx) => {
                if self.nodes[idx].record.take().is_some() {
                    self.live -= 1;
                }
                true
            }
            None => false,
        }
    }

    /// K nearest live entries, ordered by distance ascending.
    pub(crate) fn search(&self, query: &[f32], k: usize) -> Vec<(Arc<IndexRecord>, f32)> {
        let Some(entry) = self.entry_point() else {
            return Vec::new();
        };

        let ef = (k + k / 2).max(16);
        let mut visited = VisitedSet::new(self.nodes.len());

        // Small graphs skip the upper-layer descent entirely.
        let start = if self.nodes.len() < 1000 {
            entry
        } else {
            let mut current = entry;
            for layer in (1..self.max_layers).rev() {
                let mut layer_visited = VisitedSet::new(self.nodes.len());
                if let Some(&(best, _)) = self
                    .search_layer(query, current, 1, layer, &mut layer_visited)
                    .first()
                {
                    current = best;
                }
            }
            current
        };

        self.search_layer(query, start, ef, 0, &mut visited)
            .into_iter()
            .filter_map(|(idx, dist)| {
                self.nodes[idx].record.as_ref().map(|r| (r.clone(), dist))
            })
            .take(k)
            .collect()
    }

}
