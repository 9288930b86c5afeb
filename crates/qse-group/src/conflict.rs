use qse_core::ObservableSet;

/// Undirected graph whose edges join observables that cannot share a setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictGraph {
    adjacency: Vec<Vec<usize>>,
}

impl ConflictGraph {
    /// Builds the graph over reporting indices of `observables`.
    pub fn from_observables(observables: &ObservableSet) -> Self {
        let items: Vec<_> = observables.iter().collect();
        let mut adjacency = vec![Vec::new(); items.len()];
        for (i, a) in items.iter().enumerate() {
            for (j, b) in items.iter().enumerate().skip(i + 1) {
                if !a.is_compatible_with(b) {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
        Self { adjacency }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// True for a graph without vertices.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Conflicting neighbours of `vertex`, ascending.
    pub fn neighbors(&self, vertex: usize) -> &[usize] {
        &self.adjacency[vertex]
    }

    /// Number of conflict edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Returns true when no two members conflict.
    pub fn is_independent(&self, members: &[usize]) -> bool {
        members.iter().enumerate().all(|(pos, &a)| {
            members[pos + 1..]
                .iter()
                .all(|b| self.neighbors(a).binary_search(b).is_err())
        })
    }
}
