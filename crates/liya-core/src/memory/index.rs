//! ============================================================================
//! Vector Index - Exact nearest-neighbour search over memory embeddings
//! ============================================================================
//! Flat index: every query is compared against every stored vector using
//! squared Euclidean distance. Entries carry the `RecordId` they came from,
//! so results always point at the right record no matter which store
//! entries were skipped while building.
//! ============================================================================

use tracing::{debug, warn};

use super::types::RecordId;
use crate::error::DimensionMismatch;

/// A search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: RecordId,
    /// Squared L2 distance to the query
    pub distance: f32,
}

/// In-memory flat L2 index
#[derive(Debug, Default, Clone)]
pub struct VectorIndex {
    dimension: Option<usize>,
    ids: Vec<RecordId>,
    /// Row-major, `ids.len() * dimension` values
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(id, vector)` pairs. The first non-empty vector fixes the
    /// dimensionality; empty and disagreeing vectors are left out.
    pub fn build<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (RecordId, &'a [f32])>,
    {
        let mut index = Self::new();
        let mut skipped = 0usize;

        for (id, vector) in entries {
            if vector.is_empty() {
                skipped += 1;
                continue;
            }
            if let Err(e) = index.add(id, vector) {
                warn!("Leaving memory {} out of the index: {}", id, e);
                skipped += 1;
            }
        }

        debug!(
            "Built index with {} vectors (dimension {:?}, {} skipped)",
            index.len(),
            index.dimension,
            skipped
        );
        index
    }

    /// Add a single vector. An empty index adopts the vector's length.
    pub fn add(&mut self, id: RecordId, vector: &[f32]) -> Result<(), DimensionMismatch> {
        let expected = match self.dimension {
            Some(dim) => dim,
            None if vector.is_empty() => {
                return Err(DimensionMismatch {
                    expected: 0,
                    found: 0,
                })
            }
            None => {
                self.dimension = Some(vector.len());
                vector.len()
            }
        };

        if vector.len() != expected {
            return Err(DimensionMismatch {
                expected,
                found: vector.len(),
            });
        }

        self.ids.push(id);
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.ids.contains(&id)
    }

    /// The `k` closest entries, nearest first. Equal distances keep
    /// insertion order. An empty index, `k == 0` or a query of the wrong
    /// length gives no results.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let Some(dim) = self.dimension else {
            return Vec::new();
        };
        if query.len() != dim {
            debug!("Query has {} dimensions, index has {}", query.len(), dim);
            return Vec::new();
        }
        if k == 0 {
            return Vec::new();
        }

        let mut hits: Vec<Neighbor> = self
            .ids
            .iter()
            .zip(self.data.chunks_exact(dim))
            .map(|(id, row)| Neighbor {
                id: *id,
                distance: squared_l2(query, row),
            })
            .collect();

        // Stable sort keeps insertion order for ties
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        hits
    }

    /// The single closest entry
    pub fn nearest(&self, query: &[f32]) -> Option<Neighbor> {
        self.search(query, 1).into_iter().next()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(vectors: &[Vec<f32>]) -> VectorIndex {
        VectorIndex::build(
            vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (RecordId(i), v.as_slice())),
        )
    }

    #[test]
    fn test_empty_index_has_no_match() {
        let index = index_of(&[]);
        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);
        assert_eq!(index.nearest(&[1.0, 2.0]), None);
        assert!(index.search(&[1.0], 3).is_empty());
    }

    #[test]
    fn test_only_invalid_vectors_build_empty_index() {
        let index = index_of(&[vec![], vec![]]);
        assert!(index.is_empty());
        assert_eq!(index.nearest(&[0.0]), None);
    }

    #[test]
    fn test_nearest_is_minimum_distance() {
        let vectors = vec![
            vec![0.0, 0.0],
            vec![10.0, 10.0],
            vec![3.0, 4.0],
            vec![-1.0, 0.5],
        ];
        let index = index_of(&vectors);

        let hit = index.nearest(&[2.5, 3.5]).unwrap();
        assert_eq!(hit.id, RecordId(2));
        assert_eq!(hit.distance, 0.5);

        // Brute-force agreement for a handful of queries
        for query in [[9.0, 9.0], [-2.0, 0.0], [0.1, 0.1], [5.0, 5.0]] {
            let expected = vectors
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    squared_l2(&query, a).total_cmp(&squared_l2(&query, b))
                })
                .map(|(i, _)| RecordId(i));
            assert_eq!(index.nearest(&query).map(|n| n.id), expected);
        }
    }

    #[test]
    fn test_ties_go_to_lowest_insertion_position() {
        let index = index_of(&[vec![1.0, 0.0], vec![-1.0, 0.0], vec![0.0, 1.0]]);
        let hits = index.search(&[0.0, 0.0], 3);
        assert_eq!(
            hits.iter().map(|h| h.id).collect::<Vec<_>>(),
            vec![RecordId(0), RecordId(1), RecordId(2)]
        );
        assert!(hits.iter().all(|h| h.distance == 1.0));
    }

    #[test]
    fn test_k_nearest_ordering_and_truncation() {
        let index = index_of(&[vec![5.0], vec![1.0], vec![3.0], vec![2.0]]);
        let hits = index.search(&[0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], Neighbor { id: RecordId(1), distance: 1.0 });
        assert_eq!(hits[1], Neighbor { id: RecordId(3), distance: 4.0 });

        assert_eq!(index.search(&[0.0], 10).len(), 4);
        assert!(index.search(&[0.0], 0).is_empty());
    }

    #[test]
    fn test_mismatched_dimensions_are_filtered_not_fatal() {
        let index = index_of(&[
            vec![],
            vec![1.0, 1.0],
            vec![1.0, 1.0, 1.0],
            vec![4.0, 4.0],
        ]);
        assert_eq!(index.dimension(), Some(2));
        assert_eq!(index.len(), 2);
        assert!(!index.contains(RecordId(0)));
        assert!(!index.contains(RecordId(2)));

        // Results map back to store positions, not index ordinals
        assert_eq!(index.nearest(&[4.0, 4.0]).unwrap().id, RecordId(3));

        assert!(index.search(&[1.0, 1.0, 1.0], 1).is_empty());
    }

    #[test]
    fn test_incremental_add() {
        let mut index = VectorIndex::new();
        index.add(RecordId(7), &[0.0, 1.0]).unwrap();
        assert_eq!(index.dimension(), Some(2));

        index.add(RecordId(9), &[5.0, 5.0]).unwrap();
        assert_eq!(index.nearest(&[5.0, 5.0]).unwrap().id, RecordId(9));

        let err = index.add(RecordId(10), &[1.0]).unwrap_err();
        assert_eq!(err, DimensionMismatch { expected: 2, found: 1 });
        assert_eq!(index.len(), 2);

        assert!(VectorIndex::new().add(RecordId(0), &[]).is_err());
    }
}
