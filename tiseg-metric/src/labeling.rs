//! Connected-component relabeling of instance maps.
//!
//! Instance ids coming out of post-processing are arbitrary and may even reuse
//! one id for several blobs. Matching assumes contiguous ids `1..=K` where each
//! id is a single 8-connected component, so every map is relabeled first.

use crate::map::LabelMap;

/// Neighbours already visited in raster order.
const PRIOR_NEIGHBOURS: [(isize, isize); 4] = [(-1, -1), (-1, 0), (-1, 1), (0, -1)];

/// Relabels `mask` into contiguous 8-connected instance ids.
///
/// Two neighbouring pixels belong to the same output instance only if they
/// carry the same input id. Output ids are assigned in raster order of each
/// component's first pixel. An all-background input yields an all-zero map.
#[must_use]
pub fn relabel(mask: &LabelMap) -> LabelMap {
    relabel_with_count(mask).0
}

/// Like [`relabel`], also returning the number of instances found.
#[must_use]
pub fn relabel_with_count(mask: &LabelMap) -> (LabelMap, usize) {
    let (height, width) = mask.dim();
    let mut provisional = LabelMap::zeros((height, width));
    let mut forest = DisjointSet::default();

    for row in 0..height {
        for col in 0..width {
            let value = mask[[row, col]];
            if value == 0 {
                continue;
            }

            let mut current = 0;
            for (dr, dc) in PRIOR_NEIGHBOURS {
                let (Some(nr), Some(nc)) = (row.checked_add_signed(dr), col.checked_add_signed(dc))
                else {
                    continue;
                };
                if nc >= width || mask[[nr, nc]] != value {
                    continue;
                }
                let neighbour = provisional[[nr, nc]];
                if current == 0 {
                    current = neighbour;
                } else {
                    forest.union(current, neighbour);
                }
            }

            if current == 0 {
                current = forest.make_set();
            }
            provisional[[row, col]] = current;
        }
    }

    let mut final_ids = vec![0u32; forest.len()];
    let mut count = 0u32;
    for label in &mut provisional {
        if *label == 0 {
            continue;
        }
        let root = forest.find(*label) as usize;
        if final_ids[root] == 0 {
            count += 1;
            final_ids[root] = count;
        }
        *label = final_ids[root];
    }

    (provisional, count as usize)
}

/// Union-find over provisional labels. Index 0 is the unused background slot.
#[derive(Debug, Clone)]
struct DisjointSet {
    parent: Vec<u32>,
}

impl Default for DisjointSet {
    fn default() -> Self {
        Self { parent: vec![0] }
    }
}

impl DisjointSet {
    fn len(&self) -> usize {
        self.parent.len()
    }

    fn make_set(&mut self) -> u32 {
        let label = self.parent.len() as u32;
        self.parent.push(label);
        label
    }

    fn find(&mut self, mut label: u32) -> u32 {
        while self.parent[label as usize] != label {
            let grandparent = self.parent[self.parent[label as usize] as usize];
            self.parent[label as usize] = grandparent;
            label = grandparent;
        }
        label
    }

    fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // keep the older label as root
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child as usize] = root;
        }
    }
}
