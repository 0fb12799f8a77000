//! SAH-based BVH builder over photon bounding volumes.
//!
//! Constructs a flat BVH array from a list of AABBs using binned Surface Area
//! Heuristic splits. Photons move every frame, so the index is always built
//! from scratch; there is no refit path.

use bytemuck::Zeroable;

use super::bvh::{Aabb, BvhNode};

/// Number of SAH bins for split evaluation.
const NUM_BINS: usize = 12;

/// Cost ratio: traversal vs intersection.
const TRAVERSAL_COST: f32 = 1.0;
const INTERSECT_COST: f32 = 1.0;

/// Maximum primitives per leaf before forcing a split.
const MAX_LEAF_SIZE: usize = 4;

/// Built BVH result.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    /// Flat node array (index 0 = root). Empty when built from no primitives.
    pub nodes: Vec<BvhNode>,
    /// Reordered primitive indices (leaves reference into this).
    pub prim_indices: Vec<usize>,
}

/// SAH bin for evaluating split candidates.
#[derive(Clone, Copy)]
struct Bin {
    bounds: Aabb,
    count: usize,
}

impl Bin {
    const EMPTY: Self = Self { bounds: Aabb::EMPTY, count: 0 };
}

/// Build a BVH over `bounds` using SAH.
///
/// Primitives are not moved; `prim_indices` maps leaf ranges back into
/// the input slice.
#[tracing::instrument(skip_all, fields(prim_count = bounds.len()))]
pub fn build_bvh(bounds: &[Aabb]) -> Bvh {
    let n = bounds.len();
    if n == 0 {
        return Bvh::default();
    }

    let centroids: Vec<[f32; 3]> = bounds.iter().map(|b| b.centroid()).collect();

    // Working index array (reordered by partitioning)
    let mut indices: Vec<usize> = (0..n).collect();

    // Worst case: 2*n - 1 nodes for a full binary tree
    let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n);
    nodes.push(BvhNode::zeroed());

    // Explicit stack instead of recursion for large photon counts
    struct Task {
        node_idx: usize,
        start: usize,
        end: usize, // exclusive
    }

    let mut stack = vec![Task { node_idx: 0, start: 0, end: n }];

    while let Some(task) = stack.pop() {
        let Task { node_idx, start, end } = task;
        let count = end - start;

        let mut node_aabb = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            node_aabb.grow(&bounds[idx]);
        }

        if count <= MAX_LEAF_SIZE {
            nodes[node_idx] = BvhNode::leaf(&node_aabb, start as u32, count as u32);
            continue;
        }

        let mut centroid_bounds = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            centroid_bounds.grow_point(centroids[idx]);
        }

        let (best_axis, best_split_pos, best_cost) =
            find_best_split(&indices[start..end], bounds, &centroids, &centroid_bounds);

        // Cost of not splitting, in the same unnormalized units as the split cost
        let leaf_cost = count as f32 * INTERSECT_COST * node_aabb.area();

        if best_cost >= leaf_cost || best_axis == usize::MAX {
            nodes[node_idx] = BvhNode::leaf(&node_aabb, start as u32, count as u32);
            continue;
        }

        let mid = partition(&mut indices[start..end], |&idx| {
            centroids[idx][best_axis] < best_split_pos
        }) + start;

        // Degenerate partition: split in the middle
        let mid = if mid == start || mid == end { (start + end) / 2 } else { mid };

        let left_idx = nodes.len();
        let right_idx = left_idx + 1;
        nodes.push(BvhNode::zeroed());
        nodes.push(BvhNode::zeroed());

        nodes[node_idx] = BvhNode::internal(&node_aabb, left_idx as u32);

        // Right first so the left subtree is laid out first (depth-first)
        stack.push(Task { node_idx: right_idx, start: mid, end });
        stack.push(Task { node_idx: left_idx, start, end: mid });
    }

    Bvh { nodes, prim_indices: indices }
}

/// SAH binned split search across all 3 axes.
/// Returns (best_axis, split_position, cost). axis=usize::MAX if no valid split.
fn find_best_split(
    indices: &[usize],
    bounds: &[Aabb],
    centroids: &[[f32; 3]],
    centroid_bounds: &Aabb,
) -> (usize, f32, f32) {
    let mut best_axis = usize::MAX;
    let mut best_pos = 0.0f32;
    let mut best_cost = f32::INFINITY;

    for axis in 0..3 {
        let extent = centroid_bounds.max[axis] - centroid_bounds.min[axis];
        if extent < 1e-8 {
            continue;
        }

        let mut bins = [Bin::EMPTY; NUM_BINS];
        let inv_extent = NUM_BINS as f32 / extent;

        for &idx in indices {
            let bin_id = ((centroids[idx][axis] - centroid_bounds.min[axis]) * inv_extent) as usize;
            let bin = &mut bins[bin_id.min(NUM_BINS - 1)];
            bin.bounds.grow(&bounds[idx]);
            bin.count += 1;
        }

        // Prefix sweep from the left
        let mut left_area = [0.0f32; NUM_BINS - 1];
        let mut left_count = [0usize; NUM_BINS - 1];
        let mut sweep = Aabb::EMPTY;
        let mut sweep_count = 0;
        for i in 0..NUM_BINS - 1 {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            left_area[i] = sweep.area();
            left_count[i] = sweep_count;
        }

        // Suffix sweep from the right, evaluating each plane
        sweep = Aabb::EMPTY;
        sweep_count = 0;
        for i in (1..NUM_BINS).rev() {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            if left_count[i - 1] == 0 || sweep_count == 0 {
                continue;
            }
            let cost = TRAVERSAL_COST
                + INTERSECT_COST
                    * (left_count[i - 1] as f32 * left_area[i - 1] + sweep_count as f32 * sweep.area());

            if cost < best_cost {
                best_cost = cost;
                best_axis = axis;
                best_pos = centroid_bounds.min[axis] + (i as f32 / NUM_BINS as f32) * extent;
            }
        }
    }

    (best_axis, best_pos, best_cost)
}

/// Partition slice in-place. Returns count of elements where predicate is true.
fn partition<T, F>(slice: &mut [T], pred: F) -> usize
where
    F: Fn(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();
    while left < right {
        if pred(&slice[left]) {
            left += 1;
        } else {
            right -= 1;
            slice.swap(left, right);
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn cube(x: f32, y: f32, z: f32) -> Aabb {
        Aabb::around(Vec3::new(x, y, z), 0.1)
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = build_bvh(&[]);
        assert!(bvh.nodes.is_empty());
        assert!(bvh.prim_indices.is_empty());
    }

    #[test]
    fn test_single_leaf() {
        let bvh = build_bvh(&[cube(0.0, 0.0, 0.0)]);
        assert_eq!(bvh.nodes.len(), 1);
        assert_eq!(bvh.nodes[0].count, 1);
    }

    #[test]
    fn test_many_builds_tree_with_all_indices() {
        let prims: Vec<Aabb> = (0..200).map(|i| cube(i as f32 * 0.5, (i % 7) as f32, 0.0)).collect();
        let bvh = build_bvh(&prims);
        assert!(bvh.nodes.len() > 1);

        let mut sorted = bvh.prim_indices.clone();
        sorted.sort();
        assert_eq!(sorted, (0..200).collect::<Vec<_>>());

        // Every leaf range stays inside the index array and nodes are tight.
        let mut covered = 0;
        for node in &bvh.nodes {
            if node.is_leaf() {
                let first = node.left_or_first as usize;
                covered += node.count as usize;
                for &idx in &bvh.prim_indices[first..first + node.count as usize] {
                    let b = node.bounds();
                    assert!(b.contains(Vec3::from(prims[idx].centroid())));
                }
            }
        }
        assert_eq!(covered, 200);
    }

    #[test]
    fn test_coincident_primitives_stay_one_leaf() {
        let prims = vec![cube(1.0, 1.0, 1.0); 10];
        let bvh = build_bvh(&prims);
        assert_eq!(bvh.nodes.len(), 1);
        assert_eq!(bvh.nodes[0].count, 10);
    }
}
