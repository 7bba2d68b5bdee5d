// Copyright @yucwang 2026

use crate::core::geometry::Triangle;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;

const SPLIT_STEPS: usize = 100;

// Nodes live in one growable array and reference children by index.
// Leaves own candidate triangle indices; a triangle straddling a split
// plane is listed in both children, so queries must keep the strict
// minimum distance rather than the first accepted candidate.
enum KdNode {
    Leaf { tris: Vec<u32> },
    Interior { axis: usize, split: Float, left: u32, right: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub triangle: u32,
    pub u: Float,
    pub v: Float,
    pub t: Float,
}

pub struct KdTree {
    nodes: Vec<KdNode>,
    bounds: AABB,
    leaf_size: usize,
}

impl KdTree {
    pub fn build(triangles: &[Triangle], leaf_size: usize) -> Self {
        let mut bounds = AABB::default();
        for tri in triangles.iter() {
            bounds.expand_by_point(&tri.p0);
            bounds.expand_by_point(&tri.p1);
            bounds.expand_by_point(&tri.p2);
        }

        let mut tree = Self {
            nodes: Vec::new(),
            bounds,
            leaf_size: leaf_size.max(1),
        };

        if !triangles.is_empty() {
            let candidates: Vec<u32> = (0..triangles.len() as u32).collect();
            tree.build_node(triangles, candidates, bounds.p_min, bounds.p_max);
        }

        log::info!("Built kd-tree over {} triangles with {} nodes.",
                   triangles.len(), tree.nodes.len());

        tree
    }

    pub fn bounds(&self) -> &AABB {
        &self.bounds
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn build_node(&mut self,
                  triangles: &[Triangle],
                  candidates: Vec<u32>,
                  bounds_min: Vector3f,
                  bounds_max: Vector3f) -> u32 {
        if candidates.len() <= self.leaf_size {
            let node_idx = self.nodes.len() as u32;
            self.nodes.push(KdNode::Leaf { tris: candidates });
            return node_idx;
        }

        // No split that strictly shrinks both children: stop here even
        // though the leaf is oversized, otherwise degenerate input (many
        // coincident triangles) would recurse forever.
        let (axis, split) = match Self::find_split(triangles, &candidates, &bounds_min, &bounds_max) {
            Some(found) => found,
            None => {
                let node_idx = self.nodes.len() as u32;
                self.nodes.push(KdNode::Leaf { tris: candidates });
                return node_idx;
            }
        };

        let mut left_tris = Vec::new();
        let mut right_tris = Vec::new();
        let mut left_min = bounds_min;
        let mut left_max = bounds_max;
        let mut right_min = bounds_min;
        let mut right_max = bounds_max;
        let mut left_init = false;
        let mut right_init = false;

        for &ti in candidates.iter() {
            let tri = &triangles[ti as usize];
            if tri.axis_min(axis) <= split {
                for ax in 0..3 {
                    if !left_init {
                        left_min[ax] = tri.axis_min(ax);
                        left_max[ax] = tri.axis_max(ax);
                    } else {
                        left_min[ax] = left_min[ax].min(tri.axis_min(ax));
                        left_max[ax] = left_max[ax].max(tri.axis_max(ax));
                    }
                }
                left_init = true;
                left_tris.push(ti);
            }
            if tri.axis_max(axis) >= split {
                for ax in 0..3 {
                    if !right_init {
                        right_min[ax] = tri.axis_min(ax);
                        right_max[ax] = tri.axis_max(ax);
                    } else {
                        right_min[ax] = right_min[ax].min(tri.axis_min(ax));
                        right_max[ax] = right_max[ax].max(tri.axis_max(ax));
                    }
                }
                right_init = true;
                right_tris.push(ti);
            }
        }

        let node_idx = self.nodes.len() as u32;
        self.nodes.push(KdNode::Leaf { tris: Vec::new() });
        let left = self.build_node(triangles, left_tris, left_min, left_max);
        let right = self.build_node(triangles, right_tris, right_min, right_max);
        self.nodes[node_idx as usize] = KdNode::Interior { axis, split, left, right };

        node_idx
    }

    // Sweep all three axes in 1% steps of the node extent. The cost of a
    // candidate plane charges every triangle overlapping the left half
    // with the left width fraction and every triangle overlapping the
    // right half with the right fraction; straddlers pay both. A plane is
    // admissible only if both children end up strictly smaller than the
    // parent, which is what guarantees the recursion makes progress.
    fn find_split(triangles: &[Triangle],
                  candidates: &[u32],
                  bounds_min: &Vector3f,
                  bounds_max: &Vector3f) -> Option<(usize, Float)> {
        let total = candidates.len();
        let mut best: Option<(usize, Float)> = None;
        let mut best_cost = total as Float;

        for axis in 0..3 {
            let extent = bounds_max[axis] - bounds_min[axis];
            for step in 1..SPLIT_STEPS {
                let ratio = step as Float / SPLIT_STEPS as Float;
                let split = bounds_min[axis] + ratio * extent;

                let mut cost = 0.0;
                let mut left_count = 0usize;
                let mut right_count = 0usize;
                for &ti in candidates.iter() {
                    let tri = &triangles[ti as usize];
                    if tri.axis_min(axis) <= split {
                        cost += ratio;
                        left_count += 1;
                    }
                    if tri.axis_max(axis) >= split {
                        cost += 1.0 - ratio;
                        right_count += 1;
                    }
                }

                if left_count < total && right_count < total && cost < best_cost {
                    best = Some((axis, split));
                    best_cost = cost;
                }
            }
        }

        best
    }

    // Closest intersection along the ray, front to back. The running best
    // distance doubles as the pruning bound and as the deduplication of
    // straddle-duplicated candidates.
    pub fn nearest_hit(&self, triangles: &[Triangle], ray: &Ray3f) -> Option<RayHit> {
        if self.nodes.is_empty() {
            return None;
        }
        let (t_entry, t_exit) = self.bounds.ray_intersect_range(ray)?;

        let mut best = RayHit { triangle: u32::MAX, u: 0.0, v: 0.0, t: ray.max_t };
        self.nearest_node(triangles, ray, 0, t_entry, t_exit, &mut best);

        if best.triangle == u32::MAX {
            None
        } else {
            Some(best)
        }
    }

    fn nearest_node(&self,
                    triangles: &[Triangle],
                    ray: &Ray3f,
                    node: u32,
                    t_min: Float,
                    t_max: Float,
                    best: &mut RayHit) {
        if t_min >= best.t {
            return;
        }

        match &self.nodes[node as usize] {
            KdNode::Leaf { tris } => {
                let origin = ray.origin();
                let dir = ray.dir();
                for &ti in tris.iter() {
                    if let Some((t, u, v)) = triangles[ti as usize].intersect(&origin, &dir) {
                        if t >= ray.min_t && t < best.t {
                            *best = RayHit { triangle: ti, u, v, t };
                        }
                    }
                }
            }
            KdNode::Interior { axis, split, left, right } => {
                let o = ray.origin()[*axis];
                let d = ray.dir()[*axis];
                let (near, far) = if o <= *split {
                    (*left, *right)
                } else {
                    (*right, *left)
                };

                let t_split = (*split - o) / d;
                if t_split < 0.0 || t_split > t_max {
                    self.nearest_node(triangles, ray, near, t_min, t_max, best);
                } else if t_split < t_min {
                    self.nearest_node(triangles, ray, far, t_min, t_max, best);
                } else {
                    self.nearest_node(triangles, ray, near, t_min, t_split, best);
                    self.nearest_node(triangles, ray, far, t_split, t_max, best);
                }
            }
        }
    }

    // Occlusion query: reports whether anything blocks the ray strictly
    // before its max_t. Stops at the first blocker; `exclude` skips the
    // sampled light triangle so it cannot shadow itself.
    pub fn hit_before(&self,
                      triangles: &[Triangle],
                      ray: &Ray3f,
                      exclude: Option<u32>) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let (t_entry, t_exit) = match self.bounds.ray_intersect_range(ray) {
            Some(range) => range,
            None => return false,
        };

        self.occluded_node(triangles, ray, 0, t_entry, t_exit, exclude)
    }

    fn occluded_node(&self,
                     triangles: &[Triangle],
                     ray: &Ray3f,
                     node: u32,
                     t_min: Float,
                     t_max: Float,
                     exclude: Option<u32>) -> bool {
        if t_min >= ray.max_t {
            return false;
        }

        match &self.nodes[node as usize] {
            KdNode::Leaf { tris } => {
                let origin = ray.origin();
                let dir = ray.dir();
                for &ti in tris.iter() {
                    if exclude == Some(ti) {
                        continue;
                    }
                    if let Some((t, _, _)) = triangles[ti as usize].intersect(&origin, &dir) {
                        if t >= ray.min_t && t < ray.max_t {
                            return true;
                        }
                    }
                }
                false
            }
            KdNode::Interior { axis, split, left, right } => {
                let o = ray.origin()[*axis];
                let d = ray.dir()[*axis];
                let (near, far) = if o <= *split {
                    (*left, *right)
                } else {
                    (*right, *left)
                };

                let t_split = (*split - o) / d;
                if t_split < 0.0 || t_split > t_max {
                    self.occluded_node(triangles, ray, near, t_min, t_max, exclude)
                } else if t_split < t_min {
                    self.occluded_node(triangles, ray, far, t_min, t_max, exclude)
                } else {
                    self.occluded_node(triangles, ray, near, t_min, t_split, exclude)
                        || self.occluded_node(triangles, ray, far, t_split, t_max, exclude)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::constants::{Vector3f, EPSILON};

    fn axis_quad(z: Float, size: Float) -> Vec<Triangle> {
        vec![
            Triangle::new(Vector3f::new(-size, -size, z),
                          Vector3f::new(size, -size, z),
                          Vector3f::new(size, size, z)),
            Triangle::new(Vector3f::new(-size, -size, z),
                          Vector3f::new(size, size, z),
                          Vector3f::new(-size, size, z)),
        ]
    }

    // Scatter small triangles along x so splits have something to do.
    fn scattered_triangles(count: usize) -> Vec<Triangle> {
        let mut tris = Vec::new();
        for i in 0..count {
            let x = i as Float * 1.5;
            let y = (i % 3) as Float;
            tris.push(Triangle::new(Vector3f::new(x, y, 0.0),
                                    Vector3f::new(x + 1.0, y, 0.0),
                                    Vector3f::new(x, y + 1.0, 0.0)));
        }
        tris
    }

    #[test]
    fn test_containment_after_build() {
        let tris = scattered_triangles(40);
        let tree = KdTree::build(&tris, 4);

        // every triangle index must appear in at least one leaf whose
        // region, replayed from the root splits, overlaps the triangle
        for (idx, tri) in tris.iter().enumerate() {
            let mut found = false;
            let mut stack = vec![(0u32, tree.bounds.p_min, tree.bounds.p_max)];
            while let Some((node, region_min, region_max)) = stack.pop() {
                match &tree.nodes[node as usize] {
                    KdNode::Leaf { tris: leaf_tris } => {
                        if leaf_tris.contains(&(idx as u32)) {
                            let overlaps = (0..3).all(|ax| {
                                tri.axis_min(ax) <= region_max[ax] + 1e-5
                                    && tri.axis_max(ax) >= region_min[ax] - 1e-5
                            });
                            if overlaps {
                                found = true;
                                break;
                            }
                        }
                    }
                    KdNode::Interior { axis, split, left, right } => {
                        let mut left_max = region_max;
                        left_max[*axis] = *split;
                        let mut right_min = region_min;
                        right_min[*axis] = *split;
                        stack.push((*left, region_min, left_max));
                        stack.push((*right, right_min, region_max));
                    }
                }
            }
            assert!(found, "triangle {} not reachable in any leaf", idx);
        }
    }

    #[test]
    fn test_leaf_bound_or_no_admissible_split() {
        let tris = scattered_triangles(64);
        let leaf_size = 4;
        let tree = KdTree::build(&tris, leaf_size);

        for node in tree.nodes.iter() {
            if let KdNode::Leaf { tris: leaf_tris } = node {
                if leaf_tris.len() > leaf_size {
                    // oversized leaves are only legal when no admissible
                    // split existed for exactly this candidate set
                    let mut bmin = Vector3f::new(std::f32::MAX, std::f32::MAX, std::f32::MAX);
                    let mut bmax = Vector3f::new(std::f32::MIN, std::f32::MIN, std::f32::MIN);
                    for &ti in leaf_tris.iter() {
                        for ax in 0..3 {
                            bmin[ax] = bmin[ax].min(tris[ti as usize].axis_min(ax));
                            bmax[ax] = bmax[ax].max(tris[ti as usize].axis_max(ax));
                        }
                    }
                    assert!(KdTree::find_split(&tris, leaf_tris, &bmin, &bmax).is_none());
                }
            }
        }
    }

    #[test]
    fn test_coincident_triangles_terminate_as_oversized_leaf() {
        // 16 identical triangles can never be split apart; build must
        // terminate with a single oversized leaf instead of recursing.
        let tri = Triangle::new(Vector3f::new(0.0, 0.0, 0.0),
                                Vector3f::new(1.0, 0.0, 0.0),
                                Vector3f::new(0.0, 1.0, 0.0));
        let tris = vec![tri; 16];
        let tree = KdTree::build(&tris, 2);

        assert_eq!(tree.node_count(), 1);
        match &tree.nodes[0] {
            KdNode::Leaf { tris } => assert_eq!(tris.len(), 16),
            _ => panic!("expected a leaf root"),
        }
    }

    #[test]
    fn test_nearest_hit_picks_closer_triangle() {
        let mut tris = axis_quad(-5.0, 2.0);
        tris.extend(axis_quad(-2.0, 2.0));
        let tree = KdTree::build(&tris, 1);

        let ray = Ray3f::new(Vector3f::new(0.5, 0.5, 0.0),
                             Vector3f::new(0.0, 0.0, -1.0),
                             None, None);
        let hit = tree.nearest_hit(&tris, &ray).expect("expected hit");

        // quads at z=-2 occupy indices 2 and 3
        assert!(hit.triangle == 2 || hit.triangle == 3);
        assert!((hit.t - 2.0).abs() < 1e-5);

        // matches the direct triangle intersection
        let direct = tris[hit.triangle as usize]
            .intersect(&ray.origin(), &ray.dir())
            .expect("direct intersection");
        assert!((direct.0 - hit.t).abs() < 1e-6);
    }

    #[test]
    fn test_occlusion_matches_nearest_distance() {
        let mut tris = axis_quad(-5.0, 2.0);
        tris.extend(axis_quad(-2.0, 2.0));
        let tree = KdTree::build(&tris, 1);

        let origin = Vector3f::new(0.5, 0.5, 0.0);
        let dir = Vector3f::new(0.0, 0.0, -1.0);
        let nearest = tree
            .nearest_hit(&tris, &Ray3f::new(origin, dir, None, None))
            .expect("expected hit");

        let beyond = Ray3f::new(origin, dir, Some(0.0), Some(nearest.t + EPSILON));
        assert!(tree.hit_before(&tris, &beyond, None));

        let short = Ray3f::new(origin, dir, Some(0.0), Some(nearest.t - EPSILON));
        assert!(!tree.hit_before(&tris, &short, None));
    }

    #[test]
    fn test_shadow_query_excludes_light_triangle() {
        let tris = vec![Triangle::new(Vector3f::new(-2.0, -2.0, -2.0),
                                      Vector3f::new(2.0, -2.0, -2.0),
                                      Vector3f::new(0.0, 2.0, -2.0))];
        let tree = KdTree::build(&tris, 1);

        let ray = Ray3f::new(Vector3f::new(0.0, 0.0, 0.0),
                             Vector3f::new(0.0, 0.0, -1.0),
                             Some(0.0), Some(10.0));
        assert!(tree.hit_before(&tris, &ray, None));

        // excluding the only blocker clears the path
        assert!(!tree.hit_before(&tris, &ray, Some(0)));
    }

    #[test]
    fn test_single_leaf_tree_matches_small_leaf_tree() {
        let tris = scattered_triangles(32);
        let single = KdTree::build(&tris, tris.len());
        assert_eq!(single.node_count(), 1);
        let split = KdTree::build(&tris, 4);
        assert!(split.node_count() > 1);

        for iy in 0..8 {
            for ix in 0..32 {
                let origin = Vector3f::new(ix as Float * 1.5 + 0.3,
                                           iy as Float * 0.5,
                                           5.0);
                let ray = Ray3f::new(origin, Vector3f::new(0.0, 0.1, -1.0), None, None);

                let a = single.nearest_hit(&tris, &ray);
                let b = split.nearest_hit(&tris, &ray);
                match (a, b) {
                    (None, None) => {}
                    (Some(ha), Some(hb)) => {
                        assert_eq!(ha.triangle, hb.triangle);
                        assert!((ha.t - hb.t).abs() < 1e-5);
                    }
                    _ => panic!("tree results disagree at ({}, {})", ix, iy),
                }
            }
        }
    }

    #[test]
    fn test_empty_tree_misses() {
        let tris: Vec<Triangle> = Vec::new();
        let tree = KdTree::build(&tris, 8);
        let ray = Ray3f::new(Vector3f::new(0.0, 0.0, 0.0),
                             Vector3f::new(0.0, 0.0, -1.0),
                             None, None);
        assert!(tree.nearest_hit(&tris, &ray).is_none());
        assert!(!tree.hit_before(&tris, &ray, None));
    }

    #[test]
    fn test_ray_outside_scene_bounds_misses() {
        let tris = scattered_triangles(16);
        let tree = KdTree::build(&tris, 4);
        let ray = Ray3f::new(Vector3f::new(0.0, 100.0, 0.0),
                             Vector3f::new(0.0, 1.0, 0.0),
                             None, None);
        assert!(tree.nearest_hit(&tris, &ray).is_none());
    }
}
