//! Bounding-volume tree.
//!
//! # Structure
//!
//! ```text
//!            [root: box = union of everything]
//!              /                        \
//!   [front: centers > avg]       [back: centers < avg]
//!      /          \                  (leaf: objects)
//!    ...          ...
//! ```
//!
//! Each node owns a box, a list of `(object, box)` pairs, and either no
//! children or exactly two. After [`AabbTree::optimize`], a node with
//! children holds no objects of its own and neither child subtree is empty.
//!
//! # Box Maintenance
//!
//! A node's box is the union of the boxes inserted into it, grown
//! incrementally. Removal never shrinks boxes; they may stay loose until the
//! next full rebuild. The tree is never rebalanced incrementally.
//!
//! # Queries
//!
//! A query descends into every child whose box is not [`Intersection::Out`].
//! Children classified as [`Intersection::In`] are known to be fully inside
//! the shape, so their objects are emitted without per-object tests.

use std::fmt;

use crate::math::{BoundingBox, Intersection, QueryShape};

/// Number of children created by a split.
const CHILDREN_PER_SPLIT: usize = 2;

#[derive(Debug, Clone)]
struct Node<T> {
    bounds: BoundingBox,
    objects: Vec<(T, BoundingBox)>,
    children: Option<Box<[Node<T>; CHILDREN_PER_SPLIT]>>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            bounds: BoundingBox::default(),
            objects: Vec::new(),
            children: None,
        }
    }
}

impl<T> Node<T> {
    fn add(&mut self, object: T, bounds: BoundingBox) {
        self.objects.push((object, bounds));
        // The first object defines the box; unioning with the default box
        // would drag it to the origin.
        if self.objects.len() == 1 {
            self.bounds = bounds;
        } else {
            self.bounds.union_with(&bounds);
        }
    }

    fn len(&self) -> usize {
        let in_children = self
            .children
            .as_ref()
            .map_or(0, |children| children.iter().map(Node::len).sum());
        self.objects.len() + in_children
    }

    fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.children.is_none()
    }

    /// Moves every object held below this node into `target`.
    fn drain_into(&mut self, target: &mut Vec<(T, BoundingBox)>) {
        target.append(&mut self.objects);
        if let Some(mut children) = self.children.take() {
            for child in children.iter_mut() {
                child.drain_into(target);
            }
        }
    }

    /// Pulls all descendant objects back into this node.
    fn collapse(&mut self) {
        let mut gathered = Vec::new();
        if let Some(mut children) = self.children.take() {
            for child in children.iter_mut() {
                child.drain_into(&mut gathered);
            }
        }
        for (object, bounds) in gathered {
            self.add(object, bounds);
        }
    }

    // TODO: deduplicate once tree objects carry an ordering key; until then
    // duplicates are kept and counted by `len`.
    fn remove_duplicate_objects(&mut self) {}

    fn distribute(&mut self, ideal_objects_per_node: usize, level: usize) {
        self.collapse();

        if self.objects.len() <= ideal_objects_per_node {
            return;
        }

        // Unweighted average center of all held objects.
        let weight = 1.0 / self.objects.len() as f32;
        let average = self
            .objects
            .iter()
            .fold(glam::Vec3::ZERO, |acc, (_, b)| acc + b.center() * weight);

        // Split along the axis of strictly greatest extent, x by default.
        let size = self.bounds.size();
        let axis = if size.y > size.x && size.y > size.z {
            1
        } else if size.z > size.x && size.z > size.y {
            2
        } else {
            0
        };
        let split = average[axis];

        let mut front = Node::default();
        let mut back = Node::default();
        let mut tie_breaker = 0usize;
        for (object, bounds) in self.objects.drain(..) {
            let coord = bounds.center()[axis];
            let to_front = if coord > split {
                true
            } else if coord < split {
                false
            } else {
                // Objects sitting exactly on the average alternate sides.
                tie_breaker += 1;
                tie_breaker % 2 == 1
            };
            if to_front {
                front.add(object, bounds);
            } else {
                back.add(object, bounds);
            }
        }

        // A one-sided split would only add depth; take everything back.
        if front.objects.is_empty() || back.objects.is_empty() {
            for (object, bounds) in front.objects.into_iter().chain(back.objects) {
                self.add(object, bounds);
            }
            return;
        }

        let mut children = Box::new([front, back]);
        for child in children.iter_mut() {
            child.distribute(ideal_objects_per_node, level + 1);
        }
        self.children = Some(children);
    }

    fn query<S>(&self, shape: &S, out: &mut Vec<T>, test_objects: bool)
    where
        S: QueryShape + ?Sized,
        T: Clone,
    {
        if self.objects.len() > 1 && test_objects {
            out.extend(
                self.objects
                    .iter()
                    .filter(|(_, bounds)| shape.classify(bounds) != Intersection::Out)
                    .map(|(object, _)| object.clone()),
            );
        } else {
            out.extend(self.objects.iter().map(|(object, _)| object.clone()));
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                let intersection = shape.classify(&child.bounds);
                if intersection != Intersection::Out {
                    child.query(shape, out, intersection == Intersection::Intersect);
                }
            }
        }
    }

    fn remove(&mut self, object: &T, bounds: Option<&BoundingBox>)
    where
        T: PartialEq,
    {
        self.objects.retain(|(held, _)| held != object);
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if bounds.is_none_or(|b| child.bounds.intersects(b)) {
                    child.remove(object, bounds);
                }
            }
        }
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a T>) {
        out.extend(self.objects.iter().map(|(object, _)| object));
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect(out);
            }
        }
    }

    fn debug_print(
        &self,
        level: usize,
        object_count: &mut usize,
        verbose: bool,
        out: &mut dyn fmt::Write,
    ) -> fmt::Result {
        if verbose {
            writeln!(
                out,
                "{}objects: {}, child nodes: {}, aabb: {}",
                "-".repeat(level),
                self.objects.len(),
                self.children.as_ref().map_or(0, |c| c.len()),
                self.bounds
            )?;
        }
        *object_count += self.objects.len();
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.debug_print(level + 1, object_count, verbose, out)?;
            }
        }
        Ok(())
    }

    fn stats(&self, depth: usize, stats: &mut TreeStats) {
        stats.nodes += 1;
        stats.objects += self.objects.len();
        stats.max_depth = stats.max_depth.max(depth);
        match &self.children {
            Some(children) => {
                for child in children.iter() {
                    child.stats(depth + 1, stats);
                }
            }
            None => stats.leaves += 1,
        }
    }
}

/// Aggregate shape of a tree, mostly for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub nodes: usize,
    pub leaves: usize,
    pub max_depth: usize,
    pub objects: usize,
}

/// Read-only view of one tree node.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a, T> {
    node: &'a Node<T>,
}

impl<'a, T> NodeView<'a, T> {
    #[must_use]
    pub fn bounds(&self) -> &'a BoundingBox {
        &self.node.bounds
    }

    /// Objects held directly by this node.
    pub fn objects(&self) -> impl Iterator<Item = &'a (T, BoundingBox)> + 'a {
        self.node.objects.iter()
    }

    #[must_use]
    pub fn object_count(&self) -> usize {
        self.node.objects.len()
    }

    /// Number of objects in this node and all descendants.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        self.node.len()
    }

    #[must_use]
    pub fn children(&self) -> Option<[NodeView<'a, T>; 2]> {
        self.node.children.as_ref().map(|children| {
            [
                NodeView { node: &children[0] },
                NodeView { node: &children[1] },
            ]
        })
    }
}

/// Binary bounding-volume tree over `(object, box)` pairs.
#[derive(Debug, Clone)]
pub struct AabbTree<T> {
    root: Node<T>,
    ideal_objects_per_node: usize,
}

impl<T> Default for AabbTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AabbTree<T> {
    /// A tree that splits until every leaf holds a single object.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ideal_objects_per_node(1)
    }

    /// A tree whose leaves may hold up to `ideal` objects before splitting.
    #[must_use]
    pub fn with_ideal_objects_per_node(ideal: usize) -> Self {
        Self {
            root: Node::default(),
            ideal_objects_per_node: ideal.max(1),
        }
    }

    #[inline]
    #[must_use]
    pub fn ideal_objects_per_node(&self) -> usize {
        self.ideal_objects_per_node
    }

    /// Inserts an object at the root. Call [`optimize`](Self::optimize) to
    /// distribute it into the hierarchy.
    pub fn add(&mut self, object: T, bounds: BoundingBox) {
        self.root.add(object, bounds);
    }

    /// Rebuilds the hierarchy from scratch: flatten, deduplicate, split.
    pub fn optimize(&mut self) {
        self.root.collapse();
        self.root.remove_duplicate_objects();
        self.root.distribute(self.ideal_objects_per_node, 0);
    }

    /// Number of objects held anywhere in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn clear(&mut self) {
        self.root = Node::default();
    }

    /// Box of the root node. Loose after removals.
    #[must_use]
    pub fn bounds(&self) -> &BoundingBox {
        &self.root.bounds
    }

    #[must_use]
    pub fn root(&self) -> NodeView<'_, T> {
        NodeView { node: &self.root }
    }

    /// Appends every object whose box is not outside `shape` to `out`.
    pub fn query<S>(&self, shape: &S, out: &mut Vec<T>)
    where
        S: QueryShape + ?Sized,
        T: Clone,
    {
        if self.root.is_empty() {
            return;
        }
        match shape.classify(&self.root.bounds) {
            Intersection::Out => {}
            intersection => {
                self.root
                    .query(shape, out, intersection == Intersection::Intersect);
            }
        }
    }

    /// Removes every occurrence of `object`, skipping subtrees whose box
    /// does not intersect `bounds`.
    pub fn remove(&mut self, object: &T, bounds: &BoundingBox)
    where
        T: PartialEq,
    {
        self.root.remove(object, Some(bounds));
    }

    /// Removes every occurrence of `object`, visiting every node.
    pub fn remove_slow(&mut self, object: &T)
    where
        T: PartialEq,
    {
        self.root.remove(object, None);
    }

    /// References to every object in the tree, in depth-first order.
    #[must_use]
    pub fn contained_objects(&self) -> Vec<&T> {
        let mut out = Vec::with_capacity(self.len());
        self.root.collect(&mut out);
        out
    }

    #[must_use]
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.root.stats(0, &mut stats);
        stats
    }

    /// Writes the node hierarchy (when `verbose`) followed by the total object count.
    pub fn debug_print(&self, verbose: bool, out: &mut dyn fmt::Write) -> fmt::Result {
        let mut object_count = 0;
        self.root.debug_print(0, &mut object_count, verbose, out)?;
        if verbose {
            writeln!(out, "================")?;
        }
        writeln!(out, "TOTAL OBJECTS: {object_count}")
    }
}
