//! Loose octree over cover records.
//!
//! Records live in a generational slot array; tree nodes only hold slot
//! indices. Children are allocated in blocks of eight consecutive nodes and
//! freed blocks are reused, so the node array never shrinks. Points outside
//! the root bounds are kept in a separate list and checked by every query.

use std::collections::HashMap;

use crate::core::types::Vec3;
use crate::cover::{CoverCandidate, CoverId, CoverRecord};
use crate::math::Aabb;

/// Elements a leaf holds before it splits.
pub const MAX_ELEMENTS_PER_LEAF: usize = 16;
/// Leaves at this depth never split.
pub const MAX_DEPTH: u32 = 12;
/// Subtrees holding at most this many elements collapse into one leaf on [`CoverOctree::shrink`].
pub const COLLAPSE_THRESHOLD: usize = 7;
/// Query bounds of a node are its bounds grown by this factor.
const LOOSENESS: f32 = 1.5;
/// Node index of records outside the root bounds.
const OUTSIDE: u32 = u32::MAX;

type LocationKey = [u32; 3];

fn location_key(p: Vec3) -> LocationKey {
    // + 0.0 folds -0.0 into 0.0
    [(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits(), (p.z + 0.0).to_bits()]
}

#[derive(Clone, Debug)]
struct Node {
    bounds: Aabb,
    /// Index of the first of eight consecutive children.
    children: Option<u32>,
    elements: Vec<u32>,
}

impl Node {
    fn leaf(bounds: Aabb) -> Self {
        Self { bounds, children: None, elements: Vec::new() }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: u32,
    location: Vec3,
    record: Option<CoverRecord>,
}

/// Point octree of cover records with exact-location lookup.
#[derive(Debug)]
pub struct CoverOctree {
    /// Stamped into every id handed out by this tree.
    epoch: u32,
    nodes: Vec<Node>,
    free_blocks: Vec<u32>,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    outside: Vec<u32>,
    by_location: HashMap<LocationKey, u32>,
    len: usize,
}

impl CoverOctree {
    /// Create an empty tree whose root covers `bounds`.
    pub fn new(bounds: Aabb) -> Self {
        Self::with_epoch(bounds, 0)
    }

    /// Create an empty tree whose ids carry `epoch`. Ids from a tree with
    /// another epoch never resolve here.
    pub fn with_epoch(bounds: Aabb, epoch: u32) -> Self {
        Self {
            epoch,
            nodes: vec![Node::leaf(bounds)],
            free_blocks: Vec::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
            outside: Vec::new(),
            by_location: HashMap::new(),
            len: 0,
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.nodes[0].bounds
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of nodes currently in use.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_blocks.len() * 8
    }

    pub fn get(&self, id: CoverId) -> Option<&CoverRecord> {
        let slot = self.slots.get(id.slot as usize)?;
        if id.epoch != self.epoch || slot.generation != id.generation {
            return None;
        }
        slot.record.as_ref()
    }

    pub fn contains(&self, id: CoverId) -> bool {
        self.get(id).is_some()
    }

    /// Record stored at exactly `location`.
    pub fn find_at(&self, location: Vec3) -> Option<CoverId> {
        self.by_location
            .get(&location_key(location))
            .map(|&slot| self.id_of(slot))
    }

    /// True if any record lies inside the box of half-extent `radius` around `location`.
    pub fn has_duplicate(&self, location: Vec3, radius: f32) -> bool {
        let area = Aabb::from_center_half_extent(location, Vec3::splat(radius));
        let mut found = false;
        self.visit_box(&area, |_, _| {
            found = true;
            false
        });
        found
    }

    /// Insert a candidate unless another record lies within `duplicate_radius`
    /// on every axis.
    pub fn insert(&mut self, candidate: &CoverCandidate, duplicate_radius: f32) -> Option<CoverId> {
        if self.has_duplicate(candidate.location, duplicate_radius) {
            return None;
        }

        let slot = self.allocate(candidate.location, CoverRecord::new(candidate));
        self.by_location.insert(location_key(candidate.location), slot);
        self.place(slot, candidate.location);
        self.len += 1;
        Some(self.id_of(slot))
    }

    /// Remove a record. Stale ids return `None`.
    pub fn remove(&mut self, id: CoverId) -> Option<CoverRecord> {
        if id.epoch != self.epoch {
            return None;
        }
        let entry = self.slots.get_mut(id.slot as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let record = entry.record.take()?;
        let (node, location) = (entry.node, entry.location);

        let list = if node == OUTSIDE {
            &mut self.outside
        } else {
            &mut self.nodes[node as usize].elements
        };
        if let Some(pos) = list.iter().position(|&s| s == id.slot) {
            list.swap_remove(pos);
        }

        let key = location_key(location);
        if self.by_location.get(&key) == Some(&id.slot) {
            self.by_location.remove(&key);
        }
        self.free_slots.push(id.slot);
        self.len -= 1;
        Some(record)
    }

    /// Visit every record inside `area` (inclusive).
    pub fn query_box(&self, area: &Aabb, mut visit: impl FnMut(CoverId, &CoverRecord)) {
        self.visit_box(area, |slot, record| {
            visit(self.id_of(slot), record);
            true
        });
    }

    /// Visit every record within `radius` of `center` (inclusive).
    pub fn query_sphere(&self, center: Vec3, radius: f32, mut visit: impl FnMut(CoverId, &CoverRecord)) {
        let radius_sq = radius * radius;
        self.visit_box(&Aabb::from_sphere(center, radius), |slot, record| {
            if record.location.distance_squared(center) <= radius_sq {
                visit(self.id_of(slot), record);
            }
            true
        });
    }

    /// Remove every record in `area` for which `keep` returns false.
    pub fn retain_in(&mut self, area: &Aabb, mut keep: impl FnMut(CoverId, &CoverRecord) -> bool) -> usize {
        let mut doomed = Vec::new();
        self.query_box(area, |id, record| {
            if !keep(id, record) {
                doomed.push(id);
            }
        });
        doomed.into_iter().filter_map(|id| self.remove(id)).count()
    }

    /// Remove every record, anywhere, for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&CoverRecord) -> bool) -> usize {
        let doomed: Vec<CoverId> = self
            .iter()
            .filter(|(_, record)| !keep(*record))
            .map(|(id, _)| id)
            .collect();
        doomed.into_iter().filter_map(|id| self.remove(id)).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CoverId, &CoverRecord)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.record.as_ref().map(|record| {
                (CoverId { epoch: self.epoch, slot: i as u32, generation: slot.generation }, record)
            })
        })
    }

    /// Collapse sparse subtrees back into leaves.
    pub fn shrink(&mut self) {
        self.collapse(0);
    }

    fn id_of(&self, slot: u32) -> CoverId {
        CoverId { epoch: self.epoch, slot, generation: self.slots[slot as usize].generation }
    }

    fn allocate(&mut self, location: Vec3, record: CoverRecord) -> u32 {
        if let Some(slot) = self.free_slots.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.generation = entry.generation.wrapping_add(1);
            entry.location = location;
            entry.record = Some(record);
            slot
        } else {
            self.slots.push(Slot {
                generation: 1,
                node: OUTSIDE,
                location,
                record: Some(record),
            });
            (self.slots.len() - 1) as u32
        }
    }

    fn place(&mut self, slot: u32, p: Vec3) {
        if !self.nodes[0].bounds.contains_point(p) {
            self.slots[slot as usize].node = OUTSIDE;
            self.outside.push(slot);
            return;
        }

        let mut node = 0usize;
        let mut depth = 0;
        while let Some(first) = self.nodes[node].children {
            node = first as usize + self.nodes[node].bounds.octant_of(p) as usize;
            depth += 1;
        }

        self.attach(node, slot);
        if self.nodes[node].elements.len() > MAX_ELEMENTS_PER_LEAF && depth < MAX_DEPTH {
            self.split(node);
        }
    }

    fn attach(&mut self, node: usize, slot: u32) {
        self.nodes[node].elements.push(slot);
        self.slots[slot as usize].node = node as u32;
    }

    fn split(&mut self, node: usize) {
        let bounds = self.nodes[node].bounds;
        let first = self.allocate_block(bounds);
        let elements = std::mem::take(&mut self.nodes[node].elements);
        self.nodes[node].children = Some(first);

        for slot in elements {
            let octant = bounds.octant_of(self.slots[slot as usize].location);
            self.attach(first as usize + octant as usize, slot);
        }
    }

    fn allocate_block(&mut self, parent: Aabb) -> u32 {
        let children = (0..8u8).map(|i| Node::leaf(parent.child_octant(i)));
        if let Some(first) = self.free_blocks.pop() {
            for (i, child) in children.enumerate() {
                self.nodes[first as usize + i] = child;
            }
            first
        } else {
            let first = self.nodes.len() as u32;
            self.nodes.extend(children);
            first
        }
    }

    /// Post-order collapse; returns the element count of the subtree.
    fn collapse(&mut self, node: usize) -> usize {
        let Some(first) = self.nodes[node].children else {
            return self.nodes[node].elements.len();
        };

        let mut total = self.nodes[node].elements.len();
        for child in first..first + 8 {
            total += self.collapse(child as usize);
        }

        if total <= COLLAPSE_THRESHOLD {
            for child in first..first + 8 {
                let elements = std::mem::take(&mut self.nodes[child as usize].elements);
                for slot in elements {
                    self.attach(node, slot);
                }
            }
            self.nodes[node].children = None;
            self.free_blocks.push(first);
        }
        total
    }

    /// Walk records inside `area`; `f` returns false to stop early.
    fn visit_box(&self, area: &Aabb, mut f: impl FnMut(u32, &CoverRecord) -> bool) {
        let mut check = |slot: u32| -> bool {
            let entry = &self.slots[slot as usize];
            match &entry.record {
                Some(record) if area.contains_point(entry.location) => f(slot, record),
                _ => true,
            }
        };

        for &slot in &self.outside {
            if !check(slot) {
                return;
            }
        }

        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node];
            if !n.bounds.enlarged(LOOSENESS).intersects(area) {
                continue;
            }
            for &slot in &n.elements {
                if !check(slot) {
                    return;
                }
            }
            if let Some(first) = n.children {
                stack.extend((first..first + 8).map(|c| c as usize));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover::{NavNodeRef, TileId};
    use crate::world::ActorId;

    fn candidate(x: f32, z: f32) -> CoverCandidate {
        CoverCandidate {
            owner: ActorId(1),
            location: Vec3::new(x, 0.0, z),
            force_field: false,
            tile: TileId(0),
            node: NavNodeRef(0),
        }
    }

    fn tree() -> CoverOctree {
        CoverOctree::new(Aabb::new(Vec3::splat(-1000.0), Vec3::splat(1000.0)))
    }

    #[test]
    fn test_insert_and_get() {
        let mut tree = tree();
        let id = tree.insert(&candidate(10.0, 20.0), 5.0).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(id).unwrap().location, Vec3::new(10.0, 0.0, 20.0));
        assert_eq!(tree.find_at(Vec3::new(10.0, 0.0, 20.0)), Some(id));
        assert_eq!(tree.find_at(Vec3::new(10.0, 0.0, 21.0)), None);
    }

    #[test]
    fn test_duplicate_test_is_a_box() {
        let mut tree = tree();
        tree.insert(&candidate(0.0, 0.0), 10.0).unwrap();
        // corner of the box lies farther than the radius but is still a duplicate
        assert!(tree.insert(&candidate(9.0, 9.0), 10.0).is_none());
        assert!(tree.insert(&candidate(10.5, 0.0), 10.0).is_some());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_removed_id_goes_stale() {
        let mut tree = tree();
        let first = tree.insert(&candidate(0.0, 0.0), 1.0).unwrap();
        assert!(tree.remove(first).is_some());
        assert!(tree.remove(first).is_none());
        assert!(tree.find_at(Vec3::ZERO).is_none());

        // same slot reused with a new generation
        let second = tree.insert(&candidate(0.0, 0.0), 1.0).unwrap();
        assert_ne!(first, second);
        assert!(tree.get(first).is_none());
        assert!(tree.get(second).is_some());
    }

    #[test]
    fn test_ids_do_not_cross_epochs() {
        let mut old = CoverOctree::with_epoch(Aabb::new(Vec3::splat(-1000.0), Vec3::splat(1000.0)), 1);
        let stale = old.insert(&candidate(0.0, 0.0), 1.0).unwrap();

        let mut fresh = CoverOctree::with_epoch(old.bounds(), 2);
        let id = fresh.insert(&candidate(50.0, 0.0), 1.0).unwrap();
        assert_eq!((stale.slot, stale.generation), (id.slot, id.generation));
        assert!(fresh.get(stale).is_none());
        assert!(fresh.remove(stale).is_none());
        assert_eq!(fresh.len(), 1);
        assert!(fresh.iter().all(|(id, _)| id.epoch == 2));
    }

    #[test]
    fn test_split_and_shrink() {
        let mut tree = tree();
        let ids: Vec<CoverId> = (0..=MAX_ELEMENTS_PER_LEAF)
            .map(|i| tree.insert(&candidate(i as f32 * 10.0, 5.0), 1.0).unwrap())
            .collect();
        assert_eq!(tree.node_count(), 9);

        for id in &ids[..10] {
            tree.remove(*id);
        }
        tree.shrink();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.len(), 7);

        let mut seen = 0;
        tree.query_box(&tree.bounds(), |_, _| seen += 1);
        assert_eq!(seen, 7);
    }

    #[test]
    fn test_freed_blocks_are_reused() {
        let mut tree = tree();
        let ids: Vec<CoverId> = (0..=MAX_ELEMENTS_PER_LEAF)
            .map(|i| tree.insert(&candidate(i as f32 * 10.0, 5.0), 1.0).unwrap())
            .collect();
        for id in ids {
            tree.remove(id);
        }
        tree.shrink();
        for i in 0..=MAX_ELEMENTS_PER_LEAF {
            tree.insert(&candidate(i as f32 * 10.0, 5.0), 1.0);
        }
        assert_eq!(tree.node_count(), 9);
        assert_eq!(tree.nodes.len(), 9);
    }

    #[test]
    fn test_points_outside_root_are_queryable() {
        let mut tree = tree();
        let id = tree.insert(&candidate(5000.0, 0.0), 1.0).unwrap();
        let mut hits = Vec::new();
        tree.query_sphere(Vec3::new(5000.0, 0.0, 10.0), 20.0, |id, _| hits.push(id));
        assert_eq!(hits, vec![id]);
        assert!(tree.insert(&candidate(5000.5, 0.0), 1.0).is_none());
        assert!(tree.remove(id).is_some());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_sphere_query_excludes_box_corners() {
        let mut tree = tree();
        tree.insert(&candidate(0.0, 0.0), 1.0);
        tree.insert(&candidate(9.0, 9.0), 1.0);
        let mut hits = 0;
        tree.query_sphere(Vec3::ZERO, 10.0, |_, _| hits += 1);
        assert_eq!(hits, 1);

        let mut boxed = 0;
        tree.query_box(&Aabb::from_sphere(Vec3::ZERO, 10.0), |_, _| boxed += 1);
        assert_eq!(boxed, 2);
    }

    #[test]
    fn test_retain_in_area() {
        let mut tree = tree();
        for i in 0..40 {
            tree.insert(&candidate(i as f32 * 10.0, 0.0), 1.0);
        }
        let area = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(95.0, 1.0, 1.0));
        let spared = tree.find_at(Vec3::new(30.0, 0.0, 0.0)).unwrap();
        let removed = tree.retain_in(&area, |id, _| id == spared);
        assert_eq!(removed, 9);
        assert_eq!(tree.len(), 31);
        assert!(tree.get(spared).is_some());
        assert!(tree.find_at(Vec3::new(50.0, 0.0, 0.0)).is_none());
        assert!(tree.find_at(Vec3::new(100.0, 0.0, 0.0)).is_some());
    }
}
