//! Resolved tree structure.
//!
//! Items are stored in a flat `Vec<TreeItem>` in tree order, with
//! parent/children relationships tracked by indices. This provides:
//! - O(1) id lookups via the `by_id` index
//! - O(d) ancestor walks where d is the item depth
//! - children lists in the order the items were loaded

use std::collections::{BTreeSet, HashMap};

use navtree_storage::Permission;

use crate::model::TreeItem;

/// A tree with computed structure.
///
/// Built from items in tree order (stored items as returned by the storage,
/// with dynamic items merged in). Items whose parent is missing become roots.
#[derive(Clone, Debug, Default)]
pub(crate) struct TreeState {
    items: Vec<TreeItem>,
    by_id: HashMap<i64, usize>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl TreeState {
    /// Index `items` and compute `depth` and `perms` for each.
    pub(crate) fn build(mut items: Vec<TreeItem>) -> Self {
        let by_id: HashMap<i64, usize> = items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.id, idx))
            .collect();

        let mut parents: Vec<Option<usize>> = items
            .iter()
            .map(|item| {
                let parent = item.parent?;
                let idx = by_id.get(&parent).copied();
                if idx.is_none() {
                    tracing::warn!(
                        tree = %item.tree,
                        item = item.id,
                        parent,
                        "Parent item not found, treating as root"
                    );
                }
                idx
            })
            .collect();

        compute_depths(&mut items, &mut parents);

        let mut children = vec![Vec::new(); items.len()];
        let mut roots = Vec::new();
        for (idx, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(idx),
                None => roots.push(idx),
            }
        }

        for item in &mut items {
            item.perms = if item.access_restricted {
                item.access_permissions.iter().map(Permission::name).collect()
            } else {
                BTreeSet::new()
            };
            item.has_children = false;
        }

        Self {
            items,
            by_id,
            parents,
            children,
            roots,
        }
    }

    pub(crate) fn items(&self) -> &[TreeItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [TreeItem] {
        &mut self.items
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn get(&self, id: i64) -> Option<&TreeItem> {
        self.by_id.get(&id).map(|&idx| &self.items[idx])
    }

    pub(crate) fn get_mut(&mut self, id: i64) -> Option<&mut TreeItem> {
        self.by_id.get(&id).map(|&idx| &mut self.items[idx])
    }

    /// Parent of the item, if it has one in this tree.
    pub(crate) fn parent(&self, id: i64) -> Option<&TreeItem> {
        let idx = *self.by_id.get(&id)?;
        self.parents[idx].map(|p| &self.items[p])
    }

    /// Children of the item in tree order. Unknown ids have none.
    pub(crate) fn children(&self, id: i64) -> impl Iterator<Item = &TreeItem> {
        self.by_id
            .get(&id)
            .map_or(&[][..], |&idx| self.children[idx].as_slice())
            .iter()
            .map(|&c| &self.items[c])
    }

    /// Root items in tree order.
    pub(crate) fn roots(&self) -> impl Iterator<Item = &TreeItem> {
        self.roots.iter().map(|&idx| &self.items[idx])
    }

    /// Ids from the item up to its root, the item first.
    pub(crate) fn ancestry(&self, id: i64) -> Vec<i64> {
        let Some(&start) = self.by_id.get(&id) else {
            return Vec::new();
        };
        let mut chain = vec![self.items[start].id];
        let mut cursor = self.parents[start];
        while let Some(idx) = cursor {
            chain.push(self.items[idx].id);
            cursor = self.parents[idx];
        }
        chain
    }
}

/// Set `depth` on every item, cutting parent links that form a cycle.
///
/// Each item climbs only until it meets an ancestor whose depth is already
/// known, so every depth is computed once.
fn compute_depths(items: &mut [TreeItem], parents: &mut [Option<usize>]) {
    let mut depths: Vec<Option<usize>> = vec![None; items.len()];
    let mut on_chain = vec![false; items.len()];
    let mut chain = Vec::new();

    for start in 0..items.len() {
        if depths[start].is_some() {
            continue;
        }

        chain.clear();
        let mut cursor = Some(start);
        // Depth of the item above the top of the chain, if there is one
        let above = loop {
            let Some(idx) = cursor else {
                break None;
            };
            if let Some(depth) = depths[idx] {
                break Some(depth);
            }
            if on_chain[idx] {
                tracing::warn!(
                    tree = %items[idx].tree,
                    item = items[idx].id,
                    "Parent cycle detected, treating item as root"
                );
                parents[idx] = None;
                items[idx].parent = None;
                let pos = chain.iter().position(|&c| c == idx).unwrap_or(0);
                for &c in &chain[pos + 1..] {
                    on_chain[c] = false;
                }
                chain.truncate(pos + 1);
                break None;
            }
            on_chain[idx] = true;
            chain.push(idx);
            cursor = parents[idx];
        };

        let mut depth = above.map_or(0, |d| d + 1);
        for &idx in chain.iter().rev() {
            depths[idx] = Some(depth);
            items[idx].depth = depth;
            on_chain[idx] = false;
            depth += 1;
        }
    }
}
