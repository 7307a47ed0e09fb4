//! Routine checklists.
//!
//! A checklist is kept as a forest of [`ChecklistEntry`] nodes. The flat form
//! ([`FlatEntry`], depth carried as `level`) is what editors and older stored
//! data use; [`flatten`] and [`unflatten`] convert between the two. Every
//! operation returns a fresh tree and leaves its input untouched.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChecklistEntry {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub children: Vec<ChecklistEntry>,
}

impl ChecklistEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), text)
    }

    pub fn with_id(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            completed: false,
            level: 0,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<ChecklistEntry>) -> Self {
        self.children = children;
        let level = self.level;
        rebase(&mut self, level);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlatEntry {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub level: u32,
}

impl FlatEntry {
    pub fn new(id: impl Into<String>, level: u32) -> Self {
        Self {
            id: id.into(),
            text: String::new(),
            completed: false,
            level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Up,
    Down,
}

pub fn find<'a>(tree: &'a [ChecklistEntry], id: &str) -> Option<&'a ChecklistEntry> {
    tree.iter().find_map(|entry| {
        if entry.id == id {
            Some(entry)
        } else {
            find(&entry.children, id)
        }
    })
}

pub fn contains(tree: &[ChecklistEntry], id: &str) -> bool {
    find(tree, id).is_some()
}

/// Every entry at every depth is complete. Vacuously true for an empty tree.
pub fn all_complete(tree: &[ChecklistEntry]) -> bool {
    tree.iter()
        .all(|entry| entry.completed && all_complete(&entry.children))
}

pub fn len(tree: &[ChecklistEntry]) -> usize {
    tree.iter().map(|entry| 1 + len(&entry.children)).sum()
}

pub fn mark_all(tree: &[ChecklistEntry], completed: bool) -> Vec<ChecklistEntry> {
    tree.iter()
        .map(|entry| ChecklistEntry {
            completed,
            children: mark_all(&entry.children, completed),
            ..entry.clone()
        })
        .collect()
}

pub fn toggle_entry(tree: &[ChecklistEntry], id: &str) -> EngineResult<Vec<ChecklistEntry>> {
    update_entry(tree, id, |entry| entry.completed = !entry.completed)
}

pub fn set_entry_completed(
    tree: &[ChecklistEntry],
    id: &str,
    completed: bool,
) -> EngineResult<Vec<ChecklistEntry>> {
    update_entry(tree, id, |entry| entry.completed = completed)
}

pub fn update_text(
    tree: &[ChecklistEntry],
    id: &str,
    text: impl Into<String>,
) -> EngineResult<Vec<ChecklistEntry>> {
    let text = text.into();
    update_entry(tree, id, move |entry| entry.text = text.clone())
}

fn update_entry(
    tree: &[ChecklistEntry],
    id: &str,
    mut apply: impl FnMut(&mut ChecklistEntry),
) -> EngineResult<Vec<ChecklistEntry>> {
    let mut updated = tree.to_vec();
    if !update_in(&mut updated, id, &mut apply) {
        return Err(not_found(id));
    }
    Ok(updated)
}

fn update_in(
    list: &mut [ChecklistEntry],
    id: &str,
    apply: &mut impl FnMut(&mut ChecklistEntry),
) -> bool {
    for entry in list.iter_mut() {
        if entry.id == id {
            apply(entry);
            return true;
        }
        if update_in(&mut entry.children, id, apply) {
            return true;
        }
    }
    false
}

/// Removes an entry. Its children move up one level and take its place.
pub fn delete_entry(tree: &[ChecklistEntry], id: &str) -> EngineResult<Vec<ChecklistEntry>> {
    let mut updated = tree.to_vec();
    if !delete_in(&mut updated, id) {
        return Err(not_found(id));
    }
    Ok(updated)
}

fn delete_in(list: &mut Vec<ChecklistEntry>, id: &str) -> bool {
    if let Some(idx) = list.iter().position(|entry| entry.id == id) {
        let removed = list.remove(idx);
        let level = removed.level;
        for (offset, mut orphan) in removed.children.into_iter().enumerate() {
            rebase(&mut orphan, level);
            list.insert(idx + offset, orphan);
        }
        return true;
    }
    list.iter_mut()
        .any(|entry| delete_in(&mut entry.children, id))
}

/// Makes the entry the last child of its preceding sibling. A first sibling
/// has nothing to nest under and is left where it is.
pub fn indent(tree: &[ChecklistEntry], id: &str) -> EngineResult<Vec<ChecklistEntry>> {
    let mut updated = tree.to_vec();
    if !indent_in(&mut updated, id) {
        return Err(not_found(id));
    }
    Ok(updated)
}

fn indent_in(list: &mut Vec<ChecklistEntry>, id: &str) -> bool {
    if let Some(idx) = list.iter().position(|entry| entry.id == id) {
        if idx > 0 {
            let mut node = list.remove(idx);
            let new_parent = &mut list[idx - 1];
            rebase(&mut node, new_parent.level + 1);
            new_parent.children.push(node);
        }
        return true;
    }
    list.iter_mut()
        .any(|entry| indent_in(&mut entry.children, id))
}

/// Lifts the entry and the siblings that followed it out of their parent;
/// they are reinserted, in order, right after the parent. Root entries are
/// left alone.
pub fn outdent(tree: &[ChecklistEntry], id: &str) -> EngineResult<Vec<ChecklistEntry>> {
    if tree.iter().any(|entry| entry.id == id) {
        return Ok(tree.to_vec());
    }
    let mut updated = tree.to_vec();
    if !outdent_in(&mut updated, id) {
        return Err(not_found(id));
    }
    Ok(updated)
}

fn outdent_in(list: &mut Vec<ChecklistEntry>, id: &str) -> bool {
    for parent_idx in 0..list.len() {
        let position = list[parent_idx]
            .children
            .iter()
            .position(|child| child.id == id);
        if let Some(child_idx) = position {
            let parent = &mut list[parent_idx];
            let lifted = parent.children.split_off(child_idx);
            let level = parent.level;
            for (offset, mut node) in lifted.into_iter().enumerate() {
                rebase(&mut node, level);
                list.insert(parent_idx + 1 + offset, node);
            }
            return true;
        }
        if outdent_in(&mut list[parent_idx].children, id) {
            return true;
        }
    }
    false
}

/// Swaps the entry with its neighbouring sibling; a no-op at either end.
pub fn move_entry(
    tree: &[ChecklistEntry],
    id: &str,
    shift: Shift,
) -> EngineResult<Vec<ChecklistEntry>> {
    let mut updated = tree.to_vec();
    if !move_in(&mut updated, id, shift) {
        return Err(not_found(id));
    }
    Ok(updated)
}

fn move_in(list: &mut Vec<ChecklistEntry>, id: &str, shift: Shift) -> bool {
    if let Some(idx) = list.iter().position(|entry| entry.id == id) {
        match shift {
            Shift::Up if idx > 0 => list.swap(idx, idx - 1),
            Shift::Down if idx + 1 < list.len() => list.swap(idx, idx + 1),
            _ => {}
        }
        return true;
    }
    list.iter_mut()
        .any(|entry| move_in(&mut entry.children, id, shift))
}

/// Inserts a blank entry right after `after_id` in reading order, at `level`
/// (capped one deeper than the reference entry). With no reference the entry
/// goes first, at the root.
pub fn insert_after(
    tree: &[ChecklistEntry],
    after_id: Option<&str>,
    level: u32,
) -> EngineResult<(Vec<ChecklistEntry>, ChecklistEntry)> {
    let (flat, created) = insert_after_flat(&flatten(tree), after_id, level)?;
    let rebuilt = unflatten(&flat);
    let entry = find(&rebuilt, &created.id)
        .cloned()
        .ok_or_else(|| not_found(&created.id))?;
    Ok((rebuilt, entry))
}

pub fn insert_after_flat(
    list: &[FlatEntry],
    after_id: Option<&str>,
    level: u32,
) -> EngineResult<(Vec<FlatEntry>, FlatEntry)> {
    let mut updated = list.to_vec();
    let created = match after_id {
        None => {
            let entry = FlatEntry::new(Uuid::new_v4().to_string(), 0);
            updated.insert(0, entry.clone());
            entry
        }
        Some(after_id) => {
            let idx = position_flat(list, after_id)?;
            let entry = FlatEntry::new(Uuid::new_v4().to_string(), level.min(list[idx].level + 1));
            updated.insert(idx + 1, entry.clone());
            entry
        }
    };
    Ok((updated, created))
}

/// Flat-form indent: one level deeper, never more than one below the previous entry.
pub fn indent_flat(list: &[FlatEntry], id: &str) -> EngineResult<Vec<FlatEntry>> {
    let idx = position_flat(list, id)?;
    let mut updated = list.to_vec();
    if idx > 0 {
        let ceiling = list[idx - 1].level + 1;
        updated[idx].level = (list[idx].level + 1).min(ceiling);
    }
    Ok(updated)
}

pub fn outdent_flat(list: &[FlatEntry], id: &str) -> EngineResult<Vec<FlatEntry>> {
    let idx = position_flat(list, id)?;
    let mut updated = list.to_vec();
    updated[idx].level = list[idx].level.saturating_sub(1);
    Ok(updated)
}

fn position_flat(list: &[FlatEntry], id: &str) -> EngineResult<usize> {
    list.iter()
        .position(|entry| entry.id == id)
        .ok_or_else(|| not_found(id))
}

/// Depth-first, pre-order. `level` is taken from the depth in the tree.
pub fn flatten(tree: &[ChecklistEntry]) -> Vec<FlatEntry> {
    fn collect(list: &[ChecklistEntry], depth: u32, out: &mut Vec<FlatEntry>) {
        for entry in list {
            out.push(FlatEntry {
                id: entry.id.clone(),
                text: entry.text.clone(),
                completed: entry.completed,
                level: depth,
            });
            collect(&entry.children, depth + 1, out);
        }
    }

    let mut out = Vec::with_capacity(len(tree));
    collect(tree, 0, &mut out);
    out
}

/// Rebuilds the tree with a stack of open ancestors: each entry becomes a
/// child of the nearest earlier entry with a lower level. Levels that skip
/// ahead (including a first entry above zero) are clamped rather than rejected.
pub fn unflatten(list: &[FlatEntry]) -> Vec<ChecklistEntry> {
    fn close(stack: &mut Vec<ChecklistEntry>, roots: &mut Vec<ChecklistEntry>) {
        let Some(done) = stack.pop() else {
            return;
        };
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }

    let mut roots = Vec::new();
    let mut stack: Vec<ChecklistEntry> = Vec::new();
    for flat in list {
        let level = (flat.level as usize).min(stack.len());
        while stack.len() > level {
            close(&mut stack, &mut roots);
        }
        stack.push(ChecklistEntry {
            id: flat.id.clone(),
            text: flat.text.clone(),
            completed: flat.completed,
            level: level as u32,
            children: Vec::new(),
        });
    }
    while !stack.is_empty() {
        close(&mut stack, &mut roots);
    }
    roots
}

fn rebase(entry: &mut ChecklistEntry, level: u32) {
    entry.level = level;
    for child in &mut entry.children {
        rebase(child, level + 1);
    }
}

fn not_found(id: &str) -> EngineError {
    EngineError::ChecklistEntryNotFound { id: id.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> ChecklistEntry {
        ChecklistEntry::with_id(id, id.to_uppercase())
    }

    fn ids(tree: &[ChecklistEntry]) -> Vec<(String, u32)> {
        flatten(tree)
            .into_iter()
            .map(|flat| (flat.id, flat.level))
            .collect()
    }

    fn pairs(expected: &[(&str, u32)]) -> Vec<(String, u32)> {
        expected
            .iter()
            .map(|(id, level)| (id.to_string(), *level))
            .collect()
    }

    fn sample_tree() -> Vec<ChecklistEntry> {
        vec![
            entry("a").with_children(vec![
                entry("b"),
                entry("c").with_children(vec![entry("d")]),
            ]),
            entry("e"),
        ]
    }

    #[test]
    fn flatten_then_unflatten_reproduces_the_tree() {
        let tree = sample_tree();
        let flat = flatten(&tree);
        assert_eq!(
            ids(&tree),
            pairs(&[("a", 0), ("b", 1), ("c", 1), ("d", 2), ("e", 0)])
        );
        assert_eq!(flat.len(), 5);
        assert_eq!(unflatten(&flat), tree);
    }

    #[test]
    fn unflatten_clamps_ill_formed_levels() {
        let flat = vec![FlatEntry::new("a", 2), FlatEntry::new("b", 5), FlatEntry::new("c", 0)];
        let tree = unflatten(&flat);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, "a");
        assert_eq!(tree[0].level, 0);
        assert_eq!(tree[0].children[0].id, "b");
        assert_eq!(tree[0].children[0].level, 1);
        assert_eq!(tree[1].id, "c");
    }

    #[test]
    fn sequential_flat_indents_nest_under_the_first_entry() {
        let flat = vec![FlatEntry::new("a", 0), FlatEntry::new("b", 0), FlatEntry::new("c", 0)];
        let flat = indent_flat(&flat, "b").unwrap();
        let flat = indent_flat(&flat, "c").unwrap();
        assert_eq!(flat[2].level, 1);

        let tree = unflatten(&flat);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, "a");
        let children: Vec<&str> = tree[0].children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(children, vec!["b", "c"]);
    }

    #[test]
    fn tree_indent_reparents_under_previous_sibling() {
        let tree = vec![entry("a"), entry("b"), entry("c")];
        let tree = indent(&tree, "b").unwrap();
        let tree = indent(&tree, "c").unwrap();
        assert_eq!(ids(&tree), pairs(&[("a", 0), ("b", 1), ("c", 1)]));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 2);

        let unchanged = indent(&tree, "a").unwrap();
        assert_eq!(unchanged, tree);
    }

    #[test]
    fn flat_indent_never_skips_a_level() {
        let flat = vec![FlatEntry::new("a", 0), FlatEntry::new("b", 1)];
        let flat = indent_flat(&flat, "b").unwrap();
        assert_eq!(flat[1].level, 1);
        let first = indent_flat(&flat, "a").unwrap();
        assert_eq!(first[0].level, 0);
    }

    #[test]
    fn outdent_lifts_trailing_siblings_after_the_parent() {
        let tree = vec![entry("p").with_children(vec![
            entry("x"),
            entry("y").with_children(vec![entry("z")]),
            entry("w"),
        ])];
        let tree = outdent(&tree, "y").unwrap();
        let roots: Vec<&str> = tree.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(roots, vec!["p", "y", "w"]);
        assert_eq!(
            ids(&tree),
            pairs(&[("p", 0), ("x", 1), ("y", 0), ("z", 1), ("w", 0)])
        );
        assert_eq!(tree[0].children.len(), 1);
        assert!(tree[2].children.is_empty());

        let root_noop = outdent(&tree, "p").unwrap();
        assert_eq!(root_noop, tree);
    }

    #[test]
    fn outdent_flat_floors_at_zero() {
        let flat = vec![FlatEntry::new("a", 0), FlatEntry::new("b", 1)];
        let flat = outdent_flat(&flat, "b").unwrap();
        assert_eq!(flat[1].level, 0);
        let flat = outdent_flat(&flat, "a").unwrap();
        assert_eq!(flat[0].level, 0);
    }

    #[test]
    fn toggle_and_update_find_nested_entries() {
        let tree = sample_tree();
        let toggled = toggle_entry(&tree, "d").unwrap();
        assert!(find(&toggled, "d").unwrap().completed);
        assert!(!find(&tree, "d").unwrap().completed);

        let renamed = update_text(&toggled, "b", "Stretch").unwrap();
        assert_eq!(find(&renamed, "b").unwrap().text, "Stretch");

        assert_eq!(
            toggle_entry(&tree, "missing"),
            Err(EngineError::ChecklistEntryNotFound {
                id: "missing".into()
            })
        );
    }

    #[test]
    fn delete_promotes_children() {
        let tree = delete_entry(&sample_tree(), "c").unwrap();
        assert_eq!(
            ids(&tree),
            pairs(&[("a", 0), ("b", 1), ("d", 1), ("e", 0)])
        );
        assert_eq!(find(&tree, "d").unwrap().level, 1);
        assert!(delete_entry(&tree, "c").is_err());
    }

    #[test]
    fn insert_after_places_blank_entry_next_in_reading_order() {
        let tree = vec![entry("a"), entry("b")];
        let (tree, created) = insert_after(&tree, Some("a"), 4).unwrap();
        assert_eq!(created.text, "");
        assert_eq!(created.level, 1);
        let flat = flatten(&tree);
        assert_eq!(flat[1].id, created.id);
        assert_eq!(tree[0].children[0].id, created.id);

        let (tree, first) = insert_after(&tree, None, 3).unwrap();
        assert_eq!(tree[0].id, first.id);
        assert!(insert_after(&tree, Some("nope"), 0).is_err());
    }

    #[test]
    fn roll_up_helpers() {
        let tree = sample_tree();
        assert!(!all_complete(&tree));
        let done = mark_all(&tree, true);
        assert!(all_complete(&done));
        assert_eq!(len(&done), 5);
        let partly = set_entry_completed(&done, "d", false).unwrap();
        assert!(!all_complete(&partly));
        assert!(all_complete(&[]));
    }

    #[test]
    fn move_entry_swaps_siblings() {
        let tree = move_entry(&sample_tree(), "c", Shift::Up).unwrap();
        let children: Vec<&str> = tree[0].children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(children, vec!["c", "b"]);
        let same = move_entry(&tree, "e", Shift::Down).unwrap();
        assert_eq!(same, tree);
    }
}
