use std::collections::HashMap;

use serde::Serialize;

/// One row of `docker ps -a`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub ports: String,
}

/// One row of `docker images`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub id: String,
    pub repository: String,
    pub tag: String,
    pub size: String,
}

/// Complete point-in-time listing. Rebuilt wholesale each poll cycle,
/// never patched in place, so diffing stays well-defined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    pub containers: Vec<ContainerSummary>,
    pub images: Vec<ImageSummary>,
}

/// Added / removed / changed entries for one summary type, keyed by id.
#[derive(Debug, Clone)]
pub struct SetChanges<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
    pub changed: Vec<T>,
}

impl<T> Default for SetChanges<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
        }
    }
}

impl<T> SetChanges<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InventoryDiff {
    pub containers: SetChanges<ContainerSummary>,
    pub images: SetChanges<ImageSummary>,
}

impl InventoryDiff {
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.images.is_empty()
    }
}

/// Set-difference of two snapshots, keyed by the stable id of each entry.
/// An entry present in both but with different display fields is `changed`.
pub fn diff(old: &InventorySnapshot, new: &InventorySnapshot) -> InventoryDiff {
    InventoryDiff {
        containers: diff_keyed(&old.containers, &new.containers, |c| &c.id),
        images: diff_keyed(&old.images, &new.images, |i| &i.id),
    }
}

fn diff_keyed<'a, T, F>(old: &'a [T], new: &'a [T], key: F) -> SetChanges<T>
where
    T: Clone + PartialEq,
    F: Fn(&T) -> &String,
{
    let old_by_id: HashMap<&String, &T> = old.iter().map(|t| (key(t), t)).collect();
    let new_by_id: HashMap<&String, &T> = new.iter().map(|t| (key(t), t)).collect();

    let mut changes = SetChanges::default();
    for entry in new {
        match old_by_id.get(key(entry)) {
            None => changes.added.push(entry.clone()),
            Some(previous) if *previous != entry => changes.changed.push(entry.clone()),
            Some(_) => {}
        }
    }
    for entry in old {
        if !new_by_id.contains_key(key(entry)) {
            changes.removed.push(entry.clone());
        }
    }
    changes
}
