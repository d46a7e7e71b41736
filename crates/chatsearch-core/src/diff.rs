//! Stable list merge producing the edit script for an incremental list update.
//!
//! Indices follow the list-view transaction convention: `deletions` index into
//! the previous list, `insertions` and `updates` index into the next list. A
//! row that changed relative position is reported once, as an insertion that
//! carries its previous index, and never appears in `deletions`.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;

/// A list row with an identity that survives payload changes.
pub trait Identifiable {
    type Id: Clone + Eq + Hash + Debug;

    fn stable_id(&self) -> Self::Id;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInsert<T> {
    pub index: usize,
    pub item: T,
    /// Set when the row already existed and moved
    pub previous_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUpdate<T> {
    pub index: usize,
    pub item: T,
    pub previous_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListDiff<T> {
    pub deletions: Vec<usize>,
    pub insertions: Vec<ListInsert<T>>,
    pub updates: Vec<ListUpdate<T>>,
}

impl<T> Default for ListDiff<T> {
    fn default() -> Self {
        Self {
            deletions: Vec::new(),
            insertions: Vec::new(),
            updates: Vec::new(),
        }
    }
}

impl<T> ListDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.insertions.is_empty() && self.updates.is_empty()
    }

    pub fn moves(&self) -> impl Iterator<Item = &ListInsert<T>> {
        self.insertions
            .iter()
            .filter(|insert| insert.previous_index.is_some())
    }
}

impl<T: Clone> ListDiff<T> {
    /// Replays the edit script onto `list` the way a list view applies a transaction.
    pub fn apply_to(&self, list: &mut Vec<T>) {
        let mut removed = vec![false; list.len()];
        for &index in &self.deletions {
            if let Some(slot) = removed.get_mut(index) {
                *slot = true;
            }
        }
        for previous_index in self.moves().filter_map(|insert| insert.previous_index) {
            if let Some(slot) = removed.get_mut(previous_index) {
                *slot = true;
            }
        }

        let mut stationary: Vec<T> = list
            .drain(..)
            .zip(removed)
            .filter_map(|(item, removed)| (!removed).then_some(item))
            .collect();

        let mut insertions: Vec<&ListInsert<T>> = self.insertions.iter().collect();
        insertions.sort_by_key(|insert| insert.index);
        for insert in insertions {
            let index = insert.index.min(stationary.len());
            stationary.insert(index, insert.item.clone());
        }

        for update in &self.updates {
            if let Some(slot) = stationary.get_mut(update.index) {
                *slot = update.item.clone();
            }
        }

        *list = stationary;
    }
}

/// Computes deletions, insertions (moves carry their previous index) and
/// updates that turn `previous` into `next`.
///
/// Identities are matched through a hash map in O(n + m). Rows whose index is
/// unchanged keep their place, and so does a longest run of matched rows whose
/// previous indices increase along `next` between them; every other matched
/// row is a move. Choosing that run costs O(k log k) over the k matched rows
/// and is skipped when no row moved.
/// A duplicate identity in `next` matches only on its first occurrence and is
/// otherwise reported as a plain insertion.
pub fn merge_lists_stable_with_updates<T>(previous: &[T], next: &[T]) -> ListDiff<T>
where
    T: Identifiable + PartialEq + Clone,
{
    let mut previous_indices: HashMap<T::Id, usize> = HashMap::with_capacity(previous.len());
    for (index, item) in previous.iter().enumerate() {
        let id = item.stable_id();
        if previous_indices.contains_key(&id) {
            tracing::warn!(?id, index, "duplicate identity in previous list");
            continue;
        }
        previous_indices.insert(id, index);
    }

    let mut seen: HashSet<T::Id> = HashSet::with_capacity(next.len());
    let mut matched: Vec<Option<usize>> = Vec::with_capacity(next.len());
    for (index, item) in next.iter().enumerate() {
        let id = item.stable_id();
        if !seen.insert(id.clone()) {
            tracing::warn!(?id, index, "duplicate identity in next list");
            matched.push(None);
            continue;
        }
        matched.push(previous_indices.remove(&id));
    }

    let kept = stationary_rows(&matched);
    let mut consumed = vec![false; previous.len()];
    let mut diff = ListDiff::default();

    for (index, (item, previous_index)) in next.iter().zip(&matched).enumerate() {
        let Some(previous_index) = *previous_index else {
            diff.insertions.push(ListInsert {
                index,
                item: item.clone(),
                previous_index: None,
            });
            continue;
        };
        consumed[previous_index] = true;

        if kept[index] {
            if previous[previous_index] != *item {
                diff.updates.push(ListUpdate {
                    index,
                    item: item.clone(),
                    previous_index: Some(previous_index),
                });
            }
        } else {
            diff.insertions.push(ListInsert {
                index,
                item: item.clone(),
                previous_index: Some(previous_index),
            });
        }
    }

    diff.deletions = consumed
        .iter()
        .enumerate()
        .filter_map(|(index, consumed)| (!consumed).then_some(index))
        .collect();

    diff
}

/// Marks the rows of `next` that stay in place. A row whose index did not
/// change always stays; between those rows, a longest run of matched rows whose
/// previous indices strictly increase stays as well.
fn stationary_rows(matched: &[Option<usize>]) -> Vec<bool> {
    let rows: Vec<(usize, usize)> = matched
        .iter()
        .enumerate()
        .filter_map(|(index, previous)| previous.map(|previous| (index, previous)))
        .collect();

    let mut kept = vec![false; matched.len()];
    if rows.windows(2).all(|pair| pair[0].1 < pair[1].1) {
        for &(index, _) in &rows {
            kept[index] = true;
        }
        return kept;
    }

    let mut segment: Vec<(usize, usize)> = Vec::new();
    let mut floor: Option<usize> = None;
    for &(index, previous) in &rows {
        if index == previous {
            keep_longest_run(&segment, floor, Some(previous), &mut kept);
            segment.clear();
            kept[index] = true;
            floor = Some(previous);
        } else {
            segment.push((index, previous));
        }
    }
    keep_longest_run(&segment, floor, None, &mut kept);
    kept
}

/// Patience-sorting pass over the rows whose previous index lies strictly
/// between `floor` and `ceiling`.
fn keep_longest_run(
    segment: &[(usize, usize)],
    floor: Option<usize>,
    ceiling: Option<usize>,
    kept: &mut [bool],
) {
    let rows: Vec<(usize, usize)> = segment
        .iter()
        .copied()
        .filter(|&(_, previous)| {
            floor.map_or(true, |floor| previous > floor)
                && ceiling.map_or(true, |ceiling| previous < ceiling)
        })
        .collect();

    // tails[len - 1] is the row ending the best run of length `len` found so far
    let mut tails: Vec<usize> = Vec::new();
    let mut parents: Vec<Option<usize>> = vec![None; rows.len()];
    for (position, &(_, previous)) in rows.iter().enumerate() {
        let slot = tails.partition_point(|&tail| rows[tail].1 < previous);
        parents[position] = slot.checked_sub(1).map(|before| tails[before]);
        if slot == tails.len() {
            tails.push(position);
        } else {
            tails[slot] = position;
        }
    }

    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        kept[rows[position].0] = true;
        cursor = parents[position];
    }
}
