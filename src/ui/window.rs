/// Windowing engine for the gallery scroll surface
///
/// Every card has the same extent, so the range of cards that must exist
/// follows directly from the scroll offset:
///
/// - start = floor(offset / item_extent) - buffer
/// - end   = ceil((offset + viewport) / item_extent) + buffer
///
/// clamped to the known entries. `Windower::reconcile` then brings the
/// mounted set in line with that range: cards that left are dropped and
/// unobserved, cards that entered are built and observed. The content
/// extent never depends on what is mounted, so the scrollbar stays stable.

use std::collections::BTreeMap;
use std::ops::Range;

use super::visibility::{ElementId, Span, VisibilityTracker};
use crate::state::data::Entry;

/// Scroll state plus the fixed geometry of the list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportWindow {
    pub scroll_offset: f32,
    pub viewport_extent: f32,
    pub item_extent: f32,
    /// Extra items materialized on each side of the viewport
    pub buffer_count: usize,
}

impl ViewportWindow {
    /// The index range `[start, end)` that must be materialized
    pub fn range(&self, known_count: usize) -> Range<usize> {
        if known_count == 0 || self.item_extent.is_nan() || self.item_extent <= 0.0 {
            return 0..0;
        }

        let item_extent = self.item_extent as f64;
        let offset = self.scroll_offset as f64;
        let viewport = self.viewport_extent.max(0.0) as f64;
        let buffer = i64::try_from(self.buffer_count).unwrap_or(i64::MAX);

        let start = ((offset / item_extent).floor() as i64).saturating_sub(buffer);
        let end = (((offset + viewport) / item_extent).ceil() as i64).saturating_add(buffer);

        let known = known_count as i64;
        let start = start.clamp(0, known) as usize;
        let end = end.clamp(0, known) as usize;
        start..end.max(start)
    }

    /// Total scrollable extent of `known_count` cards
    pub fn content_extent(&self, known_count: usize) -> f32 {
        known_count as f32 * self.item_extent
    }

    /// Where card `index` sits in content coordinates
    pub fn item_span(&self, index: usize) -> Span {
        let start = index as f32 * self.item_extent;
        Span::new(start, start + self.item_extent)
    }

    /// The visible region, without any margin
    pub fn region(&self) -> Span {
        Span::new(self.scroll_offset, self.scroll_offset + self.viewport_extent)
    }
}

/// A card that currently exists on the scroll surface
#[derive(Debug)]
pub struct MountedItem<H> {
    pub index: usize,
    pub entry: Entry,
    pub handle: H,
}

/// What a reconcile pass changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub range: Range<usize>,
    pub mounted: Vec<usize>,
    pub unmounted: Vec<usize>,
}

impl Reconciliation {
    #[cfg(test)]
    pub fn is_noop(&self) -> bool {
        self.mounted.is_empty() && self.unmounted.is_empty()
    }
}

/// Owns the mounted cards. `H` is whatever the view needs per card.
#[derive(Debug)]
pub struct Windower<H> {
    mounted: BTreeMap<usize, MountedItem<H>>,
    range: Range<usize>,
}

impl<H> Default for Windower<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Windower<H> {
    pub fn new() -> Self {
        Self {
            mounted: BTreeMap::new(),
            range: 0..0,
        }
    }

    /// Range computed by the last reconcile
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Mounted cards in index order
    pub fn mounted(&self) -> impl Iterator<Item = &MountedItem<H>> {
        self.mounted.values()
    }

    #[cfg(test)]
    pub fn mounted_indices(&self) -> Vec<usize> {
        self.mounted.keys().copied().collect()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MountedItem<H>> {
        self.mounted.get_mut(&index)
    }

    /// Bring the mounted set in line with the window over `entries`.
    ///
    /// Safe to call repeatedly: with unchanged inputs nothing is mounted or
    /// unmounted and `mount` is not called.
    pub fn reconcile<F>(
        &mut self,
        window: &ViewportWindow,
        entries: &[Entry],
        tracker: &mut VisibilityTracker,
        mut mount: F,
    ) -> Reconciliation
    where
        F: FnMut(usize, &Entry) -> H,
    {
        let range = window.range(entries.len());

        // An index whose entry changed would hold a stale handle: remount it
        let leaving: Vec<usize> = self
            .mounted
            .iter()
            .filter(|(index, item)| !range.contains(*index) || entries.get(**index) != Some(&item.entry))
            .map(|(index, _)| *index)
            .collect();

        for index in &leaving {
            self.mounted.remove(index);
            tracker.unobserve(ElementId::Item(*index));
        }

        let mut entering = Vec::new();
        for index in range.clone() {
            if self.mounted.contains_key(&index) {
                continue;
            }
            let entry = &entries[index];
            let handle = mount(index, entry);
            self.mounted.insert(
                index,
                MountedItem {
                    index,
                    entry: entry.clone(),
                    handle,
                },
            );
            tracker.observe(ElementId::Item(index), window.item_span(index));
            entering.push(index);
        }

        if !leaving.is_empty() || !entering.is_empty() {
            log::debug!(
                "Window [{}, {}): +{} -{} ({} mounted)",
                range.start,
                range.end,
                entering.len(),
                leaving.len(),
                self.mounted.len()
            );
        }

        self.range = range.clone();
        Reconciliation {
            range,
            mounted: entering,
            unmounted: leaving,
        }
    }

    /// Unmount everything (route change)
    pub fn reset(&mut self, tracker: &mut VisibilityTracker) {
        for index in self.mounted.keys() {
            tracker.unobserve(ElementId::Item(*index));
        }
        self.mounted.clear();
        self.range = 0..0;
    }
}
