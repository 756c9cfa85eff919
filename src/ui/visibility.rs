/// Visibility tracking along the scroll axis
///
/// Elements are registered with the span they occupy in content
/// coordinates. Each `update` with the current viewport region produces
/// the ordered list of visibility transitions since the previous update;
/// the same events are pushed to every subscriber stream.
///
/// The region is grown by a margin on both ends so elements are reported
/// slightly before they scroll into view.

use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc;

/// Events a subscriber may have pending before it is dropped as lagging
pub const SUBSCRIBER_CAPACITY: usize = 256;

/// Something the tracker can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementId {
    /// The card at this index of the known entry set
    Item(usize),
    /// The marker after the last card that triggers the next page
    Sentinel,
}

/// A half-open interval `[start, end)` along the scroll axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: f32,
    pub end: f32,
}

impl Span {
    pub fn new(start: f32, end: f32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn extent(&self) -> f32 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityEvent {
    pub element: ElementId,
    pub is_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Observed {
    span: Span,
    /// Fraction of the span that must intersect the grown region
    threshold: f32,
}

#[derive(Debug)]
pub struct VisibilityTracker {
    margin: f32,
    default_threshold: f32,
    observed: BTreeMap<ElementId, Observed>,
    visible: BTreeSet<ElementId>,
    subscribers: Vec<mpsc::Sender<VisibilityEvent>>,
}

impl VisibilityTracker {
    /// `margin` grows the viewport on both ends; `threshold` is the default
    /// fraction of an element that must be inside (0 = any overlap)
    pub fn new(margin: f32, threshold: f32) -> Self {
        Self {
            margin: margin.max(0.0),
            default_threshold: threshold.clamp(0.0, 1.0),
            observed: BTreeMap::new(),
            visible: BTreeSet::new(),
            subscribers: Vec::new(),
        }
    }

    /// Start observing an element, or move one already observed
    pub fn observe(&mut self, element: ElementId, span: Span) {
        self.observe_with_threshold(element, span, self.default_threshold);
    }

    pub fn observe_with_threshold(&mut self, element: ElementId, span: Span, threshold: f32) {
        self.observed.insert(
            element,
            Observed {
                span,
                threshold: threshold.clamp(0.0, 1.0),
            },
        );
    }

    /// Stop observing. No event is emitted for the removal.
    pub fn unobserve(&mut self, element: ElementId) {
        self.observed.remove(&element);
        self.visible.remove(&element);
    }

    #[cfg(test)]
    pub fn is_observing(&self, element: ElementId) -> bool {
        self.observed.contains_key(&element)
    }

    pub fn is_visible(&self, element: ElementId) -> bool {
        self.visible.contains(&element)
    }

    /// Elements currently inside the grown region, in order
    #[cfg(test)]
    pub fn visible(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.visible.iter().copied()
    }

    /// Receive every future transition as an ordered stream.
    ///
    /// The stream is bounded: a subscriber that falls `SUBSCRIBER_CAPACITY`
    /// events behind is disconnected rather than buffered without limit,
    /// and sees its stream end.
    #[allow(dead_code)]
    pub fn subscribe(&mut self) -> mpsc::Receiver<VisibilityEvent> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.push(sender);
        receiver
    }

    /// Re-evaluate every observed element against the viewport region.
    /// Returns the transitions, ordered by element.
    pub fn update(&mut self, region: Span) -> Vec<VisibilityEvent> {
        let grown = Span::new(region.start - self.margin, region.end + self.margin);

        let mut events = Vec::new();
        for (&element, observed) in &self.observed {
            let now_visible = intersects(observed, grown);
            let was_visible = self.visible.contains(&element);
            if now_visible != was_visible {
                events.push(VisibilityEvent {
                    element,
                    is_visible: now_visible,
                });
            }
        }

        for event in &events {
            if event.is_visible {
                self.visible.insert(event.element);
            } else {
                self.visible.remove(&event.element);
            }
        }

        if !events.is_empty() {
            // Closed and lagging receivers are dropped here
            self.subscribers.retain(|subscriber| {
                events.iter().all(|event| match subscriber.try_send(*event) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        log::warn!("Dropping visibility subscriber that stopped reading");
                        false
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                })
            });
        }

        events
    }
}

fn intersects(observed: &Observed, region: Span) -> bool {
    let span = observed.span;
    if span.extent() <= 0.0 {
        return span.start >= region.start && span.start < region.end;
    }

    let overlap = span.end.min(region.end) - span.start.max(region.start);
    overlap > 0.0 && overlap / span.extent() >= observed.threshold
}
