/// The gallery feed for the current route
///
/// Ties the pagination state machine, the known entries, the mounted cards
/// and the visibility tracker together. Every method returns the work the
/// caller has to start (image loads, page requests) instead of starting it,
/// so the whole scroll/route/completion flow runs without a GUI runtime.

use super::card::CardHandle;
use super::visibility::{ElementId, Span, VisibilityTracker};
use super::window::{ViewportWindow, Windower};
use crate::cache::Response;
use crate::config::GalleryConfig;
use crate::state::data::{Category, Entry};
use crate::state::loader::{Completion, InfiniteLoader, PageTicket};
use crate::state::source::RetrievalError;

/// An image load for a card, stamped so a late answer can be matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub route_epoch: u64,
    pub index: usize,
    pub url: String,
}

/// Work produced by a feed transition
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FeedWork {
    /// Images for cards that were just mounted
    pub images: Vec<ImageRequest>,
    /// Next page to fetch
    pub page: Option<PageTicket>,
    /// The page is the first of a new route session
    pub starts_session: bool,
}

#[derive(Debug)]
pub struct GalleryFeed {
    loader: InfiniteLoader,
    entries: Vec<Entry>,
    windower: Windower<CardHandle>,
    tracker: VisibilityTracker,
    window: ViewportWindow,
    sentinel_extent: f32,
    sentinel_threshold: f32,
    /// Inline message shown under the cards
    status: String,
}

impl GalleryFeed {
    pub fn new(config: &GalleryConfig, category: Category) -> Self {
        Self {
            loader: InfiniteLoader::new(category),
            entries: Vec::new(),
            windower: Windower::new(),
            tracker: VisibilityTracker::new(config.visibility_margin, 0.0),
            window: ViewportWindow {
                scroll_offset: 0.0,
                viewport_extent: config.viewport_extent,
                item_extent: config.item_extent,
                buffer_count: config.buffer_count,
            },
            sentinel_extent: config.sentinel_extent,
            sentinel_threshold: config.sentinel_threshold,
            status: String::new(),
        }
    }

    pub fn loader(&self) -> &InfiniteLoader {
        &self.loader
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn windower(&self) -> &Windower<CardHandle> {
        &self.windower
    }

    pub fn window(&self) -> &ViewportWindow {
        &self.window
    }

    pub fn sentinel_extent(&self) -> f32 {
        self.sentinel_extent
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Drop everything about the current route and request its first page
    pub fn enter_route(&mut self, category: Category) -> FeedWork {
        self.entries.clear();
        self.windower.reset(&mut self.tracker);
        self.tracker.unobserve(ElementId::Sentinel);
        self.status.clear();
        self.window.scroll_offset = 0.0;

        let ticket = self.loader.enter_route(category);
        FeedWork {
            page: Some(ticket),
            starts_session: true,
            ..self.refresh()
        }
    }

    /// The scroll surface moved or was resized
    pub fn scrolled(&mut self, scroll_offset: f32, viewport_extent: f32) -> FeedWork {
        self.window.scroll_offset = scroll_offset;
        self.window.viewport_extent = viewport_extent;
        self.refresh()
    }

    /// Fold a finished page request in
    pub fn page_loaded(
        &mut self,
        ticket: &PageTicket,
        result: Result<Vec<Entry>, RetrievalError>,
    ) -> FeedWork {
        match self.loader.complete(ticket, result) {
            Completion::Appended(entries) => {
                self.entries.extend(entries);
                return self.refresh();
            }
            Completion::Exhausted => {}
            Completion::Failed { error, initial } => {
                self.status = if initial {
                    format!("Couldn't load designs. Please try again later. ({})", error)
                } else {
                    format!("Couldn't load more designs. ({})", error)
                };
            }
            Completion::Stale => return FeedWork::default(),
        }
        self.tracker.unobserve(ElementId::Sentinel);
        FeedWork::default()
    }

    /// User-initiated retry after a failed page
    pub fn retry(&mut self) -> FeedWork {
        match self.loader.retry() {
            Some(ticket) => {
                self.status.clear();
                FeedWork {
                    page: Some(ticket),
                    ..self.refresh()
                }
            }
            None => FeedWork::default(),
        }
    }

    /// Hand an image answer to its card. Returns false if the answer is
    /// late: the route changed, the card was unmounted, or its entry changed.
    pub fn image_loaded(&mut self, request: &ImageRequest, response: Response) -> bool {
        if request.route_epoch != self.loader.route_epoch() {
            return false;
        }
        match self.windower.get_mut(request.index) {
            Some(item) if item.entry.image_url == request.url => {
                log::trace!("Image for design {} arrived ({})", item.entry.id, response.status);
                item.handle.resolve(response);
                true
            }
            _ => false,
        }
    }

    /// Recompute the window, then act on visibility: images for new cards,
    /// the next page for the sentinel.
    fn refresh(&mut self) -> FeedWork {
        let report = self.windower.reconcile(
            &self.window,
            &self.entries,
            &mut self.tracker,
            |_, _| CardHandle::loading(),
        );
        if !report.unmounted.is_empty() {
            log::trace!(
                "Released {} card(s) outside [{}, {})",
                report.unmounted.len(),
                report.range.start,
                report.range.end
            );
        }

        if self.loader.sentinel_present() {
            let top = self.window.content_extent(self.entries.len());
            self.tracker.observe_with_threshold(
                ElementId::Sentinel,
                Span::new(top, top + self.sentinel_extent),
                self.sentinel_threshold,
            );
        } else {
            self.tracker.unobserve(ElementId::Sentinel);
        }

        for event in self.tracker.update(self.window.region()) {
            log::trace!("{:?} visible: {}", event.element, event.is_visible);
        }

        let route_epoch = self.loader.route_epoch();
        let images = self
            .windower
            .mounted()
            .filter(|item| report.mounted.contains(&item.index))
            .map(|item| ImageRequest {
                route_epoch,
                index: item.index,
                url: item.entry.image_url.clone(),
            })
            .collect();

        // Checked on every refresh, not only on transitions, so a short page
        // that leaves the sentinel on screen still leads to the next one
        let page = if self.tracker.is_visible(ElementId::Sentinel) {
            self.loader.on_sentinel_visible()
        } else {
            None
        };

        FeedWork {
            images,
            page,
            starts_session: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseOrigin;
    use crate::ui::card::CardImage;

    fn entries(count: usize, category: &str) -> Vec<Entry> {
        (0..count)
            .map(|id| Entry {
                id,
                image_url: format!("https://cdn.test/{}/{}.png", category, id),
                author: format!("@author{}", id),
                category: category.to_string(),
            })
            .collect()
    }

    fn image(body: &[u8]) -> Response {
        Response {
            status: 200,
            content_type: Some("image/png".to_string()),
            body: body.to_vec(),
            origin: ResponseOrigin::Network,
        }
    }

    fn feed() -> GalleryFeed {
        GalleryFeed::new(&GalleryConfig::default(), Category::Random)
    }

    #[test]
    fn test_enter_route_requests_first_page() {
        let mut feed = feed();
        let work = feed.enter_route(Category::parse("mobile"));

        let ticket = work.page.unwrap();
        assert_eq!(ticket.request.page_number, 1);
        assert!(work.starts_session);
        assert!(work.images.is_empty());
        assert!(feed.loader().is_loading());
    }

    #[test]
    fn test_full_page_mounts_window_and_requests_images() {
        let mut feed = feed();
        let ticket = feed.enter_route(Category::parse("mobile")).page.unwrap();

        let work = feed.page_loaded(&ticket, Ok(entries(20, "mobile")));
        // viewport 800 / extent 400 plus a buffer of 5
        let indices: Vec<usize> = work.images.iter().map(|request| request.index).collect();
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
        assert_eq!(work.images[3].url, "https://cdn.test/mobile/3.png");
        // Sentinel is far below the viewport
        assert_eq!(work.page, None);
        assert!(!work.starts_session);
    }

    #[test]
    fn test_short_pages_keep_loading_while_sentinel_stays_visible() {
        let mut feed = feed();
        let first = feed.enter_route(Category::parse("watch")).page.unwrap();

        // One card leaves the sentinel on screen: page 2 follows
        let work = feed.page_loaded(&first, Ok(entries(1, "watch")));
        let second = work.page.unwrap();
        assert_eq!(second.request.page_number, 2);

        // The sentinel never left the viewport, so there is no new
        // transition, yet page 3 is still requested
        let more: Vec<Entry> = entries(2, "watch").into_iter().skip(1).collect();
        let work = feed.page_loaded(&second, Ok(more));
        assert_eq!(work.page.unwrap().request.page_number, 3);
        assert_eq!(feed.entries().len(), 2);
    }

    #[test]
    fn test_exhaustion_removes_sentinel() {
        let mut feed = feed();
        let first = feed.enter_route(Category::parse("watch")).page.unwrap();
        let second = feed.page_loaded(&first, Ok(entries(1, "watch"))).page.unwrap();

        assert_eq!(feed.page_loaded(&second, Ok(Vec::new())), FeedWork::default());
        assert!(!feed.loader().sentinel_present());
        assert_eq!(feed.scrolled(0.0, 800.0).page, None);
    }

    #[test]
    fn test_failure_reports_and_retries() {
        let mut feed = feed();
        let ticket = feed.enter_route(Category::parse("mobile")).page.unwrap();

        feed.page_loaded(&ticket, Err(RetrievalError::Unavailable));
        assert!(feed.status().starts_with("Couldn't load designs"));
        assert!(feed.loader().failure().is_some());

        let work = feed.retry();
        assert_eq!(work.page.unwrap().request.page_number, 1);
        assert!(!work.starts_session);
        assert!(feed.status().is_empty());
        assert_eq!(feed.retry(), FeedWork::default());
    }

    #[test]
    fn test_image_reaches_its_mounted_card() {
        let mut feed = feed();
        let ticket = feed.enter_route(Category::parse("mobile")).page.unwrap();
        let work = feed.page_loaded(&ticket, Ok(entries(20, "mobile")));

        assert!(feed.image_loaded(&work.images[0], image(b"pixels")));
        let card = feed.windower().mounted().next().unwrap();
        assert!(matches!(card.handle.image, CardImage::Ready(_)));
    }

    #[test]
    fn test_late_image_for_previous_route_is_dropped() {
        let mut feed = feed();
        let ticket = feed.enter_route(Category::parse("mobile")).page.unwrap();
        let work = feed.page_loaded(&ticket, Ok(entries(20, "mobile")));

        let ticket = feed.enter_route(Category::parse("desktop")).page.unwrap();
        feed.page_loaded(&ticket, Ok(entries(20, "desktop")));

        assert!(!feed.image_loaded(&work.images[0], image(b"pixels")));
        let card = feed.windower().mounted().next().unwrap();
        assert!(card.handle.is_loading());
    }

    #[test]
    fn test_late_image_for_unmounted_or_changed_card_is_dropped() {
        let mut feed = feed();
        let ticket = feed.enter_route(Category::parse("mobile")).page.unwrap();
        let work = feed.page_loaded(&ticket, Ok(entries(20, "mobile")));

        // Card 0 is out of the window [5, 17) once scrolled
        let scrolled = feed.scrolled(4000.0, 800.0);
        assert_eq!(feed.windower().range(), 5..17);
        assert!(!feed.image_loaded(&work.images[0], image(b"pixels")));

        // Card 7 is mounted now, but the answer is for another entry
        let mounted = scrolled.images.iter().find(|request| request.index == 7).unwrap();
        let other = ImageRequest {
            url: "https://cdn.test/mobile/other.png".to_string(),
            ..mounted.clone()
        };
        assert!(!feed.image_loaded(&other, image(b"pixels")));
        assert!(feed.image_loaded(mounted, image(b"pixels")));
    }

    #[test]
    fn test_route_change_resets_everything() {
        let mut feed = feed();
        let ticket = feed.enter_route(Category::parse("mobile")).page.unwrap();
        feed.page_loaded(&ticket, Ok(entries(20, "mobile")));
        feed.scrolled(2000.0, 800.0);
        let epoch = feed.loader().route_epoch();

        let work = feed.enter_route(Category::parse("desktop"));
        assert!(feed.entries().is_empty());
        assert_eq!(feed.windower().mounted().count(), 0);
        assert_eq!(feed.windower().range(), 0..0);
        assert_eq!(feed.window().scroll_offset, 0.0);
        assert!(!feed.tracker.is_observing(ElementId::Item(0)));
        assert!(feed.loader().sentinel_present());
        assert_eq!(feed.loader().route_epoch(), epoch + 1);
        assert_eq!(work.page.unwrap().route_epoch, epoch + 1);

        // The old route's page is stale
        assert_eq!(feed.page_loaded(&ticket, Ok(entries(20, "mobile"))), FeedWork::default());
        assert!(feed.entries().is_empty());
    }
}
