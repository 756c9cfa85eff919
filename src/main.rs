use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};
use iced::widget::scrollable::{RelativeOffset, Viewport};
use iced::widget::{button, column, container, row, scrollable, text, Column, Space};
use iced::{Alignment, Element, Length, Task, Theme};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

mod cache;
mod config;
mod state;
mod ui;

use cache::{CacheCoordinator, CacheStore, HttpNetwork, MemoryCacheStore, Response, SqliteCacheStore};
use config::GalleryConfig;
use state::data::{Category, Entry, Route, NAV_CATEGORIES};
use state::loader::PageTicket;
use state::source::{CachedEntryFetcher, PageSource, RetrievalError};
use ui::card;
use ui::feed::{FeedWork, GalleryFeed, ImageRequest};

type Coordinator = CacheCoordinator<HttpNetwork>;
type Source = PageSource<CachedEntryFetcher<HttpNetwork>>;

/// Main application state
struct Gallery {
    /// The route currently displayed
    route: Route,
    /// Offline cache shared by every resource request
    coordinator: Arc<Coordinator>,
    /// Entry source, shared with background page loads
    source: Arc<Mutex<Source>>,
    /// Entries, mounted cards and pagination of the current route
    feed: GalleryFeed,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// Category navigation produced a new location fragment
    Navigate(String),
    /// The gallery scrolled or was resized
    Scrolled(Viewport),
    /// A page request finished
    PageLoaded(PageTicket, Result<Vec<Entry>, RetrievalError>),
    /// A card image came back from the offline cache
    ImageLoaded(ImageRequest, Response),
    /// Install hook finished
    CacheInstalled(Result<usize, String>),
    /// User asked to retry after a failed page
    Retry,
    /// "Back to top" button
    BackToTop,
}

fn gallery_scroll_id() -> scrollable::Id {
    scrollable::Id::new("gallery")
}

impl Gallery {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let config = match GalleryConfig::load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("⚠️  Ignoring config file: {}", e);
                GalleryConfig::default()
            }
        };

        let store = open_store(&config);
        let network = match HttpNetwork::new(Some(&config.base_url)) {
            Ok(network) => network,
            Err(e) => {
                log::warn!("⚠️  {}; only absolute URLs will load", e);
                HttpNetwork::without_base()
            }
        };
        let coordinator = Arc::new(CacheCoordinator::new(store, network, config.cache_settings()));

        let fetcher = CachedEntryFetcher::new(coordinator.clone(), config.data_url.clone());
        let source = Arc::new(Mutex::new(PageSource::new(fetcher, config.page_size)));

        let route = Route::parse(&config.start_route);
        let mut gallery = Gallery {
            feed: GalleryFeed::new(&config, route.category.clone()),
            route: route.clone(),
            coordinator,
            source,
        };

        log::info!("🎨 Design gallery starting on '{}'", route.title());

        let install = gallery.install_cache();
        let first_page = gallery.enter_route(route);
        (gallery, Task::batch([install, first_page]))
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Navigate(fragment) => {
                let route = Route::parse(&fragment);
                if route == self.route {
                    return Task::none();
                }
                self.enter_route(route)
            }
            Message::Scrolled(viewport) => {
                let work = self
                    .feed
                    .scrolled(viewport.absolute_offset().y, viewport.bounds().height);
                self.start(work)
            }
            Message::PageLoaded(ticket, result) => {
                let work = self.feed.page_loaded(&ticket, result);
                self.start(work)
            }
            Message::ImageLoaded(request, response) => {
                if !self.feed.image_loaded(&request, response) {
                    log::debug!("Dropping late image for card {}", request.index);
                }
                Task::none()
            }
            Message::CacheInstalled(result) => {
                match result {
                    Ok(count) => {
                        log::info!("✅ Offline cache installed ({} resources)", count);
                        match self.coordinator.activate() {
                            Ok(evicted) if !evicted.is_empty() => {
                                log::info!("Evicted {} outdated cache partition(s)", evicted.len());
                            }
                            Ok(_) => {}
                            Err(e) => log::warn!("⚠️  Cache activation failed: {}", e),
                        }
                    }
                    // Older partitions stay in place, and keep answering offline,
                    // until an install succeeds
                    Err(e) => log::warn!("⚠️  Offline cache not installed: {}", e),
                }
                Task::none()
            }
            Message::Retry => {
                let work = self.feed.retry();
                self.start(work)
            }
            Message::BackToTop => scrollable::snap_to(gallery_scroll_id(), RelativeOffset::START),
        }
    }

    /// Window title follows the route
    fn title(&self) -> String {
        format!("{} inspiration", self.route.title())
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let mut nav = row![button(text("Random").size(14))
            .on_press(Message::Navigate(String::new()))
            .padding(8)]
        .spacing(8);
        for name in NAV_CATEGORIES {
            let route = Route::for_category(Category::parse(name));
            nav = nav.push(
                button(text(capitalize(name)).size(14))
                    .on_press(Message::Navigate(route.fragment()))
                    .padding(8),
            );
        }

        let feed = &self.feed;
        let loader = feed.loader();
        let extent = feed.window().item_extent;
        let range = feed.windower().range();
        let above = range.start as f32 * extent;
        let below = feed.entries().len().saturating_sub(range.end) as f32 * extent;

        let mut list = Column::new().width(Length::Fill).push(Space::with_height(above));
        for item in feed.windower().mounted() {
            list = list.push(card::view(item, extent));
        }
        list = list.push(Space::with_height(below));

        if loader.sentinel_present() {
            list = list.push(Space::with_height(feed.sentinel_extent()));
        }
        if loader.is_loading() {
            list = list.push(
                container(text("Loading more designs…").size(14))
                    .center_x(Length::Fill)
                    .padding(16),
            );
        }
        if !feed.status().is_empty() {
            let mut notice = column![text(feed.status()).size(14)]
                .spacing(8)
                .align_x(Alignment::Center);
            if loader.failure().is_some() {
                notice = notice.push(button("Retry").on_press(Message::Retry).padding(8));
            }
            list = list.push(container(notice).center_x(Length::Fill).padding(16));
        }

        let gallery = scrollable(list)
            .id(gallery_scroll_id())
            .on_scroll(Message::Scrolled)
            .width(Length::Fill)
            .height(Length::Fill);

        let content = column![
            text(self.route.title()).size(32),
            nav,
            gallery,
            row![
                text(format!("{} designs", feed.entries().len())).size(12),
                Space::with_width(Length::Fill),
                button("↑ Top").on_press(Message::BackToTop).padding(8),
            ]
            .align_y(Alignment::Center),
        ]
        .spacing(16)
        .padding(24);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }

    /// Switch routes: reset the feed and scroll back up
    fn enter_route(&mut self, route: Route) -> Task<Message> {
        let work = self.feed.enter_route(route.category.clone());
        self.route = route;
        Task::batch([
            scrollable::snap_to(gallery_scroll_id(), RelativeOffset::START),
            self.start(work),
        ])
    }

    /// Turn feed work into background tasks
    fn start(&self, work: FeedWork) -> Task<Message> {
        let mut tasks: Vec<Task<Message>> = work
            .images
            .into_iter()
            .map(|request| self.load_image(request))
            .collect();
        if let Some(ticket) = work.page {
            tasks.push(self.fetch_page(ticket, work.starts_session));
        }
        Task::batch(tasks)
    }

    /// Run a page request in the background
    fn fetch_page(&self, ticket: PageTicket, new_session: bool) -> Task<Message> {
        let source = self.source.clone();
        Task::perform(
            async move {
                let mut source = source.lock().await;
                if new_session {
                    source.enter_route(&ticket.request.category);
                }
                let result = source
                    .get_entries(&ticket.request.category, ticket.request.page_number)
                    .await;
                (ticket, result)
            },
            |(ticket, result)| Message::PageLoaded(ticket, result),
        )
    }

    /// Fetch a card image through the offline cache
    fn load_image(&self, request: ImageRequest) -> Task<Message> {
        let coordinator = self.coordinator.clone();
        Task::perform(
            async move {
                let response = coordinator.handle(&request.url).await;
                (request, response)
            },
            |(request, response)| Message::ImageLoaded(request, response),
        )
    }

    /// Run the install hook in the background
    fn install_cache(&self) -> Task<Message> {
        let coordinator = self.coordinator.clone();
        Task::perform(
            async move { coordinator.install().await.map_err(|e| e.to_string()) },
            Message::CacheInstalled,
        )
    }
}

/// Open the persistent cache, falling back to memory so the gallery still works
fn open_store(config: &GalleryConfig) -> Arc<dyn CacheStore> {
    let path = config
        .cache_db_path
        .clone()
        .or_else(SqliteCacheStore::default_path);

    match path.map(|path| SqliteCacheStore::open(&path)) {
        Some(Ok(store)) => Arc::new(store),
        Some(Err(e)) => {
            log::warn!("⚠️  Offline cache unavailable ({}), using memory only", e);
            Arc::new(MemoryCacheStore::new())
        }
        None => {
            log::warn!("⚠️  No cache directory on this platform, using memory only");
            Arc::new(MemoryCacheStore::new())
        }
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Log directory in the platform data dir, created on demand
fn get_log_dir() -> Option<PathBuf> {
    let mut dir = dirs::data_local_dir()?;
    dir.push("design-gallery");
    dir.push("logs");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

fn init_logging() -> Option<LoggerHandle> {
    let logger = match Logger::try_with_env_or_str("info, iced=error, wgpu_hal=error, wgpu_core=error, naga=error") {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Invalid log specification: {}", e);
            return None;
        }
    };

    let logger = match get_log_dir() {
        Some(log_dir) => logger
            .log_to_file(
                FileSpec::default()
                    .directory(&log_dir)
                    .basename("design-gallery")
                    .suffix("log")
                    .suppress_timestamp(),
            )
            .rotate(Criterion::Size(64 * 1024), Naming::Numbers, Cleanup::KeepLogFiles(3))
            .duplicate_to_stderr(Duplicate::Warn),
        None => {
            eprintln!("Failed to create log directory, logging to stderr");
            logger.log_to_stderr()
        }
    };

    match logger.start() {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Failed to start logger: {}", e);
            None
        }
    }
}

fn main() -> iced::Result {
    let _logger = init_logging();

    iced::application(Gallery::title, Gallery::update, Gallery::view)
        .theme(Gallery::theme)
        .centered()
        .run_with(Gallery::new)
}
