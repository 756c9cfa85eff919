/// Gallery UI module
///
/// - Windowing over the known entries (window.rs)
/// - Visibility tracking for cards and the sentinel (visibility.rs)
/// - Card rendering (card.rs)
/// - The per-route feed tying them to pagination (feed.rs)

pub mod card;
pub mod feed;
pub mod visibility;
pub mod window;
