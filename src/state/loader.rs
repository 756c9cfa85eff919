/// Infinite-scroll pagination state machine
///
/// One loader exists per active route. It hands out `PageTicket`s (at most
/// one in flight) when the sentinel after the last card becomes visible,
/// and folds the results back in:
///
/// ```text
/// Idle --sentinel visible--> Loading --non-empty page--> Idle
///                            Loading --empty page / error--> Exhausted
/// ```
///
/// `Exhausted` is terminal for the route. A route change starts over at
/// page 1 under a new epoch, so late results for the old route are ignored.

use super::data::{Category, Entry, PageRequest};
use super::source::RetrievalError;

/// Why a route stopped paginating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExhaustReason {
    /// An empty page came back
    EndOfData,
    /// Retrieval failed; the user may retry
    Failed(RetrievalError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Exhausted(ExhaustReason),
}

/// A page request stamped with the route epoch it was issued under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    pub route_epoch: u64,
    pub request: PageRequest,
}

/// What the caller should do with a completed page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Append these entries to the known set
    Appended(Vec<Entry>),
    /// No more data for this route
    Exhausted,
    /// Retrieval failed; `initial` is true for the first page of the route,
    /// which the gallery reports inline
    Failed { error: RetrievalError, initial: bool },
    /// The result belongs to an abandoned route or request
    Stale,
}

#[derive(Debug)]
pub struct InfiniteLoader {
    category: Category,
    state: LoadState,
    /// Last page number handed out for this route
    page_number: u32,
    route_epoch: u64,
    sentinel_present: bool,
    in_flight: Option<PageTicket>,
}

impl InfiniteLoader {
    /// A loader that has not entered any route yet
    pub fn new(category: Category) -> Self {
        Self {
            category,
            state: LoadState::Idle,
            page_number: 0,
            route_epoch: 0,
            sentinel_present: false,
            in_flight: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    #[cfg(test)]
    pub fn category(&self) -> &Category {
        &self.category
    }

    #[cfg(test)]
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn route_epoch(&self) -> u64 {
        self.route_epoch
    }

    /// Drives the loading indicator
    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    /// The sentinel is removed once the route is exhausted
    pub fn sentinel_present(&self) -> bool {
        self.sentinel_present
    }

    /// The failure that stopped pagination, if any
    pub fn failure(&self) -> Option<&RetrievalError> {
        match &self.state {
            LoadState::Exhausted(ExhaustReason::Failed(error)) => Some(error),
            _ => None,
        }
    }

    /// Discard everything about the current route and request its first page
    pub fn enter_route(&mut self, category: Category) -> PageTicket {
        self.route_epoch += 1;
        self.category = category;
        self.page_number = 1;
        self.sentinel_present = true;
        log::info!(
            "Route '{}' entered (epoch {})",
            self.category,
            self.route_epoch
        );
        self.issue()
    }

    /// Sentinel became visible. Issues the next page only from `Idle`.
    pub fn on_sentinel_visible(&mut self) -> Option<PageTicket> {
        if self.state != LoadState::Idle || !self.sentinel_present || self.page_number == 0 {
            return None;
        }
        self.page_number += 1;
        Some(self.issue())
    }

    /// Re-request the page that failed. Only valid after a failure.
    pub fn retry(&mut self) -> Option<PageTicket> {
        if self.failure().is_none() {
            return None;
        }
        log::info!("Retrying page {} of '{}'", self.page_number, self.category);
        self.sentinel_present = true;
        Some(self.issue())
    }

    /// Fold a finished request back into the state machine
    pub fn complete(
        &mut self,
        ticket: &PageTicket,
        result: Result<Vec<Entry>, RetrievalError>,
    ) -> Completion {
        if ticket.route_epoch != self.route_epoch || self.in_flight.as_ref() != Some(ticket) {
            log::debug!(
                "Dropping stale page {} (epoch {}, current {})",
                ticket.request.page_number,
                ticket.route_epoch,
                self.route_epoch
            );
            return Completion::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(entries) if !entries.is_empty() => {
                self.state = LoadState::Idle;
                Completion::Appended(entries)
            }
            Ok(_) => {
                log::info!(
                    "'{}' exhausted after {} page(s)",
                    self.category,
                    self.page_number.saturating_sub(1)
                );
                self.state = LoadState::Exhausted(ExhaustReason::EndOfData);
                self.sentinel_present = false;
                Completion::Exhausted
            }
            Err(error) => {
                log::error!(
                    "Loading page {} of '{}' failed: {}",
                    self.page_number,
                    self.category,
                    error
                );
                self.state = LoadState::Exhausted(ExhaustReason::Failed(error.clone()));
                self.sentinel_present = false;
                Completion::Failed {
                    error,
                    initial: ticket.request.page_number == 1,
                }
            }
        }
    }

    fn issue(&mut self) -> PageTicket {
        let ticket = PageTicket {
            route_epoch: self.route_epoch,
            request: PageRequest {
                category: self.category.clone(),
                page_number: self.page_number,
            },
        };
        self.state = LoadState::Loading;
        self.in_flight = Some(ticket.clone());
        ticket
    }
}
