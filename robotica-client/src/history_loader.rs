use std::sync::Arc;
use std::time::Duration;

use jiff::Zoned;
use robotica_core::{HistoryFilter, NormalizedAnalysis, TimeWindow};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::service::DataAccessService;
use crate::transport::Transport;

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// What the history screen currently shows.
#[derive(Debug, Clone, Default)]
pub struct HistoryView {
    pub items: Vec<NormalizedAnalysis>,
    pub error: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    TimedOut,
    Cancelled,
    Failed(String),
    /// A newer load started before this one settled.
    Superseded,
}

enum Settlement {
    Loaded(Vec<NormalizedAnalysis>),
    TimedOut(Duration),
    Cancelled,
    Failed(String),
}

#[derive(Default)]
struct LoaderState {
    ticket: u64,
    settled: bool,
    view: HistoryView,
}

/// Loads analysis history under a deadline.
///
/// Each load takes a ticket. Only the first settlement for the current
/// ticket reaches the view; the request that lost the race, or a load that a
/// newer one replaced, is dropped when it finishes.
pub struct HistoryLoader<T> {
    service: DataAccessService<T>,
    deadline: Duration,
    state: Arc<Mutex<LoaderState>>,
}

impl<T> Clone for HistoryLoader<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            deadline: self.deadline,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Transport> HistoryLoader<T> {
    pub fn new(service: DataAccessService<T>) -> Self {
        Self::with_deadline(service, DEFAULT_LOAD_TIMEOUT)
    }

    pub fn with_deadline(service: DataAccessService<T>, deadline: Duration) -> Self {
        Self {
            service,
            deadline,
            state: Arc::new(Mutex::new(LoaderState::default())),
        }
    }

    pub async fn view(&self) -> HistoryView {
        self.state.lock().await.view.clone()
    }

    /// Load up to `limit` analyses, keeping the ones with something to show
    /// that fall inside `window`.
    pub async fn load(
        &self,
        limit: usize,
        window: TimeWindow,
        cancel: &CancellationToken,
    ) -> LoadOutcome {
        let ticket = self.begin().await;
        info!(ticket, limit, %window, "loading analysis history");

        let filter = HistoryFilter::builder()
            .window(window)
            .content_only(true)
            .build();
        let service = self.service.clone();
        let state = Arc::clone(&self.state);

        // Detached on timeout: the request keeps running until the transport
        // gives up, and its result is discarded by the ticket check.
        let mut request = tokio::spawn(async move {
            let items = service.list_analysis_history(limit).await;
            let items = filter.apply(items, &Zoned::now());
            settle(&state, ticket, Settlement::Loaded(items)).await
        });

        tokio::select! {
            joined = &mut request => match joined {
                Ok(outcome) => outcome,
                Err(e) => settle(&self.state, ticket, Settlement::Failed(e.to_string())).await,
            },
            _ = tokio::time::sleep(self.deadline) => {
                warn!(ticket, deadline_secs = self.deadline.as_secs(), "history load timed out");
                settle(&self.state, ticket, Settlement::TimedOut(self.deadline)).await
            }
            _ = cancel.cancelled() => {
                settle(&self.state, ticket, Settlement::Cancelled).await
            }
        }
    }

    async fn begin(&self) -> u64 {
        let mut state = self.state.lock().await;
        state.ticket += 1;
        state.settled = false;
        state.view.loading = true;
        state.view.error = None;
        state.ticket
    }
}

async fn settle(state: &Mutex<LoaderState>, ticket: u64, settlement: Settlement) -> LoadOutcome {
    let mut state = state.lock().await;

    if state.ticket != ticket || state.settled {
        debug!(ticket, current = state.ticket, "discarding stale history result");
        return LoadOutcome::Superseded;
    }

    state.settled = true;
    state.view.loading = false;

    match settlement {
        Settlement::Loaded(items) => {
            let count = items.len();
            state.view.items = items;
            state.view.error = None;
            info!(ticket, count, "analysis history loaded");
            LoadOutcome::Loaded { count }
        }
        Settlement::TimedOut(after) => {
            state.view.items.clear();
            state.view.error = Some(format!(
                "loading history took longer than {}s",
                after.as_secs()
            ));
            LoadOutcome::TimedOut
        }
        Settlement::Cancelled => {
            debug!(ticket, "history load cancelled");
            LoadOutcome::Cancelled
        }
        Settlement::Failed(reason) => {
            warn!(ticket, %reason, "history load failed");
            state.view.items.clear();
            state.view.error = Some(reason.clone());
            LoadOutcome::Failed(reason)
        }
    }
}
