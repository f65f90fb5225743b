use std::future::Future;
use std::sync::Arc;

use async_executor::Executor;
use futures_lite::future;
use pinpoint_locator::{
    Error as LocatorError, GeocodeParameters, GeocodeResult, LoadStatus, Locator, SuggestResult,
};
use pinpoint_map::geometry::Point;

use crate::suggestions::SuggestionAdapter;
use crate::surface::MapSurface;
use crate::ui::Ui;

const NOT_FOUND_PREFIX: &str = "Location not found: ";
const GEOCODE_FAILED: &str = "Error geo-locating address";

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// The search text changed.
    QueryChanged(String),
    /// A suggestion from the current batch was picked.
    SuggestionChosen(usize),
    /// The search text was submitted.
    QuerySubmitted(String),
    Pause,
    Resume,
}

/// How a submitted search ended.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Displayed {
        query: String,
        location: Point,
        place_name: Option<String>,
    },
    NotFound {
        query: String,
    },
    Failed {
        query: String,
    },
}

impl Outcome {
    /// User-facing message, for searches that did not find anything.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Displayed { .. } => None,
            Self::NotFound { query } => Some(format!("{NOT_FOUND_PREFIX}{query}")),
            Self::Failed { .. } => Some(GEOCODE_FAILED.to_owned()),
        }
    }

    #[must_use]
    pub fn query(&self) -> &str {
        match self {
            Self::Displayed { query, .. } | Self::NotFound { query } | Self::Failed { query } => {
                query
            }
        }
    }
}

/// Where the most recent search is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    LoadingLocator,
    Geocoding,
    Displayed,
    NotFound,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub params: GeocodeParameters,
    /// Ignore responses to requests a newer request has superseded. When
    /// off, whichever response arrives last wins.
    pub discard_stale_results: bool,
}

/// Feeds input to a running [`Controller`]. The controller stops once every
/// handle is dropped.
#[derive(Clone)]
pub struct Handle {
    inputs: async_channel::Sender<Input>,
}

impl Handle {
    /// Returns `false` if the controller has stopped.
    pub async fn send(&self, input: Input) -> bool {
        self.inputs.send(input).await.is_ok()
    }
}

enum Completion {
    Suggested {
        seq: u64,
        text: String,
        result: exn::Result<Vec<SuggestResult>, LocatorError>,
    },
    Loaded {
        seq: u64,
        query: String,
        status: LoadStatus,
        retried: bool,
    },
    Geocoded {
        seq: u64,
        query: String,
        result: exn::Result<Vec<GeocodeResult>, LocatorError>,
    },
}

enum Event {
    Input(Input),
    Completion(Completion),
}

/// Turns user input into locator requests and their results into map
/// updates.
///
/// All state lives on the task running [`Controller::run`]; requests run as
/// separate tasks and report back over a channel, so results are applied one
/// at a time in arrival order. Each suggest and search request carries a
/// sequence number; with [`Options::discard_stale_results`] a response is
/// applied only if no newer request of the same kind was made since.
/// Otherwise every response is applied and the last to arrive wins.
pub struct Controller<S, U> {
    executor: Arc<Executor<'static>>,
    locator: Arc<dyn Locator>,
    surface: S,
    ui: Arc<U>,
    options: Options,
    suggestions: SuggestionAdapter,
    suggest_seq: u64,
    search_seq: u64,
    state: SearchState,
    inputs: async_channel::Receiver<Input>,
    completions_tx: async_channel::Sender<Completion>,
    completions: async_channel::Receiver<Completion>,
}

impl<S: MapSurface, U: Ui> Controller<S, U> {
    #[must_use]
    pub fn new(
        executor: Arc<Executor<'static>>,
        locator: Arc<dyn Locator>,
        surface: S,
        ui: Arc<U>,
        options: Options,
    ) -> (Self, Handle) {
        let (inputs_tx, inputs) = async_channel::unbounded();
        let (completions_tx, completions) = async_channel::unbounded();
        let controller = Self {
            executor,
            locator,
            surface,
            ui,
            options,
            suggestions: SuggestionAdapter::new(),
            suggest_seq: 0,
            search_seq: 0,
            state: SearchState::Idle,
            inputs,
            completions_tx,
            completions,
        };
        (controller, Handle { inputs: inputs_tx })
    }

    /// Process input until every [`Handle`] is dropped, then dispose the map.
    pub async fn run(mut self) {
        loop {
            let event = future::or(
                async { self.inputs.recv().await.ok().map(Event::Input) },
                async { self.completions.recv().await.ok().map(Event::Completion) },
            )
            .await;
            match event {
                Some(Event::Input(input)) => self.handle_input(input),
                Some(Event::Completion(completion)) => self.handle_completion(completion),
                None => break,
            }
        }
        tracing::info!("input closed, disposing map");
        self.surface.dispose();
    }

    fn handle_input(&mut self, input: Input) {
        match input {
            Input::QueryChanged(text) => self.request_suggestions(text),
            Input::SuggestionChosen(id) => self.choose_suggestion(id),
            Input::QuerySubmitted(query) => self.submit(query),
            Input::Pause => self.surface.pause(),
            Input::Resume => self.surface.resume(),
        }
    }

    fn request_suggestions(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        self.suggest_seq += 1;
        let seq = self.suggest_seq;
        tracing::debug!(seq, %text, "requesting suggestions");
        let locator = Arc::clone(&self.locator);
        self.spawn(async move {
            let result = locator.suggest(text.clone()).await;
            Completion::Suggested { seq, text, result }
        });
    }

    fn choose_suggestion(&mut self, id: usize) {
        let Some(suggestion) = self.suggestions.get(id) else {
            tracing::debug!(id, "no such suggestion");
            return;
        };
        let label = suggestion.label.clone();
        self.ui.set_query(&label);
        self.submit(label);
    }

    fn submit(&mut self, query: String) {
        if query.trim().is_empty() {
            tracing::debug!("ignoring empty search");
            return;
        }
        self.search_seq += 1;
        let seq = self.search_seq;
        tracing::info!(seq, %query, "searching");
        self.transition(SearchState::LoadingLocator);
        let locator = Arc::clone(&self.locator);
        self.spawn(async move {
            let status = locator.load().await;
            Completion::Loaded {
                seq,
                query,
                status,
                retried: false,
            }
        });
    }

    fn geocode(&mut self, seq: u64, query: String) {
        self.transition(SearchState::Geocoding);
        let locator = Arc::clone(&self.locator);
        let params = self.options.params.clone();
        self.spawn(async move {
            let result = locator.geocode(query.clone(), &params).await;
            Completion::Geocoded { seq, query, result }
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Suggested { seq, text, result } => {
                if !self.is_current(seq, self.suggest_seq) {
                    tracing::debug!(seq, %text, "discarding stale suggestions");
                    return;
                }
                match result {
                    Ok(results) => {
                        let batch = self.suggestions.bind(results);
                        tracing::debug!(seq, count = batch.len(), "showing suggestions");
                        self.ui.show_suggestions(batch);
                    }
                    Err(error) => tracing::warn!(%text, ?error, "suggest failed"),
                }
            }
            Completion::Loaded {
                seq,
                query,
                status,
                retried,
            } => {
                if !self.is_current(seq, self.search_seq) {
                    tracing::debug!(seq, %query, "discarding stale search");
                    return;
                }
                if status.is_loaded() {
                    self.geocode(seq, query);
                } else if retried {
                    tracing::warn!(?status, %query, "locator failed to load");
                    self.finish(Outcome::Failed { query });
                } else {
                    tracing::info!(?status, "locator not loaded, retrying");
                    let locator = Arc::clone(&self.locator);
                    self.spawn(async move {
                        let status = locator.retry_load().await;
                        Completion::Loaded {
                            seq,
                            query,
                            status,
                            retried: true,
                        }
                    });
                }
            }
            Completion::Geocoded { seq, query, result } => {
                if !self.is_current(seq, self.search_seq) {
                    tracing::debug!(seq, %query, "discarding stale geocode result");
                    return;
                }
                match result.map(|results| results.into_iter().next()) {
                    Ok(Some(result)) => {
                        let place_name = result.place_name().map(str::to_owned);
                        let location = result.display_location;
                        tracing::info!(%query, %location, score = result.score, "found");
                        self.surface
                            .show_result(location, result.extent, result.attributes);
                        self.finish(Outcome::Displayed {
                            query,
                            location,
                            place_name,
                        });
                    }
                    Ok(None) => self.finish(Outcome::NotFound { query }),
                    Err(error) => {
                        tracing::warn!(%query, ?error, "geocode failed");
                        self.finish(Outcome::Failed { query });
                    }
                }
            }
        }
    }

    const fn is_current(&self, seq: u64, latest: u64) -> bool {
        !self.options.discard_stale_results || seq == latest
    }

    fn finish(&mut self, outcome: Outcome) {
        self.transition(match outcome {
            Outcome::Displayed { .. } => SearchState::Displayed,
            Outcome::NotFound { .. } => SearchState::NotFound,
            Outcome::Failed { .. } => SearchState::Failed,
        });
        tracing::debug!(query = outcome.query(), state = ?self.state, "search finished");
        self.ui.report(&outcome);
    }

    fn transition(&mut self, state: SearchState) {
        tracing::trace!(from = ?self.state, to = ?state, "search state");
        self.state = state;
    }

    fn spawn(&self, request: impl Future<Output = Completion> + Send + 'static) {
        let completions = self.completions_tx.clone();
        self.executor
            .spawn(async move {
                let _ = completions.send(request.await).await;
            })
            .detach();
    }
}
