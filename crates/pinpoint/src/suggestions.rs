use pinpoint_locator::SuggestResult;

/// A suggestion as shown to the user. `id` is its position in the batch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Suggestion {
    pub id: usize,
    pub label: String,
}

/// The batch of suggestions currently on display.
///
/// Each bind replaces the previous batch wholesale; ids are only meaningful
/// against the batch they came from.
#[derive(Debug, Default)]
pub struct SuggestionAdapter {
    batch: Vec<Suggestion>,
}

impl SuggestionAdapter {
    #[must_use]
    pub const fn new() -> Self {
        Self { batch: Vec::new() }
    }

    /// Replace the batch with `results`, keeping the service's order.
    pub fn bind(&mut self, results: Vec<SuggestResult>) -> &[Suggestion] {
        self.batch = results
            .into_iter()
            .enumerate()
            .map(|(id, result)| Suggestion {
                id,
                label: result.label,
            })
            .collect();
        &self.batch
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&Suggestion> {
        self.batch.get(id).filter(|s| s.id == id)
    }
}
