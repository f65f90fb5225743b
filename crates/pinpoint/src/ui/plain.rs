use std::pin::Pin;

use futures_lite::Stream;
use pinpoint_map::MapEvent;
use serde_json::json;

use crate::controller::{Input, Outcome};
use crate::suggestions::Suggestion;

/// Front end for pipes: reads commands from stdin and writes one JSON object
/// per line to stdout.
pub struct Ui;

impl crate::ui::Ui for Ui {
    fn inputs(&self) -> Pin<Box<dyn Stream<Item = Input> + Send + '_>> {
        super::stdin_inputs()
    }

    fn show_suggestions(&self, suggestions: &[Suggestion]) {
        emit(&json!({ "type": "suggestions", "suggestions": suggestions }));
    }

    fn set_query(&self, text: &str) {
        emit(&json!({ "type": "query", "text": text }));
    }

    fn report(&self, outcome: &Outcome) {
        emit(&json!({ "type": "outcome", "result": outcome, "message": outcome.message() }));
    }

    fn display(&self, event: &MapEvent) {
        emit(&json!({ "type": "map", "change": event }));
    }
}

fn emit(value: &serde_json::Value) {
    println!("{value}");
}
