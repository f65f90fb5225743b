pub mod plain;
pub mod terminal;

use std::pin::Pin;

use futures_lite::Stream;
use pinpoint_map::MapEvent;

use crate::controller::{Input, Outcome};
use crate::suggestions::Suggestion;

/// The user-facing side of a search: where input comes from and where
/// suggestions, outcomes and map changes are shown.
pub trait Ui: Send + Sync + 'static {
    /// Stream of user input. Ends when the user quits.
    fn inputs(&self) -> Pin<Box<dyn Stream<Item = Input> + Send + '_>>;

    /// Replace the displayed suggestions.
    fn show_suggestions(&self, suggestions: &[Suggestion]);

    /// Put `text` in the search field, as when a suggestion is picked.
    fn set_query(&self, text: &str);

    /// Show how a search ended.
    fn report(&self, outcome: &Outcome);

    /// Render a change to the map.
    fn display(&self, event: &MapEvent);
}

#[must_use]
pub fn terminal(hint: &str) -> terminal::Ui {
    terminal::Ui::new(hint)
}

#[must_use]
pub const fn plain() -> plain::Ui {
    plain::Ui
}

/// A line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Input(Input),
    Quit,
}

/// Interpret one line of input.
///
/// `?text` asks for suggestions, `#n` picks suggestion `n`, `:pause`,
/// `:resume` and `:quit` control the session, and anything else is searched
/// for. Blank lines are ignored.
#[must_use]
pub fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let command = match line {
        ":quit" | ":q" => Command::Quit,
        ":pause" => Command::Input(Input::Pause),
        ":resume" => Command::Input(Input::Resume),
        _ => {
            if let Some(text) = line.strip_prefix('?') {
                Command::Input(Input::QueryChanged(text.trim_start().to_owned()))
            } else if let Some(id) = line.strip_prefix('#').and_then(|n| n.parse().ok()) {
                Command::Input(Input::SuggestionChosen(id))
            } else {
                Command::Input(Input::QuerySubmitted(line.to_owned()))
            }
        }
    };
    Some(command)
}

/// Commands read from stdin, up to `:quit` or end of input.
fn stdin_inputs() -> Pin<Box<dyn Stream<Item = Input> + Send>> {
    use futures_lite::io::AsyncBufReadExt;
    use futures_lite::StreamExt;

    let stdin = blocking::Unblock::new(std::io::stdin());
    let reader = futures_lite::io::BufReader::new(stdin);
    Box::pin(
        reader
            .lines()
            .filter_map(|line| line.ok().and_then(|line| parse_line(&line)))
            .take_while(|command| *command != Command::Quit)
            .filter_map(|command| match command {
                Command::Input(input) => Some(input),
                Command::Quit => None,
            }),
    )
}
