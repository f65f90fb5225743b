use std::pin::Pin;

use futures_lite::Stream;
use pinpoint_map::MapEvent;

use crate::controller::{Input, Outcome};
use crate::suggestions::Suggestion;

/// Console front end using stdin/stdout.
pub struct Ui {
    hint: String,
}

impl Ui {
    #[must_use]
    pub fn new(hint: &str) -> Self {
        Self {
            hint: hint.to_owned(),
        }
    }
}

impl crate::ui::Ui for Ui {
    fn inputs(&self) -> Pin<Box<dyn Stream<Item = Input> + Send + '_>> {
        println!("{}", self.hint);
        println!("  type an address to search, ?text for suggestions, #n to pick one");
        println!("  :pause, :resume, :quit");
        super::stdin_inputs()
    }

    fn show_suggestions(&self, suggestions: &[Suggestion]) {
        if suggestions.is_empty() {
            println!("  (no suggestions)");
        }
        for suggestion in suggestions {
            println!("  #{} {}", suggestion.id, suggestion.label);
        }
    }

    fn set_query(&self, text: &str) {
        println!("> {text}");
    }

    fn report(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Displayed {
                location,
                place_name,
                ..
            } => match place_name {
                Some(name) => println!("found {name} at {location}"),
                None => println!("found {location}"),
            },
            // Dim ANSI styling for errors.
            _ => {
                if let Some(message) = outcome.message() {
                    println!("\x1b[2m{message}\x1b[0m");
                }
            }
        }
    }

    fn display(&self, event: &MapEvent) {
        match event {
            MapEvent::AnimationStarted { target, duration } => println!(
                "[map] moving to {} at 1:{:.0} over {:.1}s",
                target.center,
                target.scale,
                duration.as_secs_f64()
            ),
            MapEvent::GraphicAdded { graphic } => {
                println!("[map] marker at {}", graphic.geometry());
            }
            MapEvent::GraphicsCleared { removed } if *removed > 0 => {
                println!("[map] cleared {removed} marker(s)");
            }
            MapEvent::CalloutShown { callout } => {
                println!("[map] callout \"{}\" at {}", callout.text, callout.anchor);
            }
            MapEvent::Paused => println!("[map] paused"),
            MapEvent::Resumed => println!("[map] resumed"),
            MapEvent::Disposed => println!("[map] closed"),
            _ => {}
        }
    }
}
