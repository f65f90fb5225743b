use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_executor::Executor;
use pinpoint_locator::PLACE_NAME;
use pinpoint_map::callout::Callout;
use pinpoint_map::geometry::{Envelope, Point};
use pinpoint_map::graphics::{Attributes, Graphic};
use pinpoint_map::symbol::{PictureMarkerSymbol, Symbol};
use pinpoint_map::Map;

/// Where search results are drawn.
pub trait MapSurface: Send + Sync + 'static {
    /// Replace whatever is shown with a marker at `point`, move the view to
    /// `extent` and open a callout naming the place.
    fn show_result(&self, point: Point, extent: Envelope, attributes: Attributes);

    fn dismiss_callout(&self);

    fn pause(&self);

    fn resume(&self);

    /// Release the map. Nothing is drawn afterwards.
    fn dispose(&self);
}

/// [`MapSurface`] backed by a [`Map`].
pub struct Surface {
    executor: Arc<Executor<'static>>,
    map: Map,
    pin: Option<Symbol>,
    animation: Duration,
}

impl Surface {
    #[must_use]
    pub const fn new(
        executor: Arc<Executor<'static>>,
        map: Map,
        pin: Option<Symbol>,
        animation: Duration,
    ) -> Self {
        Self {
            executor,
            map,
            pin,
            animation,
        }
    }
}

impl MapSurface for Surface {
    fn show_result(&self, point: Point, extent: Envelope, attributes: Attributes) {
        self.dismiss_callout();
        if let Err(error) = self.map.clear_graphics() {
            tracing::warn!(?error, "failed to clear result marker");
            return;
        }

        let graphic = Graphic::new(point, attributes, self.pin.clone());
        let text = graphic
            .attribute_text(PLACE_NAME)
            .unwrap_or_else(|| point.to_string());
        let anchor = graphic.callout_location();
        if let Err(error) = self.map.add_graphic(graphic) {
            tracing::warn!(?error, "failed to add result marker");
            return;
        }

        let target = self.map.viewpoint_for(&extent);
        match self.map.set_viewpoint_animated(target, self.animation) {
            Ok(id) => {
                let map = self.map.clone();
                self.executor
                    .spawn(async move {
                        if map.settle(id).await {
                            tracing::debug!(id, "viewpoint animation finished");
                        }
                    })
                    .detach();
            }
            Err(error) => tracing::warn!(?error, "failed to move to result"),
        }

        if let Err(error) = self.map.show_callout(Callout::new(text, anchor)) {
            tracing::warn!(?error, "failed to show callout");
        }
    }

    fn dismiss_callout(&self) {
        self.map.dismiss_callout();
    }

    fn pause(&self) {
        self.map.pause();
    }

    fn resume(&self) {
        self.map.resume();
    }

    fn dispose(&self) {
        self.map.dispose();
    }
}

/// The result marker: the image at `path`, or the built-in pin when unset.
///
/// An image that fails to load is logged and results are drawn without a
/// symbol.
#[must_use]
pub fn load_pin(path: Option<&Path>) -> Option<Symbol> {
    let Some(path) = path else {
        return Some(Symbol::pin());
    };
    match PictureMarkerSymbol::load(path) {
        Ok(symbol) => {
            tracing::debug!(path = %path.display(), symbol.width, symbol.height, "loaded pin");
            Some(Symbol::Picture(symbol))
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), ?error, "failed to load pin");
            None
        }
    }
}
