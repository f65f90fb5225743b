pub mod callout;
pub mod geometry;
pub mod graphics;
pub mod symbol;
pub mod viewpoint;

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use futures_lite::{Stream, StreamExt};
use serde::Serialize;

use callout::Callout;
use geometry::Envelope;
use graphics::{Graphic, GraphicsOverlay};
use viewpoint::{Animation, ScreenSize, Viewpoint};

/// How often [`Map::settle`] samples a running animation.
const FRAME: Duration = Duration::from_millis(50);

/// Errors returned by [`Map`] operations.
#[derive(Debug)]
pub enum Error {
    /// The map was disposed and no longer accepts changes.
    Disposed,
    /// A symbol image could not be read or decoded.
    Asset(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed => f.write_str("map has been disposed"),
            Self::Asset(msg) => write!(f, "asset error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Base layer drawn under the graphics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Basemap {
    StreetsVector,
}

impl Basemap {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StreetsVector => "World Street Map (vector)",
        }
    }
}

/// Change notifications published by a [`Map`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MapEvent {
    /// The viewpoint was set, or an animation reached its target.
    ViewpointChanged { viewpoint: Viewpoint },
    AnimationStarted {
        target: Viewpoint,
        #[serde(with = "duration_secs")]
        duration: Duration,
    },
    GraphicsCleared { removed: usize },
    GraphicAdded { graphic: Graphic },
    CalloutShown { callout: Callout },
    CalloutDismissed,
    Paused,
    Resumed,
    Disposed,
}

mod duration_secs {
    use std::time::Duration;

    pub(super) fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Running,
    Paused(Instant),
    Disposed,
}

struct Inner {
    basemap: Basemap,
    screen: ScreenSize,
    viewpoint: Viewpoint,
    animation: Option<Animation>,
    next_animation_id: u64,
    overlay: GraphicsOverlay,
    callout: Option<Callout>,
    lifecycle: Lifecycle,
    sender: async_broadcast::Sender<MapEvent>,
    /// Keeps the channel open while the map exists so new listeners do not
    /// immediately see the end of the stream.
    _keep_alive: async_broadcast::InactiveReceiver<MapEvent>,
}

impl Inner {
    fn ensure_live(&self) -> exn::Result<(), Error> {
        if self.lifecycle == Lifecycle::Disposed {
            return Err(Error::Disposed.into());
        }
        Ok(())
    }

    fn publish(&self, event: MapEvent) {
        let _ = self.sender.try_broadcast(event);
    }

    /// Fold a finished animation into the resting viewpoint.
    fn advance(&mut self, now: Instant) -> Viewpoint {
        let Some(animation) = &self.animation else {
            return self.viewpoint;
        };
        if animation.is_finished(now) {
            self.viewpoint = animation.to;
            self.animation = None;
            self.publish(MapEvent::ViewpointChanged {
                viewpoint: self.viewpoint,
            });
            self.viewpoint
        } else {
            animation.sample(now)
        }
    }
}

/// Headless map view.
///
/// Tracks what a rendering map view would show: the viewpoint (including
/// timed transitions), one graphics overlay and an optional callout. Every
/// change is published to [`Map::listen`] streams. Clones share the same state.
#[derive(Clone)]
pub struct Map {
    inner: Arc<Mutex<Inner>>,
}

impl Map {
    #[must_use]
    pub fn new(basemap: Basemap, screen: ScreenSize, initial: Viewpoint) -> Self {
        let (mut sender, receiver) = async_broadcast::broadcast(64);
        sender.set_overflow(true);
        let keep_alive = receiver.deactivate();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                basemap,
                screen,
                viewpoint: initial,
                animation: None,
                next_animation_id: 0,
                overlay: GraphicsOverlay::new(),
                callout: None,
                lifecycle: Lifecycle::Running,
                sender,
                _keep_alive: keep_alive,
            })),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn basemap(&self) -> Basemap {
        self.inner.lock().expect("poisoned").basemap
    }

    /// Viewpoint that frames `extent` on this map's screen.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn viewpoint_for(&self, extent: &Envelope) -> Viewpoint {
        let screen = self.inner.lock().expect("poisoned").screen;
        Viewpoint::from_extent(extent, screen)
    }

    /// Current viewpoint, part way through any running animation.
    #[must_use]
    pub fn viewpoint(&self) -> Viewpoint {
        self.viewpoint_at(Instant::now())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn viewpoint_at(&self, now: Instant) -> Viewpoint {
        self.inner.lock().expect("poisoned").advance(now)
    }

    /// Jump to `viewpoint`, cancelling any running animation.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_viewpoint(&self, viewpoint: Viewpoint) -> exn::Result<(), Error> {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.ensure_live()?;
        inner.animation = None;
        inner.next_animation_id += 1;
        inner.viewpoint = viewpoint;
        inner.publish(MapEvent::ViewpointChanged { viewpoint });
        drop(inner);
        tracing::debug!(center = %viewpoint.center, scale = viewpoint.scale, "viewpoint set");
        Ok(())
    }

    /// Start a transition to `viewpoint` lasting `duration`, replacing any
    /// running one. Returns the animation id used by [`Map::settle`].
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_viewpoint_animated(
        &self,
        viewpoint: Viewpoint,
        duration: Duration,
    ) -> exn::Result<u64, Error> {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("poisoned");
        inner.ensure_live()?;
        let from = inner.advance(now);
        inner.viewpoint = from;
        inner.next_animation_id += 1;
        let id = inner.next_animation_id;
        let mut animation = Animation::new(id, from, viewpoint, now, duration);
        if let Lifecycle::Paused(_) = inner.lifecycle {
            animation.pause(now);
        }
        inner.animation = Some(animation);
        inner.publish(MapEvent::AnimationStarted {
            target: viewpoint,
            duration,
        });
        // A zero-length transition lands immediately.
        inner.advance(now);
        drop(inner);
        tracing::debug!(id, center = %viewpoint.center, ?duration, "viewpoint animation started");
        Ok(id)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.advance(Instant::now());
        inner.animation.is_some()
    }

    /// Wait for animation `id` to reach its target.
    ///
    /// Returns `true` if it completed, `false` if it was replaced, cancelled
    /// or the map was disposed first. Time spent paused does not count.
    /// While the map is paused this sleeps until the next map change
    /// instead of sampling.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub async fn settle(&self, id: u64) -> bool {
        loop {
            let paused = {
                let mut inner = self.inner.lock().expect("poisoned");
                if inner.lifecycle == Lifecycle::Disposed {
                    return false;
                }
                match inner.animation.as_ref().map(|a| a.id) {
                    Some(current) if current == id => {
                        if let Lifecycle::Paused(_) = inner.lifecycle {
                            // Subscribed under the lock so a resume cannot slip past.
                            Some(inner.sender.new_receiver())
                        } else {
                            inner.advance(Instant::now());
                            if inner.animation.is_none() {
                                return true;
                            }
                            None
                        }
                    }
                    Some(_) => return false,
                    None => return inner.next_animation_id == id,
                }
            };
            match paused {
                Some(mut changes) => {
                    let _ = changes.next().await;
                }
                None => {
                    async_io::Timer::after(FRAME).await;
                }
            }
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn add_graphic(&self, graphic: Graphic) -> exn::Result<(), Error> {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.ensure_live()?;
        inner.overlay.add(graphic.clone());
        inner.publish(MapEvent::GraphicAdded { graphic });
        Ok(())
    }

    /// Remove every graphic from the overlay.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn clear_graphics(&self) -> exn::Result<usize, Error> {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.ensure_live()?;
        let removed = inner.overlay.clear();
        inner.publish(MapEvent::GraphicsCleared { removed });
        Ok(removed)
    }

    /// Snapshot of the graphics currently drawn.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn graphics(&self) -> Vec<Graphic> {
        self.inner
            .lock()
            .expect("poisoned")
            .overlay
            .graphics()
            .to_vec()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn show_callout(&self, callout: Callout) -> exn::Result<(), Error> {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.ensure_live()?;
        inner.callout = Some(callout.clone());
        inner.publish(MapEvent::CalloutShown { callout });
        Ok(())
    }

    /// Hide the callout. Returns whether one was showing.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn dismiss_callout(&self) -> bool {
        let mut inner = self.inner.lock().expect("poisoned");
        if inner.callout.take().is_some() {
            inner.publish(MapEvent::CalloutDismissed);
            true
        } else {
            false
        }
    }

    /// The visible callout, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn callout(&self) -> Option<Callout> {
        self.inner.lock().expect("poisoned").callout.clone()
    }

    /// Stop advancing animations until [`Map::resume`].
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn pause(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("poisoned");
        if inner.lifecycle != Lifecycle::Running {
            return;
        }
        inner.lifecycle = Lifecycle::Paused(now);
        if let Some(animation) = &mut inner.animation {
            animation.pause(now);
        }
        inner.publish(MapEvent::Paused);
        drop(inner);
        tracing::debug!("map paused");
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn resume(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("poisoned");
        let Lifecycle::Paused(_) = inner.lifecycle else {
            return;
        };
        inner.lifecycle = Lifecycle::Running;
        if let Some(animation) = &mut inner.animation {
            animation.resume(now);
        }
        inner.publish(MapEvent::Resumed);
        drop(inner);
        tracing::debug!("map resumed");
    }

    /// Release the map. Graphics, callout and animation are dropped, later
    /// changes fail with [`Error::Disposed`] and listener streams end.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock().expect("poisoned");
        if inner.lifecycle == Lifecycle::Disposed {
            return;
        }
        inner.lifecycle = Lifecycle::Disposed;
        inner.animation = None;
        inner.callout = None;
        inner.overlay.clear();
        inner.publish(MapEvent::Disposed);
        inner.sender.close();
        drop(inner);
        tracing::info!("map disposed");
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        matches!(
            self.inner.lock().expect("poisoned").lifecycle,
            Lifecycle::Paused(_)
        )
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.lock().expect("poisoned").lifecycle == Lifecycle::Disposed
    }

    /// Stream of changes made after this call. Ends once the map is disposed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn listen(&self) -> impl Stream<Item = MapEvent> + Send + Unpin {
        self.inner.lock().expect("poisoned").sender.new_receiver()
    }
}
