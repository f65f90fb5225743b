mod controller;
mod settings;
mod suggestions;
mod surface;
mod ui;

use std::sync::Arc;

use futures_lite::StreamExt;
use is_terminal::IsTerminal;
use macro_rules_attribute::apply;
use smol_macros::main;

use pinpoint_locator::{arcgis, Locator};
use pinpoint_map::viewpoint::ScreenSize;
use pinpoint_map::{Basemap, Map};

use crate::controller::{Controller, Options};
use crate::settings::Settings;
use crate::surface::Surface;
use crate::ui::Ui;

#[apply(main!)]
async fn main(executor: Arc<async_executor::Executor<'static>>) {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,isahc=error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = match Settings::default_path() {
        Some(path) => Settings::load(&path).expect("failed to load settings"),
        None => Settings::default(),
    };

    let locator = arcgis::Backend::new(&settings.locator_url, settings.request_timeout())
        .expect("failed to create locator");
    let map = Map::new(
        Basemap::StreetsVector,
        ScreenSize::default(),
        settings.initial_viewpoint(),
    );
    tracing::info!(locator = locator.url(), basemap = map.basemap().name(), "started");

    let pin = surface::load_pin(settings.pin_path.as_deref());
    let surface = Surface::new(
        executor.clone(),
        map.clone(),
        pin,
        settings.animation_duration(),
    );
    let options = Options {
        params: settings.geocode_parameters(),
        discard_stale_results: settings.discard_stale_results,
    };
    let locator: Arc<dyn Locator> = Arc::new(locator);

    if std::io::stdout().is_terminal() {
        let ui = ui::terminal(&settings.search_hint);
        run(&executor, locator, &map, surface, options, ui).await;
    } else {
        run(&executor, locator, &map, surface, options, ui::plain()).await;
    }
}

/// Drive a search session until the user quits.
async fn run<U: Ui>(
    executor: &Arc<async_executor::Executor<'static>>,
    locator: Arc<dyn Locator>,
    map: &Map,
    surface: Surface,
    options: Options,
    ui: U,
) {
    let ui = Arc::new(ui);
    let (controller, handle) =
        Controller::new(executor.clone(), locator, surface, ui.clone(), options);

    futures_lite::future::zip(
        controller.run(),
        futures_lite::future::zip(
            {
                let ui = ui.clone();
                async move {
                    let mut inputs = ui.inputs();
                    while let Some(input) = inputs.next().await {
                        if !handle.send(input).await {
                            break;
                        }
                    }
                    tracing::debug!("input ended");
                }
            },
            async {
                let mut events = map.listen();
                while let Some(event) = events.next().await {
                    ui.display(&event);
                }
            },
        ),
    )
    .await;
}
