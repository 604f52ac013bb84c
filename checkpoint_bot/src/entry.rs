use std::sync::Arc;
use teloxide::{dptree::deps, prelude::*};

use arch_bot_commons::read_bot_key;

use crate::{
    actions::{sweep_expired_spinloop, Channel},
    config::Config,
    geocoding::YandexGeocoder,
    handlers::{generate_bot_commands, handle_callback_query, handle_message},
    reports::{ReportStore, Tracker},
    AddressGeocoder,
};

/// # Panics
///
/// Panics if there's no key file or the configuration is broken.
pub async fn entry() {
    let config = Config::from_env().expect("Bad configuration!");

    let key = read_bot_key().expect("Could not load bot key file!");
    let bot = Bot::new(key);

    if let Err(e) = bot.set_my_commands(generate_bot_commands()).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let store = ReportStore::load(&config.data_file);
    log::info!(
        "Loaded {} reports from {}",
        store.len(),
        store.path().display()
    );

    let tracker = Arc::new(Tracker::new(
        store,
        config.gone_threshold,
        config.lifetime_minutes,
    ));

    let geocoder: Arc<AddressGeocoder> = Arc::new(match &config.yandex_api_key {
        Some(key) => match YandexGeocoder::new(key.clone()) {
            Ok(geocoder) => Some(geocoder),
            Err(e) => {
                log::warn!("Failed to set up the geocoder, addresses stay as text: {}", e);
                None
            }
        },
        None => {
            log::info!("No YANDEX_API_KEY, addresses will not be geocoded.");
            None
        }
    });

    let channel = Arc::new(Channel::new(
        config.publish_destination.clone(),
        config.map_link.clone(),
        tracker.gone_threshold(),
    ));

    tokio::spawn(sweep_expired_spinloop(
        bot.clone(),
        Arc::downgrade(&tracker),
        channel.clone(),
        config.sweep_interval,
    ));

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![tracker, channel, geocoder])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("it appears we have been bonked.");
}
