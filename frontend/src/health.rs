use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gloo_timers::future::sleep;
use leptos::prelude::*;
use leptos::task::spawn_local;
use thinkchat::health::HEALTH_INTERVAL;

use crate::api;
use crate::state::AppState;

/// Poll `/api/health` for as long as the calling component is mounted.
///
/// The first check runs immediately. Results that land after unmount are discarded.
pub fn start_polling(state: AppState) {
    let subscribed = Arc::new(AtomicBool::new(true));
    on_cleanup({
        let subscribed = subscribed.clone();
        move || subscribed.store(false, Ordering::Release)
    });

    spawn_local(async move {
        while subscribed.load(Ordering::Acquire) {
            let status = api::fetch_health().await;
            if !subscribed.load(Ordering::Acquire) {
                break;
            }
            state.record_health(status);
            sleep(HEALTH_INTERVAL).await;
        }
        log::debug!("Health polling stopped");
    });
}
