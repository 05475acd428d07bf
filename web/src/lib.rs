mod page;
mod worker;

pub use page::{register_service_worker, OfflineQueue};
pub use worker::WorkerRuntime;

use wasm_bindgen::prelude::*;

/// WASM初期化とパニックフック設定
///
/// ページとService Workerそれぞれのコンテキストで1回ずつ走る。
#[wasm_bindgen(start)]
pub fn start() {
    // パニック時にコンソールにスタックトレースを表示
    console_error_panic_hook::set_once();

    if console_log::init_with_level(log::Level::Debug).is_err() {
        web_sys::console::warn_1(&JsValue::from_str("Logger already initialized"));
    }

    log::info!("Offline support WASM initialized");
}
