use async_trait::async_trait;
use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{NotificationOptions, RegistrationOptions, ServiceWorkerGlobalScope, ServiceWorkerRegistration};

use crate::sync::{Notifier, SyncPlatform};
use crate::types::Notification;
use crate::error::{CoreError, Result};

/// ページ側のプラットフォーム（`navigator.serviceWorker` / `SyncManager`）
pub struct BrowserSyncPlatform {
    window: web_sys::Window,
}

impl BrowserSyncPlatform {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| CoreError::Other("No window object".to_string()))?;
        Ok(Self { window })
    }

    fn has_property(target: &JsValue, name: &str) -> bool {
        Reflect::has(target, &JsValue::from_str(name)).unwrap_or(false)
    }
}

#[async_trait(?Send)]
impl SyncPlatform for BrowserSyncPlatform {
    fn has_service_worker(&self) -> bool {
        Self::has_property(&self.window.navigator(), "serviceWorker")
    }

    fn has_background_sync(&self) -> bool {
        Self::has_property(&self.window, "SyncManager")
    }

    async fn register_worker(&self, script_url: &str, scope: &str) -> Result<String> {
        let options = RegistrationOptions::new();
        options.set_scope(scope);

        let container = self.window.navigator().service_worker();
        let registration = JsFuture::from(container.register_with_options(script_url, &options)).await?;
        let registration: ServiceWorkerRegistration = registration.dyn_into()?;

        Ok(registration.scope())
    }

    async fn register_sync(&self, tag: &str) -> Result<()> {
        let container = self.window.navigator().service_worker();
        let registration = JsFuture::from(container.ready()?).await?;

        // registration.sync はweb-sysに定義がないためReflect経由
        let sync = Reflect::get(&registration, &JsValue::from_str("sync"))?;
        if sync.is_undefined() {
            return Err(CoreError::RegistrationError(
                "registration.sync is undefined".to_string(),
            ));
        }
        let register = Reflect::get(&sync, &JsValue::from_str("register"))?;
        let register = register.unchecked_ref::<Function>();

        let promise = register.call1(&sync, &JsValue::from_str(tag))?;
        JsFuture::from(Promise::from(promise)).await?;

        Ok(())
    }
}

/// Worker側の通知（`registration.showNotification`）
pub struct WorkerNotifier {
    registration: ServiceWorkerRegistration,
}

impl WorkerNotifier {
    pub fn from_worker_scope() -> Result<Self> {
        let scope = js_sys::global()
            .dyn_into::<ServiceWorkerGlobalScope>()
            .map_err(|_| CoreError::Other("Not running in a service worker".to_string()))?;
        Ok(Self {
            registration: scope.registration(),
        })
    }
}

#[async_trait(?Send)]
impl Notifier for WorkerNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
        let options = NotificationOptions::new();
        options.set_body(&notification.body);
        options.set_icon(&notification.icon);

        let promise = self
            .registration
            .show_notification_with_options(&notification.title, &options)?;
        JsFuture::from(promise).await?;

        Ok(())
    }
}
