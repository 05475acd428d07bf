use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("JavaScript error: {0}")]
    JsError(String),

    /// 送信キュー(IndexedDB)の open/append/read/clear 失敗
    #[error("Store error: {0}")]
    StoreError(String),

    /// install時のリソース取得・保存失敗
    #[error("Cache install error: {0}")]
    CacheInstallError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    /// Service Worker / Background Sync 登録失敗
    #[error("Registration error: {0}")]
    RegistrationError(String),

    /// Worker側のドレイン処理失敗
    #[error("Sync drain error: {0}")]
    SyncDrainError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("{0}")]
    Other(String),
}

impl From<JsValue> for CoreError {
    fn from(value: JsValue) -> Self {
        if let Some(s) = value.as_string() {
            CoreError::JsError(s)
        } else {
            CoreError::JsError(format!("{:?}", value))
        }
    }
}

impl From<CoreError> for JsValue {
    fn from(error: CoreError) -> Self {
        JsValue::from_str(&error.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(error: serde_json::Error) -> Self {
        CoreError::ParseError(error.to_string())
    }
}

impl From<rexie::Error> for CoreError {
    fn from(error: rexie::Error) -> Self {
        CoreError::StoreError(error.to_string())
    }
}

impl From<serde_wasm_bindgen::Error> for CoreError {
    fn from(error: serde_wasm_bindgen::Error) -> Self {
        CoreError::ParseError(error.to_string())
    }
}

impl From<url::ParseError> for CoreError {
    fn from(error: url::ParseError) -> Self {
        CoreError::ParseError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
