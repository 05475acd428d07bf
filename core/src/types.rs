use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// オフライン時に保存された送信リクエスト
///
/// ペイロードのフィールドはトップレベルにフラット化して保存される。
/// `id` はストアが挿入時に採番する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(rename = "savedOfflineAt")]
    pub saved_offline_at: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl QueuedRequest {
    /// ペイロードにタイムスタンプを付与してキュー用レコードを作る
    pub fn capture(payload: Value, at: DateTime<Utc>) -> Result<Self> {
        let mut payload = match payload {
            Value::Object(map) => map,
            other => {
                return Err(CoreError::ParseError(format!(
                    "payload must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        // 採番はストア側
        payload.remove("id");
        payload.remove("savedOfflineAt");

        Ok(Self {
            id: None,
            saved_offline_at: iso_timestamp(at),
            payload,
        })
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// `Date.prototype.toISOString()` と同じ形式
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// キャッシュ照合キー（method + URL）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetRequest {
    pub method: String,
    pub url: String,
}

impl AssetRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
        }
    }

    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
        }
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// キャッシュに保存されるレスポンス（本文とヘッダー）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl AssetResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// レスポンスの出所
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedResponse {
    pub response: AssetResponse,
    pub source: CacheSource,
}

/// Sync Coordinatorの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Registered,
    Draining,
}

/// sync イベント1回分の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// 別タグのイベント
    Ignored,
    Empty,
    Drained { count: usize },
    Failed { reason: String },
}

/// 送信リクエスト保存の結果（呼び出し側にエラーは返さない）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Queued,
    /// 保存はできたがSync登録に失敗
    QueuedWithoutSync,
    /// 保存失敗（データは失われる）
    Dropped,
}

/// ユーザー向け通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
}

impl Notification {
    pub fn sync_complete(count: usize, icon: &str) -> Self {
        let noun = if count == 1 { "request" } else { "requests" };
        Self {
            title: "Sync Complete".to_string(),
            body: format!("{} offline clearance {} synced.", count, noun),
            icon: icon.to_string(),
        }
    }

    pub fn sync_failed(icon: &str) -> Self {
        Self {
            title: "Sync Failed".to_string(),
            body: "Offline clearance requests could not be synced.".to_string(),
            icon: icon.to_string(),
        }
    }
}
