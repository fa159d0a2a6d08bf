#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use onrail::cache::{ChildCallback, ChildEventKind, RemoteCache, Subscription, WriteValue};
use onrail::error::{AppError, AppResult};
use onrail::models::VehiclePosition;
use onrail::upstream::UpstreamSource;

pub const START: i64 = 1_700_000_000_000;

pub fn vehicle(short_name: &str) -> VehiclePosition {
    serde_json::from_value(json!({
        "trip": {
            "gtfsId": format!("1:{}", short_name),
            "tripShortName": short_name,
        },
        "vehicleId": format!("veh-{}", short_name),
        "lat": 47.5,
        "lon": 19.04,
    }))
    .expect("valid vehicle json")
}

pub fn names(trains: &[VehiclePosition]) -> Vec<&str> {
    trains.iter().map(|v| v.short_name()).collect()
}

/// 可控的上游，记录调用次数
#[derive(Default)]
pub struct FakeUpstream {
    trains: Mutex<Vec<VehiclePosition>>,
    calls: AtomicUsize,
}

impl FakeUpstream {
    pub fn new(trains: Vec<VehiclePosition>) -> Self {
        Self {
            trains: Mutex::new(trains),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_trains(&self, trains: Vec<VehiclePosition>) {
        *self.trains.lock() = trains;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamSource for FakeUpstream {
    async fn fetch(&self) -> Vec<VehiclePosition> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.trains.lock().clone()
    }
}

/// 永不返回的上游
pub struct HangingUpstream;

#[async_trait]
impl UpstreamSource for HangingUpstream {
    async fn fetch(&self) -> Vec<VehiclePosition> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Vec::new()
    }
}

/// 包装远程缓存：统计调用次数，并可注入读取或删除失败
pub struct FlakyRemote {
    inner: Arc<dyn RemoteCache>,
    calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_removes: Mutex<Vec<String>>,
}

impl FlakyRemote {
    pub fn new(inner: Arc<dyn RemoteCache>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_removes: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// 删除以该后缀结尾的路径时失败
    pub fn fail_remove_of(&self, path_suffix: &str) {
        self.fail_removes.lock().push(path_suffix.to_string());
    }

    fn injected(reason: &str) -> AppError {
        AppError::Io(std::io::Error::other(reason.to_string()))
    }
}

#[async_trait]
impl RemoteCache for FlakyRemote {
    async fn get(&self, path: &str) -> AppResult<Option<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected("injected read failure"));
        }
        self.inner.get(path).await
    }

    async fn set(&self, path: &str, value: WriteValue) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set(path, value).await
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fails = self
            .fail_removes
            .lock()
            .iter()
            .any(|suffix| path.ends_with(suffix.as_str()));
        if fails {
            return Err(Self::injected("injected remove failure"));
        }
        self.inner.remove(path).await
    }

    async fn subscribe(
        &self,
        path: &str,
        kind: ChildEventKind,
        callback: ChildCallback,
    ) -> AppResult<Subscription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribe(path, kind, callback).await
    }
}
