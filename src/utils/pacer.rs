// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// 调用节拍器
///
/// 保证同一类调用之间至少间隔固定的时间。
/// 搜索、详情、主人信息三类调用各自持有独立的节拍器，互不影响。
#[derive(Debug)]
pub struct Pacer {
    /// 调用类型名称，仅用于日志
    label: &'static str,
    /// 两次调用之间的最小间隔
    delay: Duration,
    /// 上一次放行的时间
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    /// 创建新的节拍器
    pub fn new(label: &'static str, delay: Duration) -> Self {
        Self {
            label,
            delay,
            last: Mutex::new(None),
        }
    }

    /// 获取配置的间隔
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 等待直到允许下一次调用
    ///
    /// 锁在等待期间保持持有，因此并发调用者会依次排队
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.delay;
            let now = Instant::now();
            if ready_at > now {
                trace!(
                    call_type = self.label,
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Pacing call"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }
}
