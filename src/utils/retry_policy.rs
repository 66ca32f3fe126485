// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// 错误可重试性
///
/// 默认所有错误都可重试；只有在启用错误分类时才会读取该判断
pub trait Retryable {
    /// 判断错误是否值得再次尝试
    fn is_retryable(&self) -> bool {
        true
    }
}

/// 重试耗尽错误
///
/// 携带最后一次失败的错误以及已经进行的尝试次数
#[derive(Error, Debug)]
#[error("操作在 {attempts} 次尝试后失败: {source}")]
pub struct RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// 实际尝试次数
    pub attempts: u32,
    /// 最后一次失败的错误
    #[source]
    pub source: E,
}

/// 重试策略配置
///
/// 所有远程调用共用同一种算法，调用方只提供不同的次数和基础延迟
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含第一次调用）
    pub max_attempts: u32,
    /// 基础退避时间
    pub base_delay: Duration,
    /// 最大退避时间
    pub max_delay: Duration,
    /// 是否根据错误类型跳过不可重试的错误
    pub classify_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300), // 5分钟
            classify_errors: false,
        }
    }
}

impl RetryPolicy {
    /// 创建指定次数和基础延迟的重试策略
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// 设置是否启用错误分类
    pub fn with_classification(mut self, classify_errors: bool) -> Self {
        self.classify_errors = classify_errors;
        self
    }

    /// 计算第 `attempt` 次失败之后的退避时间
    ///
    /// `base_delay * 2^(attempt-1)`，并限制在 `max_delay` 以内
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let factor = 2u32.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// 执行操作，失败时按指数退避重试
    ///
    /// # 返回值
    ///
    /// * `Ok(T)` - 某次尝试成功的结果
    /// * `Err(RetryError<E>)` - 最后一次错误及尝试次数
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Retryable + 'static,
    {
        self.run_counted(op).await.0
    }

    /// 与 [`RetryPolicy::run`] 相同，额外返回实际尝试次数
    pub async fn run_counted<T, E, F, Fut>(&self, mut op: F) -> (Result<T, RetryError<E>>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Retryable + 'static,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return (Ok(value), attempt),
                Err(error) => {
                    let give_up = attempt >= max_attempts
                        || (self.classify_errors && !error.is_retryable());
                    if give_up {
                        return (
                            Err(RetryError {
                                attempts: attempt,
                                source: error,
                            }),
                            attempt,
                        );
                    }

                    let delay = self.calculate_backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
