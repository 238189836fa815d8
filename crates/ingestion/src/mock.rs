//! Mock 注视数据源
//!
//! 用于无眼动仪环境的测试与 `--mock` 运行。

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use contracts::{unix_time_s, ContractError, GazeSample};
use tracing::debug;

/// Mock 注视源配置
#[derive(Debug, Clone)]
pub struct MockGazeConfig {
    /// 名称
    pub name: String,

    /// 采样频率 (Hz)
    pub rate_hz: f64,

    /// 眼动仪时钟相对本地时钟的偏差：tracker = local - skew
    pub clock_skew_ms: f64,

    /// 注视轨迹圆心（像素）
    pub center: (f64, f64),

    /// 注视轨迹半径（像素）
    pub radius: f64,
}

impl Default for MockGazeConfig {
    fn default() -> Self {
        Self {
            name: "mock_gaze".to_string(),
            rate_hz: 200.0,
            clock_skew_ms: 0.0,
            center: (800.0, 600.0),
            radius: 200.0,
        }
    }
}

struct MockState {
    closed: bool,
    script: Option<VecDeque<GazeSample>>,
    next_due: Instant,
    emitted: u64,
}

/// Mock 注视源
///
/// 按频率生成圆周轨迹样本，或依次返回预设样本。预设样本耗尽后阻塞直到 `close`。
pub struct MockGazeSource {
    config: MockGazeConfig,
    offset_ms: f64,
    state: Mutex<MockState>,
    wake: Condvar,
}

impl MockGazeSource {
    /// 按频率生成样本
    pub fn new(config: MockGazeConfig) -> Self {
        let offset_ms = config.clock_skew_ms;
        Self {
            config,
            offset_ms,
            state: Mutex::new(MockState {
                closed: false,
                script: None,
                next_due: Instant::now(),
                emitted: 0,
            }),
            wake: Condvar::new(),
        }
    }

    /// 依次返回预设样本，offset 估计固定为 `offset_ms`
    pub fn scripted(samples: Vec<GazeSample>, offset_ms: f64) -> Self {
        let mut source = Self::new(MockGazeConfig {
            name: "scripted_gaze".to_string(),
            ..Default::default()
        });
        source.offset_ms = offset_ms;
        source.lock().script = Some(samples.into());
        source
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn closed_error(&self) -> ContractError {
        ContractError::gaze_source(&self.config.name, "source closed")
    }

    fn synthesize(&self, index: u64) -> GazeSample {
        let phase = index as f64 / self.config.rate_hz;
        let (cx, cy) = self.config.center;
        GazeSample {
            timestamp_unix_seconds: unix_time_s() - self.config.clock_skew_ms * 0.001,
            x: cx + self.config.radius * phase.cos(),
            y: cy + self.config.radius * phase.sin(),
            worn: true,
        }
    }
}

impl contracts::GazeSource for MockGazeSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn receive_sample(&self) -> Result<GazeSample, ContractError> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(self.closed_error());
            }
            if let Some(script) = state.script.as_mut() {
                if let Some(sample) = script.pop_front() {
                    state.emitted += 1;
                    return Ok(sample);
                }
                state = self.wake.wait(state).unwrap_or_else(|e| e.into_inner());
                continue;
            }

            let now = Instant::now();
            if now >= state.next_due {
                let interval = Duration::from_secs_f64(1.0 / self.config.rate_hz);
                state.next_due = (state.next_due + interval).max(now);
                let index = state.emitted;
                state.emitted += 1;
                return Ok(self.synthesize(index));
            }
            let wait = state.next_due - now;
            state = self
                .wake
                .wait_timeout(state, wait)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    fn estimate_offset_ms(&self) -> Result<f64, ContractError> {
        Ok(self.offset_ms)
    }

    fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            debug!(source = %self.config.name, emitted = state.emitted, "mock gaze source closed");
        }
        drop(state);
        self.wake.notify_all();
    }
}
