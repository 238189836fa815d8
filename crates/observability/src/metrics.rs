//! 配对输出指标
//!
//! 基于 `PairMeta` 记录 Prometheus 指标，并在内存中聚合运行摘要。

use std::collections::BTreeMap;

use contracts::{MatchOutcome, PairMeta};
use metrics::{counter, gauge};

/// 记录一次送往 dispatcher 的配对结果
pub fn record_pair_metrics(meta: &PairMeta, pair_id: u64) {
    let kind = match meta.outcome {
        Some(outcome) if outcome.is_pair() => "paired",
        _ => "frame_only",
    };
    counter!("gaze_sync_pairs_total", "kind" => kind).increment(1);
    gauge!("gaze_sync_last_pair_id").set(pair_id as f64);
    gauge!("gaze_sync_gaze_dropped_current").set(meta.gaze_dropped_total as f64);
}

/// 记录单个 sink 的分发结果
pub fn record_pair_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "gaze_sync_pairs_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 配对指标聚合器
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    /// 输出总数
    pub total_outputs: u64,

    /// 帧 + 注视配对数
    pub paired: u64,

    /// 仅含帧的输出数
    pub frame_only: u64,

    /// 各结果计数
    pub outcome_counts: BTreeMap<&'static str, u64>,

    /// 最近一次看到的注视丢弃总数
    pub gaze_dropped_total: u64,

    /// 配对时间差统计（毫秒）
    pub delta_stats: RunningStats,

    /// 帧队列积压统计
    pub frame_backlog_stats: RunningStats,

    /// 注视队列积压统计
    pub gaze_backlog_stats: RunningStats,
}

impl SyncMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, meta: &PairMeta) {
        self.total_outputs += 1;
        match meta.outcome {
            Some(outcome) if outcome.is_pair() => self.paired += 1,
            Some(MatchOutcome::ForcedRelease) | Some(MatchOutcome::GazeAhead) => {
                self.frame_only += 1
            }
            _ => {}
        }
        if let Some(outcome) = meta.outcome {
            *self.outcome_counts.entry(outcome.as_str()).or_insert(0) += 1;
        }
        if let Some(delta) = meta.time_delta {
            self.delta_stats.push(delta * 1000.0);
        }
        self.frame_backlog_stats.push(meta.frame_backlog as f64);
        self.gaze_backlog_stats.push(meta.gaze_backlog as f64);
        self.gaze_dropped_total = self.gaze_dropped_total.max(meta.gaze_dropped_total);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_outputs: self.total_outputs,
            paired: self.paired,
            frame_only: self.frame_only,
            pair_rate: if self.total_outputs > 0 {
                self.paired as f64 / self.total_outputs as f64 * 100.0
            } else {
                0.0
            },
            gaze_dropped: self.gaze_dropped_total,
            outcome_counts: self.outcome_counts.clone(),
            delta_ms: StatsSummary::from(&self.delta_stats),
            frame_backlog: StatsSummary::from(&self.frame_backlog_stats),
            gaze_backlog: StatsSummary::from(&self.gaze_backlog_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_outputs: u64,
    pub paired: u64,
    pub frame_only: u64,
    pub pair_rate: f64,
    pub gaze_dropped: u64,
    pub outcome_counts: BTreeMap<&'static str, u64>,
    pub delta_ms: StatsSummary,
    pub frame_backlog: StatsSummary,
    pub gaze_backlog: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sync Metrics Summary ===")?;
        writeln!(f, "Outputs: {}", self.total_outputs)?;
        writeln!(f, "Paired: {} ({:.2}%)", self.paired, self.pair_rate)?;
        writeln!(f, "Frame only: {}", self.frame_only)?;
        writeln!(f, "Gaze dropped by backpressure: {}", self.gaze_dropped)?;
        writeln!(f, "Pair delta (ms): {}", self.delta_ms)?;
        writeln!(f, "Frame backlog: {}", self.frame_backlog)?;
        writeln!(f, "Gaze backlog: {}", self.gaze_backlog)?;

        if !self.outcome_counts.is_empty() {
            writeln!(f, "Outcomes:")?;
            for (outcome, count) in &self.outcome_counts {
                writeln!(f, "  {}: {}", outcome, count)?;
            }
        }
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(outcome: MatchOutcome, delta: Option<f64>) -> PairMeta {
        PairMeta {
            outcome: Some(outcome),
            time_delta: delta,
            frame_backlog: 2,
            gaze_backlog: 10,
            gaze_dropped_total: 0,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = SyncMetricsAggregator::new();
        aggregator.update(&meta(MatchOutcome::Matched, Some(0.002)));
        aggregator.update(&meta(MatchOutcome::Crossed, Some(0.010)));
        aggregator.update(&meta(MatchOutcome::GazeAhead, None));
        aggregator.update(&PairMeta {
            gaze_dropped_total: 7,
            ..meta(MatchOutcome::ForcedRelease, None)
        });

        let summary = aggregator.summary();
        assert_eq!(summary.total_outputs, 4);
        assert_eq!(summary.paired, 2);
        assert_eq!(summary.frame_only, 2);
        assert!((summary.pair_rate - 50.0).abs() < 1e-10);
        assert_eq!(summary.gaze_dropped, 7);
        assert_eq!(summary.outcome_counts.get("crossed"), Some(&1));
        assert_eq!(summary.delta_ms.count, 2);
        assert!((summary.delta_ms.mean - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = SyncMetricsAggregator::new();
        aggregator.update(&meta(MatchOutcome::Matched, Some(0.001)));
        let text = aggregator.summary().to_string();
        assert!(text.contains("Sync Metrics Summary"));
        assert!(text.contains("Paired: 1 (100.00%)"));
        assert!(text.contains("matched: 1"));

        aggregator.reset();
        assert!(aggregator.summary().to_string().contains("Pair delta (ms): N/A"));
    }
}
