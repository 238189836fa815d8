//! LogSink - logs a one-line summary per pair via tracing

use std::collections::HashMap;

use contracts::{ContractError, DataSink, SyncedPair};
use tracing::{info, instrument};

/// Sink that logs pair summaries for debugging
pub struct LogSink {
    name: String,
    /// Log every n-th pair
    every: u64,
    seen: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            every: 1,
            seen: 0,
        }
    }

    /// Reads the optional `every` param; unparsable values fall back to 1
    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> Self {
        let every = params
            .get("every")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        Self {
            every,
            ..Self::new(name)
        }
    }

    fn log_pair_summary(&self, pair: &SyncedPair) {
        info!(
            sink = %self.name,
            pair_id = pair.pair_id,
            outcome = pair.meta.outcome.map(|o| o.as_str()).unwrap_or("none"),
            frame_ts = pair.frame.as_ref().map(|f| f.timestamp),
            gaze_ts = pair.gaze.as_ref().map(|g| g.timestamp),
            delta_ms = pair.meta.time_delta.map(|d| d * 1000.0),
            gaze_x = pair.gaze.as_ref().map(|g| g.payload.x),
            gaze_y = pair.gaze.as_ref().map(|g| g.payload.y),
            frame_backlog = pair.meta.frame_backlog,
            gaze_backlog = pair.meta.gaze_backlog,
            "SyncedPair received"
        );
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, pair),
        fields(sink = %self.name, pair_id = pair.pair_id)
    )]
    async fn write(&mut self, pair: &SyncedPair) -> Result<(), ContractError> {
        if self.seen % self.every == 0 {
            self.log_pair_summary(pair);
        }
        self.seen += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, pairs = self.seen, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PairMeta;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let pair = SyncedPair {
            pair_id: 1,
            frame: None,
            gaze: None,
            meta: PairMeta::default(),
        };

        assert!(sink.write(&pair).await.is_ok());
        assert_eq!(sink.seen, 1);
    }

    #[test]
    fn test_every_param() {
        let params = HashMap::from([("every".to_string(), "25".to_string())]);
        assert_eq!(LogSink::from_params("l", &params).every, 25);

        let params = HashMap::from([("every".to_string(), "0".to_string())]);
        assert_eq!(LogSink::from_params("l", &params).every, 1);
        assert_eq!(LogSink::from_params("l", &HashMap::new()).name(), "l");
    }
}
