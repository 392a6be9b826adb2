use arq_lab_abstract::ArqConfig;
use serde::Serialize;

use crate::observer::{RecordedEvent, RecordingObserver};
use crate::receiver::ReceiveSummary;
use crate::sender::SendSummary;

/// Serialisable record of one finished transfer, written with `--trace-out`.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub config: ArqConfig,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<SendSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<ReceiveSummary>,
    pub events: Vec<RecordedEvent>,
}

impl TransferReport {
    pub fn new(config: ArqConfig, recorder: RecordingObserver) -> Self {
        Self {
            config,
            duration_ms: recorder.elapsed_ms(),
            sender: None,
            receiver: None,
            events: recorder.into_events(),
        }
    }

    pub fn with_sender(mut self, summary: SendSummary) -> Self {
        self.sender = Some(summary);
        self
    }

    pub fn with_receiver(mut self, summary: ReceiveSummary) -> Self {
        self.receiver = Some(summary);
        self
    }

    /// Interleave another side's events by timestamp.
    pub fn merge_events(mut self, events: Vec<RecordedEvent>) -> Self {
        self.events.extend(events);
        self.events.sort_by_key(|event| event.at_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_lab_abstract::{TransferEvent, TransferObserver};

    #[test]
    fn report_omits_the_missing_side() {
        let mut recorder = RecordingObserver::new();
        recorder.on_event(&TransferEvent::Close);
        let report = TransferReport::new(ArqConfig::default(), recorder).with_sender(SendSummary {
            chunks: 2,
            attempts: 3,
            ..Default::default()
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sender"]["attempts"], 3);
        assert!(json.get("receiver").is_none());
        assert_eq!(json["config"]["packet_size"], 512);
        assert_eq!(json["events"][0]["type"], "close");
    }

    #[test]
    fn merged_events_stay_ordered() {
        let report = TransferReport::new(ArqConfig::default(), RecordingObserver::new())
            .merge_events(vec![
                RecordedEvent {
                    at_ms: 30,
                    event: TransferEvent::Close,
                },
                RecordedEvent {
                    at_ms: 10,
                    event: TransferEvent::Timeout { seq: 0 },
                },
            ]);
        let times: Vec<u64> = report.events.iter().map(|e| e.at_ms).collect();
        assert_eq!(times, vec![10, 30]);
    }
}
