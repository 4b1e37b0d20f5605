use framecast_core::EnrichedResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Signaling payloads are opaque; the server only relays them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    PhoneOffer { data: Value },
    PcAnswer { data: Value },
    PhoneIceCandidate { data: Value },
    PcIceCandidate { data: Value },
    FrameData {
        frame_id: Option<String>,
        capture_ts: Option<i64>,
        image_data: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Detections {
        #[serde(flatten)]
        result: EnrichedResult,
    },
}

impl ServerMessage {
    pub fn detections(result: EnrichedResult) -> Self {
        Self::Detections { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecast_core::{Detection, DetectionResult};

    #[test]
    fn parses_frame_data_with_missing_fields() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"frame-data","image_data":"data:image/jpeg;base64,xx"}"#)
                .unwrap();
        let ClientMessage::FrameData {
            frame_id,
            capture_ts,
            image_data,
        } = msg
        else {
            panic!("expected frame-data");
        };
        assert!(frame_id.is_none());
        assert!(capture_ts.is_none());
        assert_eq!(image_data.unwrap(), "data:image/jpeg;base64,xx");
    }

    #[test]
    fn parses_signaling_messages() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"phone-offer","data":{"sdp":"v=0"}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::PhoneOffer { .. }));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"pc-ice-candidate","data":{"candidate":"c"}}"#)
                .unwrap();
        assert!(matches!(msg, ClientMessage::PcIceCandidate { .. }));
    }

    #[test]
    fn detections_message_is_tagged_and_flat() {
        let result = EnrichedResult {
            result: DetectionResult {
                frame_id: "f1".into(),
                capture_ts: 100,
                recv_ts: 110,
                inference_ts: 120,
                detections: vec![Detection {
                    label: "person".into(),
                    score: 0.9,
                    xmin: 0.1,
                    ymin: 0.2,
                    xmax: 0.3,
                    ymax: 0.4,
                }],
            },
            processing_start_ts: 110,
            processing_end_ts: 130,
            queue_wait_ms: 5,
            server_latency_ms: 20,
            network_latency_ms: 10,
            total_latency_ms: 30,
        };

        let value = serde_json::to_value(ServerMessage::detections(result)).unwrap();
        assert_eq!(value["type"], "detections");
        assert_eq!(value["frame_id"], "f1");
        assert_eq!(value["total_latency_ms"], 30);
        assert_eq!(value["detections"][0]["label"], "person");
    }
}
