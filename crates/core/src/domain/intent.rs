use serde::{Deserialize, Serialize};

/// Conversation intents the routing layer distinguishes between.
///
/// The wire labels double as the vocabulary offered to the language model
/// during classification, so they must stay stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[serde(rename = "check_order_status")]
    OrderStatus,
    #[serde(rename = "ask_return_policy")]
    ReturnPolicy,
    #[serde(rename = "request_human")]
    HumanHandoff,
    GeneralQuery,
    Unknown,
}

impl Intent {
    /// Intents a classifier is allowed to propose, in prompt order.
    pub const CLASSIFIABLE: [Intent; 3] =
        [Intent::OrderStatus, Intent::ReturnPolicy, Intent::HumanHandoff];

    pub fn label(&self) -> &'static str {
        match self {
            Intent::OrderStatus => "check_order_status",
            Intent::ReturnPolicy => "ask_return_policy",
            Intent::HumanHandoff => "request_human",
            Intent::GeneralQuery => "general_query",
            Intent::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Option<Intent> {
        match label {
            "check_order_status" => Some(Intent::OrderStatus),
            "ask_return_policy" => Some(Intent::ReturnPolicy),
            "request_human" => Some(Intent::HumanHandoff),
            "general_query" => Some(Intent::GeneralQuery),
            "unknown" => Some(Intent::Unknown),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Intent;

    #[test]
    fn labels_round_trip_through_from_label() {
        let intents = [
            Intent::OrderStatus,
            Intent::ReturnPolicy,
            Intent::HumanHandoff,
            Intent::GeneralQuery,
            Intent::Unknown,
        ];
        for intent in intents {
            assert_eq!(Intent::from_label(intent.label()), Some(intent));
        }
    }

    #[test]
    fn from_label_rejects_unlisted_values() {
        assert_eq!(Intent::from_label("track_shipment"), None);
        assert_eq!(Intent::from_label(""), None);
    }

    #[test]
    fn serde_uses_wire_labels() {
        let encoded = serde_json::to_string(&Intent::OrderStatus).expect("serialize intent");
        assert_eq!(encoded, "\"check_order_status\"");

        let decoded: Intent =
            serde_json::from_str("\"general_query\"").expect("deserialize intent");
        assert_eq!(decoded, Intent::GeneralQuery);
    }
}
