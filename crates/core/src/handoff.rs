use serde::{Deserialize, Serialize};

/// Keyword a customer can send at any point to abandon the handoff flow.
pub const CANCEL_KEYWORD: &str = "cancel";

/// Keyword that completes the flow without leaving a phone number.
pub const SKIP_KEYWORD: &str = "skip";

/// The pieces of contact information collected before a human follow-up
/// request can be filed, in the order they are asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandoffSlot {
    FullName,
    Email,
    Phone,
}

impl HandoffSlot {
    pub fn prompt(&self) -> &'static str {
        match self {
            HandoffSlot::FullName => "First, could you please provide your full name?",
            HandoffSlot::Email => "Now, could you please provide your email address?",
            HandoffSlot::Phone => {
                "Lastly, could you provide a phone number? \
                 You can also say 'skip' if you prefer not to."
            }
        }
    }

    pub fn reprompt(&self) -> &'static str {
        match self {
            HandoffSlot::FullName => "Please provide your full name so I can create the request.",
            HandoffSlot::Email => {
                "That doesn't look like a valid email address. Could you please provide your email?"
            }
            HandoffSlot::Phone => {
                "Please provide a phone number where our team can reach you."
            }
        }
    }
}

/// Contact details captured by a completed handoff flow. The phone number
/// is optional; the customer may skip it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Where a handoff conversation currently stands. Each state carries the
/// values already collected, so a session can resume mid-flow after a
/// round trip through storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffProgress {
    AwaitingName,
    AwaitingEmail { full_name: String },
    AwaitingPhone { full_name: String, email: String },
}

/// Result of feeding one customer message into the handoff flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotOutcome {
    /// A value was captured and the flow moved on to the next slot.
    Advanced(HandoffProgress),
    /// The input did not satisfy the awaited slot; the flow did not move.
    Rejected(HandoffProgress),
    /// The customer abandoned the flow.
    Cancelled,
    /// The final slot was filled and the full contact record is ready.
    Completed(ContactDetails),
}

impl HandoffProgress {
    pub fn start() -> Self {
        HandoffProgress::AwaitingName
    }

    pub fn awaiting(&self) -> HandoffSlot {
        match self {
            HandoffProgress::AwaitingName => HandoffSlot::FullName,
            HandoffProgress::AwaitingEmail { .. } => HandoffSlot::Email,
            HandoffProgress::AwaitingPhone { .. } => HandoffSlot::Phone,
        }
    }

    pub fn first_name(&self) -> Option<&str> {
        match self {
            HandoffProgress::AwaitingName => None,
            HandoffProgress::AwaitingEmail { full_name }
            | HandoffProgress::AwaitingPhone { full_name, .. } => {
                full_name.split_whitespace().next()
            }
        }
    }

    /// Applies one message to the flow. Captured values are stored trimmed
    /// but otherwise verbatim. The phone step never re-prompts: `skip` or
    /// input without a single digit completes the flow with no phone.
    pub fn advance(self, input: &str) -> SlotOutcome {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case(CANCEL_KEYWORD) {
            return SlotOutcome::Cancelled;
        }

        match self {
            HandoffProgress::AwaitingName => {
                if trimmed.is_empty() {
                    SlotOutcome::Rejected(HandoffProgress::AwaitingName)
                } else {
                    SlotOutcome::Advanced(HandoffProgress::AwaitingEmail {
                        full_name: trimmed.to_owned(),
                    })
                }
            }
            HandoffProgress::AwaitingEmail { full_name } => {
                if trimmed.is_empty() || !trimmed.contains('@') {
                    SlotOutcome::Rejected(HandoffProgress::AwaitingEmail { full_name })
                } else {
                    SlotOutcome::Advanced(HandoffProgress::AwaitingPhone {
                        full_name,
                        email: trimmed.to_owned(),
                    })
                }
            }
            HandoffProgress::AwaitingPhone { full_name, email } => {
                let skipped = trimmed.eq_ignore_ascii_case(SKIP_KEYWORD)
                    || !trimmed.bytes().any(|byte| byte.is_ascii_digit());
                let phone = if skipped { None } else { Some(trimmed.to_owned()) };
                SlotOutcome::Completed(ContactDetails { full_name, email, phone })
            }
        }
    }
}
