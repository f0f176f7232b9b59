use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::domain::contact::ContactRequest;
use crate::domain::intent::Intent;
use crate::domain::session::Session;
use crate::handlers::{
    ContactSink, HandlerReply, HandoffUpdate, IntentHandler, TurnContext,
};
use crate::handoff::{ContactDetails, HandoffProgress, HandoffSlot, SlotOutcome};

const SAVE_FAILED: &str = "I'm sorry, there was an issue saving your request. \
     Please try asking again in a moment.";

const CANCELLED: &str = "No problem, I've cancelled the request. \
     Is there anything else I can help you with?";

/// Walks a customer through the handoff flow and files the completed
/// contact request.
pub struct HumanRepHandler<C> {
    sink: C,
}

impl<C> HumanRepHandler<C> {
    pub fn new(sink: C) -> Self {
        Self { sink }
    }
}

impl<C> HumanRepHandler<C>
where
    C: ContactSink,
{
    async fn file_request(
        &self,
        details: ContactDetails,
        message: &str,
        context: &TurnContext,
    ) -> HandlerReply {
        let request = ContactRequest {
            full_name: details.full_name.clone(),
            email: details.email.clone(),
            phone: details.phone.clone(),
            notes: Some(format!(
                "User requested human assistance via chatbot. Last message: {message}"
            )),
            requested_at: Utc::now(),
        };

        match self.sink.record_contact(request).await {
            Ok(()) => {
                let first = details.full_name.split_whitespace().next().unwrap_or("there");
                let contact_line = match &details.phone {
                    Some(phone) => format!(
                        "Name: {}, Email: {}, Phone: {phone}",
                        details.full_name, details.email
                    ),
                    None => format!("Name: {}, Email: {}", details.full_name, details.email),
                };
                let text = format!(
                    "Thank you, {first}! I've created a request with your details \
                     ({contact_line}). A member of our team will reach out to you shortly."
                );
                HandlerReply::with_handoff(text, HandoffUpdate::Clear)
            }
            Err(error) => {
                warn!(
                    event_name = "conversation.handoff.save_failed",
                    correlation_id = %context.correlation_id,
                    error = %error,
                    "contact request could not be saved",
                );
                // Keep the collected name and email so the customer only has
                // to resend the phone number.
                HandlerReply::with_handoff(
                    SAVE_FAILED,
                    HandoffUpdate::Store(HandoffProgress::AwaitingPhone {
                        full_name: details.full_name,
                        email: details.email,
                    }),
                )
            }
        }
    }
}

#[async_trait]
impl<C> IntentHandler for HumanRepHandler<C>
where
    C: ContactSink,
{
    fn intent(&self) -> Intent {
        Intent::HumanHandoff
    }

    async fn handle(
        &self,
        message: &str,
        session: &Session,
        context: &TurnContext,
    ) -> HandlerReply {
        let Some(progress) = session.handoff.clone() else {
            let text = format!(
                "Okay, I can help connect you with a human representative. {}",
                HandoffSlot::FullName.prompt()
            );
            return HandlerReply::with_handoff(
                text,
                HandoffUpdate::Store(HandoffProgress::start()),
            );
        };

        match progress.advance(message) {
            SlotOutcome::Rejected(progress) => {
                HandlerReply::text_only(progress.awaiting().reprompt())
            }
            SlotOutcome::Advanced(progress) => {
                let text = match progress.awaiting() {
                    HandoffSlot::Email => {
                        let first = progress.first_name().unwrap_or("there");
                        format!("Thanks, {first}! {}", HandoffSlot::Email.prompt())
                    }
                    _ => format!("Got it. {}", HandoffSlot::Phone.prompt()),
                };
                HandlerReply::with_handoff(text, HandoffUpdate::Store(progress))
            }
            SlotOutcome::Cancelled => HandlerReply::with_handoff(CANCELLED, HandoffUpdate::Clear),
            SlotOutcome::Completed(details) => self.file_request(details, message, context).await,
        }
    }
}
