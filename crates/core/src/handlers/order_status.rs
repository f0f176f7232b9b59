use async_trait::async_trait;
use tracing::warn;

use crate::domain::intent::Intent;
use crate::domain::order::extract_order_id;
use crate::domain::session::Session;
use crate::handlers::{HandlerReply, IntentHandler, OrderDirectory, TurnContext};

const ASK_FOR_ID: &str = "Okay, I can help with that. Please provide the 32-character \
     alphanumeric order ID found in your confirmation email.";

const LOOKUP_FAILED: &str = "Sorry, I encountered an error while checking the order status.";

/// Answers order-status questions by looking the order up in a directory.
pub struct OrderStatusHandler<D> {
    directory: D,
}

impl<D> OrderStatusHandler<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<D> IntentHandler for OrderStatusHandler<D>
where
    D: OrderDirectory,
{
    fn intent(&self) -> Intent {
        Intent::OrderStatus
    }

    async fn handle(
        &self,
        message: &str,
        _session: &Session,
        context: &TurnContext,
    ) -> HandlerReply {
        let Some(order_id) = extract_order_id(message) else {
            return HandlerReply::text_only(ASK_FOR_ID);
        };

        match self.directory.find_order(&order_id).await {
            Ok(Some(record)) => HandlerReply::text_only(record.summary()),
            Ok(None) => HandlerReply::text_only(format!(
                "Sorry, I couldn't find any order with the ID '{order_id}'. \
                 Please double-check the ID."
            )),
            Err(error) => {
                warn!(
                    event_name = "conversation.order_lookup.failed",
                    correlation_id = %context.correlation_id,
                    order_id = %order_id,
                    error = %error,
                    "order directory lookup failed",
                );
                HandlerReply::text_only(LOOKUP_FAILED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use crate::domain::order::{OrderId, OrderRecord};
    use crate::domain::session::{Session, SessionId};
    use crate::handlers::{CollaboratorError, IntentHandler, OrderDirectory, TurnContext};

    use super::{OrderStatusHandler, ASK_FOR_ID, LOOKUP_FAILED};

    const KNOWN_ID: &str = "abc123def456ghi789jkl012mno345p0";

    #[derive(Default)]
    struct FakeDirectory {
        orders: HashMap<String, OrderRecord>,
        fail: bool,
    }

    impl FakeDirectory {
        fn with_order(record: OrderRecord) -> Self {
            let mut orders = HashMap::new();
            orders.insert(record.id.as_str().to_owned(), record);
            Self { orders, fail: false }
        }

        fn failing() -> Self {
            Self { orders: HashMap::new(), fail: true }
        }
    }

    #[async_trait]
    impl OrderDirectory for FakeDirectory {
        async fn find_order(
            &self,
            id: &OrderId,
        ) -> Result<Option<OrderRecord>, CollaboratorError> {
            if self.fail {
                return Err(CollaboratorError("directory offline".to_owned()));
            }
            Ok(self.orders.get(id.as_str()).cloned())
        }
    }

    fn shipped_order() -> OrderRecord {
        OrderRecord {
            id: OrderId::parse(KNOWN_ID).expect("known id"),
            customer_id: None,
            status: "shipped".to_owned(),
            purchased_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).single(),
            approved_at: None,
            shipped_at: Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).single(),
            delivered_at: None,
            estimated_delivery_at: Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).single(),
        }
    }

    fn session() -> Session {
        Session::new(SessionId("s-1".to_owned()))
    }

    #[tokio::test]
    async fn asks_for_id_when_message_has_none() {
        let handler = OrderStatusHandler::new(FakeDirectory::default());
        let reply = handler
            .handle("where is my order?", &session(), &TurnContext::new("req-1"))
            .await;

        assert_eq!(reply.text, ASK_FOR_ID);
    }

    #[tokio::test]
    async fn replies_with_summary_when_order_is_found() {
        let handler = OrderStatusHandler::new(FakeDirectory::with_order(shipped_order()));
        let message = format!("status for {KNOWN_ID} please");
        let reply = handler.handle(&message, &session(), &TurnContext::new("req-2")).await;

        assert!(reply.text.starts_with(&format!("Order ID: {KNOWN_ID}")));
        assert!(reply.text.contains("has been shipped"));
        assert!(reply.text.contains("Estimated Delivery: 2026-03-09"));
    }

    #[tokio::test]
    async fn reports_when_no_order_matches_the_id() {
        let handler = OrderStatusHandler::new(FakeDirectory::default());
        let reply = handler.handle(KNOWN_ID, &session(), &TurnContext::new("req-3")).await;

        assert_eq!(
            reply.text,
            format!(
                "Sorry, I couldn't find any order with the ID '{KNOWN_ID}'. \
                 Please double-check the ID."
            )
        );
    }

    #[tokio::test]
    async fn degrades_politely_when_directory_fails() {
        let handler = OrderStatusHandler::new(FakeDirectory::failing());
        let reply = handler.handle(KNOWN_ID, &session(), &TurnContext::new("req-4")).await;

        assert_eq!(reply.text, LOOKUP_FAILED);
    }
}
