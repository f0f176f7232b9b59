//! In-memory collaborator implementations.
//!
//! Handles are cheap clones over shared state, so a demo or test can
//! keep one handle for assertions while the conversation layer owns
//! another.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use desky_core::domain::contact::ContactRequest;
use desky_core::domain::order::{OrderId, OrderRecord};
use desky_core::handlers::{CollaboratorError, ContactSink, OrderDirectory};

#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<String, OrderRecord>>>,
}

impl InMemoryOrderRepository {
    pub async fn insert(&self, order: OrderRecord) {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.as_str().to_owned(), order);
    }
}

#[async_trait::async_trait]
impl OrderDirectory for InMemoryOrderRepository {
    async fn find_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, CollaboratorError> {
        let orders = self.orders.read().await;
        Ok(orders.get(id.as_str()).cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryContactRepository {
    contacts: Arc<RwLock<Vec<ContactRequest>>>,
}

impl InMemoryContactRepository {
    pub async fn recorded(&self) -> Vec<ContactRequest> {
        self.contacts.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ContactSink for InMemoryContactRepository {
    async fn record_contact(&self, request: ContactRequest) -> Result<(), CollaboratorError> {
        let mut contacts = self.contacts.write().await;
        contacts.push(request);
        Ok(())
    }
}
