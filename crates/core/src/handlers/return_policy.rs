use async_trait::async_trait;

use crate::domain::intent::Intent;
use crate::domain::policy::{PolicyBook, DEFAULT_CATEGORY};
use crate::domain::session::Session;
use crate::handlers::{HandlerReply, IntentHandler, PolicyCatalog, TurnContext};

const MISSING_POLICY: &str =
    "I couldn't find the specific return policy information right now.";

/// Answers return-policy questions from a policy catalog, picking the most
/// specific category the customer's message mentions.
pub struct ReturnPolicyHandler<P> {
    catalog: P,
}

impl<P> ReturnPolicyHandler<P>
where
    P: PolicyCatalog,
{
    pub fn new(catalog: P) -> Self {
        Self { catalog }
    }

    fn match_category(&self, message: &str) -> Option<String> {
        let lowered = message.to_lowercase();
        let mut best: Option<String> = None;
        for category in self.catalog.categories() {
            if category == DEFAULT_CATEGORY {
                continue;
            }
            let spoken = category.replace('_', " ");
            if lowered.contains(category.as_str()) || lowered.contains(&spoken) {
                let better =
                    best.as_ref().map(|current| category.len() > current.len()).unwrap_or(true);
                if better {
                    best = Some(category);
                }
            }
        }
        best
    }
}

#[async_trait]
impl<P> IntentHandler for ReturnPolicyHandler<P>
where
    P: PolicyCatalog,
{
    fn intent(&self) -> Intent {
        Intent::ReturnPolicy
    }

    async fn handle(
        &self,
        message: &str,
        _session: &Session,
        _context: &TurnContext,
    ) -> HandlerReply {
        let category = self.match_category(message);
        match self.catalog.policy_text(category.as_deref()) {
            Some(text) => HandlerReply::text_only(text),
            None => HandlerReply::text_only(MISSING_POLICY),
        }
    }
}

impl PolicyCatalog for PolicyBook {
    fn categories(&self) -> Vec<String> {
        PolicyBook::categories(self)
    }

    fn policy_text(&self, category: Option<&str>) -> Option<String> {
        PolicyBook::policy_text(self, category)
    }
}
