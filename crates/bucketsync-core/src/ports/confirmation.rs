//! Confirmation port (driving-side gate)
//!
//! Destructive runs ask before touching the remote store. The CLI answers
//! from stdin; tests answer with a fixed value.

/// Port trait for a yes/no confirmation
#[async_trait::async_trait]
pub trait IConfirmation: Send + Sync {
    /// Returns true if the user agreed to `question`
    async fn confirm(&self, question: &str) -> anyhow::Result<bool>;
}

/// Confirmation that always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirmation(pub bool);

#[async_trait::async_trait]
impl IConfirmation for FixedConfirmation {
    async fn confirm(&self, _question: &str) -> anyhow::Result<bool> {
        Ok(self.0)
    }
}
