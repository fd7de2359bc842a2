//! Chat-completion probe

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::Probe;
use crate::auth::TokenProvider;
use crate::config::AppConfig;
use crate::http::{GatewayClient, GatewayError};
use crate::models::{ChatCompletionRequest, ChatCompletionResponse, ProbeFailure, ProbeOutcome};
use crate::output::ResultFormatter;
use crate::utils::timer::Timer;

/// How much a probe prints when it finishes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Echo {
    /// Model, response text and token usage, or the error
    Full,
    /// One line per probe
    Brief,
    Silent,
}

/// Sends the fixed conversation through the gateway
pub struct ChatProbe {
    client: GatewayClient,
    credential: Arc<dyn TokenProvider>,
    scope: String,
    request: ChatCompletionRequest,
    formatter: ResultFormatter,
    echo: Echo,
}

impl ChatProbe {
    pub fn new(
        config: &AppConfig,
        client: GatewayClient,
        credential: Arc<dyn TokenProvider>,
    ) -> Self {
        let request = ChatCompletionRequest::conversation(
            config.deployment.clone(),
            config.prompt.system.clone(),
            config.prompt.user.clone(),
            config.prompt.temperature,
        );

        Self {
            client,
            credential,
            scope: config.scope.clone(),
            request,
            formatter: ResultFormatter::default(),
            echo: Echo::Full,
        }
    }

    pub fn with_echo(mut self, echo: Echo) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_formatter(mut self, formatter: ResultFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    async fn call(&self) -> Result<ChatCompletionResponse, GatewayError> {
        let token = self.credential.get_token(&self.scope).await?;
        self.client.chat_completion(&token.token, &self.request).await
    }

    fn report(&self, outcome: &ProbeOutcome) {
        // One println per probe keeps concurrent reports from interleaving.
        match self.echo {
            Echo::Full => println!("{}", self.formatter.format_outcome(outcome)),
            Echo::Brief => println!("{}", self.formatter.format_outcome_brief(outcome)),
            Echo::Silent => {}
        }
    }
}

#[async_trait]
impl Probe for ChatProbe {
    async fn run(&self, index: usize) -> ProbeOutcome {
        let timer = Timer::start(format!("probe {index}"));

        let outcome = match self.call().await {
            Ok(response) => ProbeOutcome::pass(index, timer.stop(), &response),
            Err(e) => {
                debug!("Probe {} failed: {}", index, e);
                ProbeOutcome::fail(index, timer.stop(), ProbeFailure::new(e.kind(), e.to_string()))
            }
        };

        self.report(&outcome);
        outcome
    }
}
