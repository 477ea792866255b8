use anyhow::Result;

use crate::devops::DevOpsApi;
use crate::lookup::ReleaseLookupClient;
use crate::report::ReportFormatter;
use crate::sink::{ChatApiError, MessageReceipt, NotificationSender, SendError};

/// How a single run ended. Every variant is a normal exit.
#[derive(Debug)]
pub enum RunOutcome {
    /// The branch has no releases.
    NoRelease,
    /// The release had no deployment artifact, so the report was empty.
    NothingToSend,
    Sent(MessageReceipt),
    /// Slack rejected the message. Logged, not propagated.
    DeliveryFailed(ChatApiError),
}

/// Look up the latest release of `branch` and render its report.
///
/// Returns an empty string when there is nothing to report.
pub async fn generate_release_notes(api: &dyn DevOpsApi, branch: &str) -> Result<String> {
    match ReleaseLookupClient::new(api).fetch_latest(branch).await? {
        Some(release) => ReportFormatter::new(api).render(&release).await,
        None => Ok(String::new()),
    }
}

/// Full run: lookup, render, then post to `channel`.
///
/// Steps run strictly one after another. Only a Slack API rejection is
/// handled here; any other fault is returned to the caller.
pub async fn run(
    api: &dyn DevOpsApi,
    sender: &dyn NotificationSender,
    branch: &str,
    channel: &str,
) -> Result<RunOutcome> {
    let Some(release) = ReleaseLookupClient::new(api).fetch_latest(branch).await? else {
        return Ok(RunOutcome::NoRelease);
    };

    let report = ReportFormatter::new(api).render(&release).await?;
    if report.is_empty() {
        return Ok(RunOutcome::NothingToSend);
    }

    match sender.send(channel, &report).await {
        Ok(receipt) => {
            tracing::info!(ts = %receipt.ts, channel, "Message sent");
            Ok(RunOutcome::Sent(receipt))
        }
        Err(SendError::Api(error)) => {
            tracing::error!(%error, payload = %error.payload, "Error sending message");
            Ok(RunOutcome::DeliveryFailed(error))
        }
        Err(err @ SendError::Transport(_)) => Err(err.into()),
    }
}
