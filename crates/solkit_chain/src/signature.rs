//! Recovering the signature of a failed transaction from its error.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use crate::cluster::Cluster;
use crate::error::{ChainError, Result};
use crate::explorer::{ExplorerCategory, explorer_link};

pub const DEFAULT_LOG_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Optional `...Error: ` prefix, the word `Transaction` or `Signature`, then
/// 32+ letters/digits followed by a space. Multi-line and case-insensitive.
static FAILED_SIGNATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^((.*)?Error: )?(Transaction|Signature) ([A-Z0-9]{32,}) ")
        .expect("valid regex")
});

/// First signature embedded in an error message, if any.
pub fn match_failed_signature(message: &str) -> Option<String> {
    FAILED_SIGNATURE_RE
        .captures(message)
        .and_then(|caps| caps.get(4))
        .map(|m| m.as_str().to_string())
}

/// Anything a failed remote call can hand back.
pub trait FailedCall {
    /// A signature the error already carries as data.
    fn signature(&self) -> Option<&str> {
        None
    }

    fn message(&self) -> String;
}

impl FailedCall for str {
    fn message(&self) -> String {
        self.to_string()
    }
}

impl FailedCall for String {
    fn message(&self) -> String {
        self.clone()
    }
}

impl FailedCall for ChainError {
    fn signature(&self) -> Option<&str> {
        ChainError::signature(self)
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

impl FailedCall for anyhow::Error {
    fn signature(&self) -> Option<&str> {
        self.chain()
            .find_map(|cause| cause.downcast_ref::<ChainError>())
            .and_then(ChainError::signature)
    }

    fn message(&self) -> String {
        format!("{self:#}")
    }
}

/// Read-only lookup of a transaction's program logs.
#[async_trait]
pub trait TransactionLogSource: Send + Sync {
    /// `Ok(None)` when the transaction or its logs are unknown.
    async fn transaction_logs(&self, signature: &str) -> Result<Option<Vec<String>>>;
}

/// Pulls signatures out of failed-call errors and, on request, prints the
/// matching transaction logs.
pub struct SignatureExtractor<'a> {
    logs: &'a dyn TransactionLogSource,
    cluster: Cluster,
    timeout: Duration,
}

impl<'a> SignatureExtractor<'a> {
    pub fn new(logs: &'a dyn TransactionLogSource, cluster: Cluster) -> Self {
        Self {
            logs,
            cluster,
            timeout: DEFAULT_LOG_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Signature of the failed call, if one can be determined.
    ///
    /// A structured signature is returned as-is. Otherwise the message is
    /// matched against [`match_failed_signature`]; on a match the logs are
    /// fetched and printed when `fetch_logs` is set, or the bare signature is
    /// printed when it is not. Fetch failures are logged and otherwise
    /// ignored.
    ///
    /// Output goes through `warn!` so it survives a `RUST_LOG=warn` filter.
    pub async fn extract<E>(&self, err: &E, fetch_logs: bool) -> Option<String>
    where
        E: FailedCall + ?Sized,
    {
        if let Some(signature) = err.signature() {
            return Some(signature.to_string());
        }

        let signature = match_failed_signature(&err.message())?;

        if fetch_logs {
            self.print_logs(&signature).await;
        } else {
            warn!("========================================");
            warn!(tx_signature = %signature, "failed transaction");
            warn!("========================================");
        }

        Some(signature)
    }

    async fn print_logs(&self, signature: &str) {
        let fetched = tokio::time::timeout(self.timeout, self.logs.transaction_logs(signature)).await;
        let lines = match fetched {
            Ok(Ok(lines)) => lines,
            Ok(Err(e)) => {
                warn!(%signature, error = %e, "unable to fetch transaction logs");
                return;
            }
            Err(_) => {
                warn!(%signature, timeout_secs = self.timeout.as_secs(), "timed out fetching transaction logs");
                return;
            }
        };

        warn!("==== Transaction logs for {signature} ====");
        warn!(
            "{}",
            explorer_link(ExplorerCategory::Transaction, signature, self.cluster)
        );
        match lines {
            Some(lines) if !lines.is_empty() => {
                for line in lines {
                    warn!("{line}");
                }
            }
            _ => warn!("No log messages provided by RPC"),
        }
        warn!("==== END LOGS ====");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    const SIG: &str = "5UfDuX7WXYjYgVyBNa3ktzH3VLnc1JMikJZcqaJq1CPYWkjzWEgrYg1HGRiPWWXm7YnyLgqqgDM5hGR8SeHp7ZUm";

    /// Records every lookup and answers with a canned result.
    #[derive(Default)]
    struct RecordingLogs {
        calls: Mutex<Vec<String>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl RecordingLogs {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransactionLogSource for RecordingLogs {
        async fn transaction_logs(&self, signature: &str) -> Result<Option<Vec<String>>> {
            self.calls.lock().unwrap().push(signature.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(ChainError::Rpc {
                    code: -32603,
                    message: "node is unhealthy".into(),
                });
            }
            Ok(Some(vec!["Program log: custom program error: 0x1".into()]))
        }
    }

    #[test]
    fn matches_error_prefixed_transaction() {
        let message = format!("Error: Transaction {SIG} resulted in an error.");
        assert_eq!(match_failed_signature(&message).as_deref(), Some(SIG));
    }

    #[test]
    fn matches_longer_prefix_and_signature_keyword() {
        let message = format!("SendTransactionError: Signature {SIG} has expired: block height exceeded");
        assert_eq!(match_failed_signature(&message).as_deref(), Some(SIG));
    }

    #[test]
    fn matches_without_prefix() {
        let message = format!("Transaction {SIG} failed");
        assert_eq!(match_failed_signature(&message).as_deref(), Some(SIG));
    }

    #[test]
    fn matches_on_a_later_line() {
        let message = format!("request failed\nError: Transaction {SIG} \nmore detail");
        assert_eq!(match_failed_signature(&message).as_deref(), Some(SIG));
    }

    #[test]
    fn keyword_is_case_insensitive() {
        let message = format!("transaction {SIG} dropped");
        assert_eq!(match_failed_signature(&message).as_deref(), Some(SIG));
    }

    #[test]
    fn requires_trailing_space() {
        let message = format!("Error: Transaction {SIG}");
        assert!(match_failed_signature(&message).is_none());
    }

    #[test]
    fn requires_thirty_two_characters() {
        let short = "A".repeat(31);
        assert!(match_failed_signature(&format!("Transaction {short} failed")).is_none());

        let exact = "A".repeat(32);
        assert_eq!(
            match_failed_signature(&format!("Transaction {exact} failed")),
            Some(exact)
        );
    }

    #[test]
    fn keyword_must_start_the_line_or_follow_error_prefix() {
        let message = format!("the Transaction {SIG} failed");
        assert!(match_failed_signature(&message).is_none());
    }

    #[test]
    fn no_match_for_unrelated_message() {
        assert!(match_failed_signature("Something went wrong").is_none());
    }

    #[tokio::test]
    async fn extract_returns_matched_signature_without_fetching() {
        let logs = RecordingLogs::default();
        let extractor = SignatureExtractor::new(&logs, Cluster::Devnet);

        let message = format!("Error: Transaction {SIG} resulted in an error.");
        let found = extractor.extract(message.as_str(), false).await;

        assert_eq!(found.as_deref(), Some(SIG));
        assert!(logs.calls().is_empty());
    }

    #[tokio::test]
    async fn extract_no_match_is_none() {
        let logs = RecordingLogs::default();
        let extractor = SignatureExtractor::new(&logs, Cluster::Devnet);

        assert!(extractor.extract("Something went wrong", true).await.is_none());
        assert!(logs.calls().is_empty());
    }

    #[tokio::test]
    async fn extract_prefers_structured_signature() {
        let logs = RecordingLogs::default();
        let extractor = SignatureExtractor::new(&logs, Cluster::Devnet);
        let err = ChainError::TransactionFailed {
            signature: "ABC123".into(),
            message: format!("Error: Transaction {SIG} "),
        };

        assert_eq!(extractor.extract(&err, true).await.as_deref(), Some("ABC123"));
        assert!(logs.calls().is_empty());
    }

    #[tokio::test]
    async fn extract_finds_structured_signature_through_anyhow_context() {
        let logs = RecordingLogs::default();
        let extractor = SignatureExtractor::new(&logs, Cluster::Devnet);
        let err = anyhow::Error::new(ChainError::TransactionFailed {
            signature: "ABC123".into(),
            message: "custom program error".into(),
        })
        .context("minting tokens");

        assert_eq!(extractor.extract(&err, false).await.as_deref(), Some("ABC123"));
    }

    #[tokio::test]
    async fn extract_fetches_logs_exactly_once() {
        let logs = RecordingLogs::default();
        let extractor = SignatureExtractor::new(&logs, Cluster::Devnet);

        let message = format!("Error: Transaction {SIG} resulted in an error.");
        let found = extractor.extract(&message, true).await;

        assert_eq!(found.as_deref(), Some(SIG));
        assert_eq!(logs.calls(), vec![SIG.to_string()]);
    }

    #[tokio::test]
    async fn extract_swallows_fetch_failures() {
        let logs = RecordingLogs {
            fail: true,
            ..Default::default()
        };
        let extractor = SignatureExtractor::new(&logs, Cluster::Devnet);

        let message = format!("Signature {SIG} failed");
        assert_eq!(extractor.extract(&message, true).await.as_deref(), Some(SIG));
        assert_eq!(logs.calls().len(), 1);
    }

    #[tokio::test]
    async fn extract_gives_up_after_timeout() {
        let logs = RecordingLogs {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let extractor =
            SignatureExtractor::new(&logs, Cluster::Devnet).with_timeout(Duration::from_millis(20));

        let message = format!("Transaction {SIG} failed");
        assert_eq!(extractor.extract(&message, true).await.as_deref(), Some(SIG));
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

    impl CapturedOutput {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedOutput {
        type Writer = CapturedOutput;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn warn_only_subscriber(output: CapturedOutput) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(output)
            .finish()
    }

    #[tokio::test]
    async fn fetched_logs_survive_warn_filter() {
        let output = CapturedOutput::default();
        let _guard = tracing::subscriber::set_default(warn_only_subscriber(output.clone()));

        let logs = RecordingLogs::default();
        let extractor = SignatureExtractor::new(&logs, Cluster::Devnet);
        let message = format!("Error: Transaction {SIG} resulted in an error.");
        extractor.extract(&message, true).await;

        let text = output.text();
        assert!(text.contains(SIG), "{text}");
        assert!(text.contains("custom program error: 0x1"), "{text}");
        assert!(text.contains("explorer.solana.com/tx/"), "{text}");
    }

    #[tokio::test]
    async fn banner_survives_warn_filter() {
        let output = CapturedOutput::default();
        let _guard = tracing::subscriber::set_default(warn_only_subscriber(output.clone()));

        let logs = RecordingLogs::default();
        let extractor = SignatureExtractor::new(&logs, Cluster::Devnet);
        extractor.extract(&format!("Transaction {SIG} failed"), false).await;

        assert!(output.text().contains(SIG));
        assert!(logs.calls().is_empty());
    }

    #[test]
    fn anyhow_message_includes_causes() {
        let err = anyhow::anyhow!("inner").context("outer");
        assert_eq!(FailedCall::message(&err), "outer: inner");
        assert!(FailedCall::signature(&err).is_none());
    }
}
