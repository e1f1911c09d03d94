//! Per-execution log capture using context-isolated output redirection.
//!
//! The source installs a process-wide tee on stdout/stderr that, if a
//! per-execution buffer is bound in the current `ContextVar`, also writes
//! into that buffer. `tokio::task_local!` is the direct async-Rust
//! analogue of that context variable: it propagates automatically across
//! `.await` suspension points and is invisible to any task that didn't
//! explicitly enter the scope, so two executions running concurrently on
//! different tasks never see each other's lines. The tee itself becomes a
//! `tracing_subscriber::Layer` installed once, alongside the ordinary
//! formatted output every other log line already goes through — so
//! originally-terminal output is never suppressed.

use std::sync::{Arc, Mutex, Once};

use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

tokio::task_local! {
    static LOG_BUFFER: Arc<Mutex<String>>;
}

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

struct ExecutionCaptureLayer;

impl<S: tracing::Subscriber> Layer<S> for ExecutionCaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let _ = LOG_BUFFER.try_with(|buffer| {
            let mut visitor = MessageVisitor {
                message: String::new(),
            };
            event.record(&mut visitor);
            let mut guard = buffer.lock().expect("log buffer poisoned");
            guard.push_str(&visitor.message);
            guard.push('\n');
        });
    }
}

static INIT: Once = Once::new();

/// Installs the combined formatted-output + per-execution-capture
/// subscriber. Idempotent and thread-safe: only the first call takes
/// effect, matching the contract in the component design.
pub fn install() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .with(ExecutionCaptureLayer);
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Runs `future` with a fresh, isolated log buffer bound for its duration,
/// returning both the future's output and everything logged while it ran.
pub async fn execute_with_logging<F, T>(future: F) -> (T, String)
where
    F: std::future::Future<Output = T>,
{
    install();
    let buffer = Arc::new(Mutex::new(String::new()));
    let result = LOG_BUFFER.scope(buffer.clone(), future).await;
    let logs = buffer.lock().expect("log buffer poisoned").clone();
    (result, logs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_executions_have_disjoint_logs() {
        let (_, logs_a) = execute_with_logging(async {
            tracing::info!("line-from-a");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        })
        .await;
        let (_, logs_b) = execute_with_logging(async {
            tracing::info!("line-from-b");
        })
        .await;
        assert!(logs_a.contains("line-from-a"));
        assert!(!logs_a.contains("line-from-b"));
        assert!(logs_b.contains("line-from-b"));
        assert!(!logs_b.contains("line-from-a"));
    }

    #[tokio::test]
    async fn truly_concurrent_executions_stay_isolated() {
        let (a, b) = tokio::join!(
            execute_with_logging(async {
                tracing::info!("only-a");
                tokio::time::sleep(std::time::Duration::from_millis(30)).await;
                1
            }),
            execute_with_logging(async {
                tracing::info!("only-b");
                2
            })
        );
        assert!(a.1.contains("only-a") && !a.1.contains("only-b"));
        assert!(b.1.contains("only-b") && !b.1.contains("only-a"));
    }
}
