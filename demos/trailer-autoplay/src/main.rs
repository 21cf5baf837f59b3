//! Trailer autoplay example binary
//!
//! Runs a short carousel: one banner plays its trailer, one is switched away
//! during its preview, and one has no trailer and times out.

use futures::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trailer_autoplay::{
    SubjectId, TrailerAutoplayModel, TrailerConfig, TrailerError, TrailerRepository,
};

/// Resolves every subject after a short latency, except `"3"`
struct DemoRepository {
    latency: Duration,
}

impl TrailerRepository for DemoRepository {
    fn trailer_url(
        &self,
        subject: SubjectId,
    ) -> Pin<Box<dyn Future<Output = Result<String, TrailerError>> + Send + '_>> {
        Box::pin(async move {
            tokio::time::sleep(self.latency).await;
            if subject.as_str() == "3" {
                Err(TrailerError::Unavailable("503 Service Unavailable".to_string()))
            } else {
                Ok(format!("https://cdn.example/trailers/{subject}.m3u8"))
            }
        })
    }

    fn stop_request(&self, subject: &SubjectId) {
        tracing::info!(subject = %subject, "Repository dropped pending request");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trailer_autoplay=debug,knot_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    knot_runtime::metrics::describe_metrics();

    println!("=== Trailer Autoplay Example: Knot ===\n");

    let config = TrailerConfig::new(800, 2000);
    let repository = Arc::new(DemoRepository {
        latency: Duration::from_millis(200),
    });
    let model = TrailerAutoplayModel::new(repository, config);
    model.start(&tokio::runtime::Handle::current())?;

    let mut states = Box::pin(model.state());
    let printer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            println!("  state: {state:?}");
        }
    });

    let mut side_effects = model.side_effects();
    let notifier = tokio::spawn(async move {
        while let Ok(side_effect) = side_effects.recv().await {
            println!("  side effect: {side_effect:?}");
        }
    });

    println!(">>> Banner 1 visible");
    model.start_banner("1").await?;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    println!("\n>>> Banner 2 visible during banner 1's trailer");
    model.start_banner("2").await?;
    tokio::time::sleep(Duration::from_millis(400)).await;

    println!("\n>>> Banner 3 visible during banner 2's preview");
    model.start_banner("3").await?;
    tokio::time::sleep(Duration::from_millis(2500)).await;

    println!("\n>>> Final state: {:?}", model.current());
    model.stop().await;

    printer.await?;
    notifier.await?;

    println!("\n=== Autoplay Demonstration Complete ===");
    Ok(())
}
