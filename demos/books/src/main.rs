//! Books example binary
//!
//! Loads books from a flaky in-memory service on every store strategy.

use books::{Book, BooksError, BooksRepository, BooksStrategy, BooksUseCase, books_use_case};
use futures::StreamExt;
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Answers after a random latency and fails now and then
struct FlakyRepository {
    shelf: Vec<Book>,
    failure_rate: f64,
}

impl BooksRepository for FlakyRepository {
    fn load_books(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Book>, BooksError>> + Send + '_>> {
        let mut rng = rand::thread_rng();
        let latency = Duration::from_millis(rng.gen_range(100..600));
        let fails = rng.gen_bool(self.failure_rate);

        Box::pin(async move {
            tokio::time::sleep(latency).await;
            if fails {
                Err(BooksError::Network("connection reset".to_string()))
            } else {
                Ok(self.shelf.clone())
            }
        })
    }
}

async fn run(strategy: BooksStrategy, repository: Arc<dyn BooksRepository>) -> anyhow::Result<()> {
    println!("\n>>> Strategy: {strategy:?}");

    let books: Box<dyn BooksUseCase> = books_use_case(strategy, repository);
    books.start(&tokio::runtime::Handle::current())?;

    let mut states = books.state();
    let printer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            println!("  state: {state:?}");
        }
    });

    books.load().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("  (loading again supersedes the first fetch)");
    books.load().await?;
    tokio::time::sleep(Duration::from_millis(800)).await;

    if !books.clear() {
        println!("  clear dropped, intake full");
    }
    books.load().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("  (clearing cancels the fetch in flight)");
    books.clear();
    tokio::time::sleep(Duration::from_millis(800)).await;

    println!("  final state: {:?}", books.current());
    books.stop().await;
    printer.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "books=debug,knot_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Books Example: Knot ===");

    let repository: Arc<dyn BooksRepository> = Arc::new(FlakyRepository {
        shelf: vec![
            Book::new("The Left Hand of Darkness", 1969),
            Book::new("Dune", 1965),
            Book::new("Solaris", 1961),
        ],
        failure_rate: 0.3,
    });

    run(BooksStrategy::Simple, Arc::clone(&repository)).await?;
    run(BooksStrategy::Proposals, Arc::clone(&repository)).await?;
    run(BooksStrategy::Redux, repository).await?;

    println!("\n=== Books Demonstration Complete ===");
    Ok(())
}
