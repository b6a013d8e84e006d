//! Counter example binary
//!
//! Demonstrates Unistore with a simple counter: a preloaded snapshot,
//! logging middleware, a listener, and a state stream.

use counter::{CounterAction, CounterReducer, CounterState};
use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unistore_runtime::{LoggingMiddleware, Store, StoreConfig, apply_middleware};

const SNAPSHOT: &str = r#"{ "count": 10 }"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counter=debug,unistore_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Counter Example: Unistore ===\n");

    let snapshot: CounterState = serde_json::from_str(SNAPSHOT)?;
    println!("Preloaded snapshot: {snapshot:?}");

    let store = Store::builder(CounterReducer)
        .preloaded_state(snapshot)
        .enhancer(apply_middleware(vec![Box::new(LoggingMiddleware)]))
        .config(StoreConfig::new("counter"))
        .build()?;

    let reader = store.clone();
    let listener = store.subscribe(move || {
        if let Ok(count) = reader.state(|s| s.count) {
            tracing::info!(count, "Listener saw new state");
        }
    })?;

    let mut states = store.observable().into_stream()?;

    for action in [
        CounterAction::Increment,
        CounterAction::Increment,
        CounterAction::Add(5),
        CounterAction::Decrement,
        CounterAction::Reset,
    ] {
        println!("\n>>> Dispatching: {action:?}");
        store.dispatch(action)?;
        println!("Count: {}", store.state(|s| s.count)?);
    }

    listener.unsubscribe()?;

    // The stream buffered the initial state plus one entry per dispatch
    let history: Vec<i64> = (&mut states).take(6).map(|s| s.count).collect().await;
    println!("\nState history from the stream: {history:?}");

    let final_state = serde_json::to_string(&*store.get_state()?)?;
    println!("Final snapshot: {final_state}");

    println!("\n=== Demonstration Complete ===");
    println!("\nKey concepts demonstrated:");
    println!("  • State: CounterState, replaced wholesale on every transition");
    println!("  • Action: CounterAction, a tagged value with a string discriminant");
    println!("  • Reducer: (Option<&State>, &Action) → State");
    println!("  • Middleware: LoggingMiddleware wraps every dispatch");
    println!("  • Observation: listeners and a state stream");
    Ok(())
}
