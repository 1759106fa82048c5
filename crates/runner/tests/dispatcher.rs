//! Console sessions against a paper venue

use rust_decimal_macros::dec;
use std::sync::Arc;
use tame_core::{Position, PositionSide};
use tame_gateway::{GatewayError, GatewayOp, PaperGateway};
use tame_runner::{Dispatcher, Reply, bootstrap};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn session() -> (Arc<PaperGateway>, Dispatcher) {
    init_logging();
    let (gateway, engine) = bootstrap::paper_engine(bootstrap::demo_config()).unwrap();
    (gateway, Dispatcher::new(engine))
}

async fn line(dispatcher: &mut Dispatcher, input: &str) -> String {
    match dispatcher.handle_line(input).await {
        Reply::Line(line) => line,
        other => panic!("expected a reply line for '{}', got {:?}", input, other),
    }
}

#[tokio::test]
async fn test_trading_needs_a_market() {
    let (gateway, mut dispatcher) = session();

    let reply = line(&mut dispatcher, "stop 28000").await;
    assert!(reply.starts_with("stop failed: no market selected"));
    assert_eq!(gateway.create_count(), 0);

    let reply = line(&mut dispatcher, "market DOGE/USD").await;
    assert!(reply.starts_with("market failed:"));
    assert_eq!(dispatcher.symbol(), None);

    let reply = line(&mut dispatcher, "market BTC/USD").await;
    assert!(reply.starts_with("market: BTC/USD selected on paper"));
    assert_eq!(dispatcher.symbol(), Some("BTC/USD"));
}

#[tokio::test]
async fn test_parse_errors_and_control_lines() {
    let (_gateway, mut dispatcher) = session();

    assert_eq!(dispatcher.handle_line("").await, Reply::Silent);
    assert_eq!(dispatcher.handle_line("# comment").await, Reply::Silent);
    assert_eq!(dispatcher.handle_line("quit").await, Reply::Quit);

    let reply = line(&mut dispatcher, "teleport 5").await;
    assert!(reply.starts_with("error: unknown command 'teleport'"));

    let reply = line(&mut dispatcher, "help").await;
    assert!(reply.contains("bracket <buy|sell>"));
}

#[tokio::test]
async fn test_stop_then_status() {
    let (gateway, mut dispatcher) = session();
    gateway.set_position(Position::new(
        "BTC/USD",
        PositionSide::Long,
        dec!(1),
        dec!(30000),
    ));
    line(&mut dispatcher, "market BTC/USD").await;

    let reply = line(&mut dispatcher, "stop 28000").await;
    assert!(reply.starts_with("stop: "), "{}", reply);
    assert!(reply.contains("sell"));
    assert_eq!(gateway.resting_orders("BTC/USD").len(), 1);

    let reply = line(&mut dispatcher, "status").await;
    assert!(reply.contains("position long"), "{}", reply);
    assert!(reply.contains("chase idle"));
    assert!(!reply.contains("stop none"));
}

#[tokio::test]
async fn test_lost_stop_is_flagged() {
    let (gateway, mut dispatcher) = session();
    gateway.set_position(Position::new(
        "BTC/USD",
        PositionSide::Long,
        dec!(1),
        dec!(30000),
    ));
    line(&mut dispatcher, "market BTC/USD").await;
    line(&mut dispatcher, "stop 28000").await;

    gateway.fail_next(
        GatewayOp::CreateOrder,
        GatewayError::Network("connection reset".to_string()),
    );
    let reply = line(&mut dispatcher, "move-stop 28500").await;
    assert!(reply.starts_with("!!! move-stop FAILED"), "{}", reply);
    assert!(gateway.resting_orders("BTC/USD").is_empty());

    // Session keeps going; the stop can be placed again
    let reply = line(&mut dispatcher, "stop 28500").await;
    assert!(reply.starts_with("stop: "), "{}", reply);
}

#[tokio::test]
async fn test_range_uses_default_threshold() {
    let (gateway, mut dispatcher) = session();
    line(&mut dispatcher, "market BTC/USD").await;

    let reply = line(&mut dispatcher, "range buy 100 110 3 10000 3 90 150").await;
    assert!(reply.starts_with("range: 3 buy orders"), "{}", reply);
    assert_eq!(gateway.resting_orders("BTC/USD").len(), 4);

    // 150 target from 110 with a 90 stop is 2:1; a 3:1 floor rejects it up front
    let reply = line(&mut dispatcher, "range buy 100 110 3 10000 3 90 150 3").await;
    assert!(reply.starts_with("range failed:"), "{}", reply);
    assert_eq!(gateway.resting_orders("BTC/USD").len(), 4);
}

#[tokio::test]
async fn test_oversized_bracket_fails_without_orders() {
    let (gateway, mut dispatcher) = session();
    line(&mut dispatcher, "market BTC/USD").await;

    let reply = line(
        &mut dispatcher,
        "bracket buy 30000 29999.9999999999999999999999 31000 1000000000 2",
    )
    .await;
    assert!(reply.starts_with("bracket failed: Invalid input"), "{}", reply);
    assert_eq!(gateway.create_count(), 0);

    // Dispatcher still answers
    let reply = line(&mut dispatcher, "status").await;
    assert!(reply.starts_with("status: "), "{}", reply);
}

#[tokio::test]
async fn test_cancel_from_bottom() {
    let (gateway, mut dispatcher) = session();
    line(&mut dispatcher, "market BTC/USD").await;
    line(&mut dispatcher, "range buy 100 110 3 10000 3 90 150").await;

    let reply = line(&mut dispatcher, "cancel bottom 1 2").await;
    assert_eq!(
        reply,
        "cancel: 2 orders cancelled from the bottom (0 already gone)"
    );
    assert_eq!(gateway.resting_orders("BTC/USD").len(), 2);
}

#[tokio::test]
async fn test_chase_then_cancel() {
    let (gateway, mut dispatcher) = session();
    line(&mut dispatcher, "market BTC/USD").await;

    let reply = line(&mut dispatcher, "cancel-chase").await;
    assert_eq!(reply, "cancel-chase: no active chase");

    let reply = line(&mut dispatcher, "chase buy 0.5").await;
    assert!(reply.starts_with("chase: session "), "{}", reply);
    assert_eq!(gateway.resting_orders("BTC/USD").len(), 1);

    let reply = line(&mut dispatcher, "chase sell 0.5").await;
    assert!(reply.starts_with("chase failed:"), "{}", reply);

    let reply = line(&mut dispatcher, "cancel-chase").await;
    assert!(reply.ends_with("cancelled"), "{}", reply);
    assert!(gateway.resting_orders("BTC/USD").is_empty());
}
