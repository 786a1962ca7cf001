mod common;

use std::sync::Arc;

use approx::assert_relative_eq;

use common::*;
use strade::trading::exchange::OrderType;
use strade::trading::ledger::{InMemoryLedger, PositionLedger};
use strade::trading::model::{OrderKind, PositionSide, UserTradeStatus};
use strade::trading::order::{MarginMode, OrderSide, TradeSide};
use strade::trading::services::order_service::{
    CloseOrderService, OpenOrderService, OrderOutcome,
};
use strade::trading::strategy::{CloseReason, Signal, SignalAction};

struct Fixture {
    ledger: Arc<InMemoryLedger>,
    exchange: Arc<ScriptedExchange>,
    open: OpenOrderService,
    close: CloseOrderService,
}

async fn fixture() -> Fixture {
    let ledger = Arc::new(InMemoryLedger::new());
    seed_strategy(&ledger).await;
    seed_bot(&ledger, bot(1, STRATEGY_ID, "BTC-USDT-SWAP")).await;
    let exchange = ScriptedExchange::new();
    let factory = Arc::new(ScriptedFactory {
        exchange: exchange.clone(),
    });
    Fixture {
        open: OpenOrderService::new(ledger.clone(), factory.clone()),
        close: CloseOrderService::new(ledger.clone(), factory),
        ledger,
        exchange,
    }
}

fn signal(action: SignalAction, side: PositionSide, price: f64) -> Signal {
    Signal {
        action,
        position_side: side,
        price,
        strategy_trade_id: Some(3),
    }
}

#[tokio::test]
async fn test_place_open_records_pending_trade_and_open_order() {
    let f = fixture().await;

    let outcome = f
        .open
        .place_open(1, &signal(SignalAction::Open, PositionSide::Long, 50_000.0))
        .await;

    let placed = outcome.placed().expect("order should be placed").clone();
    assert_eq!(placed.exchange_order_id, "ord-1");
    assert_eq!(placed.order_status, "NEW");

    // 强制模拟盘
    assert_eq!(*f.exchange.sandbox_flags.lock().unwrap(), vec![true]);
    let leverage_calls = f.exchange.leverage_calls.lock().unwrap().clone();
    assert_eq!(
        leverage_calls,
        vec![(5, "BTC-USDT-SWAP".to_string(), MarginMode::Isolated)]
    );

    let requests = f.exchange.placed_orders();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.order_type, OrderType::Limit);
    assert_eq!(request.side, OrderSide::Buy);
    assert_eq!(request.trade_side, TradeSide::Open);
    assert_eq!(request.margin_mode, MarginMode::Isolated);
    assert_eq!(request.price, Some(50_000.0));
    assert_relative_eq!(request.amount, 0.002, epsilon = 1e-12);

    let trade = f
        .ledger
        .find_user_trade(placed.user_trade_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trade.status, UserTradeStatus::Pending);
    assert_eq!(trade.strategy_trade_id, Some(3));
    assert_eq!(trade.opened_at, None);
    assert_eq!(trade.user_id, 1001);
    assert_eq!(trade.leverage, 5);

    let orders = f.ledger.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_type, OrderKind::Open);
    assert_eq!(orders[0].user_trade_id, placed.user_trade_id);
    assert_eq!(orders[0].status, "NEW");
    assert_eq!(orders[0].filled_qty, 0.0);
    assert_eq!(f.ledger.write_count(), 1);
}

#[tokio::test]
async fn test_leverage_failure_is_soft_and_places_nothing() {
    let f = fixture().await;
    f.exchange.fail_leverage("leverage too high");

    let outcome = f
        .open
        .place_open(1, &signal(SignalAction::Open, PositionSide::Long, 100.0))
        .await;

    assert!(matches!(outcome, OrderOutcome::Failed(ref e) if e.is_exchange()));
    assert!(f.exchange.placed_orders().is_empty());
    assert_eq!(f.ledger.write_count(), 0);
}

#[tokio::test]
async fn test_rejected_open_writes_nothing() {
    let f = fixture().await;
    f.exchange
        .on_place("BTC-USDT-SWAP", PlaceBehavior::Reject("51008".into()));

    let outcome = f
        .open
        .place_open(1, &signal(SignalAction::Open, PositionSide::Long, 100.0))
        .await;

    assert!(matches!(outcome, OrderOutcome::Failed(_)));
    assert_eq!(f.ledger.write_count(), 0);
}

#[tokio::test]
async fn test_response_without_order_id_fails() {
    let f = fixture().await;
    f.exchange.on_place("BTC-USDT-SWAP", PlaceBehavior::NoOrderId);

    let outcome = f
        .open
        .place_open(1, &signal(SignalAction::Open, PositionSide::Long, 100.0))
        .await;

    assert!(matches!(outcome, OrderOutcome::Failed(_)));
    assert_eq!(f.ledger.write_count(), 0);
}

#[tokio::test]
async fn test_unknown_bot_is_skipped() {
    let f = fixture().await;

    let outcome = f
        .open
        .place_open(99, &signal(SignalAction::Open, PositionSide::Long, 100.0))
        .await;

    assert!(matches!(outcome, OrderOutcome::Skipped(_)));
    assert!(f.exchange.sandbox_flags.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_zero_price_open_fails() {
    let f = fixture().await;

    let outcome = f
        .open
        .place_open(1, &signal(SignalAction::Open, PositionSide::Long, 0.0))
        .await;

    assert!(matches!(outcome, OrderOutcome::Failed(_)));
    assert!(f.exchange.placed_orders().is_empty());
}

#[tokio::test]
async fn test_close_with_nothing_open_is_skipped_without_writes() {
    let f = fixture().await;
    // 还在 PENDING 的仓位不能平
    let b = bot(1, STRATEGY_ID, "BTC-USDT-SWAP");
    f.ledger
        .seed_user_trade(user_trade(&b, PositionSide::Long, UserTradeStatus::Pending))
        .await;

    let close = SignalAction::Close(CloseReason::Signal);
    let outcome = f
        .close
        .place_close(1, &signal(close, PositionSide::Long, 100.0))
        .await;

    match outcome {
        OrderOutcome::Skipped(reason) => assert_eq!(reason, "nothing to close"),
        other => panic!("unexpected outcome: {}", other),
    }
    assert_eq!(f.ledger.write_count(), 0);
    assert!(f.exchange.placed_orders().is_empty());
}

#[tokio::test]
async fn test_close_short_buys_back_full_quantity() {
    let f = fixture().await;
    let b = bot(1, STRATEGY_ID, "BTC-USDT-SWAP");
    let user_trade_id = f
        .ledger
        .seed_user_trade(user_trade(&b, PositionSide::Short, UserTradeStatus::Open))
        .await;

    let close = SignalAction::Close(CloseReason::StopLoss);
    let outcome = f
        .close
        .place_close(1, &signal(close, PositionSide::Short, 95.0))
        .await;

    let placed = outcome.placed().expect("close should be placed").clone();
    assert_eq!(placed.user_trade_id, user_trade_id);

    let requests = f.exchange.placed_orders();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].side, OrderSide::Buy);
    assert_eq!(requests[0].trade_side, TradeSide::Close);
    assert_eq!(requests[0].position_side, Some(PositionSide::Short));
    assert_relative_eq!(requests[0].amount, 2.0);
    assert_eq!(requests[0].price, Some(95.0));

    let trade = f.ledger.find_user_trade(user_trade_id).await.unwrap().unwrap();
    assert_eq!(trade.status, UserTradeStatus::Closing);
    assert_eq!(trade.exit_price, Some(95.0));

    let orders = f.ledger.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_type, OrderKind::Close);
    assert_eq!(orders[0].user_trade_id, user_trade_id);
    assert_eq!(orders[0].exchange_order_id, placed.exchange_order_id);
}

#[tokio::test]
async fn test_close_long_sells() {
    let f = fixture().await;
    let b = bot(1, STRATEGY_ID, "BTC-USDT-SWAP");
    f.ledger
        .seed_user_trade(user_trade(&b, PositionSide::Long, UserTradeStatus::Open))
        .await;

    let close = SignalAction::Close(CloseReason::TakeProfit);
    let outcome = f
        .close
        .place_close(1, &signal(close, PositionSide::Long, 120.0))
        .await;

    assert!(outcome.is_placed());
    assert_eq!(f.exchange.placed_orders()[0].side, OrderSide::Sell);
}
