mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use approx::assert_relative_eq;

use common::*;
use strade::trading::exchange::FetchedOrder;
use strade::trading::ledger::{InMemoryLedger, PositionLedger};
use strade::trading::model::{BotEntity, OrderKind, PositionSide, UserTradeStatus};
use strade::trading::services::order_service::{ReconcileOutcome, ReconcileService};

struct Fixture {
    ledger: Arc<InMemoryLedger>,
    exchange: Arc<ScriptedExchange>,
    service: ReconcileService,
    bot: BotEntity,
}

async fn fixture() -> Fixture {
    let ledger = Arc::new(InMemoryLedger::new());
    seed_strategy(&ledger).await;
    let b = bot(1, STRATEGY_ID, "BTC-USDT-SWAP");
    seed_bot(&ledger, b.clone()).await;
    let exchange = ScriptedExchange::new();
    let service = ReconcileService::new(
        ledger.clone(),
        Arc::new(ScriptedFactory {
            exchange: exchange.clone(),
        }),
    );
    Fixture {
        ledger,
        exchange,
        service,
        bot: b,
    }
}

impl Fixture {
    /// 一笔仓位和它的一条订单记录
    async fn seed(
        &self,
        side: PositionSide,
        status: UserTradeStatus,
        kind: OrderKind,
        order_id: &str,
        order_price: f64,
    ) -> i64 {
        let user_trade_id = self
            .ledger
            .seed_user_trade(user_trade(&self.bot, side, status))
            .await;
        self.ledger
            .seed_order(order_row(user_trade_id, order_id, kind, order_price))
            .await;
        user_trade_id
    }
}

#[tokio::test]
async fn test_filled_open_order_opens_trade() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Long, UserTradeStatus::Pending, OrderKind::Open, "o-1", 100.0)
        .await;
    f.exchange
        .script_fetch("o-1", vec![Ok(fetched("filled", Some(1.5), Some(100.2), Some(100.0)))]);

    let outcome = f.service.reconcile(id, "o-1").await;

    assert_eq!(outcome, ReconcileOutcome::Opened);
    let trade = f.ledger.find_user_trade(id).await.unwrap().unwrap();
    assert_eq!(trade.status, UserTradeStatus::Open);
    assert_relative_eq!(trade.quantity, 1.5);
    assert!(trade.opened_at.is_some());

    let order = &f.ledger.orders().await[0];
    assert_eq!(order.status, "FILLED");
    assert_relative_eq!(order.filled_qty, 1.5);
    assert_eq!(order.requested_qty, Some(2.0));
    assert!(order.raw_response.contains("filled"));
}

#[tokio::test]
async fn test_open_quantity_falls_back_to_amount_then_recorded() {
    let f = fixture().await;
    let by_amount = f
        .seed(PositionSide::Long, UserTradeStatus::Pending, OrderKind::Open, "o-1", 100.0)
        .await;
    let by_record = f
        .seed(PositionSide::Long, UserTradeStatus::Pending, OrderKind::Open, "o-2", 100.0)
        .await;
    f.exchange.script_fetch(
        "o-1",
        vec![Ok(FetchedOrder {
            amount: Some(1.8),
            ..fetched("closed", None, None, None)
        })],
    );
    f.exchange.script_fetch(
        "o-2",
        vec![Ok(FetchedOrder {
            amount: None,
            ..fetched("closed", Some(0.0), None, None)
        })],
    );

    assert_eq!(f.service.reconcile(by_amount, "o-1").await, ReconcileOutcome::Opened);
    assert_eq!(f.service.reconcile(by_record, "o-2").await, ReconcileOutcome::Opened);

    let a = f.ledger.find_user_trade(by_amount).await.unwrap().unwrap();
    assert_relative_eq!(a.quantity, 1.8);
    let b = f.ledger.find_user_trade(by_record).await.unwrap().unwrap();
    assert_relative_eq!(b.quantity, 2.0);
}

#[tokio::test]
async fn test_filled_close_order_settles_long() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Long, UserTradeStatus::Closing, OrderKind::Close, "c-1", 105.0)
        .await;
    f.exchange
        .script_fetch("c-1", vec![Ok(fetched("closed", Some(2.0), Some(110.0), Some(105.0)))]);

    let outcome = f.service.reconcile(id, "c-1").await;

    assert_eq!(outcome, ReconcileOutcome::Closed);
    let trade = f.ledger.find_user_trade(id).await.unwrap().unwrap();
    assert_eq!(trade.status, UserTradeStatus::Closed);
    assert!(trade.closed_at.is_some());
    assert_eq!(trade.exit_price, Some(110.0));
    assert_relative_eq!(trade.realized_pnl.unwrap(), 20.0, epsilon = 1e-9);
    assert_relative_eq!(trade.realized_pnl_pct.unwrap(), 10.0, epsilon = 1e-9);
}

#[tokio::test]
async fn test_short_close_uses_entry_over_exit_formula() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Short, UserTradeStatus::Closing, OrderKind::Close, "c-1", 91.0)
        .await;
    // 没有均价时取委托价
    f.exchange
        .script_fetch("c-1", vec![Ok(fetched("FILLED", Some(2.0), None, Some(90.0)))]);

    assert_eq!(f.service.reconcile(id, "c-1").await, ReconcileOutcome::Closed);

    let trade = f.ledger.find_user_trade(id).await.unwrap().unwrap();
    assert_eq!(trade.exit_price, Some(90.0));
    assert_relative_eq!(trade.realized_pnl.unwrap(), 20.0, epsilon = 1e-9);
    assert_relative_eq!(
        trade.realized_pnl_pct.unwrap(),
        (100.0 / 90.0 - 1.0) * 100.0,
        epsilon = 1e-9
    );
}

#[tokio::test]
async fn test_exit_price_falls_back_to_recorded_order_price() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Long, UserTradeStatus::Closing, OrderKind::Close, "c-1", 104.0)
        .await;
    f.exchange
        .script_fetch("c-1", vec![Ok(fetched("closed", Some(2.0), None, None))]);

    assert_eq!(f.service.reconcile(id, "c-1").await, ReconcileOutcome::Closed);
    let trade = f.ledger.find_user_trade(id).await.unwrap().unwrap();
    assert_eq!(trade.exit_price, Some(104.0));
}

#[tokio::test]
async fn test_live_order_stays_pending() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Long, UserTradeStatus::Pending, OrderKind::Open, "o-1", 100.0)
        .await;
    f.exchange
        .script_fetch("o-1", vec![Ok(fetched("open", Some(0.5), None, Some(100.0)))]);

    let outcome = f.service.reconcile(id, "o-1").await;

    assert_eq!(outcome, ReconcileOutcome::Pending("OPEN".to_string()));
    assert!(outcome.should_retry());
    let trade = f.ledger.find_user_trade(id).await.unwrap().unwrap();
    assert_eq!(trade.status, UserTradeStatus::Pending);
    let order = &f.ledger.orders().await[0];
    assert_eq!(order.status, "OPEN");
    assert_relative_eq!(order.filled_qty, 0.5);
}

#[tokio::test]
async fn test_missing_status_is_recorded_as_unknown() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Long, UserTradeStatus::Pending, OrderKind::Open, "o-1", 100.0)
        .await;
    f.exchange.script_fetch(
        "o-1",
        vec![Ok(FetchedOrder {
            status: None,
            ..fetched("", None, None, None)
        })],
    );

    let outcome = f.service.reconcile(id, "o-1").await;

    assert_eq!(outcome, ReconcileOutcome::Pending("UNKNOWN".to_string()));
    assert_eq!(f.ledger.orders().await[0].status, "UNKNOWN");
}

#[tokio::test]
async fn test_canceled_order_is_terminal() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Long, UserTradeStatus::Pending, OrderKind::Open, "o-1", 100.0)
        .await;
    f.exchange
        .script_fetch("o-1", vec![Ok(fetched("canceled", Some(0.0), None, Some(100.0)))]);

    let outcome = f.service.reconcile(id, "o-1").await;

    assert_eq!(outcome, ReconcileOutcome::Terminal("CANCELED".to_string()));
    assert!(!outcome.should_retry());
    let trade = f.ledger.find_user_trade(id).await.unwrap().unwrap();
    assert_eq!(trade.status, UserTradeStatus::Pending);
}

#[tokio::test]
async fn test_fetch_failure_changes_nothing() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Long, UserTradeStatus::Pending, OrderKind::Open, "o-1", 100.0)
        .await;
    f.exchange
        .script_fetch("o-1", vec![Err("Order does not exist".to_string())]);

    let outcome = f.service.reconcile(id, "o-1").await;

    assert!(matches!(outcome, ReconcileOutcome::FetchFailed(_)));
    assert_eq!(f.ledger.write_count(), 0);
    assert_eq!(f.ledger.orders().await[0].status, "NEW");
}

#[tokio::test]
async fn test_missing_rows_are_skipped() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Long, UserTradeStatus::Pending, OrderKind::Open, "o-1", 100.0)
        .await;

    assert!(matches!(
        f.service.reconcile(999, "o-1").await,
        ReconcileOutcome::Skipped(_)
    ));
    assert!(matches!(
        f.service.reconcile(id, "unknown-order").await,
        ReconcileOutcome::Skipped(_)
    ));
    assert_eq!(f.exchange.fetch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.ledger.write_count(), 0);
}

#[tokio::test]
async fn test_latest_order_row_is_updated() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Long, UserTradeStatus::Pending, OrderKind::Open, "o-1", 100.0)
        .await;
    let newer = f
        .ledger
        .seed_order(order_row(id, "o-1", OrderKind::Open, 101.0))
        .await;
    f.exchange
        .script_fetch("o-1", vec![Ok(fetched("live", Some(0.0), None, None))]);

    f.service.reconcile(id, "o-1").await;

    let orders = f.ledger.orders().await;
    let latest = orders.iter().find(|o| o.id == Some(newer)).unwrap();
    let older = orders.iter().find(|o| o.id != Some(newer)).unwrap();
    assert_eq!(latest.status, "LIVE");
    assert_eq!(older.status, "NEW");
}

#[tokio::test]
async fn test_duplicate_delivery_does_not_reopen() {
    let f = fixture().await;
    let id = f
        .seed(PositionSide::Long, UserTradeStatus::Pending, OrderKind::Open, "o-1", 100.0)
        .await;
    f.exchange
        .script_fetch("o-1", vec![Ok(fetched("filled", Some(2.0), Some(100.0), None))]);

    f.service.reconcile(id, "o-1").await;
    let first = f.ledger.find_user_trade(id).await.unwrap().unwrap();

    assert_eq!(first.status, UserTradeStatus::Open);

    // 平仓下单后，迟到的重复开仓对账不能把仓位改回 OPEN
    f.ledger
        .record_close_placement(id, 105.0, &order_row(id, "c-1", OrderKind::Close, 105.0))
        .await
        .unwrap();
    assert_eq!(f.service.reconcile(id, "o-1").await, ReconcileOutcome::Opened);

    let second = f.ledger.find_user_trade(id).await.unwrap().unwrap();
    assert_eq!(second.status, UserTradeStatus::Closing);
    assert_eq!(first.opened_at, second.opened_at);
}

#[tokio::test]
async fn test_close_settles_only_from_closing() {
    let f = fixture().await;
    let settled = f
        .seed(PositionSide::Long, UserTradeStatus::Closing, OrderKind::Close, "c-1", 105.0)
        .await;
    f.exchange
        .script_fetch("c-1", vec![Ok(fetched("closed", Some(2.0), Some(110.0), Some(105.0)))]);

    assert_eq!(f.service.reconcile(settled, "c-1").await, ReconcileOutcome::Closed);
    let first = f.ledger.find_user_trade(settled).await.unwrap().unwrap();

    // 重复投递：已结算的仓位保持原来的平仓时间和盈亏
    assert_eq!(f.service.reconcile(settled, "c-1").await, ReconcileOutcome::Closed);
    let second = f.ledger.find_user_trade(settled).await.unwrap().unwrap();
    assert_eq!(second.status, UserTradeStatus::Closed);
    assert_eq!(first.closed_at, second.closed_at);
    assert_eq!(first.realized_pnl, second.realized_pnl);

    // 仓位不是 CLOSING 时，成交的平仓单不结算
    let open = f
        .seed(PositionSide::Long, UserTradeStatus::Open, OrderKind::Close, "c-2", 105.0)
        .await;
    f.exchange
        .script_fetch("c-2", vec![Ok(fetched("closed", Some(2.0), Some(120.0), None))]);

    assert_eq!(f.service.reconcile(open, "c-2").await, ReconcileOutcome::Closed);
    let trade = f.ledger.find_user_trade(open).await.unwrap().unwrap();
    assert_eq!(trade.status, UserTradeStatus::Open);
    assert!(trade.closed_at.is_none());
    assert!(trade.realized_pnl.is_none());
}
