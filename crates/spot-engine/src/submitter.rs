//! 주문 제출 및 해결.
//!
//! 제출기는 주문당 정확히 한 번 거래소에 주문을 넣고, 정해진 시간 예산 안에서
//! 최종 상태까지 폴링합니다. 예산이 끝나도 열려 있으면 최대 한 번 취소합니다.
//! 자동 재시도는 하지 않습니다.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use spot_core::{Order, OrderRequest, OrderStatusType, OrderType, Side};
use spot_exchange::{CancelReport, Exchange, ExchangeError, ExchangeResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::result::FailureReason;

/// 주문 해결 폴링 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// 폴링 시간 예산 (밀리초, 0이면 폴링하지 않음)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// 폴링 간격 (밀리초)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// 예산 종료 시 미체결 주문 취소 여부
    #[serde(default = "default_cancel_unfilled")]
    pub cancel_unfilled: bool,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_interval_ms() -> u64 {
    500
}

fn default_cancel_unfilled() -> bool {
    true
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            interval_ms: default_interval_ms(),
            cancel_unfilled: default_cancel_unfilled(),
        }
    }
}

impl PollPolicy {
    /// 폴링 없이 첫 응답만 사용하는 정책.
    pub fn immediate() -> Self {
        Self {
            timeout_ms: 0,
            ..Default::default()
        }
    }

    /// 미체결 주문 취소 여부를 설정합니다.
    pub fn with_cancel_unfilled(mut self, cancel: bool) -> Self {
        self.cancel_unfilled = cancel;
        self
    }
}

/// 제출 결과.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// 매수는 전량 체결, 매도는 거래소가 수락
    Accepted(Order),
    /// 비즈니스 실패. 주문이 만들어졌으면 함께 전달됩니다
    Failed {
        order: Box<Order>,
        reason: FailureReason,
    },
    /// 호출자에게 올려야 하는 치명적 어댑터 에러
    Fatal(ExchangeError),
}

impl SubmitOutcome {
    /// 성공 여부.
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted(_))
    }
}

/// 주문 제출기.
pub struct OrderSubmitter {
    exchange: Arc<dyn Exchange>,
    policy: PollPolicy,
}

impl OrderSubmitter {
    /// 새 제출기를 생성합니다.
    pub fn new(exchange: Arc<dyn Exchange>, policy: PollPolicy) -> Self {
        Self { exchange, policy }
    }

    /// 폴링 정책.
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// 주문을 제출하고 최종 상태까지 해결합니다.
    pub async fn submit(&self, request: OrderRequest) -> SubmitOutcome {
        let mut order = Order::from_request(request);

        if let Err(e) = order.request.validate() {
            order.status = OrderStatusType::Rejected;
            return SubmitOutcome::Failed {
                order: Box::new(order),
                reason: FailureReason::Validation(e.to_string()),
            };
        }

        let symbol = order.request.symbol.exchange_symbol();
        let side = order.request.side;

        let placed = self.place(&order).await;
        let report = match placed {
            Ok(report) => report,
            Err(e) if e.is_fatal() => return SubmitOutcome::Fatal(e),
            Err(e) => {
                warn!(symbol = %symbol, side = %side, error = %e, "주문 제출 실패");
                order.status = OrderStatusType::Rejected;
                return SubmitOutcome::Failed {
                    order: Box::new(order),
                    reason: FailureReason::from_exchange(&e),
                };
            }
        };

        info!(
            symbol = %symbol,
            side = %side,
            order_id = %report.order_id,
            status = %report.status,
            "주문 제출됨"
        );
        order.apply_report(report);

        if let Err(e) = self.resolve(&mut order).await {
            return SubmitOutcome::Fatal(e);
        }

        Self::classify(order)
    }

    /// 주문을 취소합니다. 거래소 응답을 그대로 반환합니다.
    pub async fn cancel(&self, symbol: &str, order_id: &str) -> ExchangeResult<CancelReport> {
        let report = self.exchange.cancel_order(symbol, order_id).await?;
        info!(symbol, order_id, status = %report.status, "주문 취소 요청 완료");
        Ok(report)
    }

    async fn place(&self, order: &Order) -> ExchangeResult<spot_core::OrderReport> {
        let request = &order.request;
        let symbol = request.symbol.exchange_symbol();
        let client_id = request.client_order_id.as_deref();

        match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) => {
                self.exchange
                    .place_limit_order(&symbol, request.side, price, request.amount.value(), client_id)
                    .await
            }
            _ => {
                self.exchange
                    .place_market_order(&symbol, request.side, request.amount, client_id)
                    .await
            }
        }
    }

    /// 시간 예산 안에서 폴링하고, 필요하면 한 번 취소합니다.
    ///
    /// 치명적 에러만 `Err`로 반환합니다.
    async fn resolve(&self, order: &mut Order) -> ExchangeResult<()> {
        let Some(order_id) = order.exchange_order_id.clone() else {
            return Ok(());
        };
        let symbol = order.request.symbol.exchange_symbol();

        let deadline = Instant::now() + Duration::from_millis(self.policy.timeout_ms);
        let interval = Duration::from_millis(self.policy.interval_ms.max(1));

        while !order.is_final() && Instant::now() < deadline {
            tokio::time::sleep(interval.min(deadline.saturating_duration_since(Instant::now()))).await;

            match self.exchange.get_order(&symbol, &order_id).await {
                Ok(report) => {
                    debug!(symbol = %symbol, order_id = %order_id, status = %report.status, "주문 상태 폴링");
                    order.apply_report(report);
                }
                Err(ExchangeError::NotSupported(_)) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(symbol = %symbol, order_id = %order_id, error = %e, "주문 상태 조회 실패"),
            }
        }

        if order.is_final() || !self.policy.cancel_unfilled {
            return Ok(());
        }

        match self.exchange.cancel_order(&symbol, &order_id).await {
            Ok(cancel) => {
                info!(symbol = %symbol, order_id = %order_id, status = %cancel.status, "미체결 주문 취소");
                if cancel.status.is_final() {
                    order.status = cancel.status;
                    order.updated_at = Utc::now();
                    if let Some(last) = order.last_report.as_mut() {
                        last.status = cancel.status;
                        last.updated_at = order.updated_at;
                    }
                }
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(symbol = %symbol, order_id = %order_id, error = %e, "미체결 주문 취소 실패");
                Ok(())
            }
        }
    }

    /// 매수는 FILLED만 성공이고, 매도는 거래소가 수락했으면 성공입니다.
    fn classify(order: Order) -> SubmitOutcome {
        let accepted = match order.request.side {
            Side::Buy => order.status == OrderStatusType::Filled,
            Side::Sell => {
                let filled = order
                    .last_report
                    .as_ref()
                    .map(|r| !r.filled_quantity.is_zero())
                    .unwrap_or(false);
                match order.status {
                    OrderStatusType::Rejected => false,
                    OrderStatusType::Cancelled => filled,
                    _ => true,
                }
            }
        };

        if accepted {
            return SubmitOutcome::Accepted(order);
        }

        match order.last_report.clone() {
            Some(report) => SubmitOutcome::Failed {
                order: Box::new(order),
                reason: FailureReason::Unfilled(report),
            },
            None => SubmitOutcome::Failed {
                reason: FailureReason::ExchangeError(format!("order ended as {}", order.status)),
                order: Box::new(order),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use spot_core::{OrderAmount, OrderReport, Price, Quantity, Symbol};
    use spot_exchange::{Balance, PaperConfig, PaperExchange, SymbolMetadata};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn paper() -> Arc<PaperExchange> {
        Arc::new(
            PaperExchange::new(PaperConfig::default().with_initial_balance("USDT", dec!(1000)))
                .with_symbol(SymbolMetadata {
                    symbol: "BTCUSDT".into(),
                    base_asset: "BTC".into(),
                    quote_asset: "USDT".into(),
                    precision: 8,
                    lot_size: dec!(0.001),
                    filters: serde_json::Value::Null,
                }),
        )
    }

    fn btc() -> Symbol {
        Symbol::new("BTC", "USDT")
    }

    /// 모든 주문에 고정된 상태와 체결 수량으로 응답하는 거래소.
    struct ScriptedExchange {
        status: OrderStatusType,
        filled: Decimal,
        cancels: AtomicUsize,
    }

    impl ScriptedExchange {
        fn new(status: OrderStatusType, filled: Decimal) -> Arc<Self> {
            Arc::new(Self {
                status,
                filled,
                cancels: AtomicUsize::new(0),
            })
        }

        fn report(&self, symbol: &str, side: Side) -> OrderReport {
            OrderReport {
                order_id: "1".to_string(),
                client_order_id: None,
                symbol: symbol.to_string(),
                side,
                status: self.status,
                filled_quantity: self.filled,
                cumulative_quote: self.filled * dec!(20000),
                average_price: (!self.filled.is_zero()).then_some(dec!(20000)),
                updated_at: Utc::now(),
                raw: serde_json::Value::Null,
            }
        }
    }

    #[async_trait]
    impl Exchange for ScriptedExchange {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn get_account_balances(&self) -> ExchangeResult<Vec<Balance>> {
            Ok(Vec::new())
        }

        async fn place_market_order(
            &self,
            symbol: &str,
            side: Side,
            _amount: OrderAmount,
            _client_order_id: Option<&str>,
        ) -> ExchangeResult<OrderReport> {
            Ok(self.report(symbol, side))
        }

        async fn place_limit_order(
            &self,
            symbol: &str,
            side: Side,
            _price: Price,
            _quantity: Quantity,
            _client_order_id: Option<&str>,
        ) -> ExchangeResult<OrderReport> {
            Ok(self.report(symbol, side))
        }

        async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<CancelReport> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(CancelReport {
                order_id: order_id.to_string(),
                symbol: symbol.to_string(),
                status: OrderStatusType::Cancelled,
                raw: serde_json::Value::Null,
            })
        }

        async fn get_symbol_metadata(&self, symbol: &str) -> ExchangeResult<SymbolMetadata> {
            Err(ExchangeError::SymbolNotFound(symbol.to_string()))
        }
    }

    fn unfilled_report(outcome: SubmitOutcome) -> OrderReport {
        match outcome {
            SubmitOutcome::Failed {
                reason: FailureReason::Unfilled(report),
                ..
            } => report,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_market_buy_filled() {
        let exchange = paper();
        exchange.set_mark_price("BTCUSDT", dec!(20000)).await;
        let submitter = OrderSubmitter::new(exchange, PollPolicy::default());

        let outcome = submitter
            .submit(OrderRequest::market_buy_quote(btc(), dec!(100)))
            .await;

        match outcome {
            SubmitOutcome::Accepted(order) => {
                assert_eq!(order.status, OrderStatusType::Filled);
                assert_eq!(order.last_report.unwrap().filled_quantity, dec!(0.005));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_locally() {
        let submitter = OrderSubmitter::new(paper(), PollPolicy::default());

        let outcome = submitter
            .submit(OrderRequest::market_sell(btc(), dec!(-1)))
            .await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Failed {
                reason: FailureReason::Validation(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_exchange_precision_rejection_is_surfaced() {
        let exchange = paper();
        exchange.set_mark_price("BTCUSDT", dec!(20000)).await;
        let submitter = OrderSubmitter::new(exchange, PollPolicy::default());

        let outcome = submitter
            .submit(OrderRequest::limit_buy(btc(), dec!(0.0015), dec!(20000)))
            .await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Failed {
                reason: FailureReason::PrecisionRejected(_),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unfilled_limit_buy_cancelled_after_budget() {
        let exchange = paper();
        exchange.set_mark_price("BTCUSDT", dec!(25000)).await;
        let policy = PollPolicy {
            timeout_ms: 2_000,
            interval_ms: 500,
            cancel_unfilled: true,
        };
        let submitter = OrderSubmitter::new(exchange.clone(), policy);

        let outcome = submitter
            .submit(OrderRequest::limit_buy(btc(), dec!(0.01), dec!(20000)))
            .await;

        let report = match outcome {
            SubmitOutcome::Failed {
                reason: FailureReason::Unfilled(report),
                ..
            } => report,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(report.status, OrderStatusType::Cancelled);

        // 취소로 묶였던 금액이 풀려야 한다
        let usdt = exchange
            .get_account_balances()
            .await
            .unwrap()
            .into_iter()
            .find(|b| b.asset == "USDT")
            .unwrap();
        assert_eq!(usdt.free, dec!(1000));
    }

    #[tokio::test]
    async fn test_resting_sell_is_accepted() {
        let exchange = Arc::new(
            PaperExchange::new(PaperConfig::default().with_initial_balance("BTC", dec!(1)))
                .with_symbol(SymbolMetadata {
                    symbol: "BTCUSDT".into(),
                    base_asset: "BTC".into(),
                    quote_asset: "USDT".into(),
                    precision: 8,
                    lot_size: dec!(0.001),
                    filters: serde_json::Value::Null,
                }),
        );
        let submitter = OrderSubmitter::new(exchange, PollPolicy::immediate().with_cancel_unfilled(false));

        let outcome = submitter
            .submit(OrderRequest::limit_sell(btc(), dec!(0.5), dec!(30000)))
            .await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_partially_filled_buy_is_unfilled() {
        let exchange = ScriptedExchange::new(OrderStatusType::PartiallyFilled, dec!(0.002));
        let policy = PollPolicy::immediate().with_cancel_unfilled(false);
        let submitter = OrderSubmitter::new(exchange.clone(), policy);

        let outcome = submitter
            .submit(OrderRequest::limit_buy(btc(), dec!(0.005), dec!(20000)))
            .await;

        let report = unfilled_report(outcome);
        assert_eq!(report.status, OrderStatusType::PartiallyFilled);
        assert_eq!(report.filled_quantity, dec!(0.002));
        assert_eq!(exchange.cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_sell_is_failure() {
        let exchange = ScriptedExchange::new(OrderStatusType::Rejected, Decimal::ZERO);
        let submitter = OrderSubmitter::new(exchange, PollPolicy::immediate());

        let outcome = submitter
            .submit(OrderRequest::market_sell(btc(), dec!(0.005)))
            .await;
        assert_eq!(unfilled_report(outcome).status, OrderStatusType::Rejected);
    }

    #[tokio::test]
    async fn test_cancelled_sell_without_fill_is_failure() {
        let exchange = ScriptedExchange::new(OrderStatusType::Cancelled, Decimal::ZERO);
        let submitter = OrderSubmitter::new(exchange, PollPolicy::immediate());

        let outcome = submitter
            .submit(OrderRequest::market_sell(btc(), dec!(0.005)))
            .await;
        assert_eq!(unfilled_report(outcome).status, OrderStatusType::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_sell_with_partial_fill_is_accepted() {
        let exchange = ScriptedExchange::new(OrderStatusType::Cancelled, dec!(0.003));
        let submitter = OrderSubmitter::new(exchange.clone(), PollPolicy::immediate());

        let outcome = submitter
            .submit(OrderRequest::market_sell(btc(), dec!(0.005)))
            .await;

        match outcome {
            SubmitOutcome::Accepted(order) => {
                assert_eq!(order.last_report.unwrap().filled_quantity, dec!(0.003));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(exchange.cancels.load(Ordering::SeqCst), 0);
    }
}
