//! 모의투자 거래소.
//!
//! 메모리 안에서 잔고와 주문을 관리하는 `Exchange` 구현입니다.
//! 시장가 주문은 설정된 기준 가격(mark)으로 즉시 체결되고,
//! 지정가 주문은 자금을 묶어 대기하다가 기준 가격이 교차하면 지정가로 체결됩니다.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use spot_core::{DecimalExt, OrderAmount, OrderReport, OrderStatusType, Price, Quantity, Side};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::traits::{Balance, CancelReport, Exchange, ExchangeResult, SymbolMetadata};
use crate::ExchangeError;

/// 모의 거래소 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// 자산별 초기 잔고
    pub initial_balances: HashMap<String, Decimal>,
    /// 거래 수수료율 (호가 자산으로 부과, 예: 0.1%의 경우 0.001)
    pub fee_rate: Decimal,
}

impl Default for PaperConfig {
    fn default() -> Self {
        let mut initial_balances = HashMap::new();
        initial_balances.insert("USDT".to_string(), dec!(10000));

        Self {
            initial_balances,
            fee_rate: Decimal::ZERO,
        }
    }
}

impl PaperConfig {
    /// 자산의 초기 잔고를 설정합니다.
    pub fn with_initial_balance(mut self, asset: &str, amount: Decimal) -> Self {
        self.initial_balances.insert(asset.to_uppercase(), amount);
        self
    }

    /// 수수료율을 설정합니다.
    pub fn with_fee_rate(mut self, rate: Decimal) -> Self {
        self.fee_rate = rate;
        self
    }
}

/// 대기 중이거나 완료된 모의 주문.
#[derive(Debug, Clone)]
struct PaperOrder {
    base: String,
    quote: String,
    price: Price,
    quantity: Quantity,
    /// 주문에 묶인 금액 (매수는 호가 자산, 매도는 기준 자산)
    locked: Decimal,
    report: OrderReport,
}

/// 내부 계정 상태.
#[derive(Debug, Default)]
struct PaperState {
    balances: HashMap<String, Balance>,
    orders: HashMap<String, PaperOrder>,
    marks: HashMap<String, Price>,
    next_order_id: u64,
}

impl PaperState {
    fn free(&self, asset: &str) -> Decimal {
        self.balances
            .get(asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO)
    }

    fn update_balance(&mut self, asset: &str, free_delta: Decimal, locked_delta: Decimal) {
        let balance = self
            .balances
            .entry(asset.to_string())
            .or_insert_with(|| Balance::new(asset, Decimal::ZERO, Decimal::ZERO));

        balance.free += free_delta;
        balance.locked += locked_delta;
    }

    fn next_id(&mut self) -> String {
        self.next_order_id += 1;
        self.next_order_id.to_string()
    }
}

/// 메모리 기반 모의 거래소.
pub struct PaperExchange {
    config: PaperConfig,
    symbols: HashMap<String, SymbolMetadata>,
    state: RwLock<PaperState>,
}

impl PaperExchange {
    /// 새로운 모의 거래소를 생성합니다.
    pub fn new(config: PaperConfig) -> Self {
        let balances = config
            .initial_balances
            .iter()
            .map(|(asset, amount)| (asset.clone(), Balance::new(asset.clone(), *amount, Decimal::ZERO)))
            .collect();

        Self {
            config,
            symbols: HashMap::new(),
            state: RwLock::new(PaperState {
                balances,
                ..Default::default()
            }),
        }
    }

    /// 거래 가능한 심볼을 등록합니다.
    pub fn with_symbol(mut self, metadata: SymbolMetadata) -> Self {
        self.symbols.insert(metadata.symbol.clone(), metadata);
        self
    }

    /// 심볼의 기준 가격을 설정하고 교차하는 대기 지정가 주문을 체결합니다.
    ///
    /// 체결된 주문 수를 반환합니다.
    pub async fn set_mark_price(&self, symbol: &str, price: Price) -> usize {
        let mut state = self.state.write().await;
        state.marks.insert(symbol.to_string(), price);

        let crossing: Vec<String> = state
            .orders
            .iter()
            .filter(|(_, o)| o.report.symbol == symbol && o.report.status.is_active())
            .filter(|(_, o)| match o.report.side {
                Side::Buy => price <= o.price,
                Side::Sell => price >= o.price,
            })
            .map(|(id, _)| id.clone())
            .collect();

        for order_id in &crossing {
            self.fill_resting(&mut state, order_id);
        }

        if !crossing.is_empty() {
            debug!(symbol, %price, filled = crossing.len(), "Paper limit orders matched");
        }
        crossing.len()
    }

    fn metadata(&self, symbol: &str) -> ExchangeResult<&SymbolMetadata> {
        self.symbols
            .get(symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))
    }

    fn notional(quantity: Quantity, price: Price) -> ExchangeResult<Decimal> {
        quantity.checked_mul(price).ok_or_else(|| {
            ExchangeError::InvalidQuantity(format!("notional overflow: {} x {}", quantity, price))
        })
    }

    fn check_grid(meta: &SymbolMetadata, quantity: Quantity) -> ExchangeResult<()> {
        if quantity <= Decimal::ZERO
            || !quantity.is_multiple_of(meta.lot_size)
            || quantity.floor_dp(meta.precision) != quantity
        {
            return Err(ExchangeError::InvalidQuantity(format!(
                "{} is not on the {} lot grid (step {}, precision {})",
                quantity, meta.symbol, meta.lot_size, meta.precision
            )));
        }
        Ok(())
    }

    fn new_report(
        order_id: String,
        client_order_id: Option<&str>,
        symbol: &str,
        side: Side,
        order_type: &str,
    ) -> OrderReport {
        OrderReport {
            raw: json!({
                "venue": "paper",
                "orderId": order_id,
                "symbol": symbol,
                "type": order_type,
                "side": side.to_string(),
            }),
            order_id,
            client_order_id: client_order_id.map(str::to_string),
            symbol: symbol.to_string(),
            side,
            status: OrderStatusType::Submitted,
            filled_quantity: Decimal::ZERO,
            cumulative_quote: Decimal::ZERO,
            average_price: None,
            updated_at: Utc::now(),
        }
    }

    fn mark_filled(report: &mut OrderReport, quantity: Quantity, price: Price) {
        report.status = OrderStatusType::Filled;
        report.filled_quantity = quantity;
        report.cumulative_quote = quantity * price;
        report.average_price = Some(price);
        report.updated_at = Utc::now();
    }

    /// 대기 중인 지정가 주문을 지정가로 체결합니다.
    fn fill_resting(&self, state: &mut PaperState, order_id: &str) {
        let Some(mut order) = state.orders.get(order_id).cloned() else {
            return;
        };
        let notional = order.quantity * order.price;

        match order.report.side {
            Side::Buy => {
                state.update_balance(&order.quote, Decimal::ZERO, -order.locked);
                state.update_balance(&order.base, order.quantity, Decimal::ZERO);
            }
            Side::Sell => {
                let fee = notional * self.config.fee_rate;
                state.update_balance(&order.base, Decimal::ZERO, -order.locked);
                state.update_balance(&order.quote, notional - fee, Decimal::ZERO);
            }
        }

        order.locked = Decimal::ZERO;
        Self::mark_filled(&mut order.report, order.quantity, order.price);
        state.orders.insert(order_id.to_string(), order);
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    fn name(&self) -> &str {
        "paper"
    }

    async fn get_account_balances(&self) -> ExchangeResult<Vec<Balance>> {
        let state = self.state.read().await;
        let mut balances: Vec<Balance> = state.balances.values().cloned().collect();
        balances.sort_by(|a, b| a.asset.cmp(&b.asset));
        Ok(balances)
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        amount: OrderAmount,
        client_order_id: Option<&str>,
    ) -> ExchangeResult<OrderReport> {
        let meta = self.metadata(symbol)?;
        let mut state = self.state.write().await;
        let price = *state
            .marks
            .get(symbol)
            .ok_or_else(|| ExchangeError::OrderRejected(format!("no market price for {}", symbol)))?;

        let quantity = match (side, amount) {
            (Side::Buy, OrderAmount::Quote(quote_amount)) => {
                let raw = quote_amount.checked_div(price).ok_or_else(|| {
                    ExchangeError::InvalidQuantity(format!(
                        "quantity overflow: {} / {}",
                        quote_amount, price
                    ))
                })?;
                meta.trading_metadata().round_quantity(raw)
            }
            (_, OrderAmount::Base(quantity)) => quantity,
            (Side::Sell, OrderAmount::Quote(_)) => {
                return Err(ExchangeError::NotSupported(
                    "market sell must be sized in base quantity".into(),
                ))
            }
        };
        Self::check_grid(meta, quantity)?;

        let notional = Self::notional(quantity, price)?;
        let fee = notional * self.config.fee_rate;

        match side {
            Side::Buy => {
                let available = state.free(&meta.quote_asset);
                if available < notional + fee {
                    return Err(ExchangeError::InsufficientBalance(format!(
                        "{} {} available, {} required",
                        available,
                        meta.quote_asset,
                        notional + fee
                    )));
                }
                state.update_balance(&meta.quote_asset, -(notional + fee), Decimal::ZERO);
                state.update_balance(&meta.base_asset, quantity, Decimal::ZERO);
            }
            Side::Sell => {
                let available = state.free(&meta.base_asset);
                if available < quantity {
                    return Err(ExchangeError::InsufficientBalance(format!(
                        "{} {} available, {} required",
                        available, meta.base_asset, quantity
                    )));
                }
                state.update_balance(&meta.base_asset, -quantity, Decimal::ZERO);
                state.update_balance(&meta.quote_asset, notional - fee, Decimal::ZERO);
            }
        }

        let order_id = state.next_id();
        let mut report = Self::new_report(order_id.clone(), client_order_id, symbol, side, "MARKET");
        Self::mark_filled(&mut report, quantity, price);

        info!(
            symbol,
            side = %side,
            order_id = %order_id,
            %quantity,
            %price,
            "Paper market order filled"
        );

        state.orders.insert(
            order_id,
            PaperOrder {
                base: meta.base_asset.clone(),
                quote: meta.quote_asset.clone(),
                price,
                quantity,
                locked: Decimal::ZERO,
                report: report.clone(),
            },
        );
        Ok(report)
    }

    async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        price: Price,
        quantity: Quantity,
        client_order_id: Option<&str>,
    ) -> ExchangeResult<OrderReport> {
        let meta = self.metadata(symbol)?;
        if price <= Decimal::ZERO {
            return Err(ExchangeError::OrderRejected(format!("invalid price {}", price)));
        }
        Self::check_grid(meta, quantity)?;

        let mut state = self.state.write().await;

        let (lock_asset, locked) = match side {
            Side::Buy => {
                let notional = Self::notional(quantity, price)?;
                (&meta.quote_asset, notional + notional * self.config.fee_rate)
            }
            Side::Sell => (&meta.base_asset, quantity),
        };
        let available = state.free(lock_asset);
        if available < locked {
            return Err(ExchangeError::InsufficientBalance(format!(
                "{} {} available, {} required",
                available, lock_asset, locked
            )));
        }
        state.update_balance(lock_asset, -locked, locked);

        let order_id = state.next_id();
        state.orders.insert(
            order_id.clone(),
            PaperOrder {
                base: meta.base_asset.clone(),
                quote: meta.quote_asset.clone(),
                price,
                quantity,
                locked,
                report: Self::new_report(order_id.clone(), client_order_id, symbol, side, "LIMIT"),
            },
        );

        let crosses = state.marks.get(symbol).is_some_and(|mark| match side {
            Side::Buy => *mark <= price,
            Side::Sell => *mark >= price,
        });
        if crosses {
            self.fill_resting(&mut state, &order_id);
        }

        let report = state
            .orders
            .get(&order_id)
            .map(|o| o.report.clone())
            .ok_or_else(|| ExchangeError::OrderNotFound(order_id.clone()))?;

        debug!(
            symbol,
            side = %side,
            order_id = %order_id,
            status = %report.status,
            "Paper limit order placed"
        );
        Ok(report)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<CancelReport> {
        let mut state = self.state.write().await;
        let mut order = state
            .orders
            .get(order_id)
            .filter(|o| o.report.symbol == symbol)
            .cloned()
            .ok_or_else(|| ExchangeError::OrderNotFound(format!("{} {}", symbol, order_id)))?;

        if order.report.status.is_active() {
            let asset = match order.report.side {
                Side::Buy => order.quote.clone(),
                Side::Sell => order.base.clone(),
            };
            state.update_balance(&asset, order.locked, -order.locked);
            order.locked = Decimal::ZERO;
            order.report.status = OrderStatusType::Cancelled;
            order.report.updated_at = Utc::now();
            state.orders.insert(order_id.to_string(), order.clone());
            info!(symbol, order_id, "Paper order cancelled");
        }

        Ok(CancelReport {
            order_id: order.report.order_id.clone(),
            symbol: order.report.symbol.clone(),
            status: order.report.status,
            raw: order.report.raw.clone(),
        })
    }

    async fn get_symbol_metadata(&self, symbol: &str) -> ExchangeResult<SymbolMetadata> {
        self.metadata(symbol).cloned()
    }

    async fn get_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<OrderReport> {
        let state = self.state.read().await;
        state
            .orders
            .get(order_id)
            .filter(|o| o.report.symbol == symbol)
            .map(|o| o.report.clone())
            .ok_or_else(|| ExchangeError::OrderNotFound(format!("{} {}", symbol, order_id)))
    }
}
