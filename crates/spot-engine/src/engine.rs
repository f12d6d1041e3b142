//! 계좌 엔진.
//!
//! 하나의 거래소 어댑터, 잔고 원장, 리스크 설정을 묶어
//! 전략이 호출하는 `buy`/`sell`/`get_balances`/`cancel_order`를 제공합니다.
//!
//! 같은 자산을 소비하는 거래는 자산별 락으로 직렬화됩니다.
//! 매수는 호가 자산, 매도는 기준 자산의 락을 잡고 갱신, 사이징, 제출을 수행합니다.

use rust_decimal::Decimal;
use spot_core::{trading_span, OrderRequest, Price, Quantity, Side, Symbol};
use spot_core::ExchangeSettings;
use spot_exchange::{CancelReport, Exchange, ExchangeError, ExchangeFactory};
use spot_risk::{BuyContext, PositionSizer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn, Instrument};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{BalanceLedger, BalanceQuery, BalanceView};
use crate::result::{FailureReason, TradeResult};
use crate::submitter::{OrderSubmitter, SubmitOutcome};

/// 거래소 계좌 하나에 묶인 실행 엔진.
pub struct AccountEngine {
    account: String,
    config: EngineConfig,
    exchange: Arc<dyn Exchange>,
    ledger: BalanceLedger,
    sizer: PositionSizer,
    submitter: OrderSubmitter,
    /// 자산 -> 거래 직렬화 락
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// 비즈니스 실패는 `TradeResult`로, 치명적 에러는 `Err`로 분리합니다.
fn exchange_failure(err: ExchangeError) -> EngineResult<FailureReason> {
    if err.is_fatal() {
        Err(EngineError::Exchange(err))
    } else {
        Ok(FailureReason::from_exchange(&err))
    }
}

impl AccountEngine {
    /// 새 엔진을 생성합니다. 네트워크 호출은 하지 않습니다.
    pub fn new(
        account: impl Into<String>,
        exchange: Arc<dyn Exchange>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.risk.validate()?;

        Ok(Self {
            account: account.into(),
            ledger: BalanceLedger::new(exchange.clone()),
            sizer: PositionSizer::new(config.risk.clone()),
            submitter: OrderSubmitter::new(exchange.clone(), config.poll),
            exchange,
            config,
            locks: StdMutex::new(HashMap::new()),
        })
    }

    /// 엔진을 생성하고 초기 잔고를 동기화합니다.
    ///
    /// 거래소에 전혀 연결할 수 없으면 치명적 에러로 실패합니다.
    pub async fn connect(
        account: impl Into<String>,
        exchange: Arc<dyn Exchange>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let engine = Self::new(account, exchange, config)?;
        let tracked = engine
            .ledger
            .refresh()
            .await
            .map_err(|source| EngineError::Connect {
                account: engine.account.clone(),
                source,
            })?;

        info!(
            account = %engine.account,
            exchange = engine.exchange.name(),
            assets = tracked,
            "계좌 연결 완료"
        );
        Ok(engine)
    }

    /// 계좌 설정으로 어댑터를 생성하고 연결합니다.
    ///
    /// 알 수 없는 거래소 이름이나 누락된 전송 계층은 연결 실패로 처리됩니다.
    pub async fn open(
        settings: &ExchangeSettings,
        factory: &ExchangeFactory,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let exchange = factory
            .create(settings)
            .map_err(|source| EngineError::Connect {
                account: settings.account.clone(),
                source,
            })?;
        Self::connect(settings.account.clone(), exchange, config).await
    }

    /// 계좌 식별자.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// 엔진 설정.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 잔고 원장.
    pub fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    /// 빈 호가 통화는 설정의 기본 호가 통화로 대체합니다.
    fn resolve_quote<'a>(&'a self, quote: &'a str) -> &'a str {
        if quote.trim().is_empty() {
            &self.config.default_quote
        } else {
            quote
        }
    }

    async fn lock_asset(&self, asset: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks
                .entry(asset.to_uppercase())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// 리스크 예산 안에서 매수합니다.
    ///
    /// 지정가가 없으면 목표 금액만큼 시장가 매수하고, 있으면 금액을 지정가로 나눈
    /// 수량으로 지정가 매수합니다. 전량 체결되지 않으면 실패로 보고됩니다.
    /// `quote`가 비어 있으면 설정의 `default_quote`를 사용합니다.
    pub async fn buy(
        &self,
        symbol: &str,
        quote: &str,
        limit_price: Option<Price>,
    ) -> EngineResult<TradeResult> {
        let quote = self.resolve_quote(quote);
        let span = trading_span!("buy", self.account, symbol, Side::Buy);
        self.buy_inner(symbol, quote, limit_price)
            .instrument(span)
            .await
    }

    async fn buy_inner(
        &self,
        pair: &str,
        quote: &str,
        limit_price: Option<Price>,
    ) -> EngineResult<TradeResult> {
        let symbol = match Symbol::from_pair(pair, quote) {
            Ok(symbol) => symbol,
            Err(e) => {
                return Ok(TradeResult::failure(
                    pair,
                    Side::Buy,
                    FailureReason::Validation(e.to_string()),
                ))
            }
        };
        let label = symbol.to_string();
        let fail = |reason: FailureReason| Ok(TradeResult::failure(label.clone(), Side::Buy, reason));

        if let Some(price) = limit_price.filter(|p| *p <= Decimal::ZERO) {
            return fail(FailureReason::Validation(format!(
                "limit price must be positive: {}",
                price
            )));
        }

        let _guard = self.lock_asset(&symbol.quote).await;

        if let Err(e) = self.ledger.refresh().await {
            return fail(exchange_failure(e)?);
        }
        let balance = self.ledger.balance_of(&symbol.quote).await;

        // 최소 잔고 미달이면 메타데이터 조회나 주문 없이 종료
        if let Err(e) = self
            .sizer
            .check_minimum(&symbol.quote, balance.available, balance.pending)
        {
            info!(available = %balance.available, reason = %e, "매수 건너뜀");
            return fail(e.into());
        }

        let metadata = match self.ledger.metadata_for(&symbol).await {
            Ok(meta) => meta,
            Err(e) => return fail(exchange_failure(e)?),
        };

        let sizing = match self.sizer.size_buy(&BuyContext {
            quote: &symbol.quote,
            available: balance.available,
            pending: balance.pending,
            metadata: &metadata,
            limit_price,
        }) {
            Ok(sizing) => sizing,
            Err(e) => {
                info!(reason = %e, "매수 사이징 실패");
                return fail(e.into());
            }
        };

        let request = match limit_price {
            Some(price) => OrderRequest::limit_buy(symbol.clone(), sizing.amount.value(), price),
            None => OrderRequest::market_buy_quote(symbol.clone(), sizing.amount.value()),
        };

        match self.submitter.submit(request).await {
            SubmitOutcome::Accepted(order) => {
                let Some(report) = order.last_report else {
                    return fail(FailureReason::ExchangeError("missing order report".into()));
                };
                self.ledger.apply_fill(&symbol, &report).await;
                self.ledger.attach_metadata(&symbol.base, metadata).await;
                info!(
                    order_id = %report.order_id,
                    filled = %report.filled_quantity,
                    spend = %sizing.spend,
                    "매수 체결"
                );
                Ok(TradeResult::success(label.clone(), Side::Buy, report)
                    .with_requested(sizing.amount.value()))
            }
            SubmitOutcome::Failed { reason, .. } => {
                warn!(%reason, "매수 실패");
                Ok(TradeResult::failure(label.clone(), Side::Buy, reason)
                    .with_requested(sizing.amount.value()))
            }
            SubmitOutcome::Fatal(e) => Err(EngineError::Exchange(e)),
        }
    }

    /// 기준 자산을 시장가로 매도합니다.
    ///
    /// 수량을 지정하지 않으면 사용 가능 잔고 전체를 로트 그리드로 내림해 매도합니다.
    pub async fn sell(
        &self,
        symbol: &str,
        quote: &str,
        quantity: Option<Quantity>,
    ) -> EngineResult<TradeResult> {
        let quote = self.resolve_quote(quote);
        let span = trading_span!("sell", self.account, symbol, Side::Sell);
        self.sell_inner(symbol, quote, quantity)
            .instrument(span)
            .await
    }

    async fn sell_inner(
        &self,
        pair: &str,
        quote: &str,
        quantity: Option<Quantity>,
    ) -> EngineResult<TradeResult> {
        let symbol = match Symbol::from_pair(pair, quote) {
            Ok(symbol) => symbol,
            Err(e) => {
                return Ok(TradeResult::failure(
                    pair,
                    Side::Sell,
                    FailureReason::Validation(e.to_string()),
                ))
            }
        };
        let label = symbol.to_string();
        let fail = |reason: FailureReason| Ok(TradeResult::failure(label.clone(), Side::Sell, reason));

        if let Some(q) = quantity.filter(|q| *q <= Decimal::ZERO) {
            return fail(FailureReason::Validation(format!(
                "sell quantity must be positive: {}",
                q
            )));
        }

        let _guard = self.lock_asset(&symbol.base).await;

        if let Err(e) = self.ledger.refresh().await {
            return fail(exchange_failure(e)?);
        }
        let balance = self.ledger.balance_of(&symbol.base).await;

        // 매수 때 붙여 둔 메타데이터가 있으면 재조회하지 않음
        let metadata = match balance
            .metadata
            .clone()
            .filter(|m| m.symbol == symbol.exchange_symbol())
        {
            Some(meta) => meta,
            None => match self.ledger.metadata_for(&symbol).await {
                Ok(meta) => meta,
                Err(e) => return fail(exchange_failure(e)?),
            },
        };

        let amount = match self.sizer.size_sell(balance.available, quantity, &metadata) {
            Ok(amount) => amount,
            Err(e) => {
                info!(available = %balance.available, reason = %e, "매도 사이징 실패");
                return fail(e.into());
            }
        };

        match self
            .submitter
            .submit(OrderRequest::market_sell(symbol.clone(), amount))
            .await
        {
            SubmitOutcome::Accepted(order) => {
                let Some(report) = order.last_report else {
                    return fail(FailureReason::ExchangeError("missing order report".into()));
                };
                self.ledger.apply_fill(&symbol, &report).await;
                info!(
                    order_id = %report.order_id,
                    status = %report.status,
                    filled = %report.filled_quantity,
                    "매도 수락"
                );
                Ok(TradeResult::success(label.clone(), Side::Sell, report).with_requested(amount))
            }
            SubmitOutcome::Failed { reason, .. } => {
                warn!(%reason, "매도 실패");
                Ok(TradeResult::failure(label.clone(), Side::Sell, reason).with_requested(amount))
            }
            SubmitOutcome::Fatal(e) => Err(EngineError::Exchange(e)),
        }
    }

    /// 호가 통화를 제외한 모든 자산을 매도합니다.
    ///
    /// 자산마다 하나의 결과를 반환하며, 로트 단위 미만의 잔량은
    /// 해당 자산의 `PrecisionRejected` 결과로 보고됩니다.
    pub async fn sell_all(&self, quote: &str) -> EngineResult<Vec<TradeResult>> {
        let quote = self.resolve_quote(quote);
        if let Err(e) = self.ledger.refresh().await {
            let reason = exchange_failure(e)?;
            return Ok(vec![TradeResult::failure(quote, Side::Sell, reason)]);
        }

        let assets: Vec<String> = match self.ledger.get(&BalanceQuery::All).await {
            Ok(BalanceView::Map(map)) => map
                .into_values()
                .filter(|b| !b.asset.eq_ignore_ascii_case(quote) && b.available > Decimal::ZERO)
                .map(|b| b.asset)
                .collect(),
            _ => Vec::new(),
        };

        info!(quote, count = assets.len(), "전체 매도 시작");

        let mut results = Vec::with_capacity(assets.len());
        for asset in assets {
            let pair = format!("{}/{}", asset, quote);
            results.push(self.sell(&pair, quote, None).await?);
        }
        Ok(results)
    }

    /// 잔고를 갱신한 뒤 조회합니다.
    ///
    /// 추적되지 않는 자산은 `NotFound` 실패로 반환됩니다.
    pub async fn get_balances(
        &self,
        query: BalanceQuery,
    ) -> EngineResult<Result<BalanceView, FailureReason>> {
        if let Err(e) = self.ledger.refresh().await {
            return Ok(Err(exchange_failure(e)?));
        }
        Ok(self
            .ledger
            .get(&query)
            .await
            .map_err(|e| FailureReason::NotFound(e.to_string())))
    }

    /// 주문을 취소합니다. 진행 중인 제출을 중단하지 않으며 거래 락을 잡지 않습니다.
    pub async fn cancel_order(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> EngineResult<Result<CancelReport, FailureReason>> {
        match self.submitter.cancel(symbol, order_id).await {
            Ok(report) => Ok(Ok(report)),
            Err(ExchangeError::OrderNotFound(msg)) => Ok(Err(FailureReason::NotFound(msg))),
            Err(e) => Ok(Err(exchange_failure(e)?)),
        }
    }
}
