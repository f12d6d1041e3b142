//! 계좌 잔고 원장.
//!
//! 거래소 잔고의 로컬 캐시와 심볼별 거래 메타데이터 캐시를 관리합니다.
//! 잔고는 `refresh` 또는 확인된 체결(`apply_fill`)로만 변경됩니다.

use rust_decimal::Decimal;
use serde::Serialize;
use spot_core::{AssetBalance, CoreError, CoreResult, OrderReport, Side, Symbol, TradingMetadata};
use spot_exchange::{Exchange, ExchangeResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 잔고 조회 대상.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceQuery {
    /// 전체 자산
    All,
    /// 단일 자산
    One(String),
    /// 자산 목록
    Many(Vec<String>),
}

impl BalanceQuery {
    /// 단일 자산 조회.
    pub fn one(asset: impl Into<String>) -> Self {
        BalanceQuery::One(asset.into())
    }

    /// 자산 목록 조회.
    pub fn many<I, S>(assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BalanceQuery::Many(assets.into_iter().map(Into::into).collect())
    }
}

/// 잔고 조회 결과.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BalanceView {
    /// 단일 자산 잔고
    One(AssetBalance),
    /// 자산별 잔고 (자산 이름 순)
    Map(BTreeMap<String, AssetBalance>),
}

impl BalanceView {
    /// 자산 잔고를 찾습니다.
    pub fn get(&self, asset: &str) -> Option<&AssetBalance> {
        match self {
            BalanceView::One(b) if b.asset.eq_ignore_ascii_case(asset) => Some(b),
            BalanceView::One(_) => None,
            BalanceView::Map(map) => map.get(&asset.to_uppercase()),
        }
    }

    /// 포함된 자산 수.
    pub fn len(&self) -> usize {
        match self {
            BalanceView::One(_) => 1,
            BalanceView::Map(map) => map.len(),
        }
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<String, AssetBalance>,
    /// 거래소 형식 심볼 -> 메타데이터
    metadata: HashMap<String, TradingMetadata>,
}

impl LedgerState {
    /// 자산 항목을 가져오거나 새로 만듭니다.
    fn entry(&mut self, asset: &str) -> &mut AssetBalance {
        let key = asset.to_uppercase();
        self.balances.entry(key.clone()).or_insert_with(|| {
            debug!(asset = %key, "새 자산 추적 시작");
            AssetBalance::new(key.clone(), Decimal::ZERO, Decimal::ZERO)
        })
    }
}

/// 거래소 잔고 원장.
pub struct BalanceLedger {
    exchange: Arc<dyn Exchange>,
    state: RwLock<LedgerState>,
}

impl BalanceLedger {
    /// 새 원장을 생성합니다. 잔고는 첫 `refresh` 전까지 비어 있습니다.
    pub fn new(exchange: Arc<dyn Exchange>) -> Self {
        Self {
            exchange,
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// 거래소에서 모든 자산의 잔고를 다시 동기화합니다.
    ///
    /// 처음 보는 자산은 추가되고, 스냅샷에 없는 기존 자산은 0으로 설정됩니다.
    /// 캐시된 메타데이터는 유지됩니다. 추적 중인 자산 수를 반환합니다.
    pub async fn refresh(&self) -> ExchangeResult<usize> {
        let snapshot = self.exchange.get_account_balances().await?;

        let mut state = self.state.write().await;
        for balance in state.balances.values_mut() {
            balance.available = Decimal::ZERO;
            balance.pending = Decimal::ZERO;
        }
        for balance in snapshot {
            let entry = state.entry(&balance.asset);
            entry.available = balance.free.max(Decimal::ZERO);
            entry.pending = balance.locked.max(Decimal::ZERO);
        }

        let tracked = state.balances.len();
        debug!(exchange = self.exchange.name(), tracked, "잔고 갱신 완료");
        Ok(tracked)
    }

    /// 잔고를 조회합니다. 추적되지 않는 자산은 `NotFound`로 실패합니다.
    pub async fn get(&self, query: &BalanceQuery) -> CoreResult<BalanceView> {
        let state = self.state.read().await;
        let lookup = |asset: &str| {
            state
                .balances
                .get(&asset.to_uppercase())
                .cloned()
                .ok_or_else(|| CoreError::NotFound(format!("asset {}", asset)))
        };

        match query {
            BalanceQuery::All => Ok(BalanceView::Map(
                state
                    .balances
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )),
            BalanceQuery::One(asset) => lookup(asset).map(BalanceView::One),
            BalanceQuery::Many(assets) => assets
                .iter()
                .map(|asset| lookup(asset).map(|b| (b.asset.clone(), b)))
                .collect::<CoreResult<BTreeMap<_, _>>>()
                .map(BalanceView::Map),
        }
    }

    /// 자산 잔고를 설정합니다. 없으면 새로 만듭니다.
    pub async fn upsert(&self, asset: &str, available: Decimal, pending: Decimal) -> AssetBalance {
        let mut state = self.state.write().await;
        let entry = state.entry(asset);
        entry.available = available.max(Decimal::ZERO);
        entry.pending = pending.max(Decimal::ZERO);
        entry.clone()
    }

    /// 자산 잔고 스냅샷. 추적되지 않는 자산은 0 잔고를 반환합니다.
    pub async fn balance_of(&self, asset: &str) -> AssetBalance {
        let state = self.state.read().await;
        state
            .balances
            .get(&asset.to_uppercase())
            .cloned()
            .unwrap_or_else(|| AssetBalance::new(asset, Decimal::ZERO, Decimal::ZERO))
    }

    /// 자산의 사용 가능 잔고.
    pub async fn available(&self, asset: &str) -> Decimal {
        self.balance_of(asset).await.available
    }

    /// 심볼의 거래 메타데이터를 반환합니다.
    ///
    /// 캐시에 없으면 거래소에서 조회해 세션 동안 캐시합니다.
    /// 한 번 캐시된 값은 교체되지 않습니다.
    pub async fn metadata_for(&self, symbol: &Symbol) -> ExchangeResult<TradingMetadata> {
        let key = symbol.exchange_symbol();
        if let Some(meta) = self.state.read().await.metadata.get(&key) {
            return Ok(meta.clone());
        }

        let fetched = self.exchange.get_symbol_metadata(&key).await?.trading_metadata();

        let mut state = self.state.write().await;
        let meta = state.metadata.entry(key).or_insert_with(|| {
            info!(
                symbol = %fetched.symbol,
                precision = fetched.precision,
                lot_size = %fetched.lot_size,
                "거래 메타데이터 캐시"
            );
            fetched
        });
        Ok(meta.clone())
    }

    /// 자산 항목에 거래 메타데이터를 붙입니다.
    pub async fn attach_metadata(&self, asset: &str, metadata: TradingMetadata) {
        let mut state = self.state.write().await;
        state.entry(asset).metadata = Some(metadata);
    }

    /// 확인된 체결을 잔고에 반영합니다.
    ///
    /// 수수료는 반영하지 않으며 다음 `refresh`에서 맞춰집니다.
    pub async fn apply_fill(&self, symbol: &Symbol, report: &OrderReport) {
        if report.filled_quantity.is_zero() {
            return;
        }

        let mut state = self.state.write().await;
        let (base_delta, quote_delta) = match report.side {
            Side::Buy => (report.filled_quantity, -report.cumulative_quote),
            Side::Sell => (-report.filled_quantity, report.cumulative_quote),
        };

        let base = state.entry(&symbol.base);
        base.available = (base.available + base_delta).max(Decimal::ZERO);
        let quote = state.entry(&symbol.quote);
        quote.available = (quote.available + quote_delta).max(Decimal::ZERO);

        debug!(
            symbol = %symbol,
            side = %report.side,
            order_id = %report.order_id,
            filled = %report.filled_quantity,
            "체결 반영"
        );
    }
}
