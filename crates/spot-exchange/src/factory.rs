//! 계좌 설정 기반 어댑터 생성.

use spot_core::ExchangeSettings;
use std::sync::Arc;
use tracing::info;

use crate::binance::{BinanceConfig, BinanceExchange, BinanceTransport};
use crate::paper::{PaperConfig, PaperExchange};
use crate::traits::{Exchange, ExchangeResult, SymbolMetadata};
use crate::ExchangeError;

/// `ExchangeSettings.name`에 따라 어댑터를 생성합니다.
///
/// - `paper`: 등록된 초기 잔고와 심볼로 `PaperExchange` 생성
/// - `binance`: 주입된 전송 계층으로 `BinanceExchange` 생성
#[derive(Default)]
pub struct ExchangeFactory {
    paper: PaperConfig,
    paper_symbols: Vec<SymbolMetadata>,
    binance_transport: Option<Arc<dyn BinanceTransport>>,
}

impl ExchangeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 모의 거래소 설정.
    pub fn with_paper_config(mut self, config: PaperConfig) -> Self {
        self.paper = config;
        self
    }

    /// 모의 거래소에 심볼 등록.
    pub fn with_paper_symbol(mut self, metadata: SymbolMetadata) -> Self {
        self.paper_symbols.push(metadata);
        self
    }

    /// Binance 전송 계층 주입.
    pub fn with_binance_transport(mut self, transport: Arc<dyn BinanceTransport>) -> Self {
        self.binance_transport = Some(transport);
        self
    }

    /// 설정에 맞는 어댑터를 생성합니다.
    pub fn create(&self, settings: &ExchangeSettings) -> ExchangeResult<Arc<dyn Exchange>> {
        let name = settings.name.to_lowercase();
        let exchange: Arc<dyn Exchange> = match name.as_str() {
            "paper" => Arc::new(
                self.paper_symbols
                    .iter()
                    .cloned()
                    .fold(PaperExchange::new(self.paper.clone()), PaperExchange::with_symbol),
            ),
            "binance" => {
                let transport = self.binance_transport.clone().ok_or_else(|| {
                    ExchangeError::NotSupported("binance adapter requires a transport".into())
                })?;
                Arc::new(BinanceExchange::new(
                    transport,
                    BinanceConfig::from_settings(settings),
                ))
            }
            other => {
                return Err(ExchangeError::NotSupported(format!(
                    "unknown exchange: {}",
                    other
                )))
            }
        };

        info!(
            exchange = exchange.name(),
            account = %settings.account,
            testnet = settings.testnet,
            "거래소 어댑터 생성"
        );
        Ok(exchange)
    }
}
