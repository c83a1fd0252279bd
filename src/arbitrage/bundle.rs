use anyhow::{anyhow, Result};
use bigdecimal::BigDecimal;
use ethers::{
    abi::{encode, Abi, Token},
    contract::BaseContract,
    types::{transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, I256, U256},
};
use std::{str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    blockchain::within,
    config::ArbitrageParams,
    dex::NativePriceSource,
    errors::SkipReason,
    types::{to_decimal, Bundle, BundleEconomics, Call, Opportunity},
};

const BASIS_POINTS: u64 = 10_000;

fn executor_abi() -> Result<Abi> {
    let abi: Abi = serde_json::from_str(
        r#"
        [
            {
                "inputs": [
                    {"internalType": "address", "name": "asset", "type": "address"},
                    {"internalType": "uint256", "name": "amount", "type": "uint256"},
                    {"internalType": "bytes", "name": "params", "type": "bytes"}
                ],
                "name": "flashloan",
                "outputs": [],
                "stateMutability": "nonpayable",
                "type": "function"
            }
        ]
        "#,
    )?;
    Ok(abi)
}

/// Borrow fee, native conversion and block-producer incentive for a trade.
/// The conversion truncates toward zero; the incentive division does too.
pub fn compute_economics(
    volume: U256,
    profit: I256,
    native_per_reference: &BigDecimal,
    borrow_fee_bps: u64,
    incentive_rate_pct: u64,
) -> Result<BundleEconomics> {
    let fee = volume * U256::from(borrow_fee_bps) / U256::from(BASIS_POINTS);
    let profit_after_fee = profit - I256::from_raw(fee);

    let scaled = BigDecimal::from_str(&profit_after_fee.to_string())? * native_per_reference;
    let (digits, _) = scaled.with_scale(0).into_bigint_and_exponent();
    let converted_profit = I256::from_dec_str(&digits.to_string())
        .map_err(|e| anyhow!("Converted profit out of range: {:?}", e))?;

    let incentive = converted_profit * I256::from_raw(U256::from(incentive_rate_pct))
        / I256::from_raw(U256::from(100u64));
    let take_home = converted_profit - incentive;

    Ok(BundleEconomics {
        fee,
        profit_after_fee,
        converted_profit,
        incentive,
        take_home,
    })
}

/// ABI-encodes `(uint256 incentive, address[] targets, bytes[] payloads)` for
/// the executor contract.
pub fn encode_payload(incentive: U256, calls: &[Call]) -> Bytes {
    let targets = calls.iter().map(|call| Token::Address(call.target)).collect();
    let payloads = calls.iter().map(|call| Token::Bytes(call.data.to_vec())).collect();

    encode(&[
        Token::Uint(incentive),
        Token::Array(targets),
        Token::Array(payloads),
    ])
    .into()
}

/// Turns a ranked opportunity into an unsigned flash-loan transaction for the
/// executor contract.
pub struct BundleBuilder {
    executor: Address,
    searcher: Address,
    reference_token: Address,
    price_source: Arc<dyn NativePriceSource>,
    borrow_fee_bps: u64,
    incentive_rate_pct: u64,
    provisional_gas_limit: U256,
    timeout: Duration,
    executor_contract: BaseContract,
}

impl BundleBuilder {
    pub fn new(
        executor: Address,
        searcher: Address,
        reference_token: Address,
        price_source: Arc<dyn NativePriceSource>,
        params: &ArbitrageParams,
    ) -> Result<Self> {
        Ok(Self {
            executor,
            searcher,
            reference_token,
            price_source,
            borrow_fee_bps: params.borrow_fee_bps,
            incentive_rate_pct: params.incentive_rate_pct,
            provisional_gas_limit: params.gas_ceiling,
            timeout: params.network_timeout,
            executor_contract: BaseContract::from(executor_abi()?),
        })
    }

    pub async fn build(&self, opportunity: &Opportunity) -> Result<Bundle, SkipReason> {
        let calls = self
            .route(opportunity)
            .await
            .map_err(|e| SkipReason::CallData(e.to_string()))?;

        let rate = within(
            self.timeout,
            "native price lookup",
            self.price_source.native_per_reference(),
        )
        .await
        .map_err(|e| SkipReason::PriceLookup(e.to_string()))?;

        let economics = compute_economics(
            opportunity.volume,
            opportunity.profit,
            &rate,
            self.borrow_fee_bps,
            self.incentive_rate_pct,
        )
        .map_err(|e| SkipReason::PriceLookup(e.to_string()))?;

        info!(
            "FL fee: {} | Miner reward: {} | Take home: {}",
            to_decimal(economics.fee),
            to_decimal(economics.incentive),
            to_decimal(economics.take_home)
        );

        if economics.take_home <= I256::zero() {
            return Err(SkipReason::Unprofitable(economics));
        }

        let payload = encode_payload(economics.incentive.into_raw(), &calls);
        let data = self
            .executor_contract
            .encode(
                "flashloan",
                (self.reference_token, opportunity.volume, payload.clone()),
            )
            .map_err(|e| SkipReason::Encoding(e.to_string()))?;

        let transaction: TypedTransaction = TransactionRequest::new()
            .from(self.searcher)
            .to(self.executor)
            .data(data)
            .gas_price(U256::zero())
            .gas(self.provisional_gas_limit)
            .into();

        debug!("Built bundle with {} calls for {:?}", calls.len(), opportunity.token);

        Ok(Bundle {
            calls,
            payload,
            transaction,
            economics,
        })
    }

    /// Leg one sells the borrowed volume on `buy_from` straight into
    /// `sell_to`; leg two sells the intermediate tokens back to the executor.
    async fn route(&self, opportunity: &Opportunity) -> Result<Vec<Call>> {
        let mut calls = within(
            self.timeout,
            "buy leg call data",
            opportunity.buy_from.forward_calls(
                self.reference_token,
                opportunity.volume,
                opportunity.sell_to.as_ref(),
            ),
        )
        .await?;

        let intermediate = within(
            self.timeout,
            "intermediate quote",
            opportunity
                .buy_from
                .quote_out(self.reference_token, opportunity.token, opportunity.volume),
        )
        .await?;

        let sell_data = within(
            self.timeout,
            "sell leg call data",
            opportunity
                .sell_to
                .sell_call_data(opportunity.token, intermediate, self.executor),
        )
        .await?;

        calls.push(Call {
            target: opportunity.sell_to.address(),
            data: sell_data,
        });

        Ok(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dex::Market,
        testing::{ether, reference_token, traded_token, FixedRate, MockMarket, UnavailableRate},
    };
    use ethers::abi::{decode, ParamType};

    fn executor() -> Address {
        Address::from_low_u64_be(0xe0)
    }

    fn searcher() -> Address {
        Address::from_low_u64_be(0x5e)
    }

    fn milli_ether(amount: u64) -> U256 {
        U256::exp10(15) * U256::from(amount)
    }

    fn signed(amount: U256) -> I256 {
        I256::from_raw(amount)
    }

    fn create_test_params(incentive_rate_pct: u64) -> ArbitrageParams {
        ArbitrageParams {
            profit_floor: signed(ether(10)),
            incentive_rate_pct,
            borrow_fee_bps: 9,
            gas_ceiling: U256::from(2_000_000u64),
            trial_volumes: vec![ether(1000)],
            reference_volume: U256::exp10(16),
            network_timeout: Duration::from_secs(1),
        }
    }

    fn create_test_builder(incentive_rate_pct: u64, source: Arc<dyn NativePriceSource>) -> BundleBuilder {
        BundleBuilder::new(
            executor(),
            searcher(),
            reference_token(),
            source,
            &create_test_params(incentive_rate_pct),
        )
        .unwrap()
    }

    /// Buying 1000 on venue 1 and selling on venue 2 returns 1050.
    fn create_test_opportunity() -> Opportunity {
        Opportunity {
            token: traded_token(),
            volume: ether(1000),
            profit: signed(ether(50)),
            buy_from: Arc::new(MockMarket::fixed_price(1, 1, 1)),
            sell_to: Arc::new(MockMarket::fixed_price(2, 105, 100)),
        }
    }

    #[test]
    fn test_economics_at_half_incentive() {
        let rate = BigDecimal::from(1);
        let economics = compute_economics(ether(1000), signed(ether(50)), &rate, 9, 50).unwrap();

        // (50 - 1000 * 9 / 10000) * 1 * (1 - 0.5)
        assert_eq!(economics.fee, milli_ether(900));
        assert_eq!(economics.profit_after_fee, signed(milli_ether(49_100)));
        assert_eq!(economics.take_home, signed(milli_ether(24_550)));
        assert_eq!(economics.incentive + economics.take_home, economics.converted_profit);
    }

    #[test]
    fn test_economics_with_fractional_rate() {
        let rate = BigDecimal::from_str("0.0005").unwrap();
        let economics = compute_economics(ether(1000), signed(ether(50)), &rate, 9, 50).unwrap();

        assert_eq!(economics.converted_profit, signed(U256::from(24_550_000_000_000_000u64)));
        assert_eq!(economics.incentive, signed(U256::from(12_275_000_000_000_000u64)));
        assert_eq!(economics.take_home, signed(U256::from(12_275_000_000_000_000u64)));
    }

    #[test]
    fn test_economics_fee_exceeding_profit_goes_negative() {
        let rate = BigDecimal::from(1);
        let economics = compute_economics(ether(1000), signed(milli_ether(500)), &rate, 9, 50).unwrap();

        assert!(economics.profit_after_fee < I256::zero());
        assert!(economics.take_home < I256::zero());
    }

    #[tokio::test]
    async fn test_build_reports_expected_economics() {
        let builder = create_test_builder(10, FixedRate::parse("1"));

        let bundle = builder.build(&create_test_opportunity()).await.unwrap();

        assert_eq!(bundle.economics.fee, milli_ether(900));
        assert_eq!(bundle.economics.profit_after_fee, signed(milli_ether(49_100)));
        assert_eq!(bundle.economics.incentive, signed(milli_ether(4_910)));
        assert_eq!(bundle.economics.take_home, signed(milli_ether(44_190)));
    }

    #[tokio::test]
    async fn test_full_incentive_is_skipped() {
        let builder = create_test_builder(100, FixedRate::parse("1"));

        let result = builder.build(&create_test_opportunity()).await;

        match result {
            Err(SkipReason::Unprofitable(economics)) => {
                assert_eq!(economics.take_home, I256::zero());
            }
            other => panic!("expected unprofitable skip, got {:?}", other.map(|b| b.economics)),
        }
    }

    #[tokio::test]
    async fn test_route_and_payload() {
        let builder = create_test_builder(10, FixedRate::parse("1"));
        let opportunity = create_test_opportunity();

        let bundle = builder.build(&opportunity).await.unwrap();

        assert_eq!(bundle.calls.len(), 2);
        assert_eq!(bundle.calls[0].target, opportunity.buy_from.address());
        assert_eq!(bundle.calls[1].target, opportunity.sell_to.address());

        let expected_sell = opportunity
            .sell_to
            .sell_call_data(traded_token(), ether(1000), executor())
            .await
            .unwrap();
        assert_eq!(bundle.calls[1].data, expected_sell);

        let decoded = decode(
            &[
                ParamType::Uint(256),
                ParamType::Array(Box::new(ParamType::Address)),
                ParamType::Array(Box::new(ParamType::Bytes)),
            ],
            &bundle.payload,
        )
        .unwrap();

        assert_eq!(decoded[0], Token::Uint(milli_ether(4_910)));
        assert_eq!(
            decoded[1],
            Token::Array(vec![
                Token::Address(opportunity.buy_from.address()),
                Token::Address(opportunity.sell_to.address()),
            ])
        );
    }

    #[tokio::test]
    async fn test_transaction_shape() {
        let builder = create_test_builder(10, FixedRate::parse("1"));

        let bundle = builder.build(&create_test_opportunity()).await.unwrap();
        let tx = &bundle.transaction;

        assert_eq!(tx.to_addr(), Some(&executor()));
        assert_eq!(tx.from(), Some(&searcher()));
        assert_eq!(tx.gas_price(), Some(U256::zero()));
        assert_eq!(tx.gas(), Some(&U256::from(2_000_000u64)));

        let (asset, amount, params): (Address, U256, Bytes) = builder
            .executor_contract
            .decode("flashloan", tx.data().unwrap())
            .unwrap();
        assert_eq!(asset, reference_token());
        assert_eq!(amount, ether(1000));
        assert_eq!(params, bundle.payload);
    }

    #[tokio::test]
    async fn test_build_is_idempotent() {
        let builder = create_test_builder(10, FixedRate::parse("1"));
        let opportunity = create_test_opportunity();

        let first = builder.build(&opportunity).await.unwrap();
        let second = builder.build(&opportunity).await.unwrap();

        assert_eq!(first.payload, second.payload);
        assert_eq!(first.transaction.data(), second.transaction.data());
    }

    #[tokio::test]
    async fn test_next_venue_must_receive_directly() {
        let builder = create_test_builder(10, FixedRate::parse("1"));
        let mut opportunity = create_test_opportunity();
        opportunity.sell_to = Arc::new(MockMarket::fixed_price(2, 105, 100).not_receiving_directly());

        let result = builder.build(&opportunity).await;
        assert!(matches!(result, Err(SkipReason::CallData(_))));
    }

    #[tokio::test]
    async fn test_price_lookup_failure_skips() {
        let builder = create_test_builder(10, Arc::new(UnavailableRate));

        let result = builder.build(&create_test_opportunity()).await;
        assert!(matches!(result, Err(SkipReason::PriceLookup(_))));
    }
}
