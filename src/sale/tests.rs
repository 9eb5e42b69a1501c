use crate::sale::config::{Currency, SaleConfig};
use crate::sale::controller::{BuyConfig, CallEnv, Sale, SaleError};
use crate::sale::evaluator::SaleScript;
use crate::sale::payment::Ledger;
use crate::types::address::Address;
use crate::virtual_machine::builder::*;
use crate::virtual_machine::operand::{Comparator, StorageSlot};
use crate::virtual_machine::state::StaticTiers;
use primitive_types::U256;

fn w(v: u64) -> U256 {
    U256::from(v)
}

fn recipient() -> Address {
    Address::derive(b"recipient")
}

fn buyer() -> Address {
    Address::derive(b"buyer")
}

fn usd() -> Address {
    Address::derive(b"usd")
}

fn remaining() -> Expr {
    sub([storage(StorageSlot::SupplyLimit), storage(StorageSlot::TotalMinted)])
}

fn sale_with(supply_limit: u64, currency: Currency, max_units: Expr, unit_price: Expr) -> Sale {
    let script = SaleScript::new(pair(max_units, unit_price).unwrap()).unwrap();
    let config = SaleConfig::new("Drop", "DRP", supply_limit, recipient())
        .with_currency(currency)
        .with_base_uri("ipfs://drop/");
    Sale::new(config, script).unwrap()
}

fn flat_token_sale(supply_limit: u64, price: u64) -> Sale {
    sale_with(supply_limit, Currency::Token(usd()), remaining(), constant(price))
}

/// Ledger where the buyer holds `funds` and has approved the sale for all of it.
fn funded(sale: &Sale, funds: u64) -> Ledger {
    let mut ledger = Ledger::new();
    ledger.credit(Some(usd()), buyer(), w(funds));
    ledger.approve(usd(), buyer(), sale.config().address, w(funds));
    ledger
}

fn buy(minimum: u64, desired: u64, maximum_price: u64) -> BuyConfig {
    BuyConfig {
        minimum_units: w(minimum),
        desired_units: w(desired),
        maximum_price: w(maximum_price),
    }
}

fn at(timestamp: u64) -> CallEnv {
    CallEnv::new(buyer(), timestamp)
}

#[test]
fn flat_price_mints_and_charges_exactly() {
    let mut sale = flat_token_sale(100, 1);
    let mut ledger = funded(&sale, 1_000);

    let receipt = sale.mint_nft(&at(0), &buy(1, 20, 1), &mut ledger).unwrap();
    assert_eq!(receipt.units, 20);
    assert_eq!(receipt.total_cost, w(20));
    assert_eq!(receipt.first_token_id, 1);
    assert_eq!(sale.tokens().balance_of(&buyer()), 20);
    assert_eq!(ledger.balance_of(Some(usd()), &buyer()), w(980));
    assert_eq!(ledger.balance_of(Some(usd()), &sale.config().address), w(20));
    assert_eq!(sale.proceeds(), w(20));
}

#[test]
fn desired_is_clamped_to_stock() {
    let mut sale = flat_token_sale(10, 2);
    let mut ledger = funded(&sale, 1_000);

    let receipt = sale.mint_nft(&at(0), &buy(1, 25, 2), &mut ledger).unwrap();
    assert_eq!(receipt.units, 10);
    assert_eq!(receipt.total_cost, w(20));
    assert_eq!(sale.remaining_units(), 0);
}

#[test]
fn stock_is_cumulative_and_burns_do_not_free_it() {
    let mut sale = flat_token_sale(5, 1);
    let mut ledger = funded(&sale, 1_000);
    sale.mint_nft(&at(0), &buy(5, 5, 1), &mut ledger).unwrap();

    sale.burn(&buyer(), 1).unwrap();
    sale.burn(&buyer(), 2).unwrap();
    assert_eq!(sale.tokens().total_supply(), 3);

    let err = sale.mint_nft(&at(0), &buy(1, 1, 1), &mut ledger).unwrap_err();
    assert_eq!(err.reason(), "INSUFFICIENT_STOCK");
    assert_eq!(sale.tokens().total_minted(), 5);
}

#[test]
fn minimum_above_stock_is_rejected() {
    let mut sale = flat_token_sale(3, 1);
    let mut ledger = funded(&sale, 1_000);
    assert_eq!(
        sale.mint_nft(&at(0), &buy(4, 6, 1), &mut ledger),
        Err(SaleError::InsufficientStock {
            minimum: w(4),
            available: w(3)
        })
    );
}

#[test]
fn zero_minimum_is_always_rejected() {
    let mut sale = flat_token_sale(100, 1);
    let mut ledger = funded(&sale, 1_000);
    let err = sale.mint_nft(&at(0), &buy(0, 5, 1), &mut ledger).unwrap_err();
    assert_eq!(err, SaleError::ZeroMinimum);
    assert_eq!(err.reason(), "0_MINIMUM");
    assert_eq!(err.to_string(), "0_MINIMUM");
}

#[test]
fn minimum_over_desired_is_rejected() {
    let mut sale = flat_token_sale(100, 1);
    let mut ledger = funded(&sale, 1_000);
    let err = sale.mint_nft(&at(0), &buy(6, 5, 1), &mut ledger).unwrap_err();
    assert_eq!(err.reason(), "MINIMUM_OVER_DESIRED");
    assert_eq!(sale.tokens().total_minted(), 0);
}

#[test]
fn price_above_maximum_is_rejected() {
    let mut sale = flat_token_sale(100, 5);
    let mut ledger = funded(&sale, 1_000);
    assert_eq!(
        sale.mint_nft(&at(0), &buy(1, 1, 4), &mut ledger),
        Err(SaleError::MaximumPrice {
            price: w(5),
            maximum: w(4)
        })
    );
    assert!(sale.mint_nft(&at(0), &buy(1, 1, 5), &mut ledger).is_ok());
}

#[test]
fn before_timestamp_gate() {
    const T: u64 = 5_000;
    let gated = if_else(before_after_time(T, Comparator::Gte), remaining(), constant(0u64));
    let mut sale = sale_with(100, Currency::Token(usd()), gated, constant(1u64));
    let mut ledger = funded(&sale, 1_000);

    assert_eq!(sale.calculate_buy(&buyer(), w(100), T - 1).unwrap().max_units, w(0));
    assert_eq!(sale.calculate_buy(&buyer(), w(100), T).unwrap().max_units, w(100));

    let err = sale.mint_nft(&at(T - 1), &buy(1, 10, 1), &mut ledger).unwrap_err();
    assert_eq!(err.reason(), "INSUFFICIENT_STOCK");
    assert_eq!(sale.mint_nft(&at(T), &buy(1, 10, 1), &mut ledger).unwrap().units, 10);
}

#[test]
fn increasing_price_is_monotone_and_saturates() {
    let sale = sale_with(
        100,
        Currency::Native,
        remaining(),
        inc_dec_price(10u64, 110u64, 1_000, 2_000),
    );

    let mut last = U256::zero();
    for t in (0..3_000u64).step_by(50) {
        let price = sale.calculate_buy(&buyer(), w(1), t).unwrap().unit_price;
        assert!(price >= last, "price fell from {last} to {price} at {t}");
        assert!(price <= w(110));
        last = price;
    }
    assert_eq!(sale.calculate_buy(&buyer(), w(1), 2_000).unwrap().unit_price, w(110));
    assert_eq!(sale.calculate_buy(&buyer(), w(1), 9_999_999).unwrap().unit_price, w(110));
    assert_eq!(sale.calculate_buy(&buyer(), w(1), 0).unwrap().unit_price, w(10));
}

#[test]
fn both_outputs_read_the_same_total_minted() {
    // max_units and price both derive from TOTAL_MINTED; the price is the
    // count already sold, and the cap is what is left.
    let mut sale = sale_with(
        50,
        Currency::Token(usd()),
        remaining(),
        add([storage(StorageSlot::TotalMinted), constant(1u64)]),
    );
    let mut ledger = funded(&sale, 10_000);

    let first = sale.calculate_buy(&buyer(), w(1), 0).unwrap();
    assert_eq!((first.max_units, first.unit_price), (w(50), w(1)));

    sale.mint_nft(&at(0), &buy(1, 10, 1), &mut ledger).unwrap();
    let second = sale.calculate_buy(&buyer(), w(1), 0).unwrap();
    assert_eq!((second.max_units, second.unit_price), (w(40), w(11)));
    assert_eq!(second.max_units + second.unit_price, w(51));
}

#[test]
fn per_wallet_cap_uses_number_minted() {
    let cap = min([remaining(), sub([constant(3u64), number_minted(account())])]);
    let mut sale = sale_with(100, Currency::Token(usd()), cap, constant(1u64));
    let mut ledger = funded(&sale, 1_000);

    assert_eq!(sale.mint_nft(&at(0), &buy(1, 2, 1), &mut ledger).unwrap().units, 2);
    assert_eq!(sale.mint_nft(&at(0), &buy(1, 5, 1), &mut ledger).unwrap().units, 1);
    let err = sale.mint_nft(&at(0), &buy(1, 1, 1), &mut ledger).unwrap_err();
    assert_eq!(err.reason(), "INSUFFICIENT_STOCK");
}

#[test]
fn tier_gate_degrades_to_lowest_tier() {
    let source = Address::derive(b"membership");
    let gated = if_else(has_min_tier(source, account(), 2), remaining(), constant(0u64));

    let open = sale_with(100, Currency::Native, gated.clone(), constant(1u64));
    assert_eq!(open.calculate_buy(&buyer(), w(1), 0).unwrap().max_units, w(0));

    let mut tiers = StaticTiers::new();
    tiers.set_tier(source, buyer(), 3);
    let member = sale_with(100, Currency::Native, gated, constant(1u64)).with_tiers(tiers);
    assert_eq!(member.calculate_buy(&buyer(), w(1), 0).unwrap().max_units, w(100));
}

#[test]
fn native_purchase_refunds_excess() {
    let mut sale = sale_with(100, Currency::Native, remaining(), constant(3u64));
    let mut ledger = Ledger::new();
    ledger.credit(None, buyer(), w(100));

    let env = at(0).with_value(w(10));
    let receipt = sale.mint_nft(&env, &buy(1, 3, 3), &mut ledger).unwrap();
    assert_eq!(receipt.total_cost, w(9));
    assert_eq!(receipt.refund, w(1));
    assert_eq!(ledger.balance_of(None, &buyer()), w(91));

    let err = sale
        .mint_nft(&at(0).with_value(w(5)), &buy(2, 2, 3), &mut ledger)
        .unwrap_err();
    assert_eq!(
        err,
        SaleError::InsufficientFund {
            value: w(5),
            cost: w(6)
        }
    );
    assert_eq!(sale.tokens().total_minted(), 3);
}

#[test]
fn failed_payment_mints_nothing() {
    let mut sale = flat_token_sale(100, 1);
    let mut ledger = Ledger::new();
    ledger.credit(Some(usd()), buyer(), w(100));

    let err = sale.mint_nft(&at(0), &buy(1, 5, 1), &mut ledger).unwrap_err();
    assert_eq!(err.reason(), "PAYMENT_FAILED");
    assert_eq!(sale.tokens().total_minted(), 0);
    assert_eq!(sale.proceeds(), w(0));
}

#[test]
fn script_abort_is_reported_and_mints_nothing() {
    let mut sale = sale_with(
        100,
        Currency::Token(usd()),
        remaining(),
        div([constant(1u64), constant(0u64)]),
    );
    let mut ledger = funded(&sale, 1_000);
    let err = sale.mint_nft(&at(0), &buy(1, 1, 1), &mut ledger).unwrap_err();
    assert_eq!(err.reason(), "SCRIPT");
    assert_eq!(sale.tokens().total_minted(), 0);
}

#[test]
fn cost_overflow_is_rejected() {
    let max = U256::max_value();
    let mut sale = sale_with(100, Currency::Native, remaining(), constant(max));
    let mut ledger = Ledger::new();
    let buy = BuyConfig {
        minimum_units: w(2),
        desired_units: w(2),
        maximum_price: max,
    };
    let err = sale.mint_nft(&at(0), &buy, &mut ledger).unwrap_err();
    assert_eq!(err.reason(), "COST_OVERFLOW");
}

#[test]
fn withdraw_is_recipient_only_and_tracks_totals() {
    let mut sale = flat_token_sale(100, 2);
    let mut ledger = funded(&sale, 1_000);

    assert_eq!(sale.withdraw(&recipient(), &mut ledger), Err(SaleError::ZeroFund));
    sale.mint_nft(&at(0), &buy(1, 5, 2), &mut ledger).unwrap();

    let err = sale.withdraw(&buyer(), &mut ledger).unwrap_err();
    assert_eq!(err.reason(), "RECIPIENT_ONLY");

    let receipt = sale.withdraw(&recipient(), &mut ledger).unwrap();
    assert_eq!(receipt.amount, w(10));
    assert_eq!(receipt.total_withdrawn, w(10));
    assert_eq!(ledger.balance_of(Some(usd()), &recipient()), w(10));
    assert_eq!(sale.proceeds(), w(0));

    sale.mint_nft(&at(0), &buy(1, 1, 2), &mut ledger).unwrap();
    let receipt = sale.withdraw(&recipient(), &mut ledger).unwrap();
    assert_eq!(receipt.amount, w(2));
    assert_eq!(receipt.total_withdrawn, w(12));
    assert_eq!(sale.total_withdrawn(), w(12));
}

#[test]
fn burn_requires_owner() {
    let mut sale = flat_token_sale(100, 1);
    let mut ledger = funded(&sale, 1_000);
    sale.mint_nft(&at(0), &buy(1, 1, 1), &mut ledger).unwrap();

    assert_eq!(sale.burn(&recipient(), 1).unwrap_err().reason(), "NOT_OWNER");
    assert_eq!(sale.burn(&buyer(), 9).unwrap_err().reason(), "INVALID_TOKEN");
    sale.burn(&buyer(), 1).unwrap();
}

#[test]
fn royalty_and_token_uri() {
    let script = SaleScript::new(pair(remaining(), constant(1u64)).unwrap()).unwrap();
    let config = SaleConfig::new("Drop", "DRP", 10, recipient())
        .with_royalty_bps(250)
        .with_base_uri("ipfs://drop/");
    let mut sale = Sale::new(config, script.clone()).unwrap();

    assert_eq!(sale.royalty_info(w(10_000)), (recipient(), w(250)));
    assert_eq!(sale.royalty_info(w(399)), (recipient(), w(9)));
    assert_eq!(
        sale.royalty_info(U256::max_value()).1,
        U256::max_value() / w(10_000) * w(250) + U256::max_value() % w(10_000) * w(250) / w(10_000)
    );

    let mut ledger = Ledger::new();
    ledger.credit(None, buyer(), w(10));
    sale.mint_nft(&at(0).with_value(w(1)), &buy(1, 1, 1), &mut ledger).unwrap();
    assert_eq!(sale.token_uri(1).unwrap(), "ipfs://drop/1");
    assert_eq!(sale.token_uri(2).unwrap_err().reason(), "INVALID_TOKEN");

    let too_much = SaleConfig::new("Drop", "DRP", 10, recipient()).with_royalty_bps(10_001);
    assert_eq!(
        Sale::new(too_much, script).err(),
        Some(SaleError::MaxRoyalty { bps: 10_001 })
    );
}

#[test]
fn deployment_rejects_context_beyond_account_and_units() {
    let script = SaleScript::new(pair(context(2), constant(1u64)).unwrap()).unwrap();
    assert_eq!(script.required_context_len(), 3);
    let config = SaleConfig::new("Drop", "DRP", 10, recipient());
    assert_eq!(
        Sale::new(config, script).err(),
        Some(SaleError::ContextLength {
            required: 3,
            supplied: 2
        })
    );

    let script = SaleScript::new(pair(target_units(), account()).unwrap()).unwrap();
    let config = SaleConfig::new("Drop", "DRP", 10, recipient());
    assert!(Sale::new(config, script).is_ok());
}

#[test]
fn deployment_rejects_supply_limit_beyond_last_id() {
    let script = SaleScript::new(pair(remaining(), constant(1u64)).unwrap()).unwrap();
    let config = SaleConfig::new("Drop", "DRP", u64::MAX, recipient());
    let err = Sale::new(config, script.clone()).err().unwrap();
    assert_eq!(err.reason(), "MAX_SUPPLY");

    let config = SaleConfig::new("Drop", "DRP", u64::MAX - 1, recipient());
    let mut sale = Sale::new(config, script).unwrap();
    let mut ledger = Ledger::new();
    let desired = U256::from(u64::MAX);
    let buy = BuyConfig {
        minimum_units: w(1),
        desired_units: desired,
        maximum_price: w(1),
    };
    ledger.credit(None, buyer(), desired);
    let receipt = sale
        .mint_nft(&at(0).with_value(desired), &buy, &mut ledger)
        .unwrap();
    assert_eq!(receipt.units, u64::MAX - 1);
    assert_eq!(sale.tokens().owner_of(u64::MAX - 1), Ok(buyer()));
    assert_eq!(sale.remaining_units(), 0);
}

#[test]
fn recipient_can_hand_over_withdrawals() {
    let mut sale = flat_token_sale(100, 2);
    let mut ledger = funded(&sale, 1_000);
    sale.mint_nft(&at(0), &buy(1, 5, 2), &mut ledger).unwrap();

    let err = sale.set_recipient(&buyer(), buyer()).unwrap_err();
    assert_eq!(err.reason(), "RECIPIENT_ONLY");

    let treasury = Address::derive(b"treasury");
    sale.set_recipient(&recipient(), treasury).unwrap();
    assert_eq!(sale.config().recipient, treasury);
    assert_eq!(sale.withdraw(&recipient(), &mut ledger).unwrap_err().reason(), "RECIPIENT_ONLY");

    let receipt = sale.withdraw(&treasury, &mut ledger).unwrap();
    assert_eq!(receipt.withdrawer, treasury);
    assert_eq!(receipt.amount, w(10));
    assert_eq!(ledger.balance_of(Some(usd()), &treasury), w(10));
    assert_eq!(sale.royalty_info(w(100)).0, treasury);
}

#[test]
fn ownership_moves_only_at_the_owner_request() {
    let mut sale = flat_token_sale(100, 1);
    let admin = Address::derive(b"admin");

    let err = sale.transfer_ownership(&buyer(), admin).unwrap_err();
    assert_eq!(err.reason(), "OWNER_ONLY");
    assert_eq!(sale.config().owner, recipient());

    sale.transfer_ownership(&recipient(), admin).unwrap();
    assert_eq!(sale.config().owner, admin);
    assert_eq!(
        sale.transfer_ownership(&recipient(), recipient()),
        Err(SaleError::OwnerOnly { caller: recipient() })
    );
}
