//! Pricing scenarios and node configuration, end to end.

use std::sync::Arc;

use agentweb_core::{Address, Amount, ContentClass, PricingPolicy, ReputationScore};
use agentweb_escrow::split_fee;
use agentweb_ledger::{Network, SimulatedLedger};
use agentweb_node::{NodeConfig, Protocol};
use agentweb_registry::{StaticOwnershipVerifier, WebsiteRegistration};
use test_case::test_case;

#[test_case("exclusive research report", ContentClass::Premium ; "premium keyword")]
#[test_case("Breaking NEWS", ContentClass::Standard ; "standard keyword any case")]
#[test_case("weather", ContentClass::Other ; "no keyword")]
#[test_case("premium news", ContentClass::Premium ; "premium wins")]
fn classification(descriptor: &str, expected: ContentClass) {
    assert_eq!(PricingPolicy::default().classify(descriptor), expected);
}

#[test]
fn reputation_scales_price() {
    let policy = PricingPolicy::default();
    let avg = Amount::from_micro(5000);

    // 850 reputation is an 8.5x factor, premium doubles it.
    let price = policy.price_for(ReputationScore::new(850).unwrap(), avg, "research");
    assert_eq!(price, Amount::from_micro(85_000));

    let low = policy.price_for(ReputationScore::new(10).unwrap(), avg, "weather");
    assert_eq!(low, policy.minimum_amount);
}

#[test_case(5000, 100, 4950, 50 ; "one percent")]
#[test_case(1000, 250, 975, 25 ; "two and a half percent")]
#[test_case(99, 100, 99, 0 ; "fee rounds down")]
#[test_case(5000, 0, 5000, 0 ; "no fee")]
fn fee_split(amount: u64, bps: u32, website: u64, platform: u64) {
    let split = split_fee(Amount::from_micro(amount), bps);
    assert_eq!(split.website_share, Amount::from_micro(website));
    assert_eq!(split.platform_fee, Amount::from_micro(platform));
}

#[tokio::test]
async fn configured_policy_prices_registered_site() {
    let config = NodeConfig::from_toml(
        r#"
        network = "localnet"

        [pricing]
        premium_keywords = ["dataset"]
        minimum_amount = 1000
        "#,
    )
    .unwrap();

    let verifier = StaticOwnershipVerifier::new();
    verifier.allow("data.example.com", "tok");
    let protocol = Protocol::from_config(
        &config,
        Arc::new(SimulatedLedger::new(Network::Localnet)),
        verifier,
    )
    .unwrap();
    protocol
        .register_website(
            WebsiteRegistration::new("data.example.com", Address::new("OWNER").unwrap(), "tok")
                .with_avg_payment(Amount::from_micro(4000)),
        )
        .await
        .unwrap();

    // Initial reputation 100 is a 1x factor.
    assert_eq!(
        protocol.price("data.example.com", "full dataset").unwrap(),
        Amount::from_micro(8000)
    );
    assert_eq!(
        protocol.price("data.example.com", "research").unwrap(),
        Amount::from_micro(2000)
    );
}

#[test]
fn invalid_config_is_rejected_before_startup() {
    let config = NodeConfig::from_toml("[registry]\nalias_suffix = \"  \"\n");
    assert!(config.is_err());
}
