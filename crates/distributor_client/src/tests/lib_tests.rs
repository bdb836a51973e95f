use super::*;
use crate::{
    interface::functions,
    test_support::{beneficiaries, MockWallet, CONTRACT, OWNER},
};
use alloy::primitives::U256;

fn client_with_cache(wallet: &Arc<MockWallet>, dir: &tempfile::TempDir) -> DistributorClient {
    DistributorClient::new(
        wallet.adapter(),
        wallet.interface(),
        ClientOptions {
            cache: Some(AddressCache::new(dir.path().join("cache.json"))),
            ..ClientOptions::default()
        },
    )
}

#[test]
fn successful_bind_is_remembered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let wallet = MockWallet::new();
    let client = client_with_cache(&wallet, &dir);
    assert!(client.cached_binding().is_none());

    let binding = client
        .bind("0xdbf03b407c01e7cd3cbea99509d93f8dddc8c6fb")
        .expect("bind");
    assert_eq!(binding.address(), CONTRACT);

    let reopened = client_with_cache(&wallet, &dir);
    let cached = reopened.cached_binding().expect("cached binding");
    assert_eq!(cached.address(), CONTRACT);
}

#[test]
fn failed_bind_leaves_the_cache_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let wallet = MockWallet::new();
    let client = client_with_cache(&wallet, &dir);
    client
        .bind("0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB")
        .expect("bind");

    assert!(matches!(
        client.bind("0xnot-an-address"),
        Err(FacadeError::InvalidAddress(_))
    ));
    assert_eq!(
        client.cached_binding().map(|binding| binding.address()),
        Some(CONTRACT)
    );
}

#[tokio::test]
async fn facade_connects_reads_and_dispatches_through_one_session() {
    let wallet = MockWallet::new();
    wallet.update(|state| state.beneficiaries = beneficiaries(2));
    let client = DistributorClient::new(
        wallet.adapter(),
        wallet.interface(),
        ClientOptions {
            confirmation: ConfirmationPolicy {
                timeout: std::time::Duration::from_secs(5),
                poll_interval: std::time::Duration::from_millis(10),
            },
            ..ClientOptions::default()
        },
    );
    let binding = client.bind(&CONTRACT.to_string()).expect("bind");

    assert_eq!(
        client
            .dispatch(&binding, functions::DISTRIBUTE_USDT, &[])
            .await,
        Err(FacadeError::NoSigner)
    );

    client.session().connect().await.expect("connect");
    let snapshot = client.reads().snapshot(&binding).await.expect("snapshot");
    assert!(snapshot.is_owned_by(client.session().current().await.account));
    assert_eq!(snapshot.total_shares, U256::from(300));

    let args = binding
        .coerce_args(functions::SET_PAUSED, &["true"])
        .expect("args");
    client
        .dispatch(&binding, functions::SET_PAUSED, &args)
        .await
        .expect("setPaused");
    assert!(client.reads().snapshot(&binding).await.expect("refresh").paused);
    assert_eq!(client.session().signer().await, Ok(OWNER));
}
