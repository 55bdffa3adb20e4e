#![cfg(test)]
use soroban_sdk::{testutils::Address as _, Address, Env};

use crate::{ResaleRewardError, ResaleRewardShare, ResaleRewardShareClient};

fn make_client(env: &Env) -> ResaleRewardShareClient<'_> {
    let id = env.register_contract(None, ResaleRewardShare);
    ResaleRewardShareClient::new(env, &id)
}

fn create_token(env: &Env) -> Address {
    let admin = Address::generate(env);
    env.register_stellar_asset_contract(admin)
}

/// Initialize with fresh token collaborators; returns the brand address.
/// Initialization itself is auth-free, so this works without mocked auths.
fn init_contract(env: &Env, client: &ResaleRewardShareClient) -> Address {
    let brand = Address::generate(env);
    let product = create_token(env);
    let payment = create_token(env);
    client.initialize(&brand, &product, &payment, &100, &1_000);
    brand
}

#[test]
fn mint_initial_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    let brand = init_contract(&env, &client);
    let recipient = Address::generate(&env);

    assert!(client.try_mint_initial(&brand, &recipient, &10).is_err());
    assert_eq!(client.get_total_minted(), 0);
    assert!(!client.is_holder(&recipient));
}

#[test]
fn mint_initial_wrong_caller_unauthorized() {
    let env = Env::default();
    env.mock_all_auths();
    let client = make_client(&env);
    let _brand = init_contract(&env, &client);
    let attacker = Address::generate(&env);
    let recipient = Address::generate(&env);

    let result = client.try_mint_initial(&attacker, &recipient, &10);
    assert_eq!(result, Err(Ok(ResaleRewardError::Unauthorized)));
    assert_eq!(client.get_total_minted(), 0);
}

#[test]
fn update_price_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    let brand = init_contract(&env, &client);

    assert!(client.try_update_price(&brand, &250).is_err());
    assert_eq!(client.get_price(), 100);
}

#[test]
fn update_price_wrong_caller_unauthorized() {
    let env = Env::default();
    env.mock_all_auths();
    let client = make_client(&env);
    let _brand = init_contract(&env, &client);
    let attacker = Address::generate(&env);

    let result = client.try_update_price(&attacker, &250);
    assert_eq!(result, Err(Ok(ResaleRewardError::Unauthorized)));
    assert_eq!(client.get_price(), 100);
}

#[test]
fn update_price_brand_succeeds() {
    let env = Env::default();
    env.mock_all_auths();
    let client = make_client(&env);
    let brand = init_contract(&env, &client);

    client.update_price(&brand, &250);
    assert_eq!(client.get_price(), 250);
}

#[test]
fn buy_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    init_contract(&env, &client);
    let buyer = Address::generate(&env);

    assert!(client.try_buy(&buyer, &5, &500).is_err());
    assert_eq!(client.get_total_minted(), 0);
    assert!(!client.is_holder(&buyer));
}

#[test]
fn resell_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    init_contract(&env, &client);
    let seller = Address::generate(&env);
    let buyer = Address::generate(&env);

    assert!(client.try_resell(&seller, &buyer, &1, &100).is_err());
    assert_eq!(client.get_holder_count(), 0);
}

#[test]
fn claim_missing_auth() {
    let env = Env::default();
    let client = make_client(&env);
    init_contract(&env, &client);
    let holder = Address::generate(&env);

    assert!(client.try_claim_rewards(&holder).is_err());
}

#[test]
fn sweep_is_open_to_any_caller() {
    let env = Env::default();
    let client = make_client(&env);
    init_contract(&env, &client);

    // No auth anywhere in the sweep path: with an empty registry the only
    // failure it can produce is the range check.
    let result = client.try_sweep_expired_rewards(&0, &0);
    assert_eq!(result, Err(Ok(ResaleRewardError::InvalidRange)));
}

#[test]
fn uninitialized_operations_fail() {
    let env = Env::default();
    env.mock_all_auths();
    let client = make_client(&env);
    let someone = Address::generate(&env);

    assert_eq!(
        client.try_buy(&someone, &1, &100),
        Err(Ok(ResaleRewardError::NotInitialized))
    );
    assert_eq!(
        client.try_claim_rewards(&someone),
        Err(Ok(ResaleRewardError::NotInitialized))
    );
    assert_eq!(
        client.try_sweep_expired_rewards(&0, &0),
        Err(Ok(ResaleRewardError::NotInitialized))
    );
}
