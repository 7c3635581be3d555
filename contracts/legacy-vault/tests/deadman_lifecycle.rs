use soroban_sdk::{
    testutils::{Address as _, Ledger},
    token::{Client as TokenClient, StellarAssetClient},
    vec, Address, Env,
};

use legacy_vault::{
    Beneficiary, LegacyVault, LegacyVaultClient, StakingConfig, VaultError, VaultStatus,
};

const DAY: u64 = 24 * 60 * 60;
const UNIT: i128 = 10_000_000;

struct World {
    vault: LegacyVaultClient<'static>,
    vault_id: Address,
    owner: Address,
    heir_major: Address,
    heir_minor: Address,
    native: Address,
}

fn setup(env: &Env) -> World {
    env.mock_all_auths();
    env.ledger().with_mut(|l| l.timestamp = 1_700_000_000);

    let owner = Address::generate(env);
    let treasury = Address::generate(env);
    let heir_major = Address::generate(env);
    let heir_minor = Address::generate(env);
    let admin = Address::generate(env);

    let native = env
        .register_stellar_asset_contract_v2(admin.clone())
        .address();
    // The staking receipt answers balance queries during distribution even
    // when nothing was ever staked.
    let receipt = env.register_stellar_asset_contract_v2(admin).address();

    StellarAssetClient::new(env, &native).mint(&owner, &(10_000 * UNIT));

    let vault_id = env.register(LegacyVault, ());
    let vault = LegacyVaultClient::new(env, &vault_id);

    vault.initialize(
        &owner,
        &native,
        &treasury,
        &vec![
            env,
            Beneficiary {
                wallet: heir_major.clone(),
                share_bp: 7_000,
            },
            Beneficiary {
                wallet: heir_minor.clone(),
                share_bp: 3_000,
            },
        ],
        &(90 * DAY),
        &StakingConfig {
            service: Address::generate(env),
            receipt,
            swap: Address::generate(env),
            receipt_index: 0,
            native_index: 1,
        },
        &Address::generate(env),
    );

    World {
        vault,
        vault_id,
        owner,
        heir_major,
        heir_minor,
        native,
    }
}

#[test]
fn vault_releases_estate_after_prolonged_silence() {
    let env = Env::default();
    let w = setup(&env);

    // Fund the estate: native plus one registered token.
    w.vault.deposit_native(&w.owner, &(1_000 * UNIT));

    let admin = Address::generate(&env);
    let usdc = env.register_stellar_asset_contract_v2(admin).address();
    StellarAssetClient::new(&env, &usdc).mint(&w.owner, &(500 * UNIT));
    w.vault.register_token(&w.owner, &usdc);
    w.vault.deposit_token(&w.owner, &usdc, &(500 * UNIT));

    // Routine check-ins keep the switch quiet.
    let mut now = env.ledger().timestamp();
    for _ in 0..3 {
        now += 89 * DAY;
        env.ledger().with_mut(|l| l.timestamp = now);
        w.vault.check_in(&w.owner);
        assert!(!w.vault.is_claimable());
    }

    // Then the owner goes silent past the deadline.
    let deadline = w.vault.deadline();
    env.ledger().with_mut(|l| l.timestamp = deadline + 1);
    assert!(w.vault.is_claimable());

    w.vault.trigger_distribution();
    assert_eq!(w.vault.status(), VaultStatus::Distributed);

    // Heirs collect everything; without yield there is no fee and no dust.
    w.vault.claim_all(&w.heir_major);
    w.vault.claim_all(&w.heir_minor);

    let native = TokenClient::new(&env, &w.native);
    let usdc_client = TokenClient::new(&env, &usdc);
    assert_eq!(native.balance(&w.heir_major), 700 * UNIT);
    assert_eq!(native.balance(&w.heir_minor), 300 * UNIT);
    assert_eq!(usdc_client.balance(&w.heir_major), 350 * UNIT);
    assert_eq!(usdc_client.balance(&w.heir_minor), 150 * UNIT);
    assert_eq!(native.balance(&w.vault_id), 0);
    assert_eq!(usdc_client.balance(&w.vault_id), 0);
}

#[test]
fn owner_reclaims_estate_before_deadline() {
    let env = Env::default();
    let w = setup(&env);

    w.vault.deposit_native(&w.owner, &(1_000 * UNIT));

    // A check-in on the deadline's last second keeps the vault out of reach.
    let deadline = w.vault.deadline();
    env.ledger().with_mut(|l| l.timestamp = deadline);
    w.vault.check_in(&w.owner);
    assert_eq!(
        w.vault.try_trigger_distribution(),
        Err(Ok(VaultError::NotYetClaimable))
    );

    // The owner unwinds the vault entirely.
    w.vault.withdraw_native(&w.owner, &(1_000 * UNIT));
    assert_eq!(
        TokenClient::new(&env, &w.native).balance(&w.owner),
        10_000 * UNIT
    );
    assert_eq!(w.vault.principal_of(&w.native).local, 0);
}
