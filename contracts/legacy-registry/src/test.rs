#![cfg(test)]

extern crate std;

use soroban_sdk::{
    contract, contractimpl, symbol_short,
    testutils::{Address as _, Ledger},
    vec, Address, Env, Symbol, Vec,
};

use crate::{Beneficiary, LegacyRegistry, LegacyRegistryClient, RegistryError};

// Each vault stub sits in its own module so the entry points generated by
// `contractimpl` do not collide at module scope.

mod mock_vault {
    use super::*;

    const BENEFS: Symbol = symbol_short!("BENEFS");
    const DEADLINE: Symbol = symbol_short!("DEADLINE");

    /// Vault stub with a configurable beneficiary list and deadline.
    #[contract]
    pub struct MockVault;

    #[contractimpl]
    impl MockVault {
        pub fn init(env: Env, beneficiaries: Vec<Beneficiary>, deadline: u64) {
            env.storage().instance().set(&BENEFS, &beneficiaries);
            env.storage().instance().set(&DEADLINE, &deadline);
        }

        pub fn set_beneficiaries(env: Env, beneficiaries: Vec<Beneficiary>) {
            env.storage().instance().set(&BENEFS, &beneficiaries);
        }

        pub fn set_deadline(env: Env, deadline: u64) {
            env.storage().instance().set(&DEADLINE, &deadline);
        }

        pub fn beneficiaries(env: Env) -> Vec<Beneficiary> {
            env.storage().instance().get(&BENEFS).unwrap()
        }

        pub fn deadline(env: Env) -> u64 {
            env.storage().instance().get(&DEADLINE).unwrap()
        }
    }
}
use mock_vault::{MockVault, MockVaultClient};

mod mock_broken {
    use super::*;

    /// Vault stub whose views trap.
    #[contract]
    pub struct MockBrokenVault;

    #[contractimpl]
    impl MockBrokenVault {
        pub fn beneficiaries(_env: Env) -> Vec<Beneficiary> {
            panic!("no such vault")
        }

        pub fn deadline(_env: Env) -> u64 {
            panic!("no such vault")
        }
    }
}
use mock_broken::MockBrokenVault;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const START: u64 = 1_700_000_000;

fn create_registry(env: &Env) -> LegacyRegistryClient<'static> {
    let id = env.register(LegacyRegistry, ());
    LegacyRegistryClient::new(env, &id)
}

fn register_mock_vault(env: &Env, wallets: &[&Address], deadline: u64) -> Address {
    let id = env.register(MockVault, ());
    let share = 10_000 / wallets.len() as u32;
    let mut list = Vec::new(env);
    for wallet in wallets {
        list.push_back(Beneficiary {
            wallet: (*wallet).clone(),
            share_bp: share,
        });
    }
    MockVaultClient::new(env, &id).init(&list, &deadline);
    id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn register_indexes_each_wallet() {
    let env = Env::default();
    env.ledger().with_mut(|l| l.timestamp = START);
    let registry = create_registry(&env);

    let heir_a = Address::generate(&env);
    let heir_b = Address::generate(&env);
    let vault = register_mock_vault(&env, &[&heir_a, &heir_b], START + 100);

    registry.register_vault(&vault);

    assert!(registry.is_registered(&vault));
    assert_eq!(registry.vaults_for(&heir_a), vec![&env, vault.clone()]);
    assert_eq!(registry.vaults_for(&heir_b), vec![&env, vault.clone()]);
    assert_eq!(registry.deadline_of(&vault), START + 100);

    let entry = registry.entry(&vault);
    assert_eq!(entry.registered_at, START);
    assert_eq!(entry.refreshed_at, START);
    assert_eq!(entry.wallets.len(), 2);
}

#[test]
fn register_unreachable_vault_rejected() {
    let env = Env::default();
    let registry = create_registry(&env);

    let broken = env.register(MockBrokenVault, ());
    assert_eq!(
        registry.try_register_vault(&broken),
        Err(Ok(RegistryError::VaultUnreachable))
    );
    assert!(!registry.is_registered(&broken));
}

#[test]
fn reregister_prunes_dropped_wallets() {
    let env = Env::default();
    env.ledger().with_mut(|l| l.timestamp = START);
    let registry = create_registry(&env);

    let heir_a = Address::generate(&env);
    let heir_b = Address::generate(&env);
    let heir_c = Address::generate(&env);
    let vault = register_mock_vault(&env, &[&heir_a, &heir_b], START + 100);
    registry.register_vault(&vault);

    // The vault replaces heir_a with heir_c; someone re-registers it.
    MockVaultClient::new(&env, &vault).set_beneficiaries(&vec![
        &env,
        Beneficiary {
            wallet: heir_b.clone(),
            share_bp: 5_000,
        },
        Beneficiary {
            wallet: heir_c.clone(),
            share_bp: 5_000,
        },
    ]);
    env.ledger().with_mut(|l| l.timestamp = START + 50);
    registry.register_vault(&vault);

    assert_eq!(registry.vaults_for(&heir_a).len(), 0);
    assert_eq!(registry.vaults_for(&heir_b), vec![&env, vault.clone()]);
    assert_eq!(registry.vaults_for(&heir_c), vec![&env, vault.clone()]);

    // The original registration time survives re-registration.
    let entry = registry.entry(&vault);
    assert_eq!(entry.registered_at, START);
    assert_eq!(entry.refreshed_at, START + 50);
}

#[test]
fn refresh_requires_registration() {
    let env = Env::default();
    let registry = create_registry(&env);

    let heir = Address::generate(&env);
    let vault = register_mock_vault(&env, &[&heir], 1_000);
    assert_eq!(
        registry.try_refresh(&vault),
        Err(Ok(RegistryError::NotRegistered))
    );
}

#[test]
fn refresh_updates_deadline() {
    let env = Env::default();
    env.ledger().with_mut(|l| l.timestamp = START);
    let registry = create_registry(&env);

    let heir = Address::generate(&env);
    let vault = register_mock_vault(&env, &[&heir], START + 100);
    registry.register_vault(&vault);

    // The owner checked in and the vault's deadline moved out.
    MockVaultClient::new(&env, &vault).set_deadline(&(START + 500));
    registry.refresh(&vault);

    assert_eq!(registry.deadline_of(&vault), START + 500);
    assert_eq!(registry.vaults_for(&heir), vec![&env, vault.clone()]);
}

#[test]
fn due_for_lists_only_expired_snapshots() {
    let env = Env::default();
    env.ledger().with_mut(|l| l.timestamp = START);
    let registry = create_registry(&env);

    let heir = Address::generate(&env);
    let overdue = register_mock_vault(&env, &[&heir], START + 100);
    let quiet = register_mock_vault(&env, &[&heir], START + 1_000);
    registry.register_vault(&overdue);
    registry.register_vault(&quiet);

    env.ledger().with_mut(|l| l.timestamp = START + 500);
    assert_eq!(registry.due_for(&heir), vec![&env, overdue.clone()]);
    assert_eq!(registry.vaults_for(&heir).len(), 2);

    // Past the second deadline both show up.
    env.ledger().with_mut(|l| l.timestamp = START + 1_001);
    assert_eq!(
        registry.due_for(&heir),
        vec![&env, overdue.clone(), quiet.clone()]
    );
}

#[test]
fn deadline_of_unregistered_rejected() {
    let env = Env::default();
    let registry = create_registry(&env);

    assert_eq!(
        registry.try_deadline_of(&Address::generate(&env)),
        Err(Ok(RegistryError::NotRegistered))
    );
}
