#![no_std]

use soroban_sdk::{
    contract, contracterror, contractimpl, contractmeta, contracttype, symbol_short, vec, Address,
    Env, InvokeError, Symbol, Vec,
};

contractmeta!(
    key = "Description",
    val = "Beneficiary-facing index of inheritance vaults and their deadlines"
);

/// Mirror of the vault's beneficiary entry, decoded from its view.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Beneficiary {
    pub wallet: Address,
    pub share_bp: u32,
}

/// Snapshot of one vault, taken at registration and on every refresh.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultEntry {
    pub deadline: u64,
    pub wallets: Vec<Address>,
    pub registered_at: u64,
    pub refreshed_at: u64,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Vault(Address),
    Watch(Address),
}

#[contracterror]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegistryError {
    NotRegistered = 1,
    VaultUnreachable = 2,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultIndexedEvent {
    pub vault: Address,
    pub deadline: u64,
    pub wallet_count: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultRefreshedEvent {
    pub vault: Address,
    pub deadline: u64,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct LegacyRegistry;

#[contractimpl]
impl LegacyRegistry {
    /// Index a vault under every beneficiary wallet it names. Anyone may
    /// register any vault; the snapshot is read straight from the vault
    /// itself. Re-registering re-snapshots and drops wallets the vault no
    /// longer names.
    pub fn register_vault(env: Env, vault: Address) -> Result<(), RegistryError> {
        let (wallets, deadline) = Self::read_vault(&env, &vault)?;
        let now = env.ledger().timestamp();

        let registered_at = match Self::read_entry(&env, &vault) {
            Some(old) => {
                Self::prune(&env, &vault, &old.wallets, &wallets);
                old.registered_at
            }
            None => now,
        };

        Self::store_entry(&env, &vault, &wallets, deadline, registered_at, now);

        env.events().publish(
            (symbol_short!("REGISTRY"), symbol_short!("INDEX")),
            VaultIndexedEvent {
                vault,
                deadline,
                wallet_count: wallets.len(),
            },
        );
        Ok(())
    }

    /// Re-read a registered vault's beneficiary list and deadline, after an
    /// owner check-in or a beneficiary change made the snapshot stale.
    pub fn refresh(env: Env, vault: Address) -> Result<(), RegistryError> {
        let old = Self::read_entry(&env, &vault).ok_or(RegistryError::NotRegistered)?;
        let (wallets, deadline) = Self::read_vault(&env, &vault)?;

        Self::prune(&env, &vault, &old.wallets, &wallets);
        Self::store_entry(
            &env,
            &vault,
            &wallets,
            deadline,
            old.registered_at,
            env.ledger().timestamp(),
        );

        env.events().publish(
            (symbol_short!("REGISTRY"), symbol_short!("REFRESH")),
            VaultRefreshedEvent { vault, deadline },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Every indexed vault naming this wallet.
    pub fn vaults_for(env: Env, wallet: Address) -> Vec<Address> {
        Self::read_watch(&env, &wallet)
    }

    /// Indexed vaults naming this wallet whose snapshot deadline has passed.
    /// Works off the last refresh, not live vault state.
    pub fn due_for(env: Env, wallet: Address) -> Vec<Address> {
        let now = env.ledger().timestamp();
        let mut due = Vec::new(&env);
        for vault in Self::read_watch(&env, &wallet).iter() {
            if let Some(entry) = Self::read_entry(&env, &vault) {
                if now > entry.deadline {
                    due.push_back(vault);
                }
            }
        }
        due
    }

    pub fn deadline_of(env: Env, vault: Address) -> Result<u64, RegistryError> {
        Self::read_entry(&env, &vault)
            .map(|e| e.deadline)
            .ok_or(RegistryError::NotRegistered)
    }

    pub fn entry(env: Env, vault: Address) -> Result<VaultEntry, RegistryError> {
        Self::read_entry(&env, &vault).ok_or(RegistryError::NotRegistered)
    }

    pub fn is_registered(env: Env, vault: Address) -> bool {
        Self::read_entry(&env, &vault).is_some()
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Pull the beneficiary wallets and deadline from the vault. Any failure
    /// on the vault's side makes it unreachable as far as the index cares.
    fn read_vault(env: &Env, vault: &Address) -> Result<(Vec<Address>, u64), RegistryError> {
        let beneficiaries = match env.try_invoke_contract::<Vec<Beneficiary>, InvokeError>(
            vault,
            &Symbol::new(env, "beneficiaries"),
            vec![env],
        ) {
            Ok(Ok(list)) => list,
            _ => return Err(RegistryError::VaultUnreachable),
        };
        let deadline = match env.try_invoke_contract::<u64, InvokeError>(
            vault,
            &symbol_short!("deadline"),
            vec![env],
        ) {
            Ok(Ok(at)) => at,
            _ => return Err(RegistryError::VaultUnreachable),
        };

        let mut wallets = Vec::new(env);
        for b in beneficiaries.iter() {
            wallets.push_back(b.wallet);
        }
        Ok((wallets, deadline))
    }

    fn store_entry(
        env: &Env,
        vault: &Address,
        wallets: &Vec<Address>,
        deadline: u64,
        registered_at: u64,
        refreshed_at: u64,
    ) {
        env.storage().persistent().set(
            &DataKey::Vault(vault.clone()),
            &VaultEntry {
                deadline,
                wallets: wallets.clone(),
                registered_at,
                refreshed_at,
            },
        );
        for wallet in wallets.iter() {
            let mut watched = Self::read_watch(env, &wallet);
            if !watched.contains(vault) {
                watched.push_back(vault.clone());
                env.storage()
                    .persistent()
                    .set(&DataKey::Watch(wallet.clone()), &watched);
            }
        }
    }

    /// Remove this vault from the watch lists of wallets it dropped.
    fn prune(env: &Env, vault: &Address, old: &Vec<Address>, new: &Vec<Address>) {
        for wallet in old.iter() {
            if new.contains(&wallet) {
                continue;
            }
            let mut watched = Self::read_watch(env, &wallet);
            if let Some(index) = watched.first_index_of(vault) {
                watched.remove(index);
                env.storage()
                    .persistent()
                    .set(&DataKey::Watch(wallet.clone()), &watched);
            }
        }
    }

    fn read_entry(env: &Env, vault: &Address) -> Option<VaultEntry> {
        env.storage()
            .persistent()
            .get(&DataKey::Vault(vault.clone()))
    }

    fn read_watch(env: &Env, wallet: &Address) -> Vec<Address> {
        env.storage()
            .persistent()
            .get(&DataKey::Watch(wallet.clone()))
            .unwrap_or(Vec::new(env))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test;
