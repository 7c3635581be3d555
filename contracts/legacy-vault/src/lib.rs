#![no_std]

use soroban_sdk::{
    contract, contractimpl, contractmeta, log, symbol_short, token, Address, Env, Vec,
};

mod protocols;
mod types;

pub use types::*;

contractmeta!(
    key = "Description",
    val = "Dead man's switch vault releasing custodied assets to beneficiaries"
);

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct LegacyVault;

#[contractimpl]
impl LegacyVault {
    // -----------------------------------------------------------------------
    // Initialisation
    // -----------------------------------------------------------------------

    /// One-time setup, called by whatever deploys the vault instance. The
    /// inactivity clock starts immediately.
    pub fn initialize(
        env: Env,
        owner: Address,
        native_token: Address,
        treasury: Address,
        beneficiaries: Vec<Beneficiary>,
        threshold_secs: u64,
        staking: StakingConfig,
        lending_pool: Address,
    ) -> Result<(), VaultError> {
        if env.storage().instance().has(&DataKey::Owner) {
            return Err(VaultError::AlreadyInitialized);
        }
        owner.require_auth();

        Self::validate_threshold(threshold_secs)?;
        Self::validate_beneficiaries(&owner, &beneficiaries)?;

        let now = env.ledger().timestamp();
        env.storage().instance().set(&DataKey::Owner, &owner);
        env.storage().instance().set(&DataKey::NativeToken, &native_token);
        env.storage().instance().set(&DataKey::Treasury, &treasury);
        env.storage().instance().set(&DataKey::Status, &VaultStatus::Active);
        env.storage().instance().set(&DataKey::ThresholdSecs, &threshold_secs);
        env.storage().instance().set(&DataKey::LastCheckIn, &now);
        env.storage()
            .instance()
            .set(&DataKey::Tokens, &Vec::<Address>::new(&env));
        env.storage().instance().set(&DataKey::Staking, &staking);
        env.storage().instance().set(&DataKey::LendingPool, &lending_pool);

        let count = beneficiaries.len();
        env.storage()
            .instance()
            .set(&DataKey::Beneficiaries, &beneficiaries);

        env.events().publish(
            (symbol_short!("VAULT"), symbol_short!("INIT")),
            VaultInitializedEvent {
                owner,
                threshold_secs,
                beneficiary_count: count,
            },
        );
        log!(&env, "Vault initialized, deadline at {}", now + threshold_secs);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle and configuration
    // -----------------------------------------------------------------------

    /// Owner heartbeat. Restarts the inactivity window.
    pub fn check_in(env: Env, caller: Address) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;

        let now = env.ledger().timestamp();
        env.storage().instance().set(&DataKey::LastCheckIn, &now);

        let deadline = now + Self::read_threshold(&env)?;
        env.events().publish(
            (symbol_short!("VAULT"), symbol_short!("CHECKIN")),
            CheckInEvent { at: now, deadline },
        );
        Ok(())
    }

    /// Replace the inactivity threshold. Also restarts the window, so a
    /// shortened threshold can never make the vault claimable in the same
    /// ledger.
    pub fn update_threshold(
        env: Env,
        caller: Address,
        threshold_secs: u64,
    ) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;
        Self::validate_threshold(threshold_secs)?;

        let now = env.ledger().timestamp();
        env.storage()
            .instance()
            .set(&DataKey::ThresholdSecs, &threshold_secs);
        env.storage().instance().set(&DataKey::LastCheckIn, &now);

        env.events().publish(
            (symbol_short!("CONFIG"), symbol_short!("THRESH")),
            ThresholdUpdatedEvent {
                threshold_secs,
                deadline: now + threshold_secs,
            },
        );
        Ok(())
    }

    /// Replace the beneficiary list wholesale. The new list must satisfy
    /// every invariant or the old list stays.
    pub fn update_beneficiaries(
        env: Env,
        caller: Address,
        beneficiaries: Vec<Beneficiary>,
    ) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;
        Self::validate_beneficiaries(&caller, &beneficiaries)?;

        let count = beneficiaries.len();
        env.storage()
            .instance()
            .set(&DataKey::Beneficiaries, &beneficiaries);

        env.events().publish(
            (symbol_short!("CONFIG"), symbol_short!("BENEF")),
            BeneficiariesUpdatedEvent { count },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Asset registry
    // -----------------------------------------------------------------------

    pub fn register_token(env: Env, caller: Address, token: Address) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;

        let mut tokens = Self::read_tokens(&env);
        Self::add_token(&env, &mut tokens, token)?;
        env.storage().instance().set(&DataKey::Tokens, &tokens);
        Ok(())
    }

    pub fn register_tokens(
        env: Env,
        caller: Address,
        new_tokens: Vec<Address>,
    ) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;

        let mut tokens = Self::read_tokens(&env);
        for token in new_tokens.iter() {
            Self::add_token(&env, &mut tokens, token)?;
        }
        env.storage().instance().set(&DataKey::Tokens, &tokens);
        Ok(())
    }

    /// Drop a token from the registry. Refused while any of its principal is
    /// still deployed in the lending pool.
    pub fn unregister_token(env: Env, caller: Address, token: Address) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;

        let mut tokens = Self::read_tokens(&env);
        let index = tokens
            .first_index_of(&token)
            .ok_or(VaultError::InvalidConfiguration)?;

        if Self::read_principal(&env, &token).deployed != 0 {
            return Err(VaultError::InvalidConfiguration);
        }

        // Swap-and-pop; registry order carries no meaning.
        let last = tokens.len() - 1;
        if index != last {
            let moved = tokens.get(last).ok_or(VaultError::InvalidConfiguration)?;
            tokens.set(index, moved);
        }
        tokens.pop_back();
        env.storage().instance().set(&DataKey::Tokens, &tokens);

        env.events().publish(
            (symbol_short!("TOKEN"), symbol_short!("REMOVE")),
            TokenUnregisteredEvent { token },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Deposits and withdrawals
    // -----------------------------------------------------------------------

    pub fn deposit_native(env: Env, caller: Address, amount: i128) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;
        Self::acquire_guard(&env)?;

        let native = Self::read_native(&env)?;
        Self::do_deposit(&env, &caller, &native, amount)?;

        Self::release_guard(&env);
        Ok(())
    }

    pub fn deposit_token(
        env: Env,
        caller: Address,
        token: Address,
        amount: i128,
    ) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;
        Self::acquire_guard(&env)?;

        if !Self::read_tokens(&env).contains(&token) {
            return Err(VaultError::InvalidConfiguration);
        }
        Self::do_deposit(&env, &caller, &token, amount)?;

        Self::release_guard(&env);
        Ok(())
    }

    pub fn withdraw_native(env: Env, caller: Address, amount: i128) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;
        Self::acquire_guard(&env)?;

        let native = Self::read_native(&env)?;
        Self::do_withdraw(&env, &caller, &native, amount)?;

        Self::release_guard(&env);
        Ok(())
    }

    /// Withdraw any token the vault holds, registered or not, so stray
    /// balances are recoverable before distribution.
    pub fn withdraw_token(
        env: Env,
        caller: Address,
        token: Address,
        amount: i128,
    ) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;
        Self::acquire_guard(&env)?;

        Self::do_withdraw(&env, &caller, &token, amount)?;

        Self::release_guard(&env);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Yield deployment
    // -----------------------------------------------------------------------

    /// Push native into the staking service. The vault receives the rebasing
    /// receipt; principal moves from local to deployed, capped by what the
    /// ledger actually tracks.
    pub fn stake(env: Env, caller: Address, amount: i128) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;
        Self::acquire_guard(&env)?;
        if amount <= 0 {
            return Err(VaultError::InvalidConfiguration);
        }

        let vault = env.current_contract_address();
        let native = Self::read_native(&env)?;
        let staking = Self::read_staking(&env)?;

        if amount > token::Client::new(&env, &native).balance(&vault) {
            return Err(VaultError::InsufficientBalance);
        }

        protocols::transfer(&env, &native, &staking.service, amount)?;
        protocols::stake_submit(&env, &staking.service, &vault, amount)?;

        let mut entry = Self::read_principal(&env, &native);
        let moved = amount.min(entry.local);
        entry.local -= moved;
        entry.deployed += moved;
        Self::write_principal(&env, &native, &entry);

        env.events().publish(
            (symbol_short!("VAULT"), symbol_short!("STAKE")),
            StakeEvent {
                amount,
                principal_moved: moved,
            },
        );
        log!(&env, "Staked {}", amount);

        Self::release_guard(&env);
        Ok(())
    }

    /// Redeem `amount` of the staking receipt for native through the swap
    /// pool. Returns the native received; the principal ledger is credited
    /// with the redeemed proportion of deployed principal only.
    pub fn unstake(env: Env, caller: Address, amount: i128) -> Result<i128, VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;
        Self::acquire_guard(&env)?;
        if amount <= 0 {
            return Err(VaultError::InvalidConfiguration);
        }

        let vault = env.current_contract_address();
        let native = Self::read_native(&env)?;
        let staking = Self::read_staking(&env)?;

        let total = token::Client::new(&env, &staking.receipt).balance(&vault);
        if amount > total {
            return Err(VaultError::InsufficientBalance);
        }

        protocols::transfer(&env, &staking.receipt, &staking.swap, amount)?;
        let received = protocols::swap_exchange(
            &env,
            &staking.swap,
            &vault,
            staking.receipt_index,
            staking.native_index,
            amount,
            0,
        )?;

        let mut entry = Self::read_principal(&env, &native);
        let portion = Self::principal_portion(entry.deployed, amount, total);
        entry.deployed -= portion;
        entry.local += portion;
        Self::write_principal(&env, &native, &entry);

        env.events().publish(
            (symbol_short!("VAULT"), symbol_short!("UNSTAKE")),
            UnstakeEvent {
                redeemed: amount,
                received,
                principal_returned: portion,
            },
        );
        log!(&env, "Unstaked {} receipt for {} native", amount, received);

        Self::release_guard(&env);
        Ok(received)
    }

    /// Supply a registered token to the lending pool.
    pub fn lend(env: Env, caller: Address, token: Address, amount: i128) -> Result<(), VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;
        Self::acquire_guard(&env)?;
        if amount <= 0 {
            return Err(VaultError::InvalidConfiguration);
        }
        if !Self::read_tokens(&env).contains(&token) {
            return Err(VaultError::InvalidConfiguration);
        }

        let vault = env.current_contract_address();
        let pool = Self::read_lending_pool(&env)?;

        if amount > token::Client::new(&env, &token).balance(&vault) {
            return Err(VaultError::InsufficientBalance);
        }

        // Cache the pool's receipt token the first time this asset is lent;
        // distribution redeems through it without another pool query.
        let receipt_key = DataKey::LendReceipt(token.clone());
        if !env.storage().persistent().has(&receipt_key) {
            let receipt = protocols::pool_receipt(&env, &pool, &token)?;
            env.storage().persistent().set(&receipt_key, &receipt);
        }

        protocols::transfer(&env, &token, &pool, amount)?;
        protocols::pool_supply(&env, &pool, &token, amount, &vault)?;

        let mut entry = Self::read_principal(&env, &token);
        let moved = amount.min(entry.local);
        entry.local -= moved;
        entry.deployed += moved;
        Self::write_principal(&env, &token, &entry);

        env.events().publish(
            (symbol_short!("VAULT"), symbol_short!("LEND")),
            LendEvent {
                token,
                amount,
                principal_moved: moved,
            },
        );

        Self::release_guard(&env);
        Ok(())
    }

    /// Redeem `amount` of the pool's receipt token for the underlying asset.
    /// Returns what the pool actually paid out.
    pub fn withdraw_from_lending(
        env: Env,
        caller: Address,
        token: Address,
        amount: i128,
    ) -> Result<i128, VaultError> {
        Self::require_owner(&env, &caller)?;
        Self::require_active(&env)?;
        Self::acquire_guard(&env)?;
        if amount <= 0 {
            return Err(VaultError::InvalidConfiguration);
        }

        let vault = env.current_contract_address();
        let pool = Self::read_lending_pool(&env)?;
        let receipt: Address = env
            .storage()
            .persistent()
            .get(&DataKey::LendReceipt(token.clone()))
            .ok_or(VaultError::InsufficientBalance)?;

        let total = token::Client::new(&env, &receipt).balance(&vault);
        if amount > total {
            return Err(VaultError::InsufficientBalance);
        }

        protocols::transfer(&env, &receipt, &pool, amount)?;
        let received = protocols::pool_withdraw(&env, &pool, &token, amount, &vault)?;

        let mut entry = Self::read_principal(&env, &token);
        let portion = Self::principal_portion(entry.deployed, amount, total);
        entry.deployed -= portion;
        entry.local += portion;
        Self::write_principal(&env, &token, &entry);

        env.events().publish(
            (symbol_short!("VAULT"), symbol_short!("UNLEND")),
            LendWithdrawEvent {
                token,
                redeemed: amount,
                received,
                principal_returned: portion,
            },
        );

        Self::release_guard(&env);
        Ok(received)
    }

    // -----------------------------------------------------------------------
    // Distribution
    // -----------------------------------------------------------------------

    /// Execute the switch. Anyone may call once the deadline has passed.
    /// Every deployed position is redeemed in full, the yield fee is carved
    /// out per asset, and claim entries are written pro rata. All-or-nothing
    /// except the fee transfer, which may be skipped.
    pub fn trigger_distribution(env: Env) -> Result<(), VaultError> {
        match Self::read_status(&env)? {
            VaultStatus::Distributed => return Err(VaultError::AlreadyDistributed),
            VaultStatus::Active => {}
        }
        let now = env.ledger().timestamp();
        if now <= Self::deadline_value(&env)? {
            return Err(VaultError::NotYetClaimable);
        }
        Self::acquire_guard(&env)?;

        // Terminal state first; any later failure reverts it with the rest.
        env.storage()
            .instance()
            .set(&DataKey::Status, &VaultStatus::Distributed);

        let vault = env.current_contract_address();
        let native = Self::read_native(&env)?;
        let staking = Self::read_staking(&env)?;
        let pool = Self::read_lending_pool(&env)?;
        let tokens = Self::read_tokens(&env);
        let beneficiaries = Self::read_beneficiaries(&env)?;
        let treasury = Self::read_treasury(&env)?;

        // Redeem the entire staking position for native.
        let receipt_held = token::Client::new(&env, &staking.receipt).balance(&vault);
        if receipt_held > 0 {
            protocols::transfer(&env, &staking.receipt, &staking.swap, receipt_held)?;
            protocols::swap_exchange(
                &env,
                &staking.swap,
                &vault,
                staking.receipt_index,
                staking.native_index,
                receipt_held,
                0,
            )?;
        }
        Self::repatriate(&env, &native);

        // Redeem every lending position.
        for token_addr in tokens.iter() {
            let receipt_key = DataKey::LendReceipt(token_addr.clone());
            if let Some(receipt) = env.storage().persistent().get::<DataKey, Address>(&receipt_key)
            {
                let held = token::Client::new(&env, &receipt).balance(&vault);
                if held > 0 {
                    protocols::transfer(&env, &receipt, &pool, held)?;
                    protocols::pool_withdraw(&env, &pool, &token_addr, held, &vault)?;
                }
                Self::repatriate(&env, &token_addr);
            }
        }

        // Settle native first, then every registered token.
        Self::settle_asset(&env, &vault, &native, &beneficiaries, &treasury);
        for token_addr in tokens.iter() {
            Self::settle_asset(&env, &vault, &token_addr, &beneficiaries, &treasury);
        }

        let asset_count = tokens.len() + 1;
        env.events().publish(
            (symbol_short!("VAULT"), symbol_short!("DIST")),
            DistributionEvent {
                at: now,
                asset_count,
            },
        );
        log!(&env, "Distribution executed over {} assets", asset_count);

        Self::release_guard(&env);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    /// Pay out the caller's native claim. Exactly once; the entry is cleared
    /// before the transfer leaves.
    pub fn claim_native(env: Env, beneficiary: Address) -> Result<i128, VaultError> {
        Self::require_beneficiary(&env, &beneficiary)?;
        Self::acquire_guard(&env)?;

        let native = Self::read_native(&env)?;
        let paid = Self::pay_claim(&env, &beneficiary, &native)?;
        if paid == 0 {
            return Err(VaultError::NothingToClaim);
        }
        log!(&env, "Paid claim of {} to {}", paid, beneficiary);

        Self::release_guard(&env);
        Ok(paid)
    }

    /// Pay out claims for the listed tokens, silently skipping entries that
    /// are zero or absent. One failing transfer aborts the whole batch.
    pub fn claim_tokens(
        env: Env,
        beneficiary: Address,
        tokens: Vec<Address>,
    ) -> Result<(), VaultError> {
        Self::require_beneficiary(&env, &beneficiary)?;
        Self::acquire_guard(&env)?;

        for token_addr in tokens.iter() {
            Self::pay_claim(&env, &beneficiary, &token_addr)?;
        }

        Self::release_guard(&env);
        Ok(())
    }

    /// Pay out everything claimable by the caller, native included.
    pub fn claim_all(env: Env, beneficiary: Address) -> Result<(), VaultError> {
        Self::require_beneficiary(&env, &beneficiary)?;
        Self::acquire_guard(&env)?;

        let native = Self::read_native(&env)?;
        Self::pay_claim(&env, &beneficiary, &native)?;
        for token_addr in Self::read_tokens(&env).iter() {
            Self::pay_claim(&env, &beneficiary, &token_addr)?;
        }

        Self::release_guard(&env);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn owner(env: Env) -> Result<Address, VaultError> {
        Self::read_owner(&env)
    }

    pub fn treasury(env: Env) -> Result<Address, VaultError> {
        Self::read_treasury(&env)
    }

    pub fn native_token(env: Env) -> Result<Address, VaultError> {
        Self::read_native(&env)
    }

    pub fn status(env: Env) -> Result<VaultStatus, VaultError> {
        Self::read_status(&env)
    }

    pub fn threshold(env: Env) -> Result<u64, VaultError> {
        Self::read_threshold(&env)
    }

    pub fn last_check_in(env: Env) -> Result<u64, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::LastCheckIn)
            .ok_or(VaultError::NotInitialized)
    }

    /// The moment after which the vault becomes claimable.
    pub fn deadline(env: Env) -> Result<u64, VaultError> {
        Self::deadline_value(&env)
    }

    pub fn is_claimable(env: Env) -> Result<bool, VaultError> {
        if Self::read_status(&env)? == VaultStatus::Distributed {
            return Ok(false);
        }
        Ok(env.ledger().timestamp() > Self::deadline_value(&env)?)
    }

    pub fn beneficiaries(env: Env) -> Result<Vec<Beneficiary>, VaultError> {
        Self::read_beneficiaries(&env)
    }

    pub fn registered_tokens(env: Env) -> Vec<Address> {
        Self::read_tokens(&env)
    }

    pub fn staking_config(env: Env) -> Result<StakingConfig, VaultError> {
        Self::read_staking(&env)
    }

    pub fn lending_pool(env: Env) -> Result<Address, VaultError> {
        Self::read_lending_pool(&env)
    }

    pub fn principal_of(env: Env, asset: Address) -> PrincipalEntry {
        Self::read_principal(&env, &asset)
    }

    /// A beneficiary's unclaimed entry for one asset. Zero before
    /// distribution and after the claim is paid.
    pub fn claimable_amount(env: Env, beneficiary: Address, asset: Address) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::Claim(beneficiary, asset))
            .unwrap_or(0)
    }

    pub fn observed_balance(env: Env, asset: Address) -> i128 {
        token::Client::new(&env, &asset).balance(&env.current_contract_address())
    }

    // -----------------------------------------------------------------------
    // Core maths
    // -----------------------------------------------------------------------

    /// Principal attributed to a partial redemption: the redeemed fraction
    /// of deployed principal, floored, never exceeding it. A full redemption
    /// repatriates all of it regardless of rate drift.
    fn principal_portion(deployed: i128, redeemed: i128, total: i128) -> i128 {
        if deployed <= 0 || redeemed <= 0 || total <= 0 {
            return 0;
        }
        if redeemed >= total {
            return deployed;
        }
        let portion = redeemed * deployed / total;
        portion.min(deployed)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn require_owner(env: &Env, caller: &Address) -> Result<(), VaultError> {
        caller.require_auth();
        let owner: Address = env
            .storage()
            .instance()
            .get(&DataKey::Owner)
            .ok_or(VaultError::NotInitialized)?;
        if *caller != owner {
            return Err(VaultError::AccessDenied);
        }
        Ok(())
    }

    fn require_beneficiary(env: &Env, caller: &Address) -> Result<(), VaultError> {
        caller.require_auth();
        for b in Self::read_beneficiaries(env)?.iter() {
            if b.wallet == *caller {
                return Ok(());
            }
        }
        Err(VaultError::AccessDenied)
    }

    fn require_active(env: &Env) -> Result<(), VaultError> {
        match Self::read_status(env)? {
            VaultStatus::Active => Ok(()),
            VaultStatus::Distributed => Err(VaultError::AlreadyDistributed),
        }
    }

    fn acquire_guard(env: &Env) -> Result<(), VaultError> {
        if env
            .storage()
            .instance()
            .get(&DataKey::Guard)
            .unwrap_or(false)
        {
            return Err(VaultError::ReentrantCall);
        }
        env.storage().instance().set(&DataKey::Guard, &true);
        Ok(())
    }

    fn release_guard(env: &Env) {
        env.storage().instance().set(&DataKey::Guard, &false);
    }

    fn validate_threshold(threshold_secs: u64) -> Result<(), VaultError> {
        if !(MIN_THRESHOLD_SECS..=MAX_THRESHOLD_SECS).contains(&threshold_secs) {
            return Err(VaultError::InvalidConfiguration);
        }
        Ok(())
    }

    fn validate_beneficiaries(
        owner: &Address,
        beneficiaries: &Vec<Beneficiary>,
    ) -> Result<(), VaultError> {
        if beneficiaries.is_empty() || beneficiaries.len() > MAX_BENEFICIARIES {
            return Err(VaultError::InvalidConfiguration);
        }
        let mut total_bp: u64 = 0;
        for i in 0..beneficiaries.len() {
            let b = beneficiaries
                .get(i)
                .ok_or(VaultError::InvalidConfiguration)?;
            if b.share_bp == 0 || b.wallet == *owner {
                return Err(VaultError::InvalidConfiguration);
            }
            for j in (i + 1)..beneficiaries.len() {
                if let Some(other) = beneficiaries.get(j) {
                    if other.wallet == b.wallet {
                        return Err(VaultError::InvalidConfiguration);
                    }
                }
            }
            total_bp += b.share_bp as u64;
        }
        if total_bp != BPS_DENOMINATOR as u64 {
            return Err(VaultError::InvalidConfiguration);
        }
        Ok(())
    }

    fn add_token(env: &Env, tokens: &mut Vec<Address>, token: Address) -> Result<(), VaultError> {
        let native = Self::read_native(env)?;
        if token == native || tokens.contains(&token) || tokens.len() >= MAX_TOKENS {
            return Err(VaultError::InvalidConfiguration);
        }
        tokens.push_back(token.clone());
        env.events().publish(
            (symbol_short!("TOKEN"), symbol_short!("ADD")),
            TokenRegisteredEvent { token },
        );
        Ok(())
    }

    fn do_deposit(
        env: &Env,
        caller: &Address,
        token_addr: &Address,
        amount: i128,
    ) -> Result<(), VaultError> {
        if amount <= 0 {
            return Err(VaultError::InvalidConfiguration);
        }
        if token::Client::new(env, token_addr).balance(caller) < amount {
            return Err(VaultError::InsufficientBalance);
        }
        protocols::transfer_in(env, token_addr, caller, amount)?;

        let mut entry = Self::read_principal(env, token_addr);
        entry.local += amount;
        Self::write_principal(env, token_addr, &entry);

        env.events().publish(
            (symbol_short!("VAULT"), symbol_short!("DEPOSIT")),
            DepositEvent {
                token: token_addr.clone(),
                amount,
            },
        );
        log!(env, "Deposited {}", amount);
        Ok(())
    }

    fn do_withdraw(
        env: &Env,
        to: &Address,
        token_addr: &Address,
        amount: i128,
    ) -> Result<(), VaultError> {
        if amount <= 0 {
            return Err(VaultError::InvalidConfiguration);
        }
        let held = token::Client::new(env, token_addr).balance(&env.current_contract_address());
        if amount > held {
            return Err(VaultError::InsufficientBalance);
        }
        protocols::transfer(env, token_addr, to, amount)?;

        // Withdrawing untracked yield never drives principal negative.
        let mut entry = Self::read_principal(env, token_addr);
        entry.local -= amount.min(entry.local);
        Self::write_principal(env, token_addr, &entry);

        env.events().publish(
            (symbol_short!("VAULT"), symbol_short!("WITHDRAW")),
            WithdrawEvent {
                token: token_addr.clone(),
                amount,
            },
        );
        log!(env, "Withdrew {}", amount);
        Ok(())
    }

    /// Full redemption moves all remaining deployed principal home.
    fn repatriate(env: &Env, asset: &Address) {
        let mut entry = Self::read_principal(env, asset);
        if entry.deployed != 0 {
            entry.local += entry.deployed;
            entry.deployed = 0;
            Self::write_principal(env, asset, &entry);
        }
    }

    /// Carve the yield fee out of one asset and write the pro-rata claim
    /// entries. Claims are sized off the post-fee pot even when the fee
    /// transfer was skipped; a stranded fee stays in the vault like dust.
    fn settle_asset(
        env: &Env,
        vault: &Address,
        asset: &Address,
        beneficiaries: &Vec<Beneficiary>,
        treasury: &Address,
    ) {
        let observed = token::Client::new(env, asset).balance(vault);
        let entry = Self::read_principal(env, asset);
        let principal = entry.local + entry.deployed;
        let yield_amount = if observed > principal {
            observed - principal
        } else {
            0
        };
        let fee = yield_amount * YIELD_FEE_BPS / BPS_DENOMINATOR;
        if fee > 0 && !protocols::try_transfer(env, asset, treasury, fee) {
            env.events().publish(
                (symbol_short!("FEE"), symbol_short!("SKIP")),
                FeeSkippedEvent {
                    token: asset.clone(),
                    amount: fee,
                },
            );
        }

        let distributable = observed - fee;
        if distributable > 0 {
            for b in beneficiaries.iter() {
                let share = distributable * b.share_bp as i128 / BPS_DENOMINATOR;
                if share > 0 {
                    env.storage()
                        .persistent()
                        .set(&DataKey::Claim(b.wallet.clone(), asset.clone()), &share);
                }
            }
        }

        env.events().publish(
            (symbol_short!("VAULT"), symbol_short!("PAYOUT")),
            AssetDistributedEvent {
                token: asset.clone(),
                observed,
                yield_amount,
                fee,
                distributable,
            },
        );
    }

    /// Clear-then-transfer. Returns the amount paid, zero when there was no
    /// entry to pay.
    fn pay_claim(env: &Env, beneficiary: &Address, asset: &Address) -> Result<i128, VaultError> {
        let key = DataKey::Claim(beneficiary.clone(), asset.clone());
        let amount: i128 = env.storage().persistent().get(&key).unwrap_or(0);
        if amount <= 0 {
            return Ok(0);
        }
        env.storage().persistent().remove(&key);
        protocols::transfer(env, asset, beneficiary, amount)?;

        env.events().publish(
            (symbol_short!("CLAIM"), symbol_short!("PAID")),
            ClaimPaidEvent {
                beneficiary: beneficiary.clone(),
                token: asset.clone(),
                amount,
            },
        );
        Ok(amount)
    }

    fn read_owner(env: &Env) -> Result<Address, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Owner)
            .ok_or(VaultError::NotInitialized)
    }

    fn read_native(env: &Env) -> Result<Address, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::NativeToken)
            .ok_or(VaultError::NotInitialized)
    }

    fn read_treasury(env: &Env) -> Result<Address, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Treasury)
            .ok_or(VaultError::NotInitialized)
    }

    fn read_status(env: &Env) -> Result<VaultStatus, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Status)
            .ok_or(VaultError::NotInitialized)
    }

    fn read_threshold(env: &Env) -> Result<u64, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::ThresholdSecs)
            .ok_or(VaultError::NotInitialized)
    }

    fn read_beneficiaries(env: &Env) -> Result<Vec<Beneficiary>, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Beneficiaries)
            .ok_or(VaultError::NotInitialized)
    }

    fn read_staking(env: &Env) -> Result<StakingConfig, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Staking)
            .ok_or(VaultError::NotInitialized)
    }

    fn read_lending_pool(env: &Env) -> Result<Address, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::LendingPool)
            .ok_or(VaultError::NotInitialized)
    }

    fn read_tokens(env: &Env) -> Vec<Address> {
        env.storage()
            .instance()
            .get(&DataKey::Tokens)
            .unwrap_or(Vec::new(env))
    }

    fn read_principal(env: &Env, asset: &Address) -> PrincipalEntry {
        env.storage()
            .persistent()
            .get(&DataKey::Principal(asset.clone()))
            .unwrap_or(PrincipalEntry {
                local: 0,
                deployed: 0,
            })
    }

    fn write_principal(env: &Env, asset: &Address, entry: &PrincipalEntry) {
        env.storage()
            .persistent()
            .set(&DataKey::Principal(asset.clone()), entry);
    }

    fn deadline_value(env: &Env) -> Result<u64, VaultError> {
        let last: u64 = env
            .storage()
            .instance()
            .get(&DataKey::LastCheckIn)
            .ok_or(VaultError::NotInitialized)?;
        Ok(last + Self::read_threshold(env)?)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
