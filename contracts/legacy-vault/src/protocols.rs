//! Calls across the trust boundary: the token interface, the staking
//! service, its redemption swap pool, and the lending pool. Everything here
//! goes through `try_invoke_contract` so a reverting counterparty surfaces
//! as `ExternalCallFailure` instead of trapping the vault.

use soroban_sdk::{symbol_short, vec, Address, Env, IntoVal, InvokeError, Val, Vec};

use crate::types::VaultError;

/// Transfer `amount` of `token` from the vault to `to`.
pub fn transfer(env: &Env, token: &Address, to: &Address, amount: i128) -> Result<(), VaultError> {
    let args: Vec<Val> = vec![
        env,
        env.current_contract_address().into_val(env),
        to.into_val(env),
        amount.into_val(env),
    ];
    let res = env.try_invoke_contract::<(), InvokeError>(token, &symbol_short!("transfer"), args);
    if res.is_err() {
        return Err(VaultError::ExternalCallFailure);
    }
    Ok(())
}

/// Transfer `amount` of `token` from `from` into the vault. The depositor
/// has authorized the sub-invocation by signing the top-level call.
pub fn transfer_in(
    env: &Env,
    token: &Address,
    from: &Address,
    amount: i128,
) -> Result<(), VaultError> {
    let args: Vec<Val> = vec![
        env,
        from.into_val(env),
        env.current_contract_address().into_val(env),
        amount.into_val(env),
    ];
    let res = env.try_invoke_contract::<(), InvokeError>(token, &symbol_short!("transfer"), args);
    if res.is_err() {
        return Err(VaultError::ExternalCallFailure);
    }
    Ok(())
}

/// Best-effort transfer used for the yield fee. Returns whether it landed;
/// a refusing treasury must not block distribution.
pub fn try_transfer(env: &Env, token: &Address, to: &Address, amount: i128) -> bool {
    let args: Vec<Val> = vec![
        env,
        env.current_contract_address().into_val(env),
        to.into_val(env),
        amount.into_val(env),
    ];
    env.try_invoke_contract::<(), InvokeError>(token, &symbol_short!("transfer"), args)
        .is_ok()
}

/// Submit already-transferred native to the staking service; the rebasing
/// receipt is credited to `to`.
pub fn stake_submit(
    env: &Env,
    service: &Address,
    to: &Address,
    amount: i128,
) -> Result<(), VaultError> {
    let args: Vec<Val> = vec![env, to.into_val(env), amount.into_val(env)];
    let res = env.try_invoke_contract::<(), InvokeError>(service, &symbol_short!("submit"), args);
    if res.is_err() {
        return Err(VaultError::ExternalCallFailure);
    }
    Ok(())
}

/// Swap already-transferred input through the pool; output is sent to `to`.
/// Returns the amount received.
pub fn swap_exchange(
    env: &Env,
    pool: &Address,
    to: &Address,
    in_index: u32,
    out_index: u32,
    amount_in: i128,
    min_out: i128,
) -> Result<i128, VaultError> {
    let args: Vec<Val> = vec![
        env,
        to.into_val(env),
        in_index.into_val(env),
        out_index.into_val(env),
        amount_in.into_val(env),
        min_out.into_val(env),
    ];
    match env.try_invoke_contract::<i128, InvokeError>(pool, &symbol_short!("exchange"), args) {
        Ok(Ok(received)) => Ok(received),
        _ => Err(VaultError::ExternalCallFailure),
    }
}

/// Supply already-transferred `asset` to the lending pool on behalf of `to`.
pub fn pool_supply(
    env: &Env,
    pool: &Address,
    asset: &Address,
    amount: i128,
    to: &Address,
) -> Result<(), VaultError> {
    let args: Vec<Val> = vec![
        env,
        asset.into_val(env),
        amount.into_val(env),
        to.into_val(env),
    ];
    let res = env.try_invoke_contract::<(), InvokeError>(pool, &symbol_short!("supply"), args);
    if res.is_err() {
        return Err(VaultError::ExternalCallFailure);
    }
    Ok(())
}

/// Redeem already-transferred receipt tokens for `asset`; underlying is sent
/// to `to`. Returns the amount actually withdrawn.
pub fn pool_withdraw(
    env: &Env,
    pool: &Address,
    asset: &Address,
    amount: i128,
    to: &Address,
) -> Result<i128, VaultError> {
    let args: Vec<Val> = vec![
        env,
        asset.into_val(env),
        amount.into_val(env),
        to.into_val(env),
    ];
    match env.try_invoke_contract::<i128, InvokeError>(pool, &symbol_short!("withdraw"), args) {
        Ok(Ok(received)) => Ok(received),
        _ => Err(VaultError::ExternalCallFailure),
    }
}

/// Ask the lending pool for the interest-bearing receipt token of `asset`.
pub fn pool_receipt(env: &Env, pool: &Address, asset: &Address) -> Result<Address, VaultError> {
    let args: Vec<Val> = vec![env, asset.into_val(env)];
    match env.try_invoke_contract::<Address, InvokeError>(pool, &symbol_short!("receipt"), args) {
        Ok(Ok(receipt)) => Ok(receipt),
        _ => Err(VaultError::ExternalCallFailure),
    }
}
