use soroban_sdk::{contracterror, contracttype, Address};

/// Maximum number of beneficiaries a vault can carry.
pub const MAX_BENEFICIARIES: u32 = 10;

/// Maximum number of registered non-native tokens.
pub const MAX_TOKENS: u32 = 50;

/// Basis-point denominator: 10_000 bp = 100%.
pub const BPS_DENOMINATOR: i128 = 10_000;

/// Protocol fee charged on realized yield only, in basis points.
pub const YIELD_FEE_BPS: i128 = 1_000;

/// Inactivity threshold bounds: 30 days to 730 days, in seconds.
pub const MIN_THRESHOLD_SECS: u64 = 30 * 24 * 60 * 60;
pub const MAX_THRESHOLD_SECS: u64 = 730 * 24 * 60 * 60;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VaultStatus {
    Active,
    Distributed,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Beneficiary {
    pub wallet: Address,
    pub share_bp: u32, // basis points; the list must sum to exactly 10_000
}

/// Principal tracked per asset. `local` sits in the vault, `deployed` is
/// working in an external protocol. Yield is whatever the observed balance
/// exceeds their sum by.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrincipalEntry {
    pub local: i128,
    pub deployed: i128,
}

/// Addresses the vault needs to route native principal through the staking
/// service and redeem its rebasing receipt via a swap pool.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StakingConfig {
    pub service: Address,
    pub receipt: Address,
    pub swap: Address,
    pub receipt_index: u32,
    pub native_index: u32,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Owner,
    NativeToken,
    Treasury,
    Status,
    ThresholdSecs,
    LastCheckIn,
    Beneficiaries,            // Vec<Beneficiary>
    Tokens,                   // Vec<Address> of registered non-native tokens
    Staking,                  // StakingConfig
    LendingPool,
    Guard,                    // re-entrancy flag
    Principal(Address),       // asset -> PrincipalEntry
    LendReceipt(Address),     // asset -> pool receipt token, cached on first lend
    Claim(Address, Address),  // beneficiary, asset -> i128, written at distribution
}

#[contracterror]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VaultError {
    AccessDenied = 1,
    AlreadyDistributed = 2,
    NotYetClaimable = 3,
    InvalidConfiguration = 4,
    InsufficientBalance = 5,
    NothingToClaim = 6,
    ExternalCallFailure = 7,
    ReentrantCall = 8,
    AlreadyInitialized = 9,
    NotInitialized = 10,
}

// Events

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultInitializedEvent {
    pub owner: Address,
    pub threshold_secs: u64,
    pub beneficiary_count: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckInEvent {
    pub at: u64,
    pub deadline: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThresholdUpdatedEvent {
    pub threshold_secs: u64,
    pub deadline: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BeneficiariesUpdatedEvent {
    pub count: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokenRegisteredEvent {
    pub token: Address,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokenUnregisteredEvent {
    pub token: Address,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DepositEvent {
    pub token: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WithdrawEvent {
    pub token: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StakeEvent {
    pub amount: i128,
    pub principal_moved: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnstakeEvent {
    pub redeemed: i128,
    pub received: i128,
    pub principal_returned: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LendEvent {
    pub token: Address,
    pub amount: i128,
    pub principal_moved: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LendWithdrawEvent {
    pub token: Address,
    pub redeemed: i128,
    pub received: i128,
    pub principal_returned: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AssetDistributedEvent {
    pub token: Address,
    pub observed: i128,
    pub yield_amount: i128,
    pub fee: i128,
    pub distributable: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DistributionEvent {
    pub at: u64,
    pub asset_count: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeeSkippedEvent {
    pub token: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClaimPaidEvent {
    pub beneficiary: Address,
    pub token: Address,
    pub amount: i128,
}
