#![no_std]
#![deny(unsafe_code)]
#![deny(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, token, Address, Env, Symbol,
    Vec,
};

/// Centralized contract error codes. Auth failures are signaled by host panic (require_auth).
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[repr(u32)]
pub enum ResaleRewardError {
    /// Sale parameters were already set.
    AlreadyInitialized = 1,
    /// Contract is not initialized (brand not set).
    NotInitialized = 2,
    /// Caller is not authorized to perform this action.
    Unauthorized = 3,
    /// Amount or price is zero (or arithmetic on it is out of range).
    InvalidAmount = 4,
    /// Minting would push total supply past max_supply.
    SupplyExceeded = 5,
    /// Paid value does not equal price * amount.
    PaymentMismatch = 6,
    /// Seller does not hold enough units to resell.
    InsufficientSellerBalance = 7,
    /// Outbound payment-token transfer failed; the operation rolls back.
    TransferFailed = 8,
    /// Caller has no unexpired pending rewards to claim.
    NoClaimableRewards = 9,
    /// Sweep bounds are malformed (start > end, or end >= holder count).
    InvalidRange = 10,
}

// ── Event symbols ────────────────────────────────────────────
const EVENT_INIT: Symbol = symbol_short!("init");
const EVENT_MINT: Symbol = symbol_short!("mint");
const EVENT_BUY: Symbol = symbol_short!("buy");
const EVENT_RESALE: Symbol = symbol_short!("resale");
const EVENT_REWARD_ASSIGNED: Symbol = symbol_short!("rew_asgn");
const EVENT_CLAIM: Symbol = symbol_short!("claim");
const EVENT_SWEEP: Symbol = symbol_short!("sweep");
const EVENT_PRICE_SET: Symbol = symbol_short!("price_set");

const BPS_DENOMINATOR: i128 = 10_000;

/// Brand cut of every resale, in basis points (20%). The other 80% is split
/// equally among the holder set snapshotted before the units move.
const BRAND_RESALE_SHARE_BPS: i128 = 2_000;

/// Pending rewards expire this many seconds after assignment (7 days).
/// Expired entries stop being claimable and become sweepable to the brand.
pub const REWARD_TTL_SECS: u64 = 7 * 24 * 60 * 60;

// ── Data structures ──────────────────────────────────────────

/// A discrete unit of owed value assigned to one holder by one resale.
/// Lives in the holder's pending list until it is claimed (holder paid) or
/// swept after expiry (brand paid); either resolution deletes it.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct RewardEntry {
    pub amount: i128,
    pub expiry: u64,
}

/// Breakdown of one resale payment.
///
/// `brand_share` is the 20% floor cut; the brand is additionally paid
/// `remainder`, the integer-division leftover of the equal split. When the
/// holder set is empty the whole payment lands in `brand_share` and the
/// other fields are zero. Always: `brand_share + holder_count * per_holder
/// + remainder == payment`.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct ResaleSplit {
    pub brand_share: i128,
    pub holders_share: i128,
    pub per_holder: i128,
    pub remainder: i128,
}

/// Storage keys. Holder membership uses the HolderCount/HolderItem/
/// HolderIndex triple: items are indexed densely, removal swaps the last
/// item into the vacated slot, and the reverse index gives O(1) membership.
/// Iteration order is therefore not stable across removals and carries no
/// meaning. `Rewards` holds each holder's pending entries, also order-free.
#[contracttype]
pub enum DataKey {
    /// Brand address; receives primary-sale proceeds, resale cuts, and sweeps.
    Brand,
    /// Product token contract; this contract is its mint admin.
    ProductToken,
    /// Asset used for every payment, escrow, and payout.
    PaymentToken,
    /// Fixed price per unit for both primary sales and resales.
    PricePerUnit,
    /// Immutable cap on units ever minted.
    MaxSupply,
    /// Units minted so far (primary sales and privileged mints).
    TotalMinted,
    /// Number of addresses currently holding a positive balance.
    HolderCount,
    /// Holder address at a dense index.
    HolderItem(u32),
    /// Reverse lookup: holder address to its current index.
    HolderIndex(Address),
    /// Pending reward entries for a holder.
    Rewards(Address),
}

// ── Contract ─────────────────────────────────────────────────
#[contract]
pub struct ResaleRewardShare;

#[contractimpl]
impl ResaleRewardShare {
    // ── Config access ─────────────────────────────────────────

    fn brand(env: &Env) -> Result<Address, ResaleRewardError> {
        env.storage()
            .persistent()
            .get(&DataKey::Brand)
            .ok_or(ResaleRewardError::NotInitialized)
    }

    fn product_token(env: &Env) -> Result<Address, ResaleRewardError> {
        env.storage()
            .persistent()
            .get(&DataKey::ProductToken)
            .ok_or(ResaleRewardError::NotInitialized)
    }

    fn payment_token(env: &Env) -> Result<Address, ResaleRewardError> {
        env.storage()
            .persistent()
            .get(&DataKey::PaymentToken)
            .ok_or(ResaleRewardError::NotInitialized)
    }

    fn price(env: &Env) -> Result<i128, ResaleRewardError> {
        env.storage()
            .persistent()
            .get(&DataKey::PricePerUnit)
            .ok_or(ResaleRewardError::NotInitialized)
    }

    /// Caller must authorize and be the brand. Used by privileged entrypoints.
    fn require_brand(env: &Env, caller: &Address) -> Result<(), ResaleRewardError> {
        caller.require_auth();
        let brand = Self::brand(env)?;
        if *caller != brand {
            return Err(ResaleRewardError::Unauthorized);
        }
        Ok(())
    }

    /// Expected payment for `amount` units at the current price.
    fn expected_payment(env: &Env, amount: i128) -> Result<i128, ResaleRewardError> {
        let price = Self::price(env)?;
        price
            .checked_mul(amount)
            .ok_or(ResaleRewardError::InvalidAmount)
    }

    // ── Holder registry ───────────────────────────────────────

    fn holder_total(env: &Env) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::HolderCount)
            .unwrap_or(0)
    }

    fn holder_at(env: &Env, index: u32) -> Address {
        env.storage()
            .persistent()
            .get(&DataKey::HolderItem(index))
            .unwrap()
    }

    /// Register a holder. Idempotent; appends at the next dense index.
    fn add_holder(env: &Env, holder: &Address) {
        let index_key = DataKey::HolderIndex(holder.clone());
        if env.storage().persistent().has(&index_key) {
            return;
        }
        let count = Self::holder_total(env);
        env.storage()
            .persistent()
            .set(&DataKey::HolderItem(count), holder);
        env.storage().persistent().set(&index_key, &count);
        env.storage()
            .persistent()
            .set(&DataKey::HolderCount, &(count + 1));
    }

    /// Drop a holder by swapping the last item into its slot. No-op when the
    /// address is not registered. Indices of other holders may change.
    fn remove_holder(env: &Env, holder: &Address) {
        let index_key = DataKey::HolderIndex(holder.clone());
        let index: u32 = match env.storage().persistent().get(&index_key) {
            Some(i) => i,
            None => return,
        };
        let last = Self::holder_total(env) - 1;
        if index < last {
            let tail: Address = env
                .storage()
                .persistent()
                .get(&DataKey::HolderItem(last))
                .unwrap();
            env.storage()
                .persistent()
                .set(&DataKey::HolderItem(index), &tail);
            env.storage()
                .persistent()
                .set(&DataKey::HolderIndex(tail), &index);
        }
        env.storage().persistent().remove(&DataKey::HolderItem(last));
        env.storage().persistent().remove(&index_key);
        env.storage().persistent().set(&DataKey::HolderCount, &last);
    }

    /// Re-check one address against the product-token ledger and update
    /// membership to match. Called after every balance-changing operation so
    /// that registration always equals "balance is positive".
    fn sync_holder(env: &Env, product: &Address, who: &Address) {
        let balance = token::Client::new(env, product).balance(who);
        if balance > 0 {
            Self::add_holder(env, who);
        } else {
            Self::remove_holder(env, who);
        }
    }

    // ── Reward ledger ─────────────────────────────────────────

    fn rewards_of(env: &Env, holder: &Address) -> Vec<RewardEntry> {
        env.storage()
            .persistent()
            .get(&DataKey::Rewards(holder.clone()))
            .unwrap_or_else(|| Vec::new(env))
    }

    fn store_rewards(env: &Env, holder: &Address, entries: &Vec<RewardEntry>) {
        let key = DataKey::Rewards(holder.clone());
        if entries.is_empty() {
            env.storage().persistent().remove(&key);
        } else {
            env.storage().persistent().set(&key, entries);
        }
    }

    fn assign_reward(env: &Env, holder: &Address, amount: i128, expiry: u64) {
        let key = DataKey::Rewards(holder.clone());
        let mut entries: Vec<RewardEntry> = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| Vec::new(env));
        entries.push_back(RewardEntry { amount, expiry });
        env.storage().persistent().set(&key, &entries);
    }

    /// Swap the last entry into `index` and shrink by one. The caller must
    /// re-examine `index` afterwards instead of advancing past it.
    fn swap_remove(entries: &mut Vec<RewardEntry>, index: u32) {
        let last = entries.len() - 1;
        if index < last {
            let tail = entries.get_unchecked(last);
            entries.set(index, tail);
        }
        entries.pop_back_unchecked();
    }

    /// Remove and total every entry of `holder` with `expiry >= now`.
    /// Entries already past expiry stay in place for a later sweep.
    fn take_claimable(env: &Env, holder: &Address, now: u64) -> i128 {
        let mut entries = Self::rewards_of(env, holder);
        let mut total: i128 = 0;
        let mut i: u32 = 0;
        while i < entries.len() {
            let entry = entries.get_unchecked(i);
            if entry.expiry >= now {
                total += entry.amount;
                Self::swap_remove(&mut entries, i);
            } else {
                i += 1;
            }
        }
        Self::store_rewards(env, holder, &entries);
        total
    }

    /// Remove and total every entry of `holder` with `expiry < now`.
    /// Unexpired entries stay claimable.
    fn take_expired(env: &Env, holder: &Address, now: u64) -> i128 {
        let mut entries = Self::rewards_of(env, holder);
        let mut total: i128 = 0;
        let mut i: u32 = 0;
        while i < entries.len() {
            let entry = entries.get_unchecked(i);
            if entry.expiry < now {
                total += entry.amount;
                Self::swap_remove(&mut entries, i);
            } else {
                i += 1;
            }
        }
        Self::store_rewards(env, holder, &entries);
        total
    }

    // ── Distribution math ─────────────────────────────────────

    /// Split a resale payment between the brand and the current holders.
    ///
    /// The brand takes a 20% floor cut; the rest is divided equally among
    /// `holder_count` holders and the division leftover goes back to the
    /// brand, so no unit of value is ever dropped. With no holders the
    /// entire payment is redirected to the brand; that case is unreachable
    /// once anything has been minted and is kept as a defensive fallback.
    fn split_resale(
        payment: i128,
        holder_count: u32,
    ) -> Result<ResaleSplit, ResaleRewardError> {
        if payment < 0 {
            return Err(ResaleRewardError::InvalidAmount);
        }
        let brand_share = payment
            .checked_mul(BRAND_RESALE_SHARE_BPS)
            .ok_or(ResaleRewardError::InvalidAmount)?
            / BPS_DENOMINATOR;
        let holders_share = payment - brand_share;
        if holder_count == 0 {
            return Ok(ResaleSplit {
                brand_share: payment,
                holders_share: 0,
                per_holder: 0,
                remainder: 0,
            });
        }
        let count = holder_count as i128;
        let per_holder = holders_share / count;
        let remainder = holders_share - per_holder * count;
        Ok(ResaleSplit {
            brand_share,
            holders_share,
            per_holder,
            remainder,
        })
    }

    // ── Initialization ────────────────────────────────────────

    /// Set the immutable sale parameters. Callable exactly once.
    ///
    /// `product_token` is the unit ledger (this contract must be its mint
    /// admin); `payment_token` is the asset all payments and payouts move
    /// in; `price_per_unit` applies to primary sales and resales alike.
    pub fn initialize(
        env: Env,
        brand: Address,
        product_token: Address,
        payment_token: Address,
        price_per_unit: i128,
        max_supply: i128,
    ) -> Result<(), ResaleRewardError> {
        if env.storage().persistent().has(&DataKey::Brand) {
            return Err(ResaleRewardError::AlreadyInitialized);
        }
        if price_per_unit <= 0 || max_supply <= 0 {
            return Err(ResaleRewardError::InvalidAmount);
        }
        env.storage().persistent().set(&DataKey::Brand, &brand);
        env.storage()
            .persistent()
            .set(&DataKey::ProductToken, &product_token);
        env.storage()
            .persistent()
            .set(&DataKey::PaymentToken, &payment_token);
        env.storage()
            .persistent()
            .set(&DataKey::PricePerUnit, &price_per_unit);
        env.storage()
            .persistent()
            .set(&DataKey::MaxSupply, &max_supply);
        env.storage().persistent().set(&DataKey::TotalMinted, &0i128);

        env.events().publish(
            (EVENT_INIT, brand),
            (product_token, payment_token, price_per_unit, max_supply),
        );
        Ok(())
    }

    // ── Sale lifecycle ────────────────────────────────────────

    /// Mint units outside a sale (seeding, promotions). Brand only.
    /// Counts against `max_supply` like any other mint.
    pub fn mint_initial(
        env: Env,
        caller: Address,
        to: Address,
        amount: i128,
    ) -> Result<(), ResaleRewardError> {
        Self::require_brand(&env, &caller)?;
        if amount <= 0 {
            return Err(ResaleRewardError::InvalidAmount);
        }
        let minted = Self::mint_units(&env, &to, amount)?;
        env.events().publish((EVENT_MINT, to), (amount, minted));
        Ok(())
    }

    /// Buy `amount` units first-hand. The full payment goes to the brand,
    /// the units are minted to the buyer, and the buyer is registered as a
    /// holder. `paid_value` must equal `price * amount` exactly.
    pub fn buy(
        env: Env,
        buyer: Address,
        amount: i128,
        paid_value: i128,
    ) -> Result<(), ResaleRewardError> {
        buyer.require_auth();
        if amount <= 0 {
            return Err(ResaleRewardError::InvalidAmount);
        }
        if paid_value != Self::expected_payment(&env, amount)? {
            return Err(ResaleRewardError::PaymentMismatch);
        }

        let brand = Self::brand(&env)?;
        let payment = Self::payment_token(&env)?;
        if token::Client::new(&env, &payment)
            .try_transfer(&buyer, &brand, &paid_value)
            .is_err()
        {
            return Err(ResaleRewardError::TransferFailed);
        }

        Self::mint_units(&env, &buyer, amount)?;
        env.events().publish((EVENT_BUY, buyer), (amount, paid_value));
        Ok(())
    }

    /// Mint `amount` product units to `to`, enforce the supply cap, and
    /// re-sync the recipient's registration. Returns the new total minted.
    fn mint_units(env: &Env, to: &Address, amount: i128) -> Result<i128, ResaleRewardError> {
        let max_supply: i128 = env
            .storage()
            .persistent()
            .get(&DataKey::MaxSupply)
            .ok_or(ResaleRewardError::NotInitialized)?;
        let total: i128 = env
            .storage()
            .persistent()
            .get(&DataKey::TotalMinted)
            .unwrap_or(0);
        let minted = total
            .checked_add(amount)
            .ok_or(ResaleRewardError::SupplyExceeded)?;
        if minted > max_supply {
            return Err(ResaleRewardError::SupplyExceeded);
        }

        let product = Self::product_token(env)?;
        token::StellarAssetClient::new(env, &product).mint(to, &amount);
        env.storage().persistent().set(&DataKey::TotalMinted, &minted);
        Self::sync_holder(env, &product, to);
        Ok(minted)
    }

    /// Resell `amount` units from `seller` to `buyer` at the fixed price.
    ///
    /// The payment splits 20% to the brand and 80% equally across the
    /// holder set as it stands before the units move, so the seller is
    /// still counted and a first-time buyer is not. Each snapshot holder
    /// gets one pending entry expiring `REWARD_TTL_SECS` from now; the
    /// equal shares are escrowed in this contract until claimed or swept.
    /// Zero-value entries (tiny payment, many holders) are assigned like
    /// any other.
    ///
    /// Pending entries are written before any money moves; the brand cut
    /// plus split remainder goes to the brand, the rest into escrow, then
    /// the units transfer and both parties' registrations are re-synced.
    pub fn resell(
        env: Env,
        seller: Address,
        buyer: Address,
        amount: i128,
        paid_value: i128,
    ) -> Result<(), ResaleRewardError> {
        seller.require_auth();
        buyer.require_auth();
        if amount <= 0 {
            return Err(ResaleRewardError::InvalidAmount);
        }
        if paid_value != Self::expected_payment(&env, amount)? {
            return Err(ResaleRewardError::PaymentMismatch);
        }

        let brand = Self::brand(&env)?;
        let product = Self::product_token(&env)?;
        let payment = Self::payment_token(&env)?;
        let product_client = token::Client::new(&env, &product);
        if product_client.balance(&seller) < amount {
            return Err(ResaleRewardError::InsufficientSellerBalance);
        }

        // Holder snapshot before the unit transfer.
        let holder_count = Self::holder_total(&env);
        let split = Self::split_resale(paid_value, holder_count)?;

        let now = env.ledger().timestamp();
        let expiry = now + REWARD_TTL_SECS;
        for i in 0..holder_count {
            let holder = Self::holder_at(&env, i);
            Self::assign_reward(&env, &holder, split.per_holder, expiry);
            env.events().publish(
                (EVENT_REWARD_ASSIGNED, holder),
                (split.per_holder, expiry),
            );
        }

        let brand_total = split.brand_share + split.remainder;
        let payment_client = token::Client::new(&env, &payment);
        if payment_client
            .try_transfer(&buyer, &brand, &brand_total)
            .is_err()
        {
            return Err(ResaleRewardError::TransferFailed);
        }
        let escrowed = split.per_holder * holder_count as i128;
        if escrowed > 0
            && payment_client
                .try_transfer(&buyer, &env.current_contract_address(), &escrowed)
                .is_err()
        {
            return Err(ResaleRewardError::TransferFailed);
        }

        product_client.transfer(&seller, &buyer, &amount);
        Self::sync_holder(&env, &product, &seller);
        Self::sync_holder(&env, &product, &buyer);

        env.events().publish(
            (EVENT_RESALE, seller, buyer),
            (amount, paid_value, brand_total, split.per_holder, holder_count),
        );
        Ok(())
    }

    // ── Claim and sweep ───────────────────────────────────────

    /// Pay the caller every pending reward of theirs that has not expired,
    /// in one transfer. Returns the total paid.
    ///
    /// Fails with `NoClaimableRewards` when the unexpired total is zero;
    /// nothing is removed in that case. Entries are deleted before the
    /// payout is issued, and a failed payout returns `TransferFailed`,
    /// which rolls the deletions back with it.
    pub fn claim_rewards(env: Env, caller: Address) -> Result<i128, ResaleRewardError> {
        caller.require_auth();
        let payment = Self::payment_token(&env)?;

        let now = env.ledger().timestamp();
        let total = Self::take_claimable(&env, &caller, now);
        if total == 0 {
            return Err(ResaleRewardError::NoClaimableRewards);
        }

        if token::Client::new(&env, &payment)
            .try_transfer(&env.current_contract_address(), &caller, &total)
            .is_err()
        {
            return Err(ResaleRewardError::TransferFailed);
        }

        env.events().publish((EVENT_CLAIM, caller), total);
        Ok(total)
    }

    /// Sweep expired pending rewards for the holders at indices
    /// `start_index..=end_index` and pay the total to the brand. Anyone may
    /// call this; batching by range keeps each call's cost bounded, and the
    /// caller drives the full registry incrementally.
    ///
    /// Bounds are validated against the current holder count; removals
    /// elsewhere shift indices, so callers must re-query the count between
    /// calls. A sweep that finds nothing expired succeeds with 0 and can be
    /// repeated without penalty. Returns the swept total.
    pub fn sweep_expired_rewards(
        env: Env,
        start_index: u32,
        end_index: u32,
    ) -> Result<i128, ResaleRewardError> {
        let brand = Self::brand(&env)?;
        let payment = Self::payment_token(&env)?;
        if start_index > end_index || end_index >= Self::holder_total(&env) {
            return Err(ResaleRewardError::InvalidRange);
        }

        let now = env.ledger().timestamp();
        let mut total: i128 = 0;
        for i in start_index..=end_index {
            let holder = Self::holder_at(&env, i);
            total += Self::take_expired(&env, &holder, now);
        }

        if total > 0
            && token::Client::new(&env, &payment)
                .try_transfer(&env.current_contract_address(), &brand, &total)
                .is_err()
        {
            return Err(ResaleRewardError::TransferFailed);
        }

        env.events()
            .publish((EVENT_SWEEP, brand), (start_index, end_index, total));
        Ok(total)
    }

    // ── Price administration ──────────────────────────────────

    /// Change the per-unit price. Brand only. Emits the previous and new
    /// values.
    pub fn update_price(
        env: Env,
        caller: Address,
        new_price: i128,
    ) -> Result<(), ResaleRewardError> {
        Self::require_brand(&env, &caller)?;
        if new_price <= 0 {
            return Err(ResaleRewardError::InvalidAmount);
        }
        let previous = Self::price(&env)?;
        env.storage()
            .persistent()
            .set(&DataKey::PricePerUnit, &new_price);
        env.events()
            .publish((EVENT_PRICE_SET, caller), (previous, new_price));
        Ok(())
    }

    // ── Read-only views ───────────────────────────────────────

    /// Get the brand address, if set.
    pub fn get_brand(env: Env) -> Option<Address> {
        env.storage().persistent().get(&DataKey::Brand)
    }

    pub fn get_product_token(env: Env) -> Option<Address> {
        env.storage().persistent().get(&DataKey::ProductToken)
    }

    pub fn get_payment_token(env: Env) -> Option<Address> {
        env.storage().persistent().get(&DataKey::PaymentToken)
    }

    /// Current price per unit (0 before initialization).
    pub fn get_price(env: Env) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::PricePerUnit)
            .unwrap_or(0)
    }

    pub fn get_max_supply(env: Env) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::MaxSupply)
            .unwrap_or(0)
    }

    pub fn get_total_minted(env: Env) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::TotalMinted)
            .unwrap_or(0)
    }

    /// Number of addresses currently holding units.
    pub fn get_holder_count(env: Env) -> u32 {
        Self::holder_total(&env)
    }

    /// All current holders. Ordering is an implementation artifact of
    /// swap-removal and must not be relied on.
    pub fn list_holders(env: Env) -> Vec<Address> {
        let count = Self::holder_total(&env);
        let mut holders = Vec::new(&env);
        for i in 0..count {
            holders.push_back(Self::holder_at(&env, i));
        }
        holders
    }

    pub fn is_holder(env: Env, address: Address) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::HolderIndex(address))
    }

    /// Number of pending reward entries for a holder (expired ones
    /// included, until they are swept).
    pub fn pending_reward_count(env: Env, holder: Address) -> u32 {
        Self::rewards_of(&env, &holder).len()
    }

    /// All pending reward entries for a holder.
    pub fn get_pending_rewards(env: Env, holder: Address) -> Vec<RewardEntry> {
        Self::rewards_of(&env, &holder)
    }

    /// Preview the total a holder could claim right now without claiming.
    pub fn get_claimable(env: Env, holder: Address) -> i128 {
        let now = env.ledger().timestamp();
        let entries = Self::rewards_of(&env, &holder);
        let mut total: i128 = 0;
        for i in 0..entries.len() {
            let entry = entries.get_unchecked(i);
            if entry.expiry >= now {
                total += entry.amount;
            }
        }
        total
    }

    /// Preview how a resale payment would split for a given holder count.
    /// Pure calculation; mutates nothing.
    pub fn preview_resale_split(
        _env: Env,
        payment: i128,
        holder_count: u32,
    ) -> Result<ResaleSplit, ResaleRewardError> {
        Self::split_resale(payment, holder_count)
    }
}

mod test_auth;
