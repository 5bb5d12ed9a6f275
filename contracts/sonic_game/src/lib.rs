#![cfg_attr(not(feature = "std"), no_std, no_main)]

pub mod constants {
    pub const GAME_NAME: &str = "SonicGame";

    /// Picks are numbered 1 through 4.
    pub const MIN_PICK: u8 = 1;
    pub const MAX_PICK: u8 = 4;
    pub const PICK_COUNT: usize = 4;

    pub const DEFAULT_WINNERS_TAX: u8 = 5;
    pub const DEFAULT_GODFATHER_TAX: u8 = 1;
    pub const MAX_TAX_PERCENT: u8 = 100;
    pub const PERCENT_DENOMINATOR: u128 = 100;

    /// Distinct (pick, player) stakes allowed per round. Settlement and
    /// emergency unlock walk every entry.
    pub const MAX_ROUND_ENTRIES: u32 = 256;
}

/// # SonicGame: player ledger and round engine
///
/// Holds the in-game balances mirrored from `SonicGameBridge` deposits and
/// runs the pari-mutuel betting rounds over four picks.
///
/// ```text
/// NotStarted --start--> Open --close_round--> Closed --pick_winner--> NotStarted (round + 1)
///                         \                     /
///                          `-- emergency_unlock -'   (stakes refunded, phase kept)
/// ```
///
/// Every bet is relayed by the owner. Players only ever act on their own
/// behalf through `withdraw`, which pays out of the contract's native balance.
#[ink::contract]
mod sonic_game {
    use crate::constants::*;
    use ink::prelude::{collections::BTreeMap, string::String, vec::Vec};
    use ink::storage::{Mapping, StorageVec};

    pub type Pick = u8;
    pub type RoundId = u32;

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(
        feature = "std",
        derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
    )]
    pub enum RoundPhase {
        NotStarted,
        Open,
        Closed,
    }

    #[ink(storage)]
    pub struct SonicGame {
        owner: AccountId,

        // ── Player ledger ────────────────────────────────────────────────
        balances: Mapping<AccountId, Balance>,
        /// Player balances plus stakes escrowed in the current round.
        total_liabilities: Balance,

        // ── Round engine ─────────────────────────────────────────────────
        current_round: RoundId,
        phase: RoundPhase,
        stakes: Mapping<(Pick, AccountId), Balance>,
        pick_totals: [Balance; PICK_COUNT],
        round_entries: StorageVec<(Pick, AccountId)>,

        // ── Tax policy ───────────────────────────────────────────────────
        winners_tax: u8,
        /// Stored and bounds-checked, but not applied at settlement yet.
        godfather_tax: u8,
        winners_tax_wallet: AccountId,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    #[ink(event)]
    pub struct RoundStarted {
        #[ink(topic)]
        round: RoundId,
    }

    #[ink(event)]
    pub struct RoundClosed {
        #[ink(topic)]
        round: RoundId,
        total_pot: Balance,
    }

    #[ink(event)]
    pub struct BetPlaced {
        #[ink(topic)]
        round: RoundId,
        #[ink(topic)]
        player: AccountId,
        pick: Pick,
        amount: Balance,
        stake: Balance,
    }

    #[ink(event)]
    pub struct WinnerPicked {
        #[ink(topic)]
        round: RoundId,
        pick: Pick,
        total_pot: Balance,
        losing_pool: Balance,
        winners_tax_amount: Balance,
        /// Part of the pot owed to nobody after the payouts and the tax.
        retained: Balance,
    }

    #[ink(event)]
    pub struct WinnerPaid {
        #[ink(topic)]
        round: RoundId,
        #[ink(topic)]
        player: AccountId,
        amount: Balance,
    }

    #[ink(event)]
    pub struct RoundUnlocked {
        #[ink(topic)]
        round: RoundId,
        refunded: Balance,
        entries: u32,
    }

    #[ink(event)]
    pub struct PlayerCredited {
        #[ink(topic)]
        player: AccountId,
        amount: Balance,
        balance: Balance,
    }

    #[ink(event)]
    pub struct Withdrawn {
        #[ink(topic)]
        player: AccountId,
        amount: Balance,
    }

    #[ink(event)]
    pub struct CustodyFunded {
        #[ink(topic)]
        funder: AccountId,
        amount: Balance,
        custody: Balance,
    }

    #[ink(event)]
    pub struct TaxWalletUpdated {
        #[ink(topic)]
        wallet: AccountId,
    }

    #[ink(event)]
    pub struct WinnersTaxUpdated {
        percent: u8,
    }

    #[ink(event)]
    pub struct GodfatherTaxUpdated {
        percent: u8,
    }

    #[ink(event)]
    pub struct OwnershipTransferred {
        #[ink(topic)]
        previous_owner: AccountId,
        #[ink(topic)]
        new_owner: AccountId,
    }

    // =========================================================================
    // ERRORS
    // =========================================================================

    #[derive(Debug, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
    pub enum Error {
        Unauthorized,
        InvalidAmount,
        InvalidOutcome,
        InvalidWinner,
        InsufficientBalance,
        NotStarted,
        AlreadyStarted,
        RoundClosed,
        RoundNotClosed,
        RoundFull,
        InvalidParameter,
        InsufficientCustody,
        TransferFailed,
        Overflow,
    }

    impl Error {
        pub fn reason(&self) -> &'static str {
            match self {
                Error::Unauthorized => "Only owner can perform this action",
                Error::InvalidAmount => "Amount must be greater than 0",
                Error::InvalidOutcome => "Pick must be between 1 and 4",
                Error::InvalidWinner => "Winner must be between 1 and 4",
                Error::InsufficientBalance => "Insufficient balance",
                Error::NotStarted => "Game has not started yet",
                Error::AlreadyStarted => "Round has already started",
                Error::RoundClosed => "Round is closed",
                Error::RoundNotClosed => "Round is not closed yet",
                Error::RoundFull => "Round has no room for another bet",
                Error::InvalidParameter => "Tax must be between 0 and 100",
                Error::InsufficientCustody => "Credit exceeds custodied funds",
                Error::TransferFailed => "Transfer failed",
                Error::Overflow => "Arithmetic overflow",
            }
        }
    }

    impl core::fmt::Display for Error {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.write_str(self.reason())
        }
    }

    /// Payouts computed for a closed round before any balance is touched.
    struct Settlement {
        payouts: Vec<(AccountId, Balance)>,
        total_pot: Balance,
        losing_pool: Balance,
        winners_tax_amount: Balance,
        retained: Balance,
    }

    fn pick_slot(pick: Pick) -> Result<usize, Error> {
        if !(MIN_PICK..=MAX_PICK).contains(&pick) {
            return Err(Error::InvalidOutcome);
        }
        Ok(usize::from(pick - MIN_PICK))
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl SonicGame {
        #[ink(constructor)]
        pub fn new(winners_tax_wallet: AccountId) -> Self {
            Self {
                owner: Self::env().caller(),
                balances: Mapping::default(),
                total_liabilities: 0,
                current_round: 0,
                phase: RoundPhase::NotStarted,
                stakes: Mapping::default(),
                pick_totals: [0; PICK_COUNT],
                round_entries: StorageVec::new(),
                winners_tax: DEFAULT_WINNERS_TAX,
                godfather_tax: DEFAULT_GODFATHER_TAX,
                winners_tax_wallet,
            }
        }

        // =================================================================
        // PLAYER LEDGER
        // =================================================================

        /// Top up the native balance that backs every player balance.
        #[ink(message, payable)]
        pub fn fund_custody(&self) {
            let amount = self.env().transferred_value();
            self.env().emit_event(CustodyFunded {
                funder: self.env().caller(),
                amount,
                custody: self.env().balance(),
            });
        }

        /// Mirror a bridge deposit into the player's game balance.
        ///
        /// # Errors
        /// - [`Error::InvalidAmount`] when `amount` is zero.
        /// - [`Error::InsufficientCustody`] when the credit would leave the
        ///   ledger owing more than the contract holds.
        #[ink(message)]
        pub fn owner_credit_player(&mut self, player: AccountId, amount: Balance) -> Result<(), Error> {
            self.only_owner()?;
            if amount == 0 {
                return Err(Error::InvalidAmount);
            }

            let liabilities = self
                .total_liabilities
                .checked_add(amount)
                .ok_or(Error::Overflow)?;
            if liabilities > self.env().balance() {
                return Err(Error::InsufficientCustody);
            }
            let balance = self
                .balance_of(player)
                .checked_add(amount)
                .ok_or(Error::Overflow)?;

            self.balances.insert(player, &balance);
            self.total_liabilities = liabilities;

            self.env().emit_event(PlayerCredited { player, amount, balance });
            Ok(())
        }

        #[ink(message)]
        pub fn withdraw(&mut self, amount: Balance) -> Result<(), Error> {
            let caller = self.env().caller();
            if amount == 0 {
                return Err(Error::InvalidAmount);
            }

            let balance = self.balance_of(caller);
            if balance < amount {
                return Err(Error::InsufficientBalance);
            }
            let liabilities = self
                .total_liabilities
                .checked_sub(amount)
                .ok_or(Error::Overflow)?;

            // Debit before paying out.
            self.balances.insert(caller, &(balance - amount));
            self.total_liabilities = liabilities;

            if self.env().transfer(caller, amount).is_err() {
                self.balances.insert(caller, &balance);
                self.total_liabilities = liabilities + amount;
                return Err(Error::TransferFailed);
            }

            self.env().emit_event(Withdrawn { player: caller, amount });
            Ok(())
        }

        // =================================================================
        // ROUND ENGINE
        // =================================================================

        #[ink(message)]
        pub fn start(&mut self) -> Result<(), Error> {
            self.only_owner()?;
            if self.phase != RoundPhase::NotStarted {
                return Err(Error::AlreadyStarted);
            }

            self.phase = RoundPhase::Open;
            self.env().emit_event(RoundStarted { round: self.current_round });
            Ok(())
        }

        /// Stop accepting bets. Closing an already closed round is a no-op.
        #[ink(message)]
        pub fn close_round(&mut self) -> Result<(), Error> {
            self.only_owner()?;
            match self.phase {
                RoundPhase::NotStarted => Err(Error::NotStarted),
                RoundPhase::Closed => Ok(()),
                RoundPhase::Open => {
                    self.phase = RoundPhase::Closed;
                    self.env().emit_event(RoundClosed {
                        round: self.current_round,
                        total_pot: self.total_pot(),
                    });
                    Ok(())
                }
            }
        }

        /// Stake `amount` of `player`'s balance on `pick` for the open round.
        ///
        /// Repeated bets on the same pick accumulate into a single stake.
        #[ink(message)]
        pub fn owner_bet_for_player(
            &mut self,
            player: AccountId,
            pick: Pick,
            amount: Balance,
        ) -> Result<(), Error> {
            self.only_owner()?;
            match self.phase {
                RoundPhase::NotStarted => return Err(Error::NotStarted),
                RoundPhase::Closed => return Err(Error::RoundClosed),
                RoundPhase::Open => {}
            }
            let slot = pick_slot(pick)?;
            if amount == 0 {
                return Err(Error::InvalidAmount);
            }

            let balance = self.balance_of(player);
            if balance < amount {
                return Err(Error::InsufficientBalance);
            }

            let stake = self.stake_of(player, pick);
            let is_new_entry = stake == 0;
            if is_new_entry && self.round_entries.len() >= MAX_ROUND_ENTRIES {
                return Err(Error::RoundFull);
            }
            let new_stake = stake.checked_add(amount).ok_or(Error::Overflow)?;
            let new_total = self.pick_totals[slot]
                .checked_add(amount)
                .ok_or(Error::Overflow)?;

            self.balances.insert(player, &(balance - amount));
            self.stakes.insert((pick, player), &new_stake);
            self.pick_totals[slot] = new_total;
            if is_new_entry {
                self.round_entries.push(&(pick, player));
            }

            self.env().emit_event(BetPlaced {
                round: self.current_round,
                player,
                pick,
                amount,
                stake: new_stake,
            });
            Ok(())
        }

        /// Settle the closed round in favour of `pick`.
        ///
        /// The winners tax is taken from the losing pool and credited to the
        /// tax wallet's game balance. Each winner gets their stake back plus a
        /// share of the remaining losing pool proportional to their stake,
        /// truncated. Truncation dust stays in custody unowed. If nobody
        /// backed `pick`, the whole net losing pool stays in custody the same
        /// way and only the tax wallet is credited.
        ///
        /// On success the round id advances and a fresh `start` is needed
        /// before the next bet.
        #[ink(message)]
        pub fn pick_winner(&mut self, pick: Pick) -> Result<(), Error> {
            self.only_owner()?;
            match self.phase {
                RoundPhase::NotStarted => return Err(Error::NotStarted),
                RoundPhase::Open => return Err(Error::RoundNotClosed),
                RoundPhase::Closed => {}
            }
            let slot = pick_slot(pick).map_err(|_| Error::InvalidWinner)?;

            let settlement = self.compute_settlement(pick, slot)?;

            let mut credits = settlement.payouts.clone();
            if settlement.winners_tax_amount > 0 {
                credits.push((self.winners_tax_wallet, settlement.winners_tax_amount));
            }
            let staged = self.stage_credits(&credits)?;
            let liabilities = self
                .total_liabilities
                .checked_sub(settlement.retained)
                .ok_or(Error::Overflow)?;
            let next_round = self.current_round.checked_add(1).ok_or(Error::Overflow)?;

            for (account, balance) in staged {
                self.balances.insert(account, &balance);
            }
            self.total_liabilities = liabilities;
            self.clear_round();

            let round = self.current_round;
            for (player, amount) in settlement.payouts {
                self.env().emit_event(WinnerPaid { round, player, amount });
            }
            self.env().emit_event(WinnerPicked {
                round,
                pick,
                total_pot: settlement.total_pot,
                losing_pool: settlement.losing_pool,
                winners_tax_amount: settlement.winners_tax_amount,
                retained: settlement.retained,
            });

            self.current_round = next_round;
            self.phase = RoundPhase::NotStarted;
            Ok(())
        }

        /// Refund every stake of the current round to its player.
        ///
        /// Usable while the round is open or closed; the phase and round id
        /// are left as they are. Calling it again finds nothing to refund.
        #[ink(message)]
        pub fn emergency_unlock(&mut self) -> Result<(), Error> {
            self.only_owner()?;
            if self.phase == RoundPhase::NotStarted {
                return Err(Error::NotStarted);
            }

            let refunds: Vec<(AccountId, Balance)> = self
                .entries()
                .into_iter()
                .map(|(pick, player)| (player, self.stake_of(player, pick)))
                .collect();
            let staged = self.stage_credits(&refunds)?;
            let refunded = self.total_pot();
            let entries = self.round_entries.len();

            for (account, balance) in staged {
                self.balances.insert(account, &balance);
            }
            self.clear_round();

            self.env().emit_event(RoundUnlocked {
                round: self.current_round,
                refunded,
                entries,
            });
            Ok(())
        }

        fn compute_settlement(&self, pick: Pick, slot: usize) -> Result<Settlement, Error> {
            let total_pot = self.checked_pot()?;
            let winning_total = self.pick_totals[slot];
            let losing_pool = total_pot - winning_total;
            let winners_tax_amount = losing_pool
                .checked_mul(Balance::from(self.winners_tax))
                .ok_or(Error::Overflow)?
                / PERCENT_DENOMINATOR;
            let net_losing_pool = losing_pool - winners_tax_amount;

            let mut payouts = Vec::new();
            let mut paid_out = winners_tax_amount;
            // No entry matches an unbacked pick, so `winning_total` is never
            // zero inside the loop.
            for (entry_pick, player) in self.entries() {
                if entry_pick != pick {
                    continue;
                }
                let stake = self.stake_of(player, entry_pick);
                let share = stake
                    .checked_mul(net_losing_pool)
                    .ok_or(Error::Overflow)?
                    / winning_total;
                let payout = stake.checked_add(share).ok_or(Error::Overflow)?;
                paid_out = paid_out.checked_add(payout).ok_or(Error::Overflow)?;
                payouts.push((player, payout));
            }

            let retained = total_pot.checked_sub(paid_out).ok_or(Error::Overflow)?;

            Ok(Settlement {
                payouts,
                total_pot,
                losing_pool,
                winners_tax_amount,
                retained,
            })
        }

        /// Resulting balances after applying `credits`, computed without
        /// writing anything so a failure leaves storage untouched.
        fn stage_credits(&self, credits: &[(AccountId, Balance)]) -> Result<BTreeMap<AccountId, Balance>, Error> {
            let mut staged: BTreeMap<AccountId, Balance> = BTreeMap::new();
            for &(account, amount) in credits {
                let current = match staged.get(&account) {
                    Some(balance) => *balance,
                    None => self.balance_of(account),
                };
                let updated = current.checked_add(amount).ok_or(Error::Overflow)?;
                staged.insert(account, updated);
            }
            Ok(staged)
        }

        fn entries(&self) -> Vec<(Pick, AccountId)> {
            (0..self.round_entries.len())
                .filter_map(|index| self.round_entries.get(index))
                .collect()
        }

        fn clear_round(&mut self) {
            for (pick, player) in self.entries() {
                self.stakes.remove((pick, player));
            }
            self.round_entries.clear();
            self.pick_totals = [0; PICK_COUNT];
        }

        fn checked_pot(&self) -> Result<Balance, Error> {
            self.pick_totals
                .iter()
                .try_fold(0 as Balance, |acc, total| acc.checked_add(*total))
                .ok_or(Error::Overflow)
        }

        // =================================================================
        // ADMIN FUNCTIONS
        // =================================================================

        #[ink(message)]
        pub fn owner_set_tax_wallet(&mut self, wallet: AccountId) -> Result<(), Error> {
            self.only_owner()?;
            self.winners_tax_wallet = wallet;
            self.env().emit_event(TaxWalletUpdated { wallet });
            Ok(())
        }

        #[ink(message)]
        pub fn owner_set_winners_tax(&mut self, percent: u8) -> Result<(), Error> {
            self.only_owner()?;
            if percent > MAX_TAX_PERCENT {
                return Err(Error::InvalidParameter);
            }
            self.winners_tax = percent;
            self.env().emit_event(WinnersTaxUpdated { percent });
            Ok(())
        }

        // TODO: apply godfather_tax in compute_settlement once the referrer
        // payout rules are settled with the game operators.
        #[ink(message)]
        pub fn owner_set_godfather_tax(&mut self, percent: u8) -> Result<(), Error> {
            self.only_owner()?;
            if percent > MAX_TAX_PERCENT {
                return Err(Error::InvalidParameter);
            }
            self.godfather_tax = percent;
            self.env().emit_event(GodfatherTaxUpdated { percent });
            Ok(())
        }

        #[ink(message)]
        pub fn transfer_ownership(&mut self, new_owner: AccountId) -> Result<(), Error> {
            self.only_owner()?;
            let previous_owner = self.owner;
            self.owner = new_owner;
            self.env().emit_event(OwnershipTransferred { previous_owner, new_owner });
            Ok(())
        }

        fn only_owner(&self) -> Result<(), Error> {
            if self.env().caller() != self.owner {
                return Err(Error::Unauthorized);
            }
            Ok(())
        }

        // =================================================================
        // VIEW FUNCTIONS
        // =================================================================

        #[ink(message)]
        pub fn name(&self) -> String {
            String::from(GAME_NAME)
        }

        #[ink(message)]
        pub fn owner(&self) -> AccountId {
            self.owner
        }

        #[ink(message)]
        pub fn balance_of(&self, account: AccountId) -> Balance {
            self.balances.get(account).unwrap_or(0)
        }

        #[ink(message)]
        pub fn total_liabilities(&self) -> Balance {
            self.total_liabilities
        }

        #[ink(message)]
        pub fn custody_balance(&self) -> Balance {
            self.env().balance()
        }

        #[ink(message)]
        pub fn current_round(&self) -> RoundId {
            self.current_round
        }

        #[ink(message)]
        pub fn round_phase(&self) -> RoundPhase {
            self.phase
        }

        #[ink(message)]
        pub fn is_picking_closed(&self) -> bool {
            self.phase != RoundPhase::Open
        }

        /// Total staked on `pick` this round; zero for picks outside 1..=4.
        #[ink(message)]
        pub fn pick_total(&self, pick: Pick) -> Balance {
            pick_slot(pick).map(|slot| self.pick_totals[slot]).unwrap_or(0)
        }

        #[ink(message)]
        pub fn total_pot(&self) -> Balance {
            self.pick_totals.iter().fold(0, |acc: Balance, total| acc.saturating_add(*total))
        }

        #[ink(message)]
        pub fn stake_of(&self, player: AccountId, pick: Pick) -> Balance {
            self.stakes.get((pick, player)).unwrap_or(0)
        }

        #[ink(message)]
        pub fn round_entries(&self) -> Vec<(Pick, AccountId)> {
            self.entries()
        }

        #[ink(message)]
        pub fn winners_tax(&self) -> u8 {
            self.winners_tax
        }

        #[ink(message)]
        pub fn godfather_tax(&self) -> u8 {
            self.godfather_tax
        }

        #[ink(message)]
        pub fn winners_tax_wallet(&self) -> AccountId {
            self.winners_tax_wallet
        }
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================

}
