#![cfg_attr(not(feature = "std"), no_std, no_main)]

pub use self::sonic_token::{Error, SonicToken, SonicTokenRef};

/// Sonic token, the fungible coin carried by `SonicGameBridge`.
///
/// Test networks and the bridge's end-to-end tests deploy this contract in
/// place of the production coin. The whole supply is minted to the deployer
/// at construction; there is no mint or burn afterwards.
#[ink::contract]
mod sonic_token {
    use ink::storage::Mapping;

    #[ink(storage)]
    pub struct SonicToken {
        balances: Mapping<AccountId, Balance>,
        allowances: Mapping<(AccountId, AccountId), Balance>,
        total_supply: Balance,
    }

    #[ink(event)]
    pub struct Transfer {
        #[ink(topic)] from: Option<AccountId>,
        #[ink(topic)] to: Option<AccountId>,
        value: Balance,
    }

    #[ink(event)]
    pub struct Approval {
        #[ink(topic)] owner: AccountId,
        #[ink(topic)] spender: AccountId,
        value: Balance,
    }

    #[derive(Debug, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
    pub enum Error {
        InsufficientBalance,
        InsufficientAllowance,
    }

    impl SonicToken {
        #[ink(constructor)]
        pub fn new(total_supply: Balance) -> Self {
            let caller = Self::env().caller();
            let mut balances = Mapping::default();
            balances.insert(caller, &total_supply);

            Self::env().emit_event(Transfer {
                from: None,
                to: Some(caller),
                value: total_supply,
            });

            Self {
                balances,
                allowances: Mapping::default(),
                total_supply,
            }
        }

        #[ink(message)]
        pub fn total_supply(&self) -> Balance {
            self.total_supply
        }

        #[ink(message)]
        pub fn balance_of(&self, owner: AccountId) -> Balance {
            self.balances.get(owner).unwrap_or(0)
        }

        #[ink(message)]
        pub fn allowance(&self, owner: AccountId, spender: AccountId) -> Balance {
            self.allowances.get((owner, spender)).unwrap_or(0)
        }

        #[ink(message)]
        pub fn approve(&mut self, spender: AccountId, value: Balance) -> Result<(), Error> {
            let owner = self.env().caller();
            self.allowances.insert((owner, spender), &value);
            self.env().emit_event(Approval { owner, spender, value });
            Ok(())
        }

        #[ink(message)]
        pub fn transfer(&mut self, to: AccountId, value: Balance) -> Result<(), Error> {
            let from = self.env().caller();
            self.process_transfer(from, to, value)
        }

        /// Moves `value` from `from` to `to` on behalf of the caller, spending
        /// the allowance `from` granted the caller.
        #[ink(message)]
        pub fn transfer_from(&mut self, from: AccountId, to: AccountId, value: Balance) -> Result<(), Error> {
            let caller = self.env().caller();
            let allowance = self.allowance(from, caller);

            if allowance < value {
                return Err(Error::InsufficientAllowance);
            }

            self.process_transfer(from, to, value)?;
            self.allowances.insert((from, caller), &(allowance - value));
            Ok(())
        }

        fn process_transfer(&mut self, from: AccountId, to: AccountId, value: Balance) -> Result<(), Error> {
            let from_bal = self.balance_of(from);
            if from_bal < value {
                return Err(Error::InsufficientBalance);
            }

            self.balances.insert(from, &(from_bal - value));
            // Supply is fixed, so a recipient balance can never exceed it.
            let to_bal = self.balance_of(to);
            self.balances.insert(to, &(to_bal + value));

            self.env().emit_event(Transfer { from: Some(from), to: Some(to), value });
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use ink::env::{test, DefaultEnvironment};

        type Env = DefaultEnvironment;

        const SUPPLY: Balance = 1_000_000;

        fn accounts() -> test::DefaultAccounts<Env> {
            test::default_accounts::<Env>()
        }

        fn set_caller(account: AccountId) {
            test::set_caller::<Env>(account);
        }

        fn deploy() -> SonicToken {
            set_caller(accounts().alice);
            SonicToken::new(SUPPLY)
        }

        #[ink::test]
        fn constructor_mints_supply_to_deployer() {
            let token = deploy();
            let accs = accounts();
            assert_eq!(token.total_supply(), SUPPLY);
            assert_eq!(token.balance_of(accs.alice), SUPPLY);
            assert_eq!(token.balance_of(accs.bob), 0);
            assert_eq!(test::recorded_events().count(), 1);
        }

        #[ink::test]
        fn transfer_moves_balance() {
            let mut token = deploy();
            let accs = accounts();
            assert_eq!(token.transfer(accs.bob, 400), Ok(()));
            assert_eq!(token.balance_of(accs.alice), SUPPLY - 400);
            assert_eq!(token.balance_of(accs.bob), 400);
        }

        #[ink::test]
        fn transfer_rejects_overdraft() {
            let mut token = deploy();
            let accs = accounts();
            set_caller(accs.bob);
            assert_eq!(token.transfer(accs.charlie, 1), Err(Error::InsufficientBalance));
            assert_eq!(token.balance_of(accs.charlie), 0);
        }

        #[ink::test]
        fn transfer_from_spends_allowance() {
            let mut token = deploy();
            let accs = accounts();
            token.approve(accs.bob, 300).unwrap();

            set_caller(accs.bob);
            assert_eq!(token.transfer_from(accs.alice, accs.charlie, 200), Ok(()));
            assert_eq!(token.balance_of(accs.charlie), 200);
            assert_eq!(token.allowance(accs.alice, accs.bob), 100);

            assert_eq!(
                token.transfer_from(accs.alice, accs.charlie, 101),
                Err(Error::InsufficientAllowance)
            );
            assert_eq!(token.allowance(accs.alice, accs.bob), 100);
        }

        #[ink::test]
        fn transfer_from_keeps_allowance_when_balance_short() {
            let mut token = deploy();
            let accs = accounts();
            set_caller(accs.bob);
            token.approve(accs.charlie, 50).unwrap();

            set_caller(accs.charlie);
            assert_eq!(
                token.transfer_from(accs.bob, accs.charlie, 50),
                Err(Error::InsufficientBalance)
            );
            assert_eq!(token.allowance(accs.bob, accs.charlie), 50);
        }
    }
}
