#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # SonicGameBridge
///
/// Custody ledger for the bridged coin. Players `deposit` coins into the
/// bridge; the operator watches `Deposited` and mirrors each deposit into
/// `SonicGame` with `owner_credit_player`. The two contracts are never
/// updated atomically together.
///
/// The owner releases custody with `owner_withdraw_to`.
#[ink::contract]
mod sonic_game_bridge {
    use ink::env::call::{build_call, ExecutionInput, Selector};
    use ink::env::DefaultEnvironment;
    use ink::storage::Mapping;
    use sonic_token::Error as TokenError;

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[ink(storage)]
    pub struct SonicGameBridge {
        owner: AccountId,
        bridged_coin: AccountId,
        balances: Mapping<AccountId, Balance>,
        /// Sum of all bridge balances; never above the coins held in custody.
        total_liabilities: Balance,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    #[ink(event)]
    pub struct Deposited {
        #[ink(topic)]
        depositor: AccountId,
        amount: Balance,
        balance: Balance,
    }

    #[ink(event)]
    pub struct OwnerWithdrawn {
        #[ink(topic)]
        recipient: AccountId,
        amount: Balance,
        balance: Balance,
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
        InsufficientBalance,
        InsufficientAllowance,
        TransferFailed,
        Overflow,
    }

    impl Error {
        pub fn reason(&self) -> &'static str {
            match self {
                Error::Unauthorized => "Only owner can perform this action",
                Error::InvalidAmount => "Amount must be greater than 0",
                Error::InsufficientBalance => "Insufficient balance",
                Error::InsufficientAllowance => "Insufficient allowance",
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

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl SonicGameBridge {
        #[ink(constructor)]
        pub fn new(bridged_coin: AccountId) -> Self {
            Self {
                owner: Self::env().caller(),
                bridged_coin,
                balances: Mapping::default(),
                total_liabilities: 0,
            }
        }

        /// Pull `amount` coins from the caller into custody and credit the
        /// caller's bridge balance.
        ///
        /// The caller must have approved the bridge for at least `amount` on
        /// the bridged coin beforehand.
        ///
        /// # Errors
        /// - [`Error::InvalidAmount`] when `amount` is zero.
        /// - [`Error::InsufficientAllowance`] when the coin refuses for lack of
        ///   allowance; [`Error::TransferFailed`] for any other coin failure.
        #[ink(message)]
        pub fn deposit(&mut self, amount: Balance) -> Result<(), Error> {
            let depositor = self.env().caller();
            if amount == 0 {
                return Err(Error::InvalidAmount);
            }

            let previous = self.balance_of(depositor);
            let balance = previous.checked_add(amount).ok_or(Error::Overflow)?;
            let liabilities = self
                .total_liabilities
                .checked_add(amount)
                .ok_or(Error::Overflow)?;

            // Credit before calling out to the coin.
            self.balances.insert(depositor, &balance);
            self.total_liabilities = liabilities;

            let custody = self.env().account_id();
            if let Err(err) = self.coin_transfer_from(depositor, custody, amount) {
                self.balances.insert(depositor, &previous);
                self.total_liabilities = liabilities - amount;
                return Err(err);
            }

            self.env().emit_event(Deposited { depositor, amount, balance });
            Ok(())
        }

        #[ink(message)]
        pub fn owner_withdraw_to(&mut self, recipient: AccountId, amount: Balance) -> Result<(), Error> {
            self.only_owner()?;
            if amount == 0 {
                return Err(Error::InvalidAmount);
            }

            let previous = self.balance_of(recipient);
            if previous < amount {
                return Err(Error::InsufficientBalance);
            }
            let balance = previous - amount;
            let liabilities = self
                .total_liabilities
                .checked_sub(amount)
                .ok_or(Error::Overflow)?;

            self.balances.insert(recipient, &balance);
            self.total_liabilities = liabilities;

            if let Err(err) = self.coin_transfer(recipient, amount) {
                self.balances.insert(recipient, &previous);
                self.total_liabilities = liabilities + amount;
                return Err(err);
            }

            self.env().emit_event(OwnerWithdrawn { recipient, amount, balance });
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

        // =================================================================
        // CROSS-CONTRACT CALLS
        // =================================================================

        fn coin_transfer_from(&self, from: AccountId, to: AccountId, amount: Balance) -> Result<(), Error> {
            let result = build_call::<DefaultEnvironment>()
                .call(self.bridged_coin)
                .exec_input(
                    ExecutionInput::new(Selector::new(ink::selector_bytes!("transfer_from")))
                        .push_arg(from)
                        .push_arg(to)
                        .push_arg(amount),
                )
                .returns::<Result<(), TokenError>>()
                .try_invoke();

            match result {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(TokenError::InsufficientAllowance))) => Err(Error::InsufficientAllowance),
                _ => Err(Error::TransferFailed),
            }
        }

        fn coin_transfer(&self, to: AccountId, amount: Balance) -> Result<(), Error> {
            let result = build_call::<DefaultEnvironment>()
                .call(self.bridged_coin)
                .exec_input(
                    ExecutionInput::new(Selector::new(ink::selector_bytes!("transfer")))
                        .push_arg(to)
                        .push_arg(amount),
                )
                .returns::<Result<(), TokenError>>()
                .try_invoke();

            match result {
                Ok(Ok(Ok(()))) => Ok(()),
                _ => Err(Error::TransferFailed),
            }
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
        pub fn bridged_coin(&self) -> AccountId {
            self.bridged_coin
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
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================


    #[cfg(all(test, feature = "e2e-tests"))]
    mod e2e_tests {
        use super::*;
        use ink_e2e::ContractsBackend;
        use sonic_token::{SonicToken, SonicTokenRef};

        type E2EResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

        const SUPPLY: Balance = 1_000_000 * 10_000_000_000;
        const DEPOSIT: Balance = 1_000 * 10_000_000_000;

        #[ink_e2e::test]
        async fn deposit_then_owner_withdraw_round_trips<Client: E2EBackend>(
            mut client: Client,
        ) -> E2EResult<()> {
            // given
            let mut token_constructor = SonicTokenRef::new(SUPPLY);
            let token = client
                .instantiate("sonic_token", &ink_e2e::alice(), &mut token_constructor)
                .submit()
                .await
                .expect("token instantiate failed");
            let mut coin = token.call_builder::<SonicToken>();

            let mut bridge_constructor = SonicGameBridgeRef::new(token.account_id);
            let bridge = client
                .instantiate("sonic_game_bridge", &ink_e2e::alice(), &mut bridge_constructor)
                .submit()
                .await
                .expect("bridge instantiate failed");
            let mut bridge_calls = bridge.call_builder::<SonicGameBridge>();

            let bob = ink_e2e::account_id(ink_e2e::AccountKeyring::Bob);
            client
                .call(&ink_e2e::alice(), &coin.transfer(bob, DEPOSIT))
                .submit()
                .await
                .expect("funding bob failed");
            client
                .call(&ink_e2e::bob(), &coin.approve(bridge.account_id, DEPOSIT))
                .submit()
                .await
                .expect("approve failed");

            // when
            client
                .call(&ink_e2e::bob(), &bridge_calls.deposit(DEPOSIT))
                .submit()
                .await
                .expect("deposit failed");

            // then
            let bob_coins = client
                .call(&ink_e2e::bob(), &coin.balance_of(bob))
                .dry_run()
                .await?;
            assert_eq!(bob_coins.return_value(), 0);

            let custody = client
                .call(&ink_e2e::bob(), &coin.balance_of(bridge.account_id))
                .dry_run()
                .await?;
            assert_eq!(custody.return_value(), DEPOSIT);

            let bridged = client
                .call(&ink_e2e::bob(), &bridge_calls.balance_of(bob))
                .dry_run()
                .await?;
            assert_eq!(bridged.return_value(), DEPOSIT);

            // when
            client
                .call(&ink_e2e::alice(), &bridge_calls.owner_withdraw_to(bob, DEPOSIT))
                .submit()
                .await
                .expect("owner withdraw failed");

            // then
            let bridged = client
                .call(&ink_e2e::bob(), &bridge_calls.balance_of(bob))
                .dry_run()
                .await?;
            assert_eq!(bridged.return_value(), 0);

            let custody = client
                .call(&ink_e2e::bob(), &coin.balance_of(bridge.account_id))
                .dry_run()
                .await?;
            assert_eq!(custody.return_value(), 0);

            let bob_coins = client
                .call(&ink_e2e::bob(), &coin.balance_of(bob))
                .dry_run()
                .await?;
            assert_eq!(bob_coins.return_value(), DEPOSIT);

            Ok(())
        }

        #[ink_e2e::test]
        async fn deposit_without_allowance_is_refused<Client: E2EBackend>(
            mut client: Client,
        ) -> E2EResult<()> {
            let mut token_constructor = SonicTokenRef::new(SUPPLY);
            let token = client
                .instantiate("sonic_token", &ink_e2e::alice(), &mut token_constructor)
                .submit()
                .await
                .expect("token instantiate failed");

            let mut bridge_constructor = SonicGameBridgeRef::new(token.account_id);
            let bridge = client
                .instantiate("sonic_game_bridge", &ink_e2e::alice(), &mut bridge_constructor)
                .submit()
                .await
                .expect("bridge instantiate failed");
            let mut bridge_calls = bridge.call_builder::<SonicGameBridge>();

            let deposit = client
                .call(&ink_e2e::alice(), &bridge_calls.deposit(DEPOSIT))
                .dry_run()
                .await?;
            assert_eq!(deposit.return_value(), Err(Error::InsufficientAllowance));

            let alice = ink_e2e::account_id(ink_e2e::AccountKeyring::Alice);
            let bridged = client
                .call(&ink_e2e::alice(), &bridge_calls.balance_of(alice))
                .dry_run()
                .await?;
            assert_eq!(bridged.return_value(), 0);

            Ok(())
        }
    }
}
