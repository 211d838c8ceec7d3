//! Balance Mutator
//!
//! Applies one signed delta to one wallet of an in-memory account. Durable
//! commit is the caller's job.

use rust_decimal::Decimal;

use crate::domain::{Account, AmountError, Balance, Currency, DomainError};

/// Apply `delta` to `account`'s wallet for `currency` and return the new balance.
///
/// A missing wallet counts as a zero balance and is created on success. A debit
/// larger than the balance fails with `InsufficientFunds` and leaves the
/// account untouched, including not creating the wallet.
pub fn apply_delta(
    account: &mut Account,
    currency: Currency,
    delta: Decimal,
) -> Result<Balance, DomainError> {
    let current = account
        .wallet(currency)
        .map(|w| w.balance())
        .unwrap_or_default();

    let next = current.checked_apply(delta).map_err(|e| match e {
        AmountError::Negative(_) => DomainError::insufficient_funds(currency, -delta, current.value()),
        other => DomainError::invalid_input(other.to_string()),
    })?;

    account.put_balance(currency, next);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_creates_wallet() {
        let mut account = Account::new("a@example.com", "a");
        assert!(account.wallet(Currency::Eur).is_none());

        let balance = apply_delta(&mut account, Currency::Eur, dec!(12.34)).unwrap();

        assert_eq!(balance.value(), dec!(12.34));
        assert_eq!(account.wallet(Currency::Eur).unwrap().balance(), balance);
    }

    #[test]
    fn test_debit_reduces_balance() {
        let mut account = Account::new("a@example.com", "a");
        apply_delta(&mut account, Currency::Usd, dec!(100)).unwrap();

        let balance = apply_delta(&mut account, Currency::Usd, dec!(-100)).unwrap();
        assert_eq!(balance.value(), Decimal::ZERO);
    }

    #[test]
    fn test_overdraw_is_rejected_without_change() {
        let mut account = Account::new("a@example.com", "a");
        apply_delta(&mut account, Currency::Usd, dec!(100)).unwrap();
        let before = account.clone();

        let err = apply_delta(&mut account, Currency::Usd, dec!(-150)).unwrap_err();

        assert_eq!(
            err,
            DomainError::insufficient_funds(Currency::Usd, dec!(150), dec!(100))
        );
        assert_eq!(account, before);
    }

    #[test]
    fn test_debit_on_missing_wallet_does_not_create_it() {
        let mut account = Account::new("a@example.com", "a");

        let err = apply_delta(&mut account, Currency::Gbp, dec!(-1)).unwrap_err();

        assert!(matches!(err, DomainError::InsufficientFunds { .. }));
        assert!(account.wallet(Currency::Gbp).is_none());
    }

    #[test]
    fn test_repeated_small_deltas_do_not_drift() {
        let mut account = Account::new("a@example.com", "a");
        for _ in 0..1000 {
            apply_delta(&mut account, Currency::Usd, dec!(0.10)).unwrap();
        }
        for _ in 0..999 {
            apply_delta(&mut account, Currency::Usd, dec!(-0.10)).unwrap();
        }
        assert_eq!(account.balance(Currency::Usd), dec!(0.10));
    }
}
