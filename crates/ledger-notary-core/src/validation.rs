//! Structural checks for new transfers and account names.

use crate::error::ValidationError;
use crate::transfer::Transfer;
use crate::types::TransferState;

/// Maximum length of an account name.
pub const MAX_ACCOUNT_NAME_LEN: usize = 128;

/// Validate a transfer before it is first persisted.
///
/// This performs:
/// - Initial state check (`proposed` or `prepared` only)
/// - Non-empty debits and credits
/// - Account name and amount format on every leg
/// - No terminal timestamps on a fresh record
pub fn validate_new_transfer(transfer: &Transfer) -> Result<(), ValidationError> {
    if !matches!(transfer.state, TransferState::Proposed | TransferState::Prepared) {
        return Err(ValidationError::InvalidInitialState(
            transfer.state.to_string(),
        ));
    }

    if transfer.debits.is_empty() {
        return Err(ValidationError::NoDebits);
    }
    if transfer.credits.is_empty() {
        return Err(ValidationError::NoCredits);
    }

    let legs = transfer
        .debits
        .iter()
        .map(|d| (&d.account, &d.amount))
        .chain(transfer.credits.iter().map(|c| (&c.account, &c.amount)));

    for (account, amount) in legs {
        validate_account_name(account)?;
        if !is_positive_decimal(amount) {
            return Err(ValidationError::InvalidAmount {
                account: account.clone(),
                amount: amount.clone(),
            });
        }
    }

    if transfer.executed_at.is_some() {
        return Err(ValidationError::UnexpectedTimestamp("executed_at"));
    }
    if transfer.rejected_at.is_some() {
        return Err(ValidationError::UnexpectedTimestamp("rejected_at"));
    }
    if transfer.rejection_reason.is_some() {
        return Err(ValidationError::UnexpectedTimestamp("rejection_reason"));
    }

    Ok(())
}

/// Account names: 1..=128 chars of `[A-Za-z0-9_.-]`.
pub fn validate_account_name(name: &str) -> Result<(), ValidationError> {
    let ok = !name.is_empty()
        && name.len() <= MAX_ACCOUNT_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidAccountName(name.to_string()))
    }
}

/// `digits` or `digits.digits`, not all zero.
pub fn is_positive_decimal(s: &str) -> bool {
    let (int, frac) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };

    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(int) || !frac.map_or(true, digits) {
        return false;
    }

    s.bytes().any(|b| matches!(b, b'1'..=b'9'))
}
