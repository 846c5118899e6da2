//! Access evaluation.
//!
//! A pure decision table mapping (drop, caller, supplied passphrase) to
//! an allow/deny outcome.  The ordering of the rules is load-bearing:
//! the HTTP layer derives status codes directly from the decision, so
//! "not found" must win over "auth required", and "auth required" over
//! the passphrase checks.

use crate::auth::Caller;
use crate::errors::DropError;
use crate::metadata::store::DropRecord;
use crate::passphrase::PassphraseHasher;

/// Outcome of an access evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    DenyNotFound,
    DenyAuthRequired,
    DenyPasswordRequired,
    DenyPasswordInvalid,
    DenyForbidden,
}

impl Decision {
    /// Turn a deny into the corresponding error; `Allow` becomes `Ok`.
    pub fn into_result(self) -> Result<(), DropError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::DenyNotFound => Err(DropError::NotFound),
            Decision::DenyAuthRequired => Err(DropError::AuthRequired),
            Decision::DenyPasswordRequired => Err(DropError::PasswordRequired),
            Decision::DenyPasswordInvalid => Err(DropError::PasswordInvalid),
            Decision::DenyForbidden => Err(DropError::Forbidden),
        }
    }
}

/// Evaluate read access to a drop.  First match wins:
///
/// 1. missing drop                  -> DenyNotFound
/// 2. private, caller not owner     -> DenyAuthRequired (anonymous)
///                                     or DenyForbidden (credentials shown)
/// 3. passphrase set, none supplied -> DenyPasswordRequired
/// 4. passphrase set, wrong         -> DenyPasswordInvalid
/// 5. otherwise                     -> Allow
///
/// The owner bypasses rules 3 and 4 entirely.
pub fn evaluate(
    drop: Option<&DropRecord>,
    caller: &Caller,
    passphrase: Option<&str>,
    hasher: &PassphraseHasher,
) -> Decision {
    let Some(drop) = drop else {
        return Decision::DenyNotFound;
    };

    if drop.private && !caller.is_owner() {
        return if caller.presented_credentials() {
            Decision::DenyForbidden
        } else {
            Decision::DenyAuthRequired
        };
    }

    if let Some(verifier) = drop.passphrase_hash.as_deref() {
        if !caller.is_owner() {
            let Some(supplied) = passphrase else {
                return Decision::DenyPasswordRequired;
            };
            if !hasher.verify(supplied, verifier) {
                return Decision::DenyPasswordInvalid;
            }
        }
    }

    Decision::Allow
}

/// Evaluate a mutating operation (update, delete, password ops,
/// favorite).  Owner-only: a non-owner short-circuits to a deny
/// regardless of any passphrase.
pub fn evaluate_mutation(drop_exists: bool, caller: &Caller) -> Decision {
    if !drop_exists {
        return Decision::DenyNotFound;
    }
    match caller {
        Caller::Owner => Decision::Allow,
        Caller::Other => Decision::DenyForbidden,
        Caller::Anonymous => Decision::DenyAuthRequired,
    }
}
