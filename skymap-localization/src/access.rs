//! Record-level authorization.
//!
//! Anyone may read or create records. Updating or deleting one requires the
//! acting user to be its submitter, or an administrator.

use crate::errors::{LocalizationError, LocalizationResult};
use crate::record::{LocalizationProperty, LocalizationTag, SkyLocalization, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// A record with a submitting user.
pub trait Owned {
    fn owner(&self) -> UserId;
}

impl Owned for SkyLocalization {
    fn owner(&self) -> UserId {
        self.sent_by
    }
}

impl Owned for LocalizationProperty {
    fn owner(&self) -> UserId {
        self.sent_by
    }
}

impl Owned for LocalizationTag {
    fn owner(&self) -> UserId {
        self.sent_by
    }
}

pub fn authorize<R: Owned + ?Sized>(actor: &Actor, record: &R, operation: Operation) -> Decision {
    match operation {
        Operation::Create | Operation::Read => Decision::Allow,
        Operation::Update | Operation::Delete => {
            if actor.is_admin || actor.user_id == record.owner() {
                Decision::Allow
            } else {
                Decision::Deny
            }
        }
    }
}

/// [`authorize`], as a `Result` for use with `?`.
pub fn require<R: Owned + ?Sized>(
    actor: &Actor,
    record: &R,
    operation: Operation,
) -> LocalizationResult<()> {
    if authorize(actor, record, operation).is_allowed() {
        Ok(())
    } else {
        Err(LocalizationError::permission_denied(format!(
            "{} may not {:?} a record owned by {}",
            actor.user_id,
            operation,
            record.owner()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Note(UserId);

    impl Owned for Note {
        fn owner(&self) -> UserId {
            self.0
        }
    }

    #[test]
    fn test_read_and_create_are_open() {
        let stranger = Actor::user(UserId(2));
        let note = Note(UserId(1));
        assert!(authorize(&stranger, &note, Operation::Read).is_allowed());
        assert!(authorize(&stranger, &note, Operation::Create).is_allowed());
    }

    #[test]
    fn test_owner_and_admin_may_modify() {
        let note = Note(UserId(1));
        for op in [Operation::Update, Operation::Delete] {
            assert_eq!(authorize(&Actor::user(UserId(1)), &note, op), Decision::Allow);
            assert_eq!(authorize(&Actor::admin(UserId(9)), &note, op), Decision::Allow);
            assert_eq!(authorize(&Actor::user(UserId(2)), &note, op), Decision::Deny);
        }
    }

    #[test]
    fn test_require_reports_denial() {
        let err = require(&Actor::user(UserId(2)), &Note(UserId(1)), Operation::Delete).unwrap_err();
        assert!(matches!(err, LocalizationError::PermissionDenied { .. }));
        assert!(err.to_string().contains("user:2"));
    }
}
