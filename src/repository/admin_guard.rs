//! The last-administrator rule: no update or delete may leave the system
//! without an admin account.

use crate::errors::{conflict, ApiResult};
use derive_more::Display;
use sqlx::PgConnection;
use tracing::{error, warn};
use uuid::Uuid;

/// The mutation being checked, which picks the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AdminRemoval {
    #[display("demote")]
    Demote,
    #[display("delete")]
    Delete,
}

impl AdminRemoval {
    fn message(self) -> &'static str {
        match self {
            AdminRemoval::Demote => "cannot remove only admin",
            AdminRemoval::Delete => "cannot delete only admin",
        }
    }
}

/// Fails unless some admin other than `target` remains in `admin_ids`.
pub fn ensure_other_admin(admin_ids: &[Uuid], target: Uuid, action: AdminRemoval) -> ApiResult<()> {
    let others = admin_ids.iter().filter(|id| **id != target).count();
    if others == 0 {
        warn!("refusing to {} user {}: no other admin", action, target);
        return Err(conflict(action.message()));
    }
    Ok(())
}

/// Locks every admin row for the rest of the transaction and returns their ids.
///
/// Callers take these locks before any other row lock on `users`, in id order,
/// so two guarded mutations queue up instead of deadlocking. Once the first
/// commits, the second's `WHERE admin` re-check no longer sees a demoted row.
pub async fn lock_admins(conn: &mut PgConnection) -> ApiResult<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE admin ORDER BY id FOR UPDATE")
        .fetch_all(&mut *conn)
        .await
        .inspect_err(|e| error!("cannot lock admin accounts: {:?}", e))?;
    Ok(ids)
}

/// Applies the rule to a mutation of `target`, given the admin ids locked by
/// [`lock_admins`]. `is_admin` is the target's current role and `stays_admin`
/// its role afterwards; only a true-to-false change is checked.
pub fn check_removal(
    admin_ids: &[Uuid],
    target: Uuid,
    is_admin: bool,
    stays_admin: bool,
    action: AdminRemoval,
) -> ApiResult<()> {
    if !is_admin || stays_admin {
        return Ok(());
    }
    ensure_other_admin(admin_ids, target, action)
}
