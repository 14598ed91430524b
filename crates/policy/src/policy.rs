//! Capability decisions, keyed by caller tier.

use parceltrace_shipments::Shipment;

use crate::Caller;

/// Mutating shipment operations gated by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    CreateShipment,
    AppendTrackingEvent,
    RecordDeliveryAttempt,
    AssignAgent,
    RecordPayment,
}

/// Whether `caller` may perform `op`.
///
/// Creation is open to any authenticated account; lifecycle mutations are
/// exclusive to agents/admins.
pub fn can_write(caller: &Caller, op: WriteOp) -> bool {
    match op {
        WriteOp::CreateShipment => !caller.is_anonymous(),
        WriteOp::AppendTrackingEvent
        | WriteOp::RecordDeliveryAttempt
        | WriteOp::AssignAgent
        | WriteOp::RecordPayment => caller.is_operational(),
    }
}

/// Whether `caller` sees the full (unredacted) shipment projection.
///
/// Agents/admins always do; a regular account does for shipments it is
/// associated with (creator, or sender/recipient email match).
pub fn can_read_full(caller: &Caller, shipment: &Shipment) -> bool {
    match caller {
        Caller::Anonymous => false,
        Caller::Account {
            account_id,
            role,
            email,
        } => role.is_operational() || shipment.is_associated_with(*account_id, email),
    }
}

/// Dashboard aggregation is an operations surface.
pub fn can_view_dashboard(caller: &Caller) -> bool {
    caller.is_operational()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parceltrace_core::AccountId;
    use parceltrace_identity::Role;

    #[test]
    fn anonymous_callers_cannot_write() {
        for op in [
            WriteOp::CreateShipment,
            WriteOp::AppendTrackingEvent,
            WriteOp::RecordDeliveryAttempt,
            WriteOp::AssignAgent,
            WriteOp::RecordPayment,
        ] {
            assert!(!can_write(&Caller::Anonymous, op));
        }
    }

    #[test]
    fn users_create_but_do_not_operate() {
        let user = Caller::account(AccountId::new(), Role::User, "u@example.com");
        assert!(can_write(&user, WriteOp::CreateShipment));
        assert!(!can_write(&user, WriteOp::AppendTrackingEvent));
        assert!(!can_write(&user, WriteOp::RecordDeliveryAttempt));
        assert!(!can_view_dashboard(&user));
    }

    #[test]
    fn agents_and_admins_operate() {
        for role in [Role::Agent, Role::Admin] {
            let caller = Caller::account(AccountId::new(), role, "ops@example.com");
            assert!(can_write(&caller, WriteOp::AppendTrackingEvent));
            assert!(can_write(&caller, WriteOp::RecordDeliveryAttempt));
            assert!(can_write(&caller, WriteOp::AssignAgent));
            assert!(can_view_dashboard(&caller));
        }
    }
}
