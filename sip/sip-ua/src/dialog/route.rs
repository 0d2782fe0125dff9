use sip_types::header::typed::Routing;

/// Side of the dialog, decides how the route set is derived from `Record-Route`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sent the initial request
    Caller,
    /// Received the initial request
    Callee,
}

/// Derive a dialog's route set from a `Record-Route` sequence as it appears in a message.
///
/// The callee keeps the order of receipt, the caller uses the reverse, so both
/// sides route their requests through the same proxies in mirrored order.
pub fn route_from_record_route(record_route: Vec<Routing>, role: Role) -> Vec<Routing> {
    match role {
        Role::Caller => record_route.into_iter().rev().collect(),
        Role::Callee => record_route,
    }
}
