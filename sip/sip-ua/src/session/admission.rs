use sip_core::IncomingRequest;
use sip_types::Code;

/// Decision whether an incoming session may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    /// A service prerequisite is not met, e.g. no call is active for content sharing
    PrerequisiteMissing,
    /// Too many sessions are already active
    AtCapacity,
}

impl Admission {
    /// Status code used to reject the INVITE
    pub fn rejection_code(self) -> Option<Code> {
        match self {
            Admission::Accept => None,
            Admission::PrerequisiteMissing => Some(Code::NOT_ACCEPTABLE),
            Admission::AtCapacity => Some(Code::BUSY_HERE),
        }
    }
}

/// Policy of a service deciding which incoming sessions are admitted
pub trait AdmissionPolicy {
    /// `active` is the number of other sessions currently active
    fn admit(&self, invite: &IncomingRequest, active: usize) -> Admission;
}

impl<F> AdmissionPolicy for F
where
    F: Fn(&IncomingRequest, usize) -> Admission,
{
    fn admit(&self, invite: &IncomingRequest, active: usize) -> Admission {
        self(invite, active)
    }
}

/// Rejects new sessions with 486 once the given number of sessions is active
#[derive(Debug, Clone, Copy)]
pub struct MaxSessions(pub usize);

impl AdmissionPolicy for MaxSessions {
    fn admit(&self, _: &IncomingRequest, active: usize) -> Admission {
        if active >= self.0 {
            Admission::AtCapacity
        } else {
            Admission::Accept
        }
    }
}
