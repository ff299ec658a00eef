use slated_core::OwnerId;

/// Authenticated owner context for a request.
///
/// Populated by the auth middleware from the boundary-supplied identity;
/// must be present for all job routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OwnerContext {
    owner: OwnerId,
}

impl OwnerContext {
    pub fn new(owner: OwnerId) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}
