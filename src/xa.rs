//! Transactional resource derivation.
//!
//! Once a connection is live, a transaction-branch handle can be derived from
//! it for enlistment in a distributed transaction. The deriver is stateless:
//! it forwards the request to the protocol layer and pairs the resulting
//! branch with the owning connection wrapper, which this crate treats as an
//! opaque correlation key.

use crate::connector::Connector;
use crate::error::ResourceError;
use futures::future::BoxFuture;

/// Protocol-layer capability to open a transaction branch on a connection.
///
/// The protocol layer enforces the "at most one active branch per physical
/// connection" policy and reports violations as [`ResourceError::BranchActive`].
pub trait XaConnector: Connector {
    /// The transaction-branch handle produced on success.
    type Branch: Send + 'static;

    /// Opens a transaction branch scoped to `connection`.
    ///
    /// Fails when the connection is not XA-capable, already closed, or
    /// already bound to a different active branch.
    fn open_transaction_branch<'a>(
        &'a self,
        connection: &'a Self::Connection,
    ) -> BoxFuture<'a, Result<Self::Branch, ResourceError>>;
}

impl<C: XaConnector + ?Sized> XaConnector for std::sync::Arc<C> {
    type Branch = C::Branch;

    fn open_transaction_branch<'a>(
        &'a self,
        connection: &'a Self::Connection,
    ) -> BoxFuture<'a, Result<Self::Branch, ResourceError>> {
        (**self).open_transaction_branch(connection)
    }
}

/// A transaction-branch handle tied to one physical connection and its
/// owning connection wrapper.
///
/// Lives as long as the enclosing transaction branch is active; released when
/// the branch completes or the connection closes, whichever comes first. The
/// owner value is never inspected here, only carried for correlation.
#[derive(Debug)]
pub struct TransactionalResource<B, W> {
    branch: B,
    owner: W,
}

impl<B, W> TransactionalResource<B, W> {
    pub(crate) fn new(branch: B, owner: W) -> Self {
        Self { branch, owner }
    }

    /// The protocol-layer branch handle.
    pub fn branch(&self) -> &B {
        &self.branch
    }

    /// Mutable access to the branch handle, for enlistment calls.
    pub fn branch_mut(&mut self) -> &mut B {
        &mut self.branch
    }

    /// The owning connection wrapper this resource is correlated with.
    pub fn owner(&self) -> &W {
        &self.owner
    }

    /// Consumes the resource, returning the branch and its owner.
    pub fn into_parts(self) -> (B, W) {
        (self.branch, self.owner)
    }
}
