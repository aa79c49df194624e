//! The two discovery strategies behind a hierarchy node.
//!
//! - [`discover_callees`] walks the declaration's own syntax subtree.
//! - [`discover_callers`] queries the project-wide reference index.
//!
//! Both are free functions over a borrowed [`DiscoveryContext`] and return a
//! freshly built [`CallEdgeMap`](crate::types::CallEdgeMap). They hold no state
//! between calls; memoization is the session's job.
//!
//! ## Failure semantics
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | Reference cannot be resolved | Skipped silently |
//! | Target matches the ignore filter | Skipped |
//! | No syntax tree / no source range | `Ok` with an empty map |
//! | Backend error | `Err(Error::Backend)`; the session logs it and caches nothing |
//! | Cancellation | `Err(Error::Cancelled)`; never cached |

mod callee;
mod caller;

pub use callee::discover_callees;
pub use caller::discover_callers;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::filter::IgnoreFilter;
use crate::implementors::ImplementorResolver;
use crate::oracle::{Backend, SearchScope};
use crate::types::Symbol;

/// Everything a discovery call reads from its session.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryContext<'a> {
    /// External collaborators
    pub backend: Backend<'a>,
    /// Ignore patterns applied to every recorded member
    pub filter: &'a IgnoreFilter,
    /// Session search scope
    pub scope: &'a SearchScope,
    /// Narrow interface call targets to a sole implementor
    pub use_implementors: bool,
    /// Cooperative cancellation
    pub cancel: &'a CancellationToken,
}

impl<'a> DiscoveryContext<'a> {
    /// Fail with [`Error::Cancelled`] if the token fired.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] after cancellation.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Returns `true` if `symbol`'s declaring type matches the ignore filter.
    #[must_use]
    pub fn is_ignored(&self, symbol: &Symbol) -> bool {
        self.filter.is_ignored(&symbol.type_name)
    }

    /// Implementor queries over this context's backend.
    #[must_use]
    pub fn implementors(&self) -> ImplementorResolver<'a> {
        ImplementorResolver::new(self.backend.model, self.backend.hierarchy)
    }
}
