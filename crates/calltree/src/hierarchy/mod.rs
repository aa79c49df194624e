//! Lazily expanded, memoized caller and callee trees.
//!
//! A [`HierarchySession`] owns everything one exploration needs: an arena of
//! [`TreeNode`]s, one [`SharedCache`] per direction, the compiled ignore
//! filter and the search scope. Nodes are addressed by [`NodeId`].
//!
//! ## Expansion
//!
//! ```text
//! children_of(node)
//!   ├─ node is recursive ──────────────► []
//!   ├─ children already materialized ──► those
//!   ├─ cache hit ──────────────────────► wrap cached edges
//!   └─ cache miss ─► discover ─► store ─► wrap
//! ```
//!
//! ## Design Decisions
//!
//! | Decision | Choice | Rationale |
//! |----------|--------|-----------|
//! | Parent links | Arena indices | No reference cycles; O(depth) ancestor walk |
//! | Variants | `direction` tag + two discovery functions | No wrapper subclassing |
//! | Cache scope | One per direction per session | Caller and callee results never mix |
//! | Failed discovery | Logged, not cached, node marked `Failed` | Retry on next access |
//! | Callee sibling order | Representative site `(start, end)` | Reading order in the source |
//! | Node identity | [`NodePath`] | Same logical position compares equal across expansions |

mod cache;
mod node;
mod session;
mod visitor;

pub use cache::SharedCache;
pub use node::{Expansion, NodeId, NodeKind, NodePath, TreeNode};
pub use session::HierarchySession;
pub use visitor::{CallHierarchyVisitor, DepthLimitedCollector};
