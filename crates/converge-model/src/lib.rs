//! Value model for converge
//!
//! A desired system state is a [`ConfigTree`]: a root mapping of typed
//! [`Value`]s. Fragments of desired state are combined with [`merge`],
//! guided by a [`Schema`] that declares, per field, how lists merge and
//! whether later fragments may override earlier ones.
//!
//! ```
//! use converge_model::{ConfigTree, FieldSpec, MergePolicy, Schema, Value, merge};
//!
//! let schema = Schema::new().field("pkg", FieldSpec::list(MergePolicy::Append));
//! let base = ConfigTree::from_iter([("pkg", Value::list([Value::str("git")]))]);
//! let extra = ConfigTree::from_iter([("pkg", Value::list([Value::str("tmux")]))]);
//!
//! let merged = merge(&base, &extra, &schema).unwrap();
//! assert_eq!(
//!     merged.get(&"pkg".parse().unwrap()),
//!     Some(&Value::list([Value::str("git"), Value::str("tmux")]))
//! );
//! ```

pub mod error;
pub mod merge;
pub mod path;
pub mod schema;
pub mod tree;
pub mod value;

pub use error::{ConflictError, PathError, SchemaError};
pub use merge::{merge, merge_value};
pub use path::TreePath;
pub use schema::{FieldKind, FieldSpec, MergePolicy, Schema};
pub use tree::{ConfigTree, MAX_DEPTH};
pub use value::{Scalar, Value, equals};
