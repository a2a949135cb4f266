//! # Resolution
//!
//! After merging, the unified tree passes through a [`Resolver`]. The default
//! [`PlaceholderResolver`] expands `${path}` / `${path:default}` references against
//! the tree itself and then against a [`VariableProvider`]. Any other resolver,
//! including a plain closure, can be installed instead; the placeholder grammar
//! is then not applied at all.

pub mod placeholder;
pub mod variables;

use crate::error::ConfigResult;
use crate::value::Tree;

pub use placeholder::{PlaceholderResolver, DEFAULT_MAX_DEPTH};
pub use variables::{DotenvVariables, EnvironmentVariables, StaticVariables, VariableProvider};

/// Post-processing step over the merged tree
pub trait Resolver: Send + Sync {
    fn resolve(&self, tree: &mut Tree) -> ConfigResult<()>;
}

impl<F> Resolver for F
where
    F: Fn(&mut Tree) -> ConfigResult<()> + Send + Sync,
{
    fn resolve(&self, tree: &mut Tree) -> ConfigResult<()> {
        self(tree)
    }
}
