use crate::lr::{ActionSet, LalrBuilder};

mod attributes;
mod ignored;
mod lr1;
mod precedence;
mod weak;

pub use attributes::{ConflictAction, ConflictAttributes};
pub use ignored::IgnoredSymbols;
pub use lr1::Lr1Rewriter;
pub use precedence::{Associativity, PrecedenceHooks, PrecedenceRewriter, PrecedenceTable};
pub use weak::WeakSymbols;

/// A pass that transforms a state's action set after synthesis.
///
/// Rewriters are registered on the builder and applied in registration order.
/// Typical rewrites remove actions so an ambiguous grammar can be accepted,
/// replace reduces with weak reduces, or add new actions (ignores, weak
/// companions). A rewriter may inspect the builder (its machine, grammar and
/// lookahead provenance) to refine its decisions.
///
/// Rewriters must be idempotent: re-running a rewriter on its own output
/// yields the same action set.
pub trait ActionRewriter {
    fn rewrite_actions(&self, state: usize, actions: &mut ActionSet, builder: &LalrBuilder);
}
