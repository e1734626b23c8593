//! Yet Another LALR(1) parser generator.
//!
//! Re-exports the whole of `yalr-core`: the grammar arena, the LALR(1)
//! builder with its action rewriters (weak symbols, ignored symbols,
//! precedence, conflict attributes, LR(1) disambiguation), the compact
//! parser tables and the guard-aware runtime driver.

pub use yalr_core::*;
