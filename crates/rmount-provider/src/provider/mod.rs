// ── rmount-provider / provider module ─────────────────────────────────────────

pub mod item;
pub mod enumerator;
pub mod bridge;

pub use bridge::*;
pub use enumerator::*;
pub use item::*;
