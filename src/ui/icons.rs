//! Shared UI icons.
//!
//! Each icon falls back to a plain-text tag on terminals without emoji support.

use console::Emoji;

// Step outcomes
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");

// Run outcomes
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static PIVOT: Emoji<'_, '_> = Emoji("🔄 ", "[REVISE]");
pub static BLOCKER: Emoji<'_, '_> = Emoji("🚧 ", "[ABORT]");

// Misc
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
