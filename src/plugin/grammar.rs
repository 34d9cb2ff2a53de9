//! Speech engine collaborator surface
//!
//! Grammars are owned by their plugin and registered with an external speech
//! engine. The host only ever calls these lifecycle hooks; compiling and
//! matching utterances is the engine's business.

use anyhow::Result;

use crate::domain::Context;

/// A set of voice commands registered with the speech engine
pub trait Grammar {
    /// Grammar name, used in log output
    fn name(&self) -> &str;

    /// Registers the grammar with the engine
    fn load(&mut self) -> Result<()>;

    /// Removes the grammar from the engine
    fn unload(&mut self) -> Result<()>;

    fn enable(&mut self) -> Result<()>;

    fn disable(&mut self) -> Result<()>;

    /// Restricts the grammar to the given activation context
    fn set_context(&mut self, context: &Context) -> Result<()>;

    /// Command rules contained in this grammar
    fn rules(&mut self) -> Vec<&mut dyn Rule>;
}

/// A single command rule inside a grammar
pub trait Rule {
    fn name(&self) -> &str;

    fn enable(&mut self) -> Result<()>;

    fn disable(&mut self) -> Result<()>;
}
