use std::path::Path;

use tracing::debug;

use crate::error::HoverError;
use crate::provider::GuardedProvider;
use crate::types::{DefinitionTarget, Position};

/// Ask the provider where the symbol at `position` is defined.
///
/// Only the first candidate is used; further candidates (overloads, declaration merging)
/// are ignored. `Ok(None)` means the provider returned no candidates at all, and callers
/// should treat the queried position as its own definition.
pub async fn resolve_definition(
    provider: GuardedProvider<'_>,
    file: &Path,
    position: Position,
) -> Result<Option<DefinitionTarget>, HoverError> {
    let candidates = provider.definition(file, position).await?;
    if candidates.len() > 1 {
        debug!(
            "definition at {}:{}:{} returned {} candidates; using the first",
            file.display(),
            position.line,
            position.character,
            candidates.len()
        );
    }
    Ok(candidates.first().map(|c| c.target()))
}
