//! The `import` component kind: stages its sources verbatim.

use crate::plugin::{ComponentError, ComponentPlugin, PluginError, PluginSetup};

/// Produces an artifact directly from the component's sources, without
/// running any commands.
pub struct Import {
  source_count: usize,
}

impl Import {
  pub fn create(setup: &PluginSetup<'_>) -> Result<Box<dyn ComponentPlugin>, PluginError> {
    Ok(Box::new(Self {
      source_count: setup.source_count,
    }))
  }
}

impl ComponentPlugin for Import {
  fn preflight(&self) -> Result<(), ComponentError> {
    if self.source_count == 0 {
      return Err(ComponentError::new("import components require at least one source"));
    }
    Ok(())
  }
}
