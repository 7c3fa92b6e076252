//! The `script` component kind: an ordered list of build commands.

use crate::plugin::{ComponentError, ComponentPlugin, PluginError, PluginSetup};

/// Runs the configured `commands` inside the build sandbox.
pub struct Script {
  config: serde_yaml::Mapping,
}

impl Script {
  pub fn create(setup: &PluginSetup<'_>) -> Result<Box<dyn ComponentPlugin>, PluginError> {
    Ok(Box::new(Self {
      config: setup.config.clone(),
    }))
  }
}

impl ComponentPlugin for Script {
  fn preflight(&self) -> Result<(), ComponentError> {
    let commands = self
      .config
      .get("commands")
      .ok_or_else(|| ComponentError::new("script components require a 'commands' list"))?;

    let commands = commands
      .as_sequence()
      .ok_or_else(|| ComponentError::new("'commands' must be a list"))?;

    if commands.is_empty() {
      return Err(ComponentError::new("'commands' must not be empty"));
    }

    for (index, command) in commands.iter().enumerate() {
      if !command.is_string() {
        return Err(ComponentError::new(format!("command {index} is not a string")));
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn script_with(yaml: &str) -> Script {
    Script {
      config: serde_yaml::from_str(yaml).unwrap(),
    }
  }

  #[test]
  fn accepts_command_list() {
    let script = script_with("commands:\n  - ./configure\n  - make\n");
    assert!(script.preflight().is_ok());
  }

  #[test]
  fn rejects_missing_commands() {
    let script = Script {
      config: serde_yaml::Mapping::new(),
    };
    assert!(script.preflight().is_err());
  }

  #[test]
  fn rejects_empty_commands() {
    let script = script_with("commands: []\n");
    assert!(script.preflight().is_err());
  }

  #[test]
  fn rejects_non_string_command() {
    let script = script_with("commands:\n  - make\n  - 42\n");
    let err = script.preflight().unwrap_err();
    assert!(err.to_string().contains("command 1"));
  }
}
