use serde::Serialize;
use sim::simulator::Connector;

use super::assemble::SystemDescriptor;
use super::component::Direction;
use crate::error::{CompileError, Result};

/// A link resolved to the component ports on either end
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wire {
  pub id: String,
  pub source_id: String,
  pub target_id: String,
  pub source_port: String,
  pub target_port: String,
  pub latency_ns: u32,
}

/// Resolve every link of a validated system to its sending and receiving port.
pub fn wires(system: &SystemDescriptor) -> Result<Vec<Wire>> {
  let mut ends: Vec<(Option<(&str, &str)>, Option<(&str, &str)>)> = vec![(None, None); system.links.len()];
  for component in &system.components {
    for binding in &component.ports {
      let slot = ends.get_mut(binding.link).ok_or_else(|| {
        CompileError::config(format!("{} binds unknown link {}", component.name, binding.link))
      })?;
      let end = Some((component.name.as_str(), binding.port.as_str()));
      match binding.direction {
        Direction::Output => slot.0 = end,
        Direction::Input => slot.1 = end,
      }
    }
  }

  system
    .links
    .iter()
    .zip(ends)
    .map(|(link, ends)| match ends {
      (Some((source_id, source_port)), Some((target_id, target_port))) => Ok(Wire {
        id: link.name.clone(),
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
        source_port: source_port.to_string(),
        target_port: target_port.to_string(),
        latency_ns: link.latency_ns,
      }),
      _ => Err(CompileError::config(format!("link {} is not connected at both ends", link.name))),
    })
    .collect()
}

/// Couplings for the discrete-event engine, one per wire
pub fn connectors(wires: &[Wire]) -> Vec<Connector> {
  wires
    .iter()
    .map(|wire| {
      Connector::new(
        wire.id.clone(),
        wire.source_id.clone(),
        wire.target_id.clone(),
        wire.source_port.clone(),
        wire.target_port.clone(),
      )
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::system::component::{ComponentDescriptor, ComponentKind};
  use crate::topology::LinkFabric;

  fn system() -> SystemDescriptor {
    let mut fabric = LinkFabric::new();
    let request = fabric.add("Tile0Core0_MPE0", 1, false);
    let response = fabric.add("Tile0MPE0_Core0", 1, false);
    let ctrl = ComponentDescriptor::new(0, "T00C00_ctrl", ComponentKind::ControlCore)
      .output("toMPEPort", request)
      .input("fromMPEPort", response);
    let mpe = ComponentDescriptor::new(0, "T00C00_mpe", ComponentKind::Mpe)
      .input("requestPort", request)
      .output("responsePort", response);
    SystemDescriptor {
      components: vec![ctrl, mpe],
      links: fabric.links().to_vec(),
    }
  }

  #[test]
  fn test_wires_resolve_both_ends() {
    let wires = wires(&system()).unwrap();
    assert_eq!(wires.len(), 2);
    assert_eq!(wires[0].source_id, "T00C00_ctrl");
    assert_eq!(wires[0].source_port, "toMPEPort");
    assert_eq!(wires[0].target_id, "T00C00_mpe");
    assert_eq!(wires[0].target_port, "requestPort");
    assert_eq!(wires[1].id, "Tile0MPE0_Core0");
    assert_eq!(connectors(&wires).len(), 2);
  }

  #[test]
  fn test_dangling_link_rejected() {
    let mut system = system();
    system.components.pop();
    assert!(wires(&system).is_err());
  }
}
