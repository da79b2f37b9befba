use serde::Serialize;
use std::collections::HashSet;

use super::component::{ComponentDescriptor, ComponentKind, Direction, ParamValue};
use crate::config::AppConfig;
use crate::error::{CompileError, Result};
use crate::image::ImageSet;
use crate::partition::PartitionAssignment;
use crate::topology::{Link, Noc};

/// Every component with its bindings, plus the links they share
#[derive(Debug, Clone, Serialize)]
pub struct SystemDescriptor {
  pub components: Vec<ComponentDescriptor>,
  pub links: Vec<Link>,
}

impl SystemDescriptor {
  pub fn component(&self, name: &str) -> Option<&ComponentDescriptor> {
    self.components.iter().find(|component| component.name == name)
  }

  /// Component names are unique, port names are unique per component, and
  /// every link has exactly one sending and one receiving port.
  pub fn validate(&self) -> Result<()> {
    let mut names = HashSet::new();
    let mut senders = vec![0usize; self.links.len()];
    let mut receivers = vec![0usize; self.links.len()];

    for component in &self.components {
      if !names.insert(component.name.as_str()) {
        return Err(CompileError::config(format!("duplicate component {}", component.name)));
      }
      let mut ports = HashSet::new();
      for binding in &component.ports {
        if !ports.insert(binding.port.as_str()) {
          return Err(CompileError::config(format!(
            "{} binds port {} twice",
            component.name, binding.port
          )));
        }
        let count = match binding.direction {
          Direction::Output => senders.get_mut(binding.link),
          Direction::Input => receivers.get_mut(binding.link),
        };
        match count {
          Some(count) => *count += 1,
          None => {
            return Err(CompileError::config(format!(
              "{}.{} refers to unknown link {}",
              component.name, binding.port, binding.link
            )))
          },
        }
      }
    }

    let mut link_names = HashSet::new();
    for (index, link) in self.links.iter().enumerate() {
      if !link_names.insert(link.name.as_str()) {
        return Err(CompileError::config(format!("duplicate link {}", link.name)));
      }
      if senders[index] != 1 || receivers[index] != 1 {
        return Err(CompileError::config(format!(
          "link {} has {} senders and {} receivers",
          link.name, senders[index], receivers[index]
        )));
      }
    }
    Ok(())
  }
}

/// Parameters every device takes
fn common_params(config: &AppConfig) -> Vec<(&'static str, ParamValue)> {
  let sw = &config.software;
  vec![
    ("verbose", sw.verbose.into()),
    ("mask", sw.mask.into()),
    ("outputDir", sw.log_dir.as_str().into()),
    ("freq", config.hardware.default.freq.as_str().into()),
  ]
}

/// Attach images, CAM contents and structural indices to the component
/// sitting at each position of the interconnect.
pub fn assemble_system(
  config: &AppConfig,
  noc: &Noc,
  assignment: &PartitionAssignment,
  images: &ImageSet,
  num_feature: usize,
) -> Result<SystemDescriptor> {
  let hw = &config.hardware;
  let topology = hw.topology()?;
  let num_core = topology.num_core();
  let common = common_params(config);
  let g_list = hw.acam.conductance_levels();

  if images.cores.len() != noc.cores.len() || assignment.cores.len() != noc.cores.len() {
    return Err(CompileError::config(format!(
      "{} core links, {} core images, {} CAM arrays",
      noc.cores.len(),
      images.cores.len(),
      assignment.cores.len()
    )));
  }

  let mut components = Vec::new();

  components.push(
    ComponentDescriptor::new(0, "Node_ctrl", ComponentKind::ControlNode)
      .params(common.clone())
      .param("numClass", assignment.ranges.num_class())
      .param("numFeature", num_feature)
      .param("instructionTable", images.node.instructions.clone())
      .param("dataMemoryTable", images.node.data.clone())
      .output("toRouterPort", noc.node.to_router)
      .input("fromRouterPort", noc.node.from_router),
  );

  for router in &noc.routers {
    let mut component = ComponentDescriptor::new(router.id, router.name(), ComponentKind::Router)
      .params(common.clone())
      .param("numPort", topology.num_port())
      .param("numLevel", topology.num_level())
      .param("latency", hw.router.latency)
      .input("fromUpPort", router.from_up);
    for (j, &link) in router.to_down.iter().enumerate() {
      component = component.output(format!("toDownPort{}", j), link);
    }
    for (j, &link) in router.from_down.iter().enumerate() {
      component = component.input(format!("fromDownPort{}", j), link);
    }
    components.push(component.output("toUpPort", router.to_up));
  }

  for tile in &noc.tiles {
    let t = tile.tile;
    let mut component = ComponentDescriptor::new(t, format!("T{:02}_ctrl", t), ComponentKind::ControlTile)
      .params(common.clone())
      .param("numCore", num_core)
      .param("indexClass", assignment.ranges.index_class(t))
      .param("instructionTable", images.tile.instructions.clone())
      .param("dataMemoryTable", images.tile.data.clone())
      .input("fromRouterPort", tile.from_router)
      .output("toRouterPort", tile.to_router);
    for (j, &link) in tile.to_core.iter().enumerate() {
      component = component.output(format!("toCorePort{}", j), link);
    }
    for (j, &link) in tile.from_core.iter().enumerate() {
      component = component.input(format!("fromCorePort{}", j), link);
    }
    components.push(component);
  }

  for (index, core) in noc.cores.iter().enumerate() {
    let (t, c) = (core.tile, core.core);
    let id = t * num_core + c;
    let prefix = format!("T{:02}C{:02}", t, c);
    let arrays = &assignment.cores[index];
    let image = &images.cores[index];

    components.push(
      ComponentDescriptor::new(id, format!("{}_ctrl", prefix), ComponentKind::ControlCore)
        .params(common.clone())
        .param("numCol", topology.num_col())
        .param("numRow", topology.num_row())
        .param("instructionTable", image.instructions.clone())
        .param("dataMemoryTable", image.data.clone())
        .output("toTilePort", core.to_tile)
        .input("fromTilePort", core.from_tile)
        .output("toCAMPort", core.ctrl_to_cam)
        .output("toCAMDataPort", core.ctrl_to_cam_data)
        .output("toMPEPort", core.ctrl_to_mpe)
        .input("fromMPEPort", core.mpe_to_ctrl)
        .output("toMMRPort", core.ctrl_to_mmr)
        .input("fromMMRPort", core.mmr_to_ctrl),
    );

    components.push(
      ComponentDescriptor::new(id, format!("{}_acam", prefix), ComponentKind::Acam)
        .params(common.clone())
        .params(hw.acam.electrical.clone())
        .param("numCol", topology.num_col())
        .param("numRow", topology.num_row())
        .param("latency", hw.acam.latency)
        .param("gBit", hw.acam.g_bit)
        .param("gMin", hw.acam.g_min)
        .param("gMax", hw.acam.g_max)
        .param("gList", g_list.clone())
        .param("acamThLow", arrays.th_low.clone())
        .param("acamThHigh", arrays.th_high.clone())
        .param("acamThXLow", arrays.x_low.clone())
        .param("acamThXHigh", arrays.x_high.clone())
        .input("requestPort", core.ctrl_to_cam)
        .input("dataPort", core.ctrl_to_cam_data)
        .output("outputPort", core.cam_to_mpe),
    );

    components.push(
      ComponentDescriptor::new(id, format!("{}_mpe", prefix), ComponentKind::Mpe)
        .params(common.clone())
        .param("numRow", topology.num_row())
        .param("latency", hw.mpe.latency)
        .input("requestPort", core.ctrl_to_mpe)
        .input("dataPort", core.cam_to_mpe)
        .output("responsePort", core.mpe_to_ctrl)
        .output("outputPort", core.mpe_to_mmr),
    );

    components.push(
      ComponentDescriptor::new(id, format!("{}_mmr", prefix), ComponentKind::Mmr)
        .params(common.clone())
        .param("latency", hw.mmr.latency)
        .input("requestPort", core.ctrl_to_mmr)
        .input("dataPort", core.mpe_to_mmr)
        .output("responsePort", core.mmr_to_ctrl),
    );
  }

  let system = SystemDescriptor {
    components,
    links: noc.fabric.links().to_vec(),
  };
  system.validate()?;
  log::info!(
    "assembled {} components over {} links",
    system.components.len(),
    system.links.len()
  );
  Ok(system)
}
