//! End-to-end compile: quantize, partition, pack images, build the
//! interconnect and bind everything into one system description.

use serde::Serialize;

use crate::config::{validate_config, AppConfig, HardwareTopology};
use crate::error::Result;
use crate::image::{build_images, ImageSet};
use crate::model::{quantize_model, EnsembleModel, QuantizedModel};
use crate::partition::{partition, LeafSlot, PartitionAssignment, TruncatedClass};
use crate::system::{assemble_system, wires, SystemDescriptor, Wire};
use crate::topology::{build_noc, network_latency_ns, Link};

/// Everything one compile produces. Immutable once returned.
#[derive(Debug, Clone)]
pub struct CompiledSystem {
  pub topology: HardwareTopology,
  pub model: QuantizedModel,
  pub assignment: PartitionAssignment,
  pub images: ImageSet,
  pub system: SystemDescriptor,
  pub wires: Vec<Wire>,
}

/// What the external engine reads back
#[derive(Serialize)]
struct CompiledOutput<'a> {
  topology: &'a HardwareTopology,
  components: &'a [crate::system::ComponentDescriptor],
  links: &'a [Link],
  wires: &'a [Wire],
  slots: &'a [LeafSlot],
  truncated: &'a [TruncatedClass],
}

impl CompiledSystem {
  pub fn to_json(&self) -> Result<String> {
    let output = CompiledOutput {
      topology: &self.topology,
      components: &self.system.components,
      links: &self.system.links,
      wires: &self.wires,
      slots: &self.assignment.slots,
      truncated: &self.assignment.truncated,
    };
    Ok(serde_json::to_string(&output)?)
  }
}

pub fn compile(config: &AppConfig, model: &EnsembleModel) -> Result<CompiledSystem> {
  validate_config(config)?;
  let topology = config.hardware.topology()?;
  log::info!(
    "compiling for {} tiles x {} cores, {}x{} CAM arrays",
    topology.num_tile(),
    topology.num_core(),
    topology.num_row(),
    topology.num_col()
  );

  let quantized = quantize_model(model, &config.software)?;
  let assignment = partition(
    &quantized,
    &topology,
    &config.software.begin_core,
    config.software.overflow_policy,
  )?;
  let images = build_images(&quantized, &assignment, &config.software.offsets)?;

  let noc = build_noc(
    &topology,
    network_latency_ns(quantized.num_feature),
    config.hardware.default.link_latency_ns,
  )?;
  let system = assemble_system(config, &noc, &assignment, &images, quantized.num_feature)?;
  let wires = wires(&system)?;

  Ok(CompiledSystem {
    topology,
    model: quantized,
    assignment,
    images,
    system,
    wires,
  })
}
