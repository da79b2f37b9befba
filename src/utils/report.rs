use super::log::is_log_enabled;
use crate::pipeline::CompiledSystem;

pub fn print_compile_report(compiled: &CompiledSystem) {
  if !is_log_enabled() {
    return;
  }

  let topology = &compiled.topology;
  println!("\n--- Compile Report ---");
  println!(
    "{} tiles x {} cores, {} rows x {} cols per CAM",
    topology.num_tile(),
    topology.num_core(),
    topology.num_row(),
    topology.num_col()
  );

  print_class_records(compiled);
  print_image_records(compiled);

  println!(
    "\n{} components, {} links",
    compiled.system.components.len(),
    compiled.wires.len()
  );
  println!("--- End Report ---\n");
}

fn print_class_records(compiled: &CompiledSystem) {
  let assignment = &compiled.assignment;
  let ranges = &assignment.ranges;

  for class in 0..ranges.num_class() {
    let cores = ranges.core_range(class);
    let tiles = ranges.tile_range(class);
    println!(
      "\n[class {}] cores {}..{} tiles {}..={}",
      class,
      cores.start,
      cores.end,
      tiles.start(),
      tiles.end()
    );
    println!(
      "  leaves {} / capacity {}",
      assignment.kept_leaves(class),
      assignment.capacity(class)
    );
    if let Some(truncated) = assignment.truncated.iter().find(|t| t.class == class) {
      println!("  dropped {} of {} leaves", truncated.dropped(), truncated.leaves);
    }
  }
}

fn print_image_records(compiled: &CompiledSystem) {
  let images = &compiled.images;
  println!("\n[images]");
  for (label, image) in [("node", &images.node), ("tile", &images.tile)] {
    println!(
      "  {}: {} instruction words, {} data bytes",
      label,
      image.instructions.len(),
      image.data.len()
    );
  }
  if let Some(core) = images.cores.first() {
    println!(
      "  core x{}: {} instruction words, {} data bytes",
      images.cores.len(),
      core.instructions.len(),
      core.data.len()
    );
  }
}
