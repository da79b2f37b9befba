use serde::Serialize;

use super::link::{LinkFabric, LinkId};
use super::router::{build_router_tree, RouterNode, TreeEnds};
use crate::config::HardwareTopology;
use crate::error::Result;

/// Control node links to and from the root router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeLinks {
  pub to_router: LinkId,
  pub from_router: LinkId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileLinks {
  pub tile: usize,
  pub from_router: LinkId,
  pub to_router: LinkId,
  pub to_core: Vec<LinkId>,
  pub from_core: Vec<LinkId>,
}

/// Links around one core: its tile pair and the wiring between the
/// control core, the CAM, the MPE and the MMR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoreLinks {
  pub tile: usize,
  pub core: usize,
  pub from_tile: LinkId,
  pub to_tile: LinkId,
  pub ctrl_to_cam: LinkId,
  pub ctrl_to_cam_data: LinkId,
  pub cam_to_mpe: LinkId,
  pub ctrl_to_mpe: LinkId,
  pub mpe_to_ctrl: LinkId,
  pub mpe_to_mmr: LinkId,
  pub ctrl_to_mmr: LinkId,
  pub mmr_to_ctrl: LinkId,
}

/// The whole interconnect: link fabric plus the per-level link lists that
/// components attach to.
#[derive(Debug, Clone, Serialize)]
pub struct Noc {
  pub fabric: LinkFabric,
  pub node: NodeLinks,
  pub routers: Vec<RouterNode>,
  pub tiles: Vec<TileLinks>,
  /// Indexed by `tile * num_core + core`
  pub cores: Vec<CoreLinks>,
}

/// Latency of node, router and tile links: one ns per four features
pub fn network_latency_ns(num_feature: usize) -> u32 {
  num_feature.div_ceil(4).max(1) as u32
}

fn single(fabric: &mut LinkFabric, source: &str, destination: &str, index: usize, latency_ns: u32) -> LinkId {
  fabric.build_link(source, &[index], destination, &[index], latency_ns, false)[0]
}

/// Build every link of the system and the router tree above the tiles.
pub fn build_noc(topology: &HardwareTopology, network_latency_ns: u32, core_latency_ns: u32) -> Result<Noc> {
  let mut fabric = LinkFabric::new();
  let num_tile = topology.num_tile();
  let num_core = topology.num_core();
  let tiles: Vec<usize> = (0..num_tile).collect();
  let cores: Vec<usize> = (0..num_core).collect();

  let node_to_router = fabric.build_link("Node", &[0], "Router", &[0], network_latency_ns, true)[0];
  let router_to_tile = fabric.build_link("Router", &[0], "Tile", &tiles, network_latency_ns, false);
  let tile_to_router = fabric.build_link("Tile", &tiles, "Router", &[0], network_latency_ns, false);
  let router_to_node = fabric.build_link("Router", &[0], "Node", &[0], network_latency_ns, true)[0];

  let ends = TreeEnds {
    from_up: node_to_router,
    to_up: router_to_node,
    to_tiles: &router_to_tile,
    from_tiles: &tile_to_router,
  };
  let routers = build_router_tree(&mut fabric, topology, ends, 0, network_latency_ns)?;

  let mut tile_links = Vec::with_capacity(num_tile);
  let mut core_links = Vec::with_capacity(topology.total_cores());
  for tile in 0..num_tile {
    let to_core = fabric.build_link("Tile", &[tile], "Core", &cores, network_latency_ns, false);
    let from_core = fabric.build_link("Core", &cores, "Tile", &[tile], network_latency_ns, false);

    for core in 0..num_core {
      let ctrl = format!("Tile{}Core", tile);
      let cam = format!("Tile{}CAM", tile);
      let mpe = format!("Tile{}MPE", tile);
      let mmr = format!("Tile{}MMR", tile);
      core_links.push(CoreLinks {
        tile,
        core,
        from_tile: to_core[core],
        to_tile: from_core[core],
        ctrl_to_cam: single(&mut fabric, &ctrl, "CAM", core, core_latency_ns),
        ctrl_to_cam_data: single(&mut fabric, &ctrl, "CAMD", core, core_latency_ns),
        cam_to_mpe: single(&mut fabric, &cam, "MPE", core, core_latency_ns),
        ctrl_to_mpe: single(&mut fabric, &ctrl, "MPE", core, core_latency_ns),
        mpe_to_ctrl: single(&mut fabric, &mpe, "Core", core, core_latency_ns),
        mpe_to_mmr: single(&mut fabric, &mpe, "MMR", core, core_latency_ns),
        ctrl_to_mmr: single(&mut fabric, &ctrl, "MMR", core, core_latency_ns),
        mmr_to_ctrl: single(&mut fabric, &mmr, "Core", core, core_latency_ns),
      });
    }

    tile_links.push(TileLinks {
      tile,
      from_router: router_to_tile[tile],
      to_router: tile_to_router[tile],
      to_core,
      from_core,
    });
  }

  log::info!(
    "interconnect: {} routers, {} tiles, {} cores, {} links",
    routers.len(),
    num_tile,
    core_links.len(),
    fabric.len()
  );

  Ok(Noc {
    fabric,
    node: NodeLinks {
      to_router: node_to_router,
      from_router: router_to_node,
    },
    routers,
    tiles: tile_links,
    cores: core_links,
  })
}
