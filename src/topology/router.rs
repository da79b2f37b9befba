use serde::Serialize;

use super::link::{LinkFabric, LinkId};
use crate::config::HardwareTopology;
use crate::error::{CompileError, Result};

/// One router of the tree with its up-link pair and down-link pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterNode {
  pub id: usize,
  /// 0 is the root
  pub depth: usize,
  pub from_up: LinkId,
  pub to_up: LinkId,
  pub to_down: Vec<LinkId>,
  pub from_down: Vec<LinkId>,
}

impl RouterNode {
  pub fn name(&self) -> String {
    format!("Router{}", self.id)
  }
}

/// Links on the upper side of the tree and the tile side of its leaves
#[derive(Debug, Clone, Copy)]
pub struct TreeEnds<'a> {
  /// Control node to root
  pub from_up: LinkId,
  /// Root to control node
  pub to_up: LinkId,
  pub to_tiles: &'a [LinkId],
  pub from_tiles: &'a [LinkId],
}

/// Up-link pair a router exposes to its parent
struct Uplink {
  down: LinkId,
  up: LinkId,
}

fn new_uplink(fabric: &mut LinkFabric, id: usize, latency_ns: u32) -> Uplink {
  Uplink {
    down: fabric.add(format!("Router{}In", id), latency_ns, false),
    up: fabric.add(format!("Router{}Out", id), latency_ns, false),
  }
}

/// Build the router tree bottom-up and return the routers in build order.
///
/// The deepest `P^(L-1)` routers are built first, each serving `P` tiles,
/// then every shallower level aggregates `P` children, ending with the root
/// on the control node link. A one-level tree is a single router bridging
/// the node to every tile. Ids run from `next_id` upwards in build order.
pub fn build_router_tree(
  fabric: &mut LinkFabric,
  topology: &HardwareTopology,
  ends: TreeEnds<'_>,
  next_id: usize,
  latency_ns: u32,
) -> Result<Vec<RouterNode>> {
  let num_port = topology.num_port();
  let num_level = topology.num_level();
  if ends.to_tiles.len() != topology.num_tile() || ends.from_tiles.len() != topology.num_tile() {
    return Err(CompileError::config(format!(
      "router tree over {} tiles given {}/{} tile links",
      topology.num_tile(),
      ends.to_tiles.len(),
      ends.from_tiles.len()
    )));
  }

  if num_level == 1 {
    let root = RouterNode {
      id: next_id,
      depth: 0,
      from_up: ends.from_up,
      to_up: ends.to_up,
      to_down: ends.to_tiles.to_vec(),
      from_down: ends.from_tiles.to_vec(),
    };
    return Ok(vec![root]);
  }

  let mut routers = Vec::new();
  let mut next_id = next_id;

  // deepest level, one router per group of tiles
  let deepest = topology.num_tile() / num_port;
  let mut children = Vec::with_capacity(deepest);
  for i in 0..deepest {
    let uplink = new_uplink(fabric, next_id, latency_ns);
    let group = i * num_port..(i + 1) * num_port;
    routers.push(RouterNode {
      id: next_id,
      depth: num_level - 1,
      from_up: uplink.down,
      to_up: uplink.up,
      to_down: ends.to_tiles[group.clone()].to_vec(),
      from_down: ends.from_tiles[group].to_vec(),
    });
    children.push(uplink);
    next_id += 1;
  }

  for depth in (1..num_level - 1).rev() {
    let count = children.len() / num_port;
    let mut parents = Vec::with_capacity(count);
    for group in children.chunks(num_port) {
      let uplink = new_uplink(fabric, next_id, latency_ns);
      routers.push(RouterNode {
        id: next_id,
        depth,
        from_up: uplink.down,
        to_up: uplink.up,
        to_down: group.iter().map(|child| child.down).collect(),
        from_down: group.iter().map(|child| child.up).collect(),
      });
      parents.push(uplink);
      next_id += 1;
    }
    children = parents;
  }

  routers.push(RouterNode {
    id: next_id,
    depth: 0,
    from_up: ends.from_up,
    to_up: ends.to_up,
    to_down: children.iter().map(|child| child.down).collect(),
    from_down: children.iter().map(|child| child.up).collect(),
  });

  log::debug!("built {} routers over {} levels", routers.len(), num_level);
  Ok(routers)
}
