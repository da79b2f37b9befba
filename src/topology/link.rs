use serde::Serialize;

/// Position of a link in its fabric, in creation order
pub type LinkId = usize;

/// Directed point-to-point connection between two component ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
  pub id: LinkId,
  pub name: String,
  pub latency_ns: u32,
  /// Kept whole when the simulation is partitioned
  pub no_cut: bool,
}

/// Every link of one compiled system. Links are never changed once added.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkFabric {
  links: Vec<Link>,
}

impl LinkFabric {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, name: impl Into<String>, latency_ns: u32, no_cut: bool) -> LinkId {
    let id = self.links.len();
    let link = Link {
      id,
      name: name.into(),
      latency_ns,
      no_cut,
    };
    log::debug!("link {} {} ({} ns)", id, link.name, latency_ns);
    self.links.push(link);
    id
  }

  /// One link `"{source}{s}_{destination}{d}"` per pair of the cross
  /// product, source-major.
  pub fn build_link(
    &mut self,
    source: &str,
    source_indices: &[usize],
    destination: &str,
    destination_indices: &[usize],
    latency_ns: u32,
    no_cut: bool,
  ) -> Vec<LinkId> {
    let mut ids = Vec::with_capacity(source_indices.len() * destination_indices.len());
    for s in source_indices {
      for d in destination_indices {
        ids.push(self.add(format!("{}{}_{}{}", source, s, destination, d), latency_ns, no_cut));
      }
    }
    ids
  }

  pub fn get(&self, id: LinkId) -> Option<&Link> {
    self.links.get(id)
  }

  pub fn links(&self) -> &[Link] {
    &self.links
  }

  pub fn len(&self) -> usize {
    self.links.len()
  }

  pub fn is_empty(&self) -> bool {
    self.links.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cross_product_names() {
    let mut fabric = LinkFabric::new();
    let ids = fabric.build_link("Router", &[0], "Tile", &[0, 1, 2], 3, false);
    assert_eq!(ids, vec![0, 1, 2]);
    let names: Vec<&str> = fabric.links().iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Router0_Tile0", "Router0_Tile1", "Router0_Tile2"]);
    assert!(fabric.links().iter().all(|l| l.latency_ns == 3 && !l.no_cut));
  }

  #[test]
  fn test_source_major_order() {
    let mut fabric = LinkFabric::new();
    fabric.build_link("A", &[0, 1], "B", &[0, 1], 1, true);
    let names: Vec<&str> = fabric.links().iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["A0_B0", "A0_B1", "A1_B0", "A1_B1"]);
    assert!(fabric.get(3).map(|l| l.no_cut).unwrap_or(false));
    assert!(fabric.get(4).is_none());
  }
}
