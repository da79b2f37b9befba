pub mod link;
pub mod noc;
pub mod router;

pub use link::{Link, LinkFabric, LinkId};
pub use noc::{build_noc, network_latency_ns, CoreLinks, Noc, NodeLinks, TileLinks};
pub use router::{build_router_tree, RouterNode, TreeEnds};
