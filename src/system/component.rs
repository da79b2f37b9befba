use serde::Serialize;
use std::collections::BTreeMap;

use crate::topology::LinkId;

/// Parameter value handed to a simulated device
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
  Int(i64),
  Float(f64),
  Text(String),
  Bytes(Vec<u8>),
  Words(Vec<u32>),
  Floats(Vec<f64>),
}

impl From<usize> for ParamValue {
  fn from(value: usize) -> Self {
    ParamValue::Int(value as i64)
  }
}

impl From<u32> for ParamValue {
  fn from(value: u32) -> Self {
    ParamValue::Int(i64::from(value))
  }
}

impl From<f64> for ParamValue {
  fn from(value: f64) -> Self {
    ParamValue::Float(value)
  }
}

impl From<&str> for ParamValue {
  fn from(value: &str) -> Self {
    ParamValue::Text(value.to_string())
  }
}

impl From<String> for ParamValue {
  fn from(value: String) -> Self {
    ParamValue::Text(value)
  }
}

impl From<Vec<u8>> for ParamValue {
  fn from(value: Vec<u8>) -> Self {
    ParamValue::Bytes(value)
  }
}

impl From<Vec<u32>> for ParamValue {
  fn from(value: Vec<u32>) -> Self {
    ParamValue::Words(value)
  }
}

impl From<Vec<f64>> for ParamValue {
  fn from(value: Vec<f64>) -> Self {
    ParamValue::Floats(value)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Input,
  Output,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBinding {
  pub port: String,
  pub direction: Direction,
  pub link: LinkId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
  ControlNode,
  Router,
  ControlTile,
  ControlCore,
  Acam,
  Mpe,
  Mmr,
}

impl ComponentKind {
  /// Device model the engine instantiates for this component
  pub fn model_type(&self) -> &'static str {
    match self {
      ComponentKind::ControlNode => "treecam.control_node",
      ComponentKind::Router => "treecam.router",
      ComponentKind::ControlTile => "treecam.control_tile",
      ComponentKind::ControlCore => "treecam.control_core",
      ComponentKind::Acam => "treecam.acam",
      ComponentKind::Mpe => "treecam.mpe",
      ComponentKind::Mmr => "treecam.mmr",
    }
  }
}

/// One device instance: identity, parameters and port bindings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentDescriptor {
  pub id: usize,
  pub name: String,
  pub kind: ComponentKind,
  pub params: BTreeMap<String, ParamValue>,
  pub ports: Vec<PortBinding>,
}

impl ComponentDescriptor {
  pub fn new(id: usize, name: impl Into<String>, kind: ComponentKind) -> Self {
    let name = name.into();
    let mut params = BTreeMap::new();
    params.insert("id".to_string(), ParamValue::from(id));
    params.insert("name".to_string(), ParamValue::from(name.as_str()));
    Self {
      id,
      name,
      kind,
      params,
      ports: Vec::new(),
    }
  }

  pub fn param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
    self.params.insert(key.to_string(), value.into());
    self
  }

  pub fn params<I, K, V>(mut self, entries: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
  {
    for (key, value) in entries {
      self.params.insert(key.into(), value.into());
    }
    self
  }

  pub fn input(mut self, port: impl Into<String>, link: LinkId) -> Self {
    self.ports.push(PortBinding {
      port: port.into(),
      direction: Direction::Input,
      link,
    });
    self
  }

  pub fn output(mut self, port: impl Into<String>, link: LinkId) -> Self {
    self.ports.push(PortBinding {
      port: port.into(),
      direction: Direction::Output,
      link,
    });
    self
  }

  pub fn port(&self, name: &str) -> Option<&PortBinding> {
    self.ports.iter().find(|binding| binding.port == name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builder_sets_identity_params() {
    let component = ComponentDescriptor::new(3, "Router3", ComponentKind::Router)
      .param("latency", 2u32)
      .input("fromUpPort", 7)
      .output("toUpPort", 8);
    assert_eq!(component.params.get("id"), Some(&ParamValue::Int(3)));
    assert_eq!(component.params.get("name"), Some(&ParamValue::Text("Router3".into())));
    assert_eq!(component.port("toUpPort").map(|p| p.direction), Some(Direction::Output));
    assert_eq!(component.port("fromUpPort").map(|p| p.link), Some(7));
  }

  #[test]
  fn test_params_serialize_untagged() {
    let component = ComponentDescriptor::new(0, "T00C00_acam", ComponentKind::Acam)
      .param("gList", vec![1.0, 2.0])
      .param("acamThLow", vec![0u8, 3]);
    let json = serde_json::to_value(&component).unwrap();
    assert_eq!(json["params"]["gList"], serde_json::json!([1.0, 2.0]));
    assert_eq!(json["params"]["acamThLow"], serde_json::json!([0, 3]));
    assert_eq!(json["kind"], serde_json::json!("acam"));
  }
}
