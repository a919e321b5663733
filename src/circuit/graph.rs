//! Circuit graph structure.

use std::collections::HashMap;

use super::node::Node;
use super::types::{BranchId, ElementId, NodeId, Sample, VarIndex};
use crate::elements::{
    Capacitor, CurrentSource, Element, ElementKind, Inductor, Resistor, VoltageSource, Waveform,
};
use crate::error::{Result, SimError};
use crate::netlist::{ElementDef, NetlistAst};

/// A complete circuit ready for simulation.
///
/// Owns every node and element for the lifetime of the simulation. Element
/// order is creation order; it is also the stamping order and fixes the
/// branch index of every voltage source.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// Nodes, indexed by `NodeId`
    nodes: Vec<Node>,

    /// All elements in creation order
    elements: Vec<Element>,

    /// Mapping from node names to node IDs
    node_map: HashMap<String, NodeId>,

    /// Mapping from element names to element IDs
    element_map: HashMap<String, ElementId>,

    /// Number of branch current variables (voltage sources)
    num_branches: usize,
}

impl Circuit {
    /// Start building a circuit.
    pub fn builder() -> CircuitBuilder {
        CircuitBuilder::new()
    }

    /// Build a circuit from a parsed netlist.
    pub fn from_ast(ast: &NetlistAst) -> Result<Self> {
        let mut builder = CircuitBuilder::new();
        let mut node_map = HashMap::new();

        // Ground is always node 0
        node_map.insert("0".to_string(), builder.ground());

        // Assign IDs to all other nodes in order of first appearance
        let mut next_id = 1usize;
        for node_name in &ast.nodes {
            if is_ground_name(node_name) || node_map.contains_key(node_name) {
                continue;
            }
            node_map.insert(node_name.clone(), builder.node(next_id, node_name.clone()));
            next_id += 1;
        }

        let mut references_ground = false;
        for def in &ast.elements {
            let nodes = def
                .nodes
                .iter()
                .map(|name| {
                    let normalized = if is_ground_name(name) { "0" } else { name };
                    node_map.get(normalized).copied().ok_or_else(|| SimError::NodeNotFound {
                        node: name.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            if nodes.len() != 2 {
                return Err(SimError::invalid_element(
                    &def.name,
                    def.line,
                    format!("expected 2 nodes, got {}", nodes.len()),
                ));
            }
            references_ground |= nodes.iter().any(NodeId::is_ground);

            add_element_def(&mut builder, def, [nodes[0], nodes[1]])?;
        }

        if !references_ground {
            return Err(SimError::MissingGround);
        }

        builder.build()
    }

    /// Number of nodes including ground.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of non-ground nodes (n).
    pub fn num_unknown_nodes(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Number of voltage sources (m).
    pub fn num_voltage_sources(&self) -> usize {
        self.num_branches
    }

    /// Get the total size of the MNA solution vector.
    pub fn matrix_size(&self) -> usize {
        // Nodes (excluding ground) + branch currents
        self.num_unknown_nodes() + self.num_branches
    }

    /// Get the matrix index for a node voltage.
    /// Returns None for ground (node 0).
    pub fn node_index(&self, node: NodeId) -> Option<usize> {
        if node.is_ground() {
            None
        } else {
            Some(VarIndex::Voltage(node).to_index(self.num_nodes()))
        }
    }

    /// Get the matrix index for a branch current.
    pub fn branch_index(&self, branch: BranchId) -> usize {
        VarIndex::Current(branch).to_index(self.num_nodes())
    }

    /// All nodes, ground first.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Look up a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Find a node ID by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        let key = if is_ground_name(name) { "0" } else { name };
        self.node_map
            .get(key)
            .copied()
            .or_else(|| is_ground_name(name).then_some(NodeId::GROUND))
    }

    /// Get the name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        self.nodes.get(node.0).map(|n| n.name.as_str()).unwrap_or("?")
    }

    /// All elements in creation order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Look up an element by ID.
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    /// Find an element ID by name.
    pub fn find_element(&self, name: &str) -> Option<ElementId> {
        self.element_map.get(name).copied()
    }

    /// Voltage of a node at a history entry. Unknown nodes are an error.
    pub fn node_voltage(&self, id: NodeId, at: Sample) -> Result<f64> {
        self.node(id)
            .ok_or_else(|| SimError::UnknownNode {
                node: id.to_string(),
            })?
            .voltage(at)
    }

    /// Voltage difference V(a) - V(b) at a history entry.
    pub fn terminal_voltage(&self, nodes: [NodeId; 2], at: Sample) -> Result<f64> {
        Ok(self.node_voltage(nodes[0], at)? - self.node_voltage(nodes[1], at)?)
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub(crate) fn elements_mut(&mut self) -> &mut [Element] {
        &mut self.elements
    }

    pub(crate) fn set_history_limit(&mut self, limit: Option<usize>) {
        for node in &mut self.nodes {
            node.set_history_limit(limit);
        }
        for element in &mut self.elements {
            element.set_history_limit(limit);
        }
    }
}

fn is_ground_name(name: &str) -> bool {
    name == "0" || name.eq_ignore_ascii_case("gnd")
}

/// Translate one netlist statement into a builder call.
fn add_element_def(builder: &mut CircuitBuilder, def: &ElementDef, nodes: [NodeId; 2]) -> Result<ElementId> {
    def.check_params()?;
    let name = def.name.clone();
    let [a, b] = nodes;
    let require_value = |what: &str| {
        def.value
            .ok_or_else(|| SimError::invalid_element(&def.name, def.line, format!("{} requires a value", what)))
    };
    let waveform = || -> Result<Waveform> {
        match (&def.pwl, def.value) {
            (Some(points), _) => Ok(Waveform::pwl(points.clone())),
            (None, Some(v)) => Ok(Waveform::dc(v)),
            (None, None) => Err(SimError::invalid_element(
                &def.name,
                def.line,
                "source requires a DC value or a PWL list",
            )),
        }
    };

    match def.kind {
        ElementKind::Resistor => builder.resistor(name, a, b, require_value("resistor")?),
        ElementKind::Capacitor => {
            let ic = def.params.get("ic").copied().unwrap_or(0.0);
            builder.capacitor(name, a, b, require_value("capacitor")?, ic)
        }
        ElementKind::Inductor => {
            let ic = def.params.get("ic").copied().unwrap_or(0.0);
            builder.inductor(name, a, b, require_value("inductor")?, ic)
        }
        ElementKind::VoltageSource => builder.voltage_source(name, a, b, waveform()?),
        ElementKind::CurrentSource => builder.current_source(name, a, b, waveform()?),
    }
}

/// Incremental constructor for [`Circuit`].
///
/// Element parameters are checked as each element is added; node references
/// and ground are checked by [`CircuitBuilder::build`], so nodes may be
/// declared in any order.
#[derive(Debug, Default)]
pub struct CircuitBuilder {
    nodes: Vec<(usize, String)>,
    elements: Vec<Element>,
    element_map: HashMap<String, ElementId>,
    num_branches: usize,
}

impl CircuitBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the ground node (index 0, named "0").
    pub fn ground(&mut self) -> NodeId {
        self.node(0, "0")
    }

    /// Declare a node with a dense index and a display name.
    pub fn node(&mut self, index: usize, name: impl Into<String>) -> NodeId {
        self.nodes.push((index, name.into()));
        NodeId(index)
    }

    /// Add a resistor between `a` and `b`.
    pub fn resistor(&mut self, name: impl Into<String>, a: NodeId, b: NodeId, resistance: f64) -> Result<ElementId> {
        let name = self.check_new(name.into(), a, b)?;
        let id = self.next_id();
        let r = Resistor::new(id, name, [a, b], resistance)?;
        Ok(self.push(Element::Resistor(r)))
    }

    /// Add a capacitor between `a` and `b` holding `initial_voltage` at t = 0.
    pub fn capacitor(
        &mut self,
        name: impl Into<String>,
        a: NodeId,
        b: NodeId,
        capacitance: f64,
        initial_voltage: f64,
    ) -> Result<ElementId> {
        let name = self.check_new(name.into(), a, b)?;
        let id = self.next_id();
        let c = Capacitor::new(id, name, [a, b], capacitance, initial_voltage)?;
        Ok(self.push(Element::Capacitor(c)))
    }

    /// Add an inductor between `a` and `b` carrying `initial_current` at t = 0.
    pub fn inductor(
        &mut self,
        name: impl Into<String>,
        a: NodeId,
        b: NodeId,
        inductance: f64,
        initial_current: f64,
    ) -> Result<ElementId> {
        let name = self.check_new(name.into(), a, b)?;
        let id = self.next_id();
        let l = Inductor::new(id, name, [a, b], inductance, initial_current)?;
        Ok(self.push(Element::Inductor(l)))
    }

    /// Add a voltage source enforcing V(a) - V(b) = v(t).
    pub fn voltage_source(&mut self, name: impl Into<String>, a: NodeId, b: NodeId, waveform: Waveform) -> Result<ElementId> {
        let name = self.check_new(name.into(), a, b)?;
        let id = self.next_id();
        let v = VoltageSource::new(id, name, [a, b], waveform, BranchId(self.num_branches))?;
        self.num_branches += 1;
        Ok(self.push(Element::VoltageSource(v)))
    }

    /// Add a current source driving i(t) from `a` through the source to `b`.
    pub fn current_source(&mut self, name: impl Into<String>, a: NodeId, b: NodeId, waveform: Waveform) -> Result<ElementId> {
        let name = self.check_new(name.into(), a, b)?;
        let id = self.next_id();
        let i = CurrentSource::new(id, name, [a, b], waveform)?;
        Ok(self.push(Element::CurrentSource(i)))
    }

    /// Validate the topology and produce the circuit.
    pub fn build(self) -> Result<Circuit> {
        let mut declared = self.nodes;
        declared.sort_by_key(|(index, _)| *index);

        if declared.first().map(|(index, _)| *index) != Some(0) {
            return Err(SimError::MissingGround);
        }
        if let Some(w) = declared.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(SimError::DuplicateNode { index: w[0].0 });
        }
        let highest = declared.last().map(|(index, _)| *index).unwrap_or(0);
        if let Some(missing) = declared
            .iter()
            .enumerate()
            .find(|(expected, (index, _))| expected != index)
            .map(|(expected, _)| expected)
        {
            return Err(SimError::NonDenseNodes { missing, highest });
        }

        let mut node_map = HashMap::new();
        let mut nodes = Vec::with_capacity(declared.len());
        for (index, name) in declared {
            if node_map.insert(name.clone(), NodeId(index)).is_some() {
                return Err(SimError::InvalidTopology {
                    message: format!("node name '{}' is used by more than one node", name),
                });
            }
            nodes.push(Node::new(NodeId(index), name));
        }

        for element in &self.elements {
            if let Some(missing) = element.nodes().iter().find(|n| n.0 >= nodes.len()) {
                return Err(SimError::NodeNotFound {
                    node: missing.0.to_string(),
                });
            }
        }

        Ok(Circuit {
            nodes,
            elements: self.elements,
            node_map,
            element_map: self.element_map,
            num_branches: self.num_branches,
        })
    }

    fn next_id(&self) -> ElementId {
        ElementId(self.elements.len())
    }

    fn check_new(&self, name: String, a: NodeId, b: NodeId) -> Result<String> {
        if a == b {
            return Err(SimError::DegenerateElement { element: name, node: a.0 });
        }
        if self.element_map.contains_key(&name) {
            return Err(SimError::DuplicateElement { name });
        }
        Ok(name)
    }

    fn push(&mut self, element: Element) -> ElementId {
        let id = element.id();
        self.element_map.insert(element.name().to_string(), id);
        self.elements.push(element);
        id
    }
}
