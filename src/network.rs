use crate::error::{PlanError, PlanResult};

/// A load point of the feeder. Demands are stored both in kW (as given)
/// and in per-unit of the network base power. Reactive demand is carried
/// for the balance equations but is zero on the reference data.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub load_kw: f64,
    pub slack: bool,
    pub load_p_pu: f64,
    pub load_q_pu: f64,
    pub in_line_indices: Vec<usize>,
    pub out_line_indices: Vec<usize>,
}

impl Node {
    pub fn new(id: usize, load_kw: f64, slack: bool) -> Self {
        Self {
            id,
            load_kw,
            slack,
            load_p_pu: 0.0,
            load_q_pu: 0.0,
            in_line_indices: vec![],
            out_line_indices: vec![],
        }
    }
}

/// A distribution line. The (from, to) pair fixes the positive flow
/// direction; flows may take either sign up to the model's capacity bound.
#[derive(Debug, Clone)]
pub struct Line {
    pub id: usize,
    pub from: usize,
    pub to: usize,
    pub resistance_pu: f64,
    pub reactance_pu: f64,
}

impl Line {
    pub fn new(
        id: usize,
        from: usize,
        to: usize,
        resistance_pu: f64,
        reactance_pu: f64,
    ) -> Self {
        Self {
            id,
            from,
            to,
            resistance_pu,
            reactance_pu,
        }
    }
}

/// The static feeder topology with its per-unit base quantities.
/// Immutable after construction; every model build borrows it read-only.
#[derive(Debug)]
pub struct Network {
    pub base_power_kva: f64,
    pub base_voltage_kv: f64,
    pub nodes: Vec<Node>,
    pub lines: Vec<Line>,
}

impl Network {
    /// Wires node/line adjacency and validates the topology. Lines are
    /// given with ohmic impedances and converted to per-unit here.
    pub fn new(
        base_power_kva: f64,
        base_voltage_kv: f64,
        mut nodes: Vec<Node>,
        lines_ohm: Vec<(usize, usize, usize, f64, f64)>,
    ) -> PlanResult<Self> {
        if base_power_kva <= 0.0 || base_voltage_kv <= 0.0 {
            return Err(PlanError::Network(
                "base quantities must be positive".to_string(),
            ));
        }
        let z_base = base_voltage_kv * base_voltage_kv * 1000.0
            / base_power_kva;

        for node in nodes.iter_mut() {
            node.load_p_pu = node.load_kw / base_power_kva;
            node.load_q_pu = 0.0;
        }

        let slack_count = nodes.iter().filter(|n| n.slack).count();
        if slack_count != 1 {
            return Err(PlanError::Network(format!(
                "expected exactly one slack node, found {}",
                slack_count
            )));
        }
        for (index, node) in nodes.iter().enumerate() {
            if nodes[index + 1..].iter().any(|other| other.id == node.id) {
                return Err(PlanError::Network(format!(
                    "duplicated node id {}",
                    node.id
                )));
            }
        }

        let mut lines = Vec::<Line>::with_capacity(lines_ohm.len());
        for (id, from, to, r_ohm, x_ohm) in lines_ohm {
            if lines.iter().any(|l| l.id == id) {
                return Err(PlanError::Network(format!(
                    "duplicated line id {}",
                    id
                )));
            }
            let from_index = nodes.iter().position(|n| n.id == from);
            let to_index = nodes.iter().position(|n| n.id == to);
            match (from_index, to_index) {
                (Some(fi), Some(ti)) => {
                    let line_index = lines.len();
                    nodes[fi].out_line_indices.push(line_index);
                    nodes[ti].in_line_indices.push(line_index);
                    lines.push(Line::new(
                        id,
                        from,
                        to,
                        r_ohm / z_base,
                        x_ohm / z_base,
                    ));
                }
                _ => {
                    return Err(PlanError::Network(format!(
                        "line {} references unknown node ({} -> {})",
                        id, from, to
                    )))
                }
            }
        }

        let network = Self {
            base_power_kva,
            base_voltage_kv,
            nodes,
            lines,
        };
        network.validate_connectivity()?;
        Ok(network)
    }

    pub fn z_base(&self) -> f64 {
        self.base_voltage_kv * self.base_voltage_kv * 1000.0
            / self.base_power_kva
    }

    pub fn slack_index(&self) -> usize {
        self.nodes
            .iter()
            .position(|n| n.slack)
            .expect("validated network has a slack node")
    }

    pub fn node_index(&self, id: usize) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn line_index(&self, id: usize) -> Option<usize> {
        self.lines.iter().position(|l| l.id == id)
    }

    /// Node ids eligible for generator siting: every node but the slack.
    pub fn candidate_indices(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|i| !self.nodes[*i].slack)
            .collect()
    }

    /// The edge-count radiality bound is only sound on a feeder whose base
    /// topology cannot strand a load behind a broken component, so every
    /// node must be reachable from the slack when all lines are closed.
    fn validate_connectivity(&self) -> PlanResult<()> {
        let mut reached = vec![false; self.nodes.len()];
        let mut stack = vec![self.slack_index()];
        while let Some(index) = stack.pop() {
            if reached[index] {
                continue;
            }
            reached[index] = true;
            let node = &self.nodes[index];
            for line_index in
                node.in_line_indices.iter().chain(&node.out_line_indices)
            {
                let line = &self.lines[*line_index];
                let other = if self.nodes[index].id == line.from {
                    line.to
                } else {
                    line.from
                };
                if let Some(other_index) = self.node_index(other) {
                    stack.push(other_index);
                }
            }
        }
        match reached.iter().position(|r| !r) {
            Some(index) => Err(PlanError::Network(format!(
                "node {} is not connected to the slack",
                self.nodes[index].id
            ))),
            None => Ok(()),
        }
    }

    /// The 13-node / 15-line reference feeder (1000 kVA, 4.16 kV, 0.1 ohm
    /// per line, slack at node 1).
    pub fn ieee13() -> Self {
        let loads_kw = [
            (1, 0.0),
            (2, 66.67),
            (3, 85.0),
            (4, 100.0),
            (5, 56.67),
            (6, 76.67),
            (7, 56.67),
            (8, 100.0),
            (9, 142.67),
            (10, 0.0),
            (11, 133.33),
            (12, 281.0),
            (13, 56.67),
        ];
        let nodes = loads_kw
            .iter()
            .map(|(id, load)| Node::new(*id, *load, *id == 1))
            .collect();
        let lines = vec![
            (1, 1, 2, 0.1, 0.1),
            (2, 2, 3, 0.1, 0.1),
            (3, 3, 4, 0.1, 0.1),
            (4, 2, 5, 0.1, 0.1),
            (5, 5, 6, 0.1, 0.1),
            (6, 6, 7, 0.1, 0.1),
            (7, 7, 8, 0.1, 0.1),
            (8, 3, 8, 0.1, 0.1),
            (9, 8, 9, 0.1, 0.1),
            (10, 4, 9, 0.1, 0.1),
            (11, 2, 10, 0.1, 0.1),
            (12, 10, 11, 0.1, 0.1),
            (13, 11, 12, 0.1, 0.1),
            (14, 12, 13, 0.1, 0.1),
            (15, 3, 13, 0.1, 0.1),
        ];
        Self::new(1000.0, 4.16, nodes, lines)
            .expect("reference feeder is valid")
    }
}
