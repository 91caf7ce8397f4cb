//! SysAdmin: a ring of networked machines, one administrator per machine.
//!
//! Each step an administrator either leaves its machine alone or reboots
//! it. Healthy machines fail more often when their ring neighbours are
//! unhealthy, which is what couples the agents. The shared reward counts
//! working machines and charges for every reboot.

use fvmcts_core::{AdjacencyMatrix, MultiAgentModel};
use rand::Rng;
use std::fmt;

/// Health of one machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Machine {
    Good,
    Faulty,
    Dead,
}

impl Machine {
    /// Per-step reward earned by a machine in this condition.
    fn reward(self) -> f64 {
        match self {
            Machine::Good => 1.0,
            Machine::Faulty => 0.5,
            Machine::Dead => 0.0,
        }
    }
}

/// An administrator's choice for its machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum AdminAction {
    Noop,
    Reboot,
}

/// Condition of every machine on the ring.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct SysAdminState {
    machines: Vec<Machine>,
}

impl SysAdminState {
    /// Wrap explicit machine conditions.
    pub fn new(machines: Vec<Machine>) -> Self {
        Self { machines }
    }

    /// Condition of each machine.
    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }
}

impl fmt::Display for SysAdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for machine in &self.machines {
            let c = match machine {
                Machine::Good => 'G',
                Machine::Faulty => 'F',
                Machine::Dead => 'D',
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// SysAdmin on a ring of `n` machines.
#[derive(Clone, Debug)]
pub struct SysAdmin {
    n: usize,
    graph: AdjacencyMatrix,

    /// Base probability that a good machine turns faulty.
    pub fail_prob: f64,

    /// Added failure probability per unhealthy neighbour.
    pub neighbor_fail_prob: f64,

    /// Probability that a faulty machine dies.
    pub death_prob: f64,

    /// Cost charged per reboot.
    pub reboot_cost: f64,

    /// Discount factor.
    pub discount: f64,
}

impl SysAdmin {
    /// Ring of `n` machines with the standard parameters.
    pub fn ring(n: usize) -> Self {
        Self {
            n,
            graph: AdjacencyMatrix::ring(n),
            fail_prob: 0.05,
            neighbor_fail_prob: 0.15,
            death_prob: 0.1,
            reboot_cost: 0.75,
            discount: 0.9,
        }
    }

    fn unhealthy_neighbors(&self, state: &SysAdminState, machine: usize) -> usize {
        self.graph
            .neighbors(machine)
            .filter(|&j| state.machines[j] != Machine::Good)
            .count()
    }
}

impl MultiAgentModel for SysAdmin {
    type State = SysAdminState;
    type Action = AdminAction;

    fn n_agents(&self) -> usize {
        self.n
    }

    fn agent_actions(&self, _agent: usize) -> Vec<AdminAction> {
        vec![AdminAction::Noop, AdminAction::Reboot]
    }

    fn coordination_graph(&self) -> AdjacencyMatrix {
        self.graph.clone()
    }

    fn generate<R: Rng + ?Sized>(
        &self,
        state: &SysAdminState,
        actions: &[AdminAction],
        rng: &mut R,
    ) -> (SysAdminState, f64) {
        let mut reward = 0.0;
        let machines = state
            .machines
            .iter()
            .zip(actions)
            .enumerate()
            .map(|(i, (&machine, &action))| {
                reward += machine.reward();
                if action == AdminAction::Reboot {
                    reward -= self.reboot_cost;
                    return Machine::Good;
                }
                match machine {
                    Machine::Good => {
                        let p = self.fail_prob
                            + self.neighbor_fail_prob * self.unhealthy_neighbors(state, i) as f64;
                        if rng.gen_bool(p.min(1.0)) {
                            Machine::Faulty
                        } else {
                            Machine::Good
                        }
                    }
                    Machine::Faulty => {
                        if rng.gen_bool(self.death_prob.min(1.0)) {
                            Machine::Dead
                        } else {
                            Machine::Faulty
                        }
                    }
                    Machine::Dead => Machine::Dead,
                }
            })
            .collect();

        (SysAdminState { machines }, reward)
    }

    fn is_terminal(&self, _state: &SysAdminState) -> bool {
        false
    }

    fn discount(&self) -> f64 {
        self.discount
    }

    fn initial_state<R: Rng + ?Sized>(&self, _rng: &mut R) -> SysAdminState {
        SysAdminState {
            machines: vec![Machine::Good; self.n],
        }
    }
}
