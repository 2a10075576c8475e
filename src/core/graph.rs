//! 服務相依圖。
//!
//! 節點只宣告 `depends_on`，`triggers` 由反向關係推導，因此兩者永遠互為反向。
//! 排序採用 Kahn 演算法，同層節點以 `ServiceName` 宣告順序決定先後。

use crate::domain::service_name::ServiceName;
use crate::utils::error::{EngineError, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNode {
    pub name: ServiceName,
    pub depends_on: BTreeSet<ServiceName>,
    pub triggers: BTreeSet<ServiceName>,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: BTreeMap<ServiceName, ServiceNode>,
}

const STANDARD_DEPENDENCIES: &[(ServiceName, &[ServiceName])] = &[
    (ServiceName::AiBreakdown, &[]),
    (ServiceName::Energy, &[ServiceName::AiBreakdown]),
    (ServiceName::Ll97, &[ServiceName::Energy]),
    (ServiceName::Financial, &[ServiceName::Energy]),
    (
        ServiceName::Noi,
        &[ServiceName::Energy, ServiceName::Ll97, ServiceName::Financial],
    ),
    (ServiceName::PropertyValue, &[ServiceName::Noi]),
];

impl DependencyGraph {
    /// 六個服務的固定相依圖
    pub fn standard() -> Self {
        let mut nodes = BTreeMap::new();
        for (name, deps) in STANDARD_DEPENDENCIES {
            nodes.insert(
                *name,
                ServiceNode {
                    name: *name,
                    depends_on: deps.iter().copied().collect(),
                    triggers: BTreeSet::new(),
                },
            );
        }
        for (name, deps) in STANDARD_DEPENDENCIES {
            for dep in *deps {
                if let Some(node) = nodes.get_mut(dep) {
                    node.triggers.insert(*name);
                }
            }
        }
        Self { nodes }
    }

    /// 由相依表建立圖；相依對象必須也是已宣告的節點
    pub fn from_dependencies(dependencies: &[(ServiceName, Vec<ServiceName>)]) -> Result<Self> {
        let mut nodes: BTreeMap<ServiceName, ServiceNode> = dependencies
            .iter()
            .map(|(name, deps)| {
                (
                    *name,
                    ServiceNode {
                        name: *name,
                        depends_on: deps.iter().copied().collect(),
                        triggers: BTreeSet::new(),
                    },
                )
            })
            .collect();

        for (name, deps) in dependencies {
            for dep in deps {
                let node = nodes
                    .get_mut(dep)
                    .ok_or_else(|| EngineError::UnknownService(dep.to_string()))?;
                node.triggers.insert(*name);
            }
        }

        Ok(Self { nodes })
    }

    pub fn node(&self, name: ServiceName) -> Result<&ServiceNode> {
        self.nodes
            .get(&name)
            .ok_or_else(|| EngineError::UnknownService(name.to_string()))
    }

    pub fn contains(&self, name: ServiceName) -> bool {
        self.nodes.contains_key(&name)
    }

    pub fn services(&self) -> impl Iterator<Item = ServiceName> + '_ {
        self.nodes.keys().copied()
    }

    pub fn dependencies_of(&self, name: ServiceName) -> Result<&BTreeSet<ServiceName>> {
        Ok(&self.node(name)?.depends_on)
    }

    pub fn triggers_of(&self, name: ServiceName) -> Result<&BTreeSet<ServiceName>> {
        Ok(&self.node(name)?.triggers)
    }

    /// `name` 加上所有經由 triggers 可達的服務，依相依順序排列
    pub fn transitive_closure(&self, name: ServiceName) -> Result<Vec<ServiceName>> {
        self.node(name)?;

        let mut reachable = BTreeSet::new();
        let mut queue = VecDeque::from([name]);
        while let Some(current) = queue.pop_front() {
            if reachable.insert(current) {
                queue.extend(self.triggers_of(current)?.iter().copied());
            }
        }

        let order = self.topological_order(&reachable)?;
        if order.first() != Some(&name) {
            // 起點只有在環中才會有圈內的相依
            return Err(EngineError::GraphCycleDetected {
                service: name.to_string(),
            });
        }
        Ok(order)
    }

    /// 全部節點的拓撲排序
    pub fn topological_order_all(&self) -> Result<Vec<ServiceName>> {
        let all: BTreeSet<ServiceName> = self.nodes.keys().copied().collect();
        self.topological_order(&all)
    }

    fn topological_order(&self, subset: &BTreeSet<ServiceName>) -> Result<Vec<ServiceName>> {
        let mut in_degree: BTreeMap<ServiceName, usize> = BTreeMap::new();
        for name in subset {
            let count = self
                .dependencies_of(*name)?
                .iter()
                .filter(|dep| subset.contains(*dep))
                .count();
            in_degree.insert(*name, count);
        }

        let mut ready: BTreeSet<ServiceName> = in_degree
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(subset.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for child in self.triggers_of(next)? {
                if let Some(count) = in_degree.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }

        if order.len() != subset.len() {
            let stuck = in_degree
                .iter()
                .find(|(name, count)| **count > 0 && !order.contains(*name))
                .map(|(name, _)| name.to_string())
                .unwrap_or_default();
            return Err(EngineError::GraphCycleDetected { service: stuck });
        }

        Ok(order)
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ServiceName::*;

    #[test]
    fn test_standard_graph_edges() {
        let graph = DependencyGraph::standard();
        assert!(graph.dependencies_of(AiBreakdown).unwrap().is_empty());
        assert!(graph.triggers_of(PropertyValue).unwrap().is_empty());

        let energy_triggers: Vec<_> = graph.triggers_of(Energy).unwrap().iter().copied().collect();
        assert_eq!(energy_triggers, vec![Ll97, Financial, Noi]);

        let noi_deps: Vec<_> = graph.dependencies_of(Noi).unwrap().iter().copied().collect();
        assert_eq!(noi_deps, vec![Energy, Ll97, Financial]);
    }

    #[test]
    fn test_triggers_are_inverse_of_dependencies() {
        let graph = DependencyGraph::standard();
        for name in graph.services() {
            for dep in graph.dependencies_of(name).unwrap() {
                assert!(graph.triggers_of(*dep).unwrap().contains(&name));
            }
            for trigger in graph.triggers_of(name).unwrap() {
                assert!(graph.dependencies_of(*trigger).unwrap().contains(&name));
            }
        }
    }

    #[test]
    fn test_closure_respects_dependency_order() {
        let graph = DependencyGraph::standard();
        for name in ServiceName::ALL {
            let closure = graph.transitive_closure(name).unwrap();
            assert_eq!(closure[0], name);

            for (position, service) in closure.iter().enumerate() {
                for dep in graph.dependencies_of(*service).unwrap() {
                    if let Some(dep_position) = closure.iter().position(|s| s == dep) {
                        assert!(dep_position < position, "{} must precede {}", dep, service);
                    }
                }
                for trigger in graph.triggers_of(*service).unwrap() {
                    assert!(closure.contains(trigger), "{} missing from closure", trigger);
                }
            }
        }
    }

    #[test]
    fn test_closure_from_energy() {
        let graph = DependencyGraph::standard();
        assert_eq!(
            graph.transitive_closure(Energy).unwrap(),
            vec![Energy, Ll97, Financial, Noi, PropertyValue]
        );
        assert_eq!(
            graph.transitive_closure(Financial).unwrap(),
            vec![Financial, Noi, PropertyValue]
        );
        assert_eq!(graph.transitive_closure(PropertyValue).unwrap(), vec![PropertyValue]);
    }

    #[test]
    fn test_topological_order_all() {
        let graph = DependencyGraph::standard();
        assert_eq!(
            graph.topological_order_all().unwrap(),
            vec![AiBreakdown, Energy, Ll97, Financial, Noi, PropertyValue]
        );
    }

    #[test]
    fn test_cycle_is_detected() {
        let graph = DependencyGraph::from_dependencies(&[
            (AiBreakdown, vec![Noi]),
            (Energy, vec![AiBreakdown]),
            (Noi, vec![Energy]),
        ])
        .unwrap();

        assert!(matches!(
            graph.transitive_closure(Energy),
            Err(EngineError::GraphCycleDetected { .. })
        ));
        assert!(matches!(
            graph.topological_order_all(),
            Err(EngineError::GraphCycleDetected { .. })
        ));
    }

    #[test]
    fn test_unknown_node_is_rejected() {
        let graph = DependencyGraph::from_dependencies(&[(AiBreakdown, vec![])]).unwrap();
        assert!(matches!(
            graph.dependencies_of(Energy),
            Err(EngineError::UnknownService(name)) if name == "energy"
        ));
        assert!(DependencyGraph::from_dependencies(&[(Energy, vec![AiBreakdown])]).is_err());
    }
}
