use crate::core::graph::DependencyGraph;
use crate::domain::service_name::ServiceName;
use crate::utils::error::Result;
use serde::Serialize;

/// 執行計畫：建立後不可變更
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    services: Vec<ServiceName>,
    cascade: bool,
}

impl ExecutionPlan {
    pub fn services(&self) -> &[ServiceName] {
        &self.services
    }

    /// 計畫中第一個服務，覆寫值只套用在這裡
    pub fn first(&self) -> Option<ServiceName> {
        self.services.first().copied()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn is_cascade(&self) -> bool {
        self.cascade
    }

    pub fn contains(&self, service: ServiceName) -> bool {
        self.services.contains(&service)
    }
}

impl std::fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.services.iter().map(|s| s.as_str()).collect();
        write!(f, "{}", names.join(" → "))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionPlanner {
    graph: DependencyGraph,
}

impl ExecutionPlanner {
    pub fn new(graph: DependencyGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn plan_all(&self) -> Result<ExecutionPlan> {
        let services = self.graph.topological_order_all()?;
        tracing::debug!("🗺️ Planned full run: {} services", services.len());
        Ok(ExecutionPlan {
            services,
            cascade: true,
        })
    }

    pub fn plan_from(&self, service: ServiceName, cascade: bool) -> Result<ExecutionPlan> {
        let services = if cascade {
            self.graph.transitive_closure(service)?
        } else {
            self.graph.node(service)?;
            vec![service]
        };
        tracing::debug!(
            "🗺️ Planned run from '{}' (cascade: {}): {} services",
            service,
            cascade,
            services.len()
        );
        Ok(ExecutionPlan { services, cascade })
    }

    /// 以字串名稱規劃，未知名稱回傳 `UnknownService`
    pub fn plan_from_name(&self, service: &str, cascade: bool) -> Result<ExecutionPlan> {
        self.plan_from(service.parse()?, cascade)
    }
}
