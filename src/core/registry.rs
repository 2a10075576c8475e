use crate::domain::ports::CalculationService;
use crate::domain::service_name::ServiceName;
use crate::utils::error::{EngineError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 服務名稱到計算服務實作的對照表
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<ServiceName, Arc<dyn CalculationService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以服務自身回報的名稱註冊，同名者會被取代
    pub fn register(&mut self, service: Arc<dyn CalculationService>) {
        self.services.insert(service.name(), service);
    }

    pub fn with_service(mut self, service: Arc<dyn CalculationService>) -> Self {
        self.register(service);
        self
    }

    pub fn get(&self, name: ServiceName) -> Result<&Arc<dyn CalculationService>> {
        self.services
            .get(&name)
            .ok_or_else(|| EngineError::UnknownService(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = ServiceName> + '_ {
        self.services.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.services.keys()).finish()
    }
}
