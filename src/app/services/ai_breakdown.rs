use super::{mismatched_input, mismatched_report};
use crate::core::overrides::merge_overrides;
use crate::domain::model::{CalculationRecord, OverrideSet};
use crate::domain::ports::CalculationService;
use crate::domain::service_io::{ServiceInput, ServiceOutput, ServiceResult, UnitMixInput, UnitMixOutput};
use crate::domain::service_name::ServiceName;
use crate::domain::validation::{OverrideField, OverrideRule, ValidationReport};
use crate::utils::error::{EngineError, Result};
use async_trait::async_trait;

const DEFAULT_BUILDING_CLASS: &str = "D";
/// studio / 1BR / 2BR / 3BR 的預設比例（百分比）
const MIX_SHARES: [u32; 4] = [20, 40, 30, 10];
const PTACS_PER_UNIT: [u32; 4] = [1, 2, 3, 4];
/// 無法整除時的餘數分配給 1BR
const REMAINDER_SLOT: usize = 1;

const OVERRIDES: &[OverrideField] = &[
    OverrideField::new("totalUnits", OverrideRule::Count),
    OverrideField::new("buildingClass", OverrideRule::Text),
    OverrideField::new("studios", OverrideRule::Count),
    OverrideField::new("oneBed", OverrideRule::Count),
    OverrideField::new("twoBed", OverrideRule::Count),
    OverrideField::new("threeBed", OverrideRule::Count),
];

/// 單位組成估算
pub struct AiBreakdownService;

impl AiBreakdownService {
    fn explicit_counts(input: &UnitMixInput) -> [Option<u32>; 4] {
        [input.studios, input.one_bed, input.two_bed, input.three_bed]
    }

    fn explicit_total(explicit: &[Option<u32>; 4]) -> u64 {
        explicit.iter().flatten().map(|count| *count as u64).sum()
    }

    /// 加總後超出 u32 範圍回傳 None
    fn checked_total(values: impl IntoIterator<Item = u64>) -> Option<u32> {
        let total = values
            .into_iter()
            .try_fold(0u64, |acc, value| acc.checked_add(value))?;
        u32::try_from(total).ok()
    }

    /// 明確指定的數量保留，其餘依預設比例分配剩下的單位數
    pub fn allocate(input: &UnitMixInput) -> [u32; 4] {
        let explicit = Self::explicit_counts(input);
        let assigned = Self::explicit_total(&explicit);
        // remaining 不超過 totalUnits，必定落在 u32 內
        let remaining = (input.total_units as u64).saturating_sub(assigned) as u32;

        let open_share: u32 = explicit
            .iter()
            .zip(MIX_SHARES)
            .filter(|(count, _)| count.is_none())
            .map(|(_, share)| share)
            .sum();

        let mut counts = [0u32; 4];
        let mut allocated = 0;
        for (slot, (count, share)) in explicit.iter().zip(MIX_SHARES).enumerate() {
            counts[slot] = match count {
                Some(count) => *count,
                None if open_share > 0 => {
                    let portion = (remaining as u64 * share as u64 / open_share as u64) as u32;
                    allocated += portion;
                    portion
                }
                None => 0,
            };
        }

        let leftover = remaining.saturating_sub(allocated);
        if leftover > 0 && open_share > 0 {
            let slot = if explicit[REMAINDER_SLOT].is_none() {
                REMAINDER_SLOT
            } else {
                explicit.iter().position(Option::is_none).unwrap_or(REMAINDER_SLOT)
            };
            counts[slot] += leftover;
        }

        counts
    }
}

#[async_trait]
impl CalculationService for AiBreakdownService {
    fn name(&self) -> ServiceName {
        ServiceName::AiBreakdown
    }

    fn override_fields(&self) -> &'static [OverrideField] {
        OVERRIDES
    }

    fn build_input_from_record(
        &self,
        record: &CalculationRecord,
        overrides: Option<&OverrideSet>,
    ) -> Result<ServiceInput> {
        let input = UnitMixInput {
            total_units: record.building.total_units,
            building_class: record
                .building
                .building_class
                .clone()
                .unwrap_or_else(|| DEFAULT_BUILDING_CLASS.to_string()),
            studios: None,
            one_bed: None,
            two_bed: None,
            three_bed: None,
        };
        Ok(ServiceInput::AiBreakdown(merge_overrides(
            self.name(),
            input,
            overrides,
        )?))
    }

    fn validate_input(&self, input: &ServiceInput) -> ValidationReport {
        let ServiceInput::AiBreakdown(input) = input else {
            return mismatched_report(self.name(), input);
        };
        let mut report = ValidationReport::new();

        if input.total_units == 0 {
            report.error("totalUnits", "building must have at least one unit");
        }

        let explicit = Self::explicit_counts(input);
        let assigned = Self::explicit_total(&explicit);
        if assigned > u32::MAX as u64 {
            report.error(
                "totalUnits",
                format!("explicit unit counts sum to {}, beyond the supported range", assigned),
            );
            return report;
        }
        let ptacs = Self::allocate(input)
            .into_iter()
            .zip(PTACS_PER_UNIT)
            .map(|(count, per_unit)| count as u64 * per_unit as u64);
        if Self::checked_total(ptacs).is_none() {
            report.error("totalUnits", "unit counts are too large to count PTAC units");
            return report;
        }

        let total_units = input.total_units as u64;
        let all_explicit = explicit.iter().all(Option::is_some);
        if assigned > total_units || (all_explicit && assigned != total_units) {
            report.warning(
                "totalUnits",
                format!(
                    "explicit unit counts sum to {} but totalUnits is {}",
                    assigned, input.total_units
                ),
            );
        }

        report
    }

    async fn execute(&self, input: ServiceInput) -> Result<ServiceOutput> {
        let input = match input {
            ServiceInput::AiBreakdown(input) => input,
            other => return Err(mismatched_input(self.name(), &other)),
        };

        let counts = Self::allocate(&input);
        let overflow = || EngineError::ComputationError {
            service: self.name(),
            message: "unit counts exceed the supported range".to_string(),
        };
        let total_units =
            Self::checked_total(counts.iter().map(|count| *count as u64)).ok_or_else(overflow)?;
        let ptac_units = Self::checked_total(
            counts
                .iter()
                .zip(PTACS_PER_UNIT)
                .map(|(count, per_unit)| *count as u64 * per_unit as u64),
        )
        .ok_or_else(overflow)?;

        Ok(ServiceOutput::new(ServiceResult::AiBreakdown(UnitMixOutput {
            total_units,
            studios: counts[0],
            one_bed: counts[1],
            two_bed: counts[2],
            three_bed: counts[3],
            ptac_units,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::fixtures;

    fn input(total_units: u32) -> UnitMixInput {
        UnitMixInput {
            total_units,
            building_class: "D".to_string(),
            studios: None,
            one_bed: None,
            two_bed: None,
            three_bed: None,
        }
    }

    #[test]
    fn test_default_allocation() {
        assert_eq!(AiBreakdownService::allocate(&input(40)), [8, 16, 12, 4]);
        // 餘數進 1BR
        assert_eq!(AiBreakdownService::allocate(&input(7)), [1, 4, 2, 0]);
    }

    #[test]
    fn test_partial_explicit_allocation() {
        let mut mix = input(40);
        mix.studios = Some(10);
        let counts = AiBreakdownService::allocate(&mix);
        assert_eq!(counts[0], 10);
        assert_eq!(counts.iter().sum::<u32>(), 40);
    }

    #[tokio::test]
    async fn test_execute_counts_ptacs() {
        let service = AiBreakdownService;
        let output = service
            .execute(ServiceInput::AiBreakdown(input(40)))
            .await
            .unwrap();
        match output.result {
            ServiceResult::AiBreakdown(mix) => {
                assert_eq!(mix.total_units, 40);
                assert_eq!(mix.ptac_units, 8 + 16 * 2 + 12 * 3 + 4 * 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_overrides_merge_into_input() {
        let record = fixtures::populated_record();
        let overrides = OverrideSet::new().with("totalUnits", 50).with("studios", 5);
        let built = AiBreakdownService
            .build_input_from_record(&record, Some(&overrides))
            .unwrap();
        let ServiceInput::AiBreakdown(mix) = built else {
            panic!("wrong input variant");
        };
        assert_eq!(mix.total_units, 50);
        assert_eq!(mix.studios, Some(5));
        assert_eq!(mix.building_class, "D");
    }

    #[test]
    fn test_oversized_explicit_counts_fail_validation() {
        let mut mix = input(10);
        mix.studios = Some(u32::MAX);
        mix.one_bed = Some(1);
        assert_eq!(AiBreakdownService::allocate(&mix), [u32::MAX, 1, 0, 0]);

        let report = AiBreakdownService.validate_input(&ServiceInput::AiBreakdown(mix));
        assert!(!report.valid);
        assert_eq!(report.errors[0].field, "totalUnits");

        let report = AiBreakdownService.validate_input(&ServiceInput::AiBreakdown(input(u32::MAX)));
        assert!(!report.valid);
    }

    #[tokio::test]
    async fn test_oversized_unit_count_is_computation_error() {
        let result = AiBreakdownService
            .execute(ServiceInput::AiBreakdown(input(u32::MAX)))
            .await;
        assert!(matches!(
            result,
            Err(EngineError::ComputationError {
                service: ServiceName::AiBreakdown,
                ..
            })
        ));

        let mut mix = input(10);
        mix.studios = Some(u32::MAX);
        mix.one_bed = Some(1);
        let result = AiBreakdownService.execute(ServiceInput::AiBreakdown(mix)).await;
        assert!(matches!(result, Err(EngineError::ComputationError { .. })));
    }

    #[test]
    fn test_validation() {
        let service = AiBreakdownService;
        let report = service.validate_input(&ServiceInput::AiBreakdown(input(0)));
        assert!(!report.valid);

        let mut mix = input(10);
        mix.studios = Some(4);
        mix.one_bed = Some(4);
        mix.two_bed = Some(4);
        mix.three_bed = Some(0);
        let report = service.validate_input(&ServiceInput::AiBreakdown(mix));
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }
}
