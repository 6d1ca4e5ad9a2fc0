//! Danger-object family: maps object classes to hazard categories.
//!
//! Class ids follow the 80-class COCO numbering used by common object models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::backend::RawDetection;
use super::finding::{Finding, HazardFinding};
use crate::Level;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardCategory {
    SharpObjects,
    FragileObjects,
    ChokingObjects,
    HotObjects,
    HeavyObjects,
    SmallElectronics,
}

impl HazardCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            HazardCategory::SharpObjects => "sharp_objects",
            HazardCategory::FragileObjects => "fragile_objects",
            HazardCategory::ChokingObjects => "choking_objects",
            HazardCategory::HotObjects => "hot_objects",
            HazardCategory::HeavyObjects => "heavy_objects",
            HazardCategory::SmallElectronics => "small_electronics",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sharp_objects" => Some(HazardCategory::SharpObjects),
            "fragile_objects" => Some(HazardCategory::FragileObjects),
            "choking_objects" => Some(HazardCategory::ChokingObjects),
            "hot_objects" => Some(HazardCategory::HotObjects),
            "heavy_objects" => Some(HazardCategory::HeavyObjects),
            "small_electronics" => Some(HazardCategory::SmallElectronics),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HazardRule {
    pub category: HazardCategory,
    pub level: Level,
    pub class_ids: BTreeSet<i32>,
}

impl HazardRule {
    fn new(category: HazardCategory, level: Level, ids: &[i32]) -> Self {
        Self {
            category,
            level,
            class_ids: ids.iter().copied().collect(),
        }
    }
}

/// Ordered rule list; the first rule containing a class wins.
#[derive(Clone, Debug, PartialEq)]
pub struct HazardTable {
    rules: Vec<HazardRule>,
}

impl Default for HazardTable {
    fn default() -> Self {
        use HazardCategory::*;
        Self {
            rules: vec![
                HazardRule::new(SharpObjects, Level::Danger, &[42, 43, 44, 76]),
                HazardRule::new(FragileObjects, Level::Warning, &[39, 40, 41, 45, 74, 75]),
                HazardRule::new(
                    ChokingObjects,
                    Level::Danger,
                    &[46, 47, 48, 49, 52, 53, 54, 55, 64, 65, 77, 79],
                ),
                HazardRule::new(HotObjects, Level::Danger, &[68, 69, 70, 78]),
                HazardRule::new(HeavyObjects, Level::Warning, &[56, 57, 58, 59, 60, 72]),
                HazardRule::new(
                    SmallElectronics,
                    Level::Safe,
                    &[24, 25, 26, 27, 28, 63, 66, 67, 73],
                ),
            ],
        }
    }
}

impl HazardTable {
    /// Rule for a detection: by class id, else by a model-supplied category.
    pub fn classify(&self, det: &RawDetection) -> Option<&HazardRule> {
        self.rules
            .iter()
            .find(|rule| rule.class_ids.contains(&det.class_id))
            .or_else(|| {
                let category = det.category.as_deref().and_then(HazardCategory::parse)?;
                self.rules.iter().find(|rule| rule.category == category)
            })
    }

    /// Findings for one frame. `track_ids[i]` is the track bound to
    /// detection `i` (0 when untracked). Unmapped classes produce nothing.
    pub fn assess(&self, detections: &[RawDetection], track_ids: &[u64]) -> Vec<Finding> {
        detections
            .iter()
            .enumerate()
            .filter_map(|(i, det)| {
                let rule = self.classify(det)?;
                let track_id = track_ids.get(i).copied().filter(|&id| id != 0);
                Some(Finding::DangerObject(HazardFinding {
                    category: rule.category,
                    level: rule.level,
                    bbox: det.bbox,
                    confidence: det.confidence,
                    class_id: det.class_id,
                    track_id,
                }))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::BoundingBox;

    fn det(class_id: i32) -> RawDetection {
        RawDetection::new(BoundingBox::new(0, 0, 10, 10), 0.8, class_id)
    }

    #[test]
    fn knife_is_sharp_and_dangerous() {
        let table = HazardTable::default();
        let rule = table.classify(&det(43)).unwrap();
        assert_eq!(rule.category, HazardCategory::SharpObjects);
        assert_eq!(rule.level, Level::Danger);
    }

    #[test]
    fn small_electronics_are_reported_as_safe() {
        let findings = HazardTable::default().assess(&[det(67)], &[5]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].level(), Level::Safe);
        assert_eq!(findings[0].reason(), Some("small_electronics"));
    }

    #[test]
    fn unmapped_classes_are_ignored() {
        // 0 = person
        let findings = HazardTable::default().assess(&[det(0), det(56)], &[1, 2]);
        assert_eq!(findings.len(), 1);
        match &findings[0] {
            Finding::DangerObject(f) => {
                assert_eq!(f.category, HazardCategory::HeavyObjects);
                assert_eq!(f.track_id, Some(2));
            }
            other => panic!("unexpected finding {:?}", other),
        }
    }

    #[test]
    fn category_label_is_a_fallback() {
        let labelled = det(999).with_category("hot_objects");
        let table = HazardTable::default();
        let rule = table.classify(&labelled).unwrap();
        assert_eq!(rule.category, HazardCategory::HotObjects);
    }
}
