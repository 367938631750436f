//! Measurement evaluation
//!
//! Maps one reading to a status, a 0-100 wellness score and the list of
//! reasons behind every deduction. The heuristic is a fixed, ordered rule
//! table: every rule that fires subtracts its penalty from a running score
//! that starts at 100. Rules sharing a group are mutually exclusive and the
//! first match in a group wins.
//!
//! This is not a medical diagnosis.

use crate::types::{HeartEvaluation, HeartStatus, MeasurementInput};

/// Starting score before any penalty
pub const MAX_SCORE: i32 = 100;

/// Motion level below which the subject is considered resting
pub const RESTING_MOTION_THRESHOLD: f64 = 0.3;

pub const RESTING_HR_LOW_BPM: f64 = 50.0;
pub const RESTING_HR_BELOW_TYPICAL_BPM: f64 = 60.0;
pub const RESTING_HR_ELEVATED_BPM: f64 = 100.0;
pub const RESTING_HR_HIGH_BPM: f64 = 110.0;
pub const ACTIVE_HR_VERY_HIGH_BPM: f64 = 160.0;
pub const ACTIVE_HR_SENSOR_NOISE_BPM: f64 = 70.0;

pub const SPO2_VERY_LOW_PCT: f64 = 90.0;
pub const SPO2_BELOW_OPTIMAL_PCT: f64 = 93.0;
pub const SPO2_SLIGHTLY_LOW_PCT: f64 = 95.0;

pub const AMBIENT_HIGH_C: f64 = 28.0;
pub const AMBIENT_LOW_C: f64 = 15.0;

/// Identifier of a scoring rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    RestingLow,
    RestingBelowTypical,
    RestingSlightlyElevated,
    RestingHigh,
    ActiveVeryHigh,
    Spo2VeryLow,
    Spo2BelowOptimal,
    Spo2SlightlyLow,
    AmbientHigh,
    AmbientLow,
    MovementSensorNoise,
}

/// Exclusive rule group. At most one rule per group fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleGroup {
    RestingHeartRate,
    ActiveHeartRate,
    Spo2,
    AmbientTemperature,
    CrossCheck,
}

/// Facts shared by every rule predicate
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    pub input: MeasurementInput,
    pub is_resting: bool,
}

/// One entry of the scoring table
pub struct Rule {
    pub id: RuleId,
    pub group: RuleGroup,
    pub penalty: i32,
    pub reason: &'static str,
    pub predicate: fn(&RuleContext) -> bool,
}

/// Scoring rules in evaluation order. The order fixes the order of reasons.
pub static RULES: &[Rule] = &[
    Rule {
        id: RuleId::RestingLow,
        group: RuleGroup::RestingHeartRate,
        penalty: 20,
        reason: "Heart rate is quite low while resting.",
        predicate: |c| c.is_resting && c.input.heart_rate < RESTING_HR_LOW_BPM,
    },
    Rule {
        id: RuleId::RestingBelowTypical,
        group: RuleGroup::RestingHeartRate,
        penalty: 5,
        reason: "Heart rate is slightly below typical resting range.",
        predicate: |c| c.is_resting && c.input.heart_rate < RESTING_HR_BELOW_TYPICAL_BPM,
    },
    Rule {
        id: RuleId::RestingSlightlyElevated,
        group: RuleGroup::RestingHeartRate,
        penalty: 10,
        reason: "Heart rate is slightly elevated while resting.",
        predicate: |c| {
            c.is_resting
                && c.input.heart_rate > RESTING_HR_ELEVATED_BPM
                && c.input.heart_rate <= RESTING_HR_HIGH_BPM
        },
    },
    Rule {
        id: RuleId::RestingHigh,
        group: RuleGroup::RestingHeartRate,
        penalty: 25,
        reason: "Heart rate is high while resting.",
        predicate: |c| c.is_resting && c.input.heart_rate > RESTING_HR_HIGH_BPM,
    },
    Rule {
        id: RuleId::ActiveVeryHigh,
        group: RuleGroup::ActiveHeartRate,
        penalty: 20,
        reason: "Heart rate is very high with activity.",
        predicate: |c| !c.is_resting && c.input.heart_rate > ACTIVE_HR_VERY_HIGH_BPM,
    },
    Rule {
        id: RuleId::Spo2VeryLow,
        group: RuleGroup::Spo2,
        penalty: 35,
        reason: "SpO₂ is very low.",
        predicate: |c| c.input.spo2 < SPO2_VERY_LOW_PCT,
    },
    Rule {
        id: RuleId::Spo2BelowOptimal,
        group: RuleGroup::Spo2,
        penalty: 20,
        reason: "SpO₂ is below optimal range.",
        predicate: |c| c.input.spo2 < SPO2_BELOW_OPTIMAL_PCT,
    },
    Rule {
        id: RuleId::Spo2SlightlyLow,
        group: RuleGroup::Spo2,
        penalty: 10,
        reason: "SpO₂ is slightly below normal.",
        predicate: |c| c.input.spo2 < SPO2_SLIGHTLY_LOW_PCT,
    },
    Rule {
        id: RuleId::AmbientHigh,
        group: RuleGroup::AmbientTemperature,
        penalty: 5,
        reason: "Ambient temperature is higher, which may increase heart rate.",
        predicate: |c| c.input.temperature > AMBIENT_HIGH_C,
    },
    Rule {
        id: RuleId::AmbientLow,
        group: RuleGroup::AmbientTemperature,
        penalty: 5,
        reason: "Ambient temperature is low, which may affect circulation.",
        predicate: |c| c.input.temperature < AMBIENT_LOW_C,
    },
    Rule {
        id: RuleId::MovementSensorNoise,
        group: RuleGroup::CrossCheck,
        penalty: 5,
        reason: "Low heart rate despite movement – might be sensor noise.",
        predicate: |c| !c.is_resting && c.input.heart_rate < ACTIVE_HR_SENSOR_NOISE_BPM,
    },
];

/// Whether a reading counts as resting
pub fn is_resting(motion_level: f64) -> bool {
    motion_level < RESTING_MOTION_THRESHOLD
}

/// Rules that fire for a reading, in table order
pub fn triggered_rules(input: &MeasurementInput) -> Vec<&'static Rule> {
    let context = RuleContext {
        input: *input,
        is_resting: is_resting(input.motion_level),
    };

    let mut fired: Vec<&'static Rule> = Vec::new();
    for rule in RULES {
        if fired.iter().any(|r| r.group == rule.group) {
            continue;
        }
        if (rule.predicate)(&context) {
            fired.push(rule);
        }
    }
    fired
}

/// Evaluate one reading. Total over every numeric input.
pub fn evaluate(input: &MeasurementInput) -> HeartEvaluation {
    let fired = triggered_rules(input);

    let penalty: i32 = fired.iter().map(|r| r.penalty).sum();
    let score = (MAX_SCORE - penalty).clamp(0, MAX_SCORE) as u8;

    HeartEvaluation {
        status: HeartStatus::from_score(score),
        score,
        reasons: fired.iter().map(|r| r.reason.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input(hr: f64, spo2: f64, temp: f64, motion: f64) -> MeasurementInput {
        MeasurementInput::new(hr, spo2, temp, motion)
    }

    #[test]
    fn test_healthy_resting_reading() {
        let eval = evaluate(&input(72.0, 98.0, 22.0, 0.1));
        assert_eq!(eval.score, 100);
        assert_eq!(eval.status, HeartStatus::Ok);
        assert!(eval.reasons.is_empty());
    }

    #[test]
    fn test_low_resting_heart_rate_stays_ok_at_80() {
        let eval = evaluate(&input(45.0, 98.0, 22.0, 0.1));
        assert_eq!(eval.score, 80);
        assert_eq!(eval.status, HeartStatus::Ok);
        assert_eq!(eval.reasons, vec!["Heart rate is quite low while resting."]);
    }

    #[test]
    fn test_penalties_stack() {
        let eval = evaluate(&input(115.0, 88.0, 30.0, 0.1));
        assert_eq!(eval.score, 35);
        assert_eq!(eval.status, HeartStatus::Warning);
        assert_eq!(
            eval.reasons,
            vec![
                "Heart rate is high while resting.",
                "SpO₂ is very low.",
                "Ambient temperature is higher, which may increase heart rate.",
            ]
        );
    }

    #[test]
    fn test_sensor_noise_with_movement() {
        let eval = evaluate(&input(65.0, 97.0, 20.0, 0.8));
        assert_eq!(eval.score, 95);
        assert_eq!(eval.status, HeartStatus::Ok);
        assert_eq!(
            eval.reasons,
            vec!["Low heart rate despite movement – might be sensor noise."]
        );
    }

    #[test]
    fn test_resting_bands_are_exclusive() {
        assert_eq!(evaluate(&input(55.0, 98.0, 22.0, 0.0)).score, 95);
        assert_eq!(evaluate(&input(60.0, 98.0, 22.0, 0.0)).score, 100);
        assert_eq!(evaluate(&input(100.0, 98.0, 22.0, 0.0)).score, 100);
        assert_eq!(evaluate(&input(105.0, 98.0, 22.0, 0.0)).score, 90);
        assert_eq!(evaluate(&input(110.0, 98.0, 22.0, 0.0)).score, 90);
        assert_eq!(evaluate(&input(111.0, 98.0, 22.0, 0.0)).score, 75);

        let low = evaluate(&input(40.0, 98.0, 22.0, 0.0));
        assert_eq!(low.reasons.len(), 1);
    }

    #[test]
    fn test_resting_threshold_is_strict() {
        // 0.3 is not resting: high heart rate is only penalized above 160
        let eval = evaluate(&input(120.0, 98.0, 22.0, 0.3));
        assert_eq!(eval.score, 100);

        let eval = evaluate(&input(120.0, 98.0, 22.0, 0.29));
        assert_eq!(eval.score, 75);
    }

    #[test]
    fn test_active_very_high() {
        let eval = evaluate(&input(170.0, 98.0, 22.0, 0.9));
        assert_eq!(eval.score, 80);
        assert_eq!(eval.reasons, vec!["Heart rate is very high with activity."]);
    }

    #[test]
    fn test_spo2_bands() {
        assert_eq!(evaluate(&input(72.0, 95.0, 22.0, 0.1)).score, 100);
        assert_eq!(evaluate(&input(72.0, 94.0, 22.0, 0.1)).score, 90);
        assert_eq!(evaluate(&input(72.0, 92.0, 22.0, 0.1)).score, 80);
        assert_eq!(evaluate(&input(72.0, 89.0, 22.0, 0.1)).score, 65);
    }

    #[test]
    fn test_ambient_temperature_bands() {
        assert_eq!(evaluate(&input(72.0, 98.0, 28.0, 0.1)).score, 100);
        assert_eq!(evaluate(&input(72.0, 98.0, 28.5, 0.1)).score, 95);
        assert_eq!(evaluate(&input(72.0, 98.0, 15.0, 0.1)).score, 100);
        assert_eq!(evaluate(&input(72.0, 98.0, 14.0, 0.1)).score, 95);
    }

    #[test]
    fn test_score_clamped_and_bounded() {
        let samples = [
            input(20.0, -5.0, 50.0, 0.0),
            input(300.0, 0.0, -40.0, 0.0),
            input(200.0, 50.0, 40.0, 1.0),
            input(10.0, 10.0, 0.0, 5.0),
            input(f64::NAN, f64::NAN, f64::NAN, f64::NAN),
        ];
        for sample in samples {
            let eval = evaluate(&sample);
            assert!(eval.score <= 100);
            assert_eq!(eval.status, HeartStatus::from_score(eval.score));
        }

        let worst = evaluate(&input(120.0, 50.0, 35.0, 0.0));
        assert_eq!(worst.score, 35);
    }

    #[test]
    fn test_spo2_monotonic() {
        let mut previous = u8::MAX;
        let mut spo2 = 100.0;
        while spo2 >= 80.0 {
            let eval = evaluate(&input(72.0, spo2, 22.0, 0.1));
            assert!(eval.score <= previous);
            previous = eval.score;
            spo2 -= 0.5;
        }
    }

    #[test]
    fn test_idempotent() {
        let reading = input(115.0, 91.0, 12.0, 0.1);
        assert_eq!(evaluate(&reading), evaluate(&reading));
    }

    #[test]
    fn test_triggered_rule_ids() {
        let ids: Vec<RuleId> = triggered_rules(&input(65.0, 91.0, 12.0, 0.5))
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                RuleId::Spo2BelowOptimal,
                RuleId::AmbientLow,
                RuleId::MovementSensorNoise,
            ]
        );
    }
}
