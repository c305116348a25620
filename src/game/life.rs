use crate::config::ConfigError;
use crate::game::judgment::Quality;

pub const MAX_HEALTH: i32 = 100;
pub const MIN_HEALTH: i32 = 0;

// Default tuning. Cosmetic values; only their ordering matters.
pub const POINTS_PERFECT: u32 = 300;
pub const POINTS_GREAT: u32 = 200;
pub const POINTS_GOOD: u32 = 100;

pub const COMBO_BONUS_STEP: u32 = 10;
pub const COMBO_BONUS_POINTS: u32 = 10;
pub const COMBO_BONUS_CAP: u32 = 10;

pub const HEALTH_HIT_RECOVERY: i32 = 1;
pub const HEALTH_MISS_PENALTY: i32 = 10;
pub const HEALTH_WHIFF_PENALTY: i32 = 4;

/// Score and health knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub perfect_points: u32,
    pub great_points: u32,
    pub good_points: u32,
    /// Every `combo_bonus_step` consecutive hits add `combo_bonus_points`
    /// per hit, up to `combo_bonus_cap` steps. A step of 0 disables the bonus.
    pub combo_bonus_step: u32,
    pub combo_bonus_points: u32,
    pub combo_bonus_cap: u32,
    pub hit_recovery: i32,
    pub miss_penalty: i32,
    pub whiff_penalty: i32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            perfect_points: POINTS_PERFECT,
            great_points: POINTS_GREAT,
            good_points: POINTS_GOOD,
            combo_bonus_step: COMBO_BONUS_STEP,
            combo_bonus_points: COMBO_BONUS_POINTS,
            combo_bonus_cap: COMBO_BONUS_CAP,
            hit_recovery: HEALTH_HIT_RECOVERY,
            miss_penalty: HEALTH_MISS_PENALTY,
            whiff_penalty: HEALTH_WHIFF_PENALTY,
        }
    }
}

impl Tuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.perfect_points > self.great_points && self.great_points > self.good_points) {
            return Err(ConfigError::PointsNotDecreasing {
                perfect: self.perfect_points,
                great: self.great_points,
                good: self.good_points,
            });
        }
        if self.hit_recovery < 0 || self.whiff_penalty < 0 {
            return Err(ConfigError::NegativeHealthDelta);
        }
        if self.miss_penalty <= self.whiff_penalty {
            return Err(ConfigError::PenaltyOrder {
                miss: self.miss_penalty,
                whiff: self.whiff_penalty,
            });
        }
        Ok(())
    }

    #[inline(always)]
    pub const fn points_for(&self, quality: Quality) -> u32 {
        match quality {
            Quality::Perfect => self.perfect_points,
            Quality::Great => self.great_points,
            Quality::Good => self.good_points,
            Quality::Miss => 0,
        }
    }

    /// Bonus earned by a hit landing on top of an existing `combo`.
    #[inline(always)]
    pub fn combo_bonus(&self, combo: u32) -> u32 {
        if self.combo_bonus_step == 0 {
            return 0;
        }
        (combo / self.combo_bonus_step)
            .min(self.combo_bonus_cap)
            .saturating_mul(self.combo_bonus_points)
    }
}

#[inline(always)]
pub fn apply_health_delta(health: i32, delta: i32) -> i32 {
    health.saturating_add(delta).clamp(MIN_HEALTH, MAX_HEALTH)
}
