use std::fmt;

/// Rounding knobs: granularity G and round-up threshold T, in minutes.
///
/// A remainder of zero is left alone, a remainder below T is dropped, and a
/// remainder of T or more is rounded up to the next multiple of G.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundingConfig {
    pub granularity_minutes: i64,
    pub round_up_threshold_minutes: i64,
}

impl Default for RoundingConfig {
    fn default() -> Self {
        Self {
            granularity_minutes: 15,
            round_up_threshold_minutes: 7,
        }
    }
}

/// How a total was adjusted, for the calculation audit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingAdjustment {
    None,
    Up(i64),
    Down(i64),
}

impl fmt::Display for RoundingAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingAdjustment::None => write!(f, "none"),
            RoundingAdjustment::Up(m) => write!(f, "+{}m", m),
            RoundingAdjustment::Down(m) => write!(f, "-{}m", m),
        }
    }
}

/// Round a minute total to the configured granularity
pub fn round_minutes(total: i64, config: &RoundingConfig) -> (i64, RoundingAdjustment) {
    let g = config.granularity_minutes;
    if g <= 0 || total < 0 {
        return (total, RoundingAdjustment::None);
    }

    let remainder = total % g;
    if remainder == 0 {
        (total, RoundingAdjustment::None)
    } else if remainder >= config.round_up_threshold_minutes {
        let bump = g - remainder;
        (total + bump, RoundingAdjustment::Up(bump))
    } else {
        (total - remainder, RoundingAdjustment::Down(remainder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(total: i64) -> i64 {
        round_minutes(total, &RoundingConfig::default()).0
    }

    #[test]
    fn test_multiples_unchanged() {
        for total in [0, 15, 30, 45, 60, 90] {
            let (rounded, adj) = round_minutes(total, &RoundingConfig::default());
            assert_eq!(rounded, total);
            assert_eq!(adj, RoundingAdjustment::None);
        }
    }

    #[test]
    fn test_small_remainders_round_down() {
        for r in 1..=6 {
            assert_eq!(round(30 + r), 30, "remainder {}", r);
        }
        let (_, adj) = round_minutes(33, &RoundingConfig::default());
        assert_eq!(adj, RoundingAdjustment::Down(3));
    }

    #[test]
    fn test_large_remainders_round_up() {
        for r in 7..=14 {
            assert_eq!(round(30 + r), 45, "remainder {}", r);
        }
        let (_, adj) = round_minutes(38, &RoundingConfig::default());
        assert_eq!(adj, RoundingAdjustment::Up(7));
    }

    #[test]
    fn test_examples() {
        assert_eq!(round(25), 30);
        assert_eq!(round(55), 60);
        assert_eq!(round(7), 15);
        assert_eq!(round(6), 0);
    }

    #[test]
    fn test_idempotent_on_rounded_values() {
        for total in 0..240 {
            let once = round(total);
            assert_eq!(round(once), once);
        }
    }

    #[test]
    fn test_custom_granularity() {
        let config = RoundingConfig {
            granularity_minutes: 30,
            round_up_threshold_minutes: 10,
        };
        assert_eq!(round_minutes(65, &config).0, 60);
        assert_eq!(round_minutes(70, &config).0, 90);
        assert_eq!(round_minutes(90, &config).0, 90);
    }
}
