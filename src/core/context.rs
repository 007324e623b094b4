use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::AppConfig;
use crate::core::dataset::DatasetLayout;

/// Everything a balancing run needs, built once from the validated config
/// and passed by reference through every phase.
pub struct BalanceContext {
    pub layout: DatasetLayout,
    pub ratio_target: f64,
    /// Source of randomness for picking which files move
    pub rng: StdRng,
    /// Extra attempts for a failed move, made before the batch returns
    pub retry_attempts: u32,
}

impl BalanceContext {
    pub fn new(layout: DatasetLayout, ratio_target: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            layout,
            ratio_target,
            rng,
            retry_attempts: 1,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut ctx = Self::new(
            DatasetLayout::from_config(config),
            config.ratio_target,
            config.seed,
        );
        ctx.retry_attempts = config.retry_attempts;
        ctx
    }
}
