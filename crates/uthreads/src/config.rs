use derive_builder::Builder;
use scheduler_round_robin::{Error, Result, DEFAULT_STACK_SIZE};

/// Smallest per-thread stack `init` accepts.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Runtime parameters, fixed for the life of the process once `init` accepts
/// them.
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Length of one quantum in microseconds of user CPU time.
    pub quantum_usecs: i32,

    #[builder(default = "DEFAULT_STACK_SIZE")]
    pub stack_size: usize,
}

impl Config {
    pub fn new(quantum_usecs: i32) -> Self {
        Self {
            quantum_usecs,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.quantum_usecs <= 0 {
            return Err(Error::InvalidArgument("the quantum length must be positive"));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(Error::InvalidArgument("the thread stack size is below 16 KiB"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_stack_size() {
        let config = ConfigBuilder::default().quantum_usecs(500).build().unwrap();
        assert_eq!(config.quantum_usecs, 500);
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_requires_quantum() {
        assert!(ConfigBuilder::default().stack_size(MIN_STACK_SIZE).build().is_err());
    }

    #[test]
    fn test_rejects_non_positive_quantum() {
        for quantum in [0, -1, i32::MIN] {
            assert!(matches!(
                Config::new(quantum).validate(),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_rejects_small_stack() {
        let config = Config {
            stack_size: MIN_STACK_SIZE - 1,
            ..Config::new(100)
        };
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));
    }
}
