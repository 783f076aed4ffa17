//! Overrides applied after loading.
//!
//! ```text
//! ConfigLoader.load()  →  MxosConfig (files + env)
//!                              │
//!                              ▼
//!                     ConfigResolver.apply()   (CLI flags)
//!                              │
//!                              ▼
//!                     MxosConfig (final)
//! ```

use super::MxosConfig;

/// Applies overrides to a loaded configuration.
///
/// Implementations apply only the values they actually carry and leave
/// everything else untouched.
pub trait ConfigResolver {
    fn apply(&self, config: &mut MxosConfig);
}

/// Makes no changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpResolver;

impl ConfigResolver for NoOpResolver {
    fn apply(&self, _config: &mut MxosConfig) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_resolver_does_nothing() {
        let mut config = MxosConfig::default();
        let original = config.clone();
        NoOpResolver.apply(&mut config);
        assert_eq!(config, original);
    }

    #[test]
    fn custom_resolver() {
        struct Fps(Option<u32>);

        impl ConfigResolver for Fps {
            fn apply(&self, config: &mut MxosConfig) {
                if let Some(fps) = self.0 {
                    config.kernel.fps = fps;
                }
            }
        }

        let mut config = MxosConfig::default();
        Fps(None).apply(&mut config);
        assert_eq!(config.kernel.fps, 60);
        Fps(Some(30)).apply(&mut config);
        assert_eq!(config.kernel.fps, 30);
    }
}
