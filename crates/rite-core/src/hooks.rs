//! Post-update hook registry.
//!
//! Hooks are registered under a string discriminator mapping to a factory
//! that produces a runnable-with-validation implementation. The engine only
//! observes success or failure per hook; what a hook actually does belongs
//! to the embedding application.

use rite_common::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// A runnable post-update hook.
pub trait Hook {
    /// Structural validation, performed before running.
    fn validate(&self) -> Result<()>;

    /// Execute the hook against the project root.
    fn run(&self, project_dir: &Path) -> Result<()>;
}

/// Factory producing a fresh hook instance per run.
pub type HookFactory = Box<dyn Fn() -> Box<dyn Hook>>;

/// Outcome of one hook execution.
#[derive(Debug, Clone, Serialize)]
pub struct HookOutcome {
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Capability-keyed registry of hook factories.
#[derive(Default)]
pub struct HookRegistry {
    factories: HashMap<String, HookFactory>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a discriminator, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, factory: HookFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Run the named hooks in order, collecting one outcome per hook.
    ///
    /// An unknown name or a failing hook produces a failed outcome; the
    /// remaining hooks still run. The caller decides whether failures are
    /// fatal (the planner marks the hooks step optional).
    pub fn run_hooks(&self, names: &[String], project_dir: &Path) -> Vec<HookOutcome> {
        let mut outcomes = Vec::with_capacity(names.len());

        for name in names {
            let outcome = match self.factories.get(name) {
                None => {
                    warn!(target: "hooks.unknown", hook = %name, "Hook not registered");
                    HookOutcome {
                        name: name.clone(),
                        success: false,
                        error: Some(Error::UnknownHook { name: name.clone() }.to_string()),
                    }
                }
                Some(factory) => {
                    let hook = factory();
                    match hook.validate().and_then(|()| hook.run(project_dir)) {
                        Ok(()) => {
                            info!(target: "hooks.run_complete", hook = %name, "Hook succeeded");
                            HookOutcome {
                                name: name.clone(),
                                success: true,
                                error: None,
                            }
                        }
                        Err(err) => {
                            warn!(
                                target: "hooks.run_fail",
                                hook = %name,
                                reason = %err,
                                "Hook failed"
                            );
                            HookOutcome {
                                name: name.clone(),
                                success: false,
                                error: Some(err.to_string()),
                            }
                        }
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHook {
        counter: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Hook for CountingHook {
        fn validate(&self) -> Result<()> {
            Ok(())
        }

        fn run(&self, _project_dir: &Path) -> Result<()> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::HookFailed {
                    name: "counting".into(),
                    reason: "intentional".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_run_known_hook() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();
        let c = counter.clone();
        registry.register(
            "counting",
            Box::new(move || -> Box<dyn Hook> {
                Box::new(CountingHook {
                    counter: c.clone(),
                    fail: false,
                })
            }),
        );

        let outcomes = registry.run_hooks(&["counting".to_string()], Path::new("."));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(outcomes[0].success);
    }

    #[test]
    fn test_unknown_hook_is_failed_outcome() {
        let registry = HookRegistry::new();
        let outcomes = registry.run_hooks(&["ghost".to_string()], Path::new("."));
        assert!(!outcomes[0].success);
        assert!(outcomes[0].error.as_ref().unwrap().contains("ghost"));
    }

    #[test]
    fn test_failing_hook_does_not_stop_others() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();
        let c1 = counter.clone();
        registry.register(
            "fails",
            Box::new(move || -> Box<dyn Hook> {
                Box::new(CountingHook {
                    counter: c1.clone(),
                    fail: true,
                })
            }),
        );
        let c2 = counter.clone();
        registry.register(
            "succeeds",
            Box::new(move || -> Box<dyn Hook> {
                Box::new(CountingHook {
                    counter: c2.clone(),
                    fail: false,
                })
            }),
        );

        let outcomes =
            registry.run_hooks(&["fails".to_string(), "succeeds".to_string()], Path::new("."));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(!outcomes[0].success);
        assert!(outcomes[1].success);
    }
}
