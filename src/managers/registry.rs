//! Detection of the backends usable on a host.

use super::{Adapter, AdapterEnv, ManagerKind};
use crate::context::Context;
use crate::util::command::SharedRunner;

/// The operable subset of all backends.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    adapters: Vec<Adapter>,
    excluded: Vec<(ManagerKind, String)>,
}

impl Registry {
    /// What: Probe every backend and keep the operable ones.
    ///
    /// Inputs:
    /// - `ctx`: Context providing root, home, timeout and codename.
    /// - `runner`: Process runner shared by all adapters.
    ///
    /// Output:
    /// - Registry; failed probes are recorded in [`Self::excluded`], never returned as errors.
    #[must_use]
    pub fn detect(ctx: &Context, runner: SharedRunner) -> Self {
        let env = adapter_env(ctx, runner);
        let mut registry = Self::default();
        for kind in ManagerKind::ALL {
            let adapter = Adapter::new(kind, env.clone());
            match adapter.probe() {
                Ok(()) => {
                    tracing::debug!(manager = %kind, "backend operable");
                    registry.adapters.push(adapter);
                }
                Err(e) => {
                    tracing::debug!(manager = %kind, reason = %e, "backend excluded");
                    registry.excluded.push((kind, e.to_string()));
                }
            }
        }
        tracing::info!(
            managers = ?registry.kinds(),
            "package managers detected"
        );
        registry
    }

    /// Registry over already-built adapters, without probing.
    #[must_use]
    pub const fn from_adapters(adapters: Vec<Adapter>) -> Self {
        Self {
            adapters,
            excluded: Vec::new(),
        }
    }

    /// Operable adapters in probing order.
    #[must_use]
    pub fn adapters(&self) -> &[Adapter] {
        &self.adapters
    }

    /// Kinds of the operable adapters.
    #[must_use]
    pub fn kinds(&self) -> Vec<ManagerKind> {
        self.adapters.iter().map(Adapter::kind).collect()
    }

    /// Backends that failed their probe, with the reason.
    #[must_use]
    pub fn excluded(&self) -> &[(ManagerKind, String)] {
        &self.excluded
    }

    /// The adapter for `kind`, if operable.
    #[must_use]
    pub fn get(&self, kind: ManagerKind) -> Option<&Adapter> {
        self.adapters.iter().find(|a| a.kind() == kind)
    }

    /// The distribution's system package manager, if one is operable.
    #[must_use]
    pub fn native(&self) -> Option<&Adapter> {
        self.adapters.iter().find(|a| a.kind().is_native())
    }

    /// No backend is operable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// What: Build an adapter environment from a context without probing.
///
/// Inputs:
/// - `ctx`: Context.
/// - `runner`: Process runner.
///
/// Output:
/// - Environment used by [`Adapter::new`].
#[must_use]
pub fn adapter_env(ctx: &Context, runner: SharedRunner) -> AdapterEnv {
    AdapterEnv {
        runner,
        root: ctx.root.clone(),
        home: ctx.host.home.clone(),
        timeout: ctx.settings.scan.command_timeout(),
        codename: ctx.host.distro.codename.clone(),
    }
}
