//! The host account: plugin installation and call dispatch.

use chrono::{DateTime, Utc};
use policy::{
    Address, AuthorizationRequest, CallPath, CapabilityProvider, Decision, DenyReason, Manifest,
};
use storage::{Event, EventKind, LedgerStore, Subscription};

use crate::plugin::{BoundProvider, ExecutionContext, Plugin};
use crate::{Clock, Error, ExecutionSink, Outcome, Request, Result, SinkError, Transfer};

struct Installed {
    plugin: Box<dyn Plugin>,
    manifest: Manifest,
    /// Names of the plugins bound to the manifest's dependency ordinals.
    dependencies: Vec<String>,
}

impl Installed {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn bind<'a>(&'a self, ctx: ExecutionContext<'a>) -> BoundProvider<'a> {
        BoundProvider::new(self.name(), &*self.plugin, ctx)
    }
}

/// A programmable account with installed plugins.
///
/// Calls are serialized by the owner of the `Account`; the type is not
/// `Sync`. A call may re-enter the account through its execution sink.
pub struct Account {
    address: Address,
    store: LedgerStore,
    clock: Box<dyn Clock>,
    sink: Box<dyn ExecutionSink>,
    plugins: Vec<Installed>,
}

impl Account {
    pub fn new(
        address: Address,
        store: LedgerStore,
        clock: impl Clock + 'static,
        sink: impl ExecutionSink + 'static,
    ) -> Self {
        Self {
            address,
            store,
            clock: Box::new(clock),
            sink: Box::new(sink),
            plugins: Vec::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Names of installed plugins, in install order.
    pub fn plugins(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(Installed::name)
    }

    pub fn manifest(&self, plugin: &str) -> Option<&Manifest> {
        self.find(plugin).map(|installed| &installed.manifest)
    }

    /// Install `plugin`, binding its declared dependencies to the installed
    /// plugins named in `dependencies`, in order.
    ///
    /// Wiring that does not resolve against those dependencies is rejected
    /// here, before any call can reach it. Re-attaching a plugin whose
    /// version the ledger already records, as a fresh process over the same
    /// database does, is not audited again.
    pub fn install(
        &mut self,
        plugin: impl Plugin + 'static,
        dependencies: &[&str],
        config: &[u8],
    ) -> Result<()> {
        let metadata = plugin.metadata();
        let manifest = plugin.manifest();

        if manifest.name != metadata.name {
            return Err(Error::Configuration(format!(
                "manifest name '{}' does not match plugin name '{}'",
                manifest.name, metadata.name
            )));
        }
        if self.find(&manifest.name).is_some() {
            return Err(Error::Configuration(format!(
                "plugin '{}' is already installed",
                manifest.name
            )));
        }

        let ctx = ExecutionContext::new(self, &self.address, CallPath::UserOperation, self.now());
        let mut providers = Vec::with_capacity(dependencies.len());
        for name in dependencies {
            let installed = self
                .find(name)
                .ok_or_else(|| Error::PluginNotFound((*name).to_string()))?;
            providers.push(installed.bind(ctx));
        }
        let own = BoundProvider::new(&manifest.name, &plugin, ctx);
        manifest.validate(&own, &as_providers(&providers))?;

        for selector in manifest.selectors() {
            if let Some(existing) = self.owner_of(selector) {
                return Err(Error::Configuration(format!(
                    "{} already provides {selector}",
                    existing.name()
                )));
            }
        }

        plugin.on_install(&ctx, config)?;

        let recorded = self.store.installed_version(&self.address, &metadata.name)?;
        if recorded.as_deref() == Some(metadata.version.as_str()) {
            tracing::debug!(
                account = %self.address,
                plugin = %metadata.name,
                "plugin re-attached"
            );
        } else {
            self.store.atomically(|| {
                self.store
                    .set_installed(&self.address, &metadata.name, &metadata.version)?;
                self.record(EventKind::PluginInstalled {
                    name: metadata.name.clone(),
                    version: metadata.version.clone(),
                })
            })?;
            tracing::info!(
                account = %self.address,
                plugin = %metadata.name,
                version = %metadata.version,
                "plugin installed"
            );
        }
        self.plugins.push(Installed {
            plugin: Box::new(plugin),
            manifest,
            dependencies: dependencies.iter().map(|d| (*d).to_string()).collect(),
        });
        Ok(())
    }

    /// Remove a plugin. Refused while another plugin depends on it.
    pub fn uninstall(&mut self, name: &str, config: &[u8]) -> Result<()> {
        let index = self
            .plugins
            .iter()
            .position(|installed| installed.name() == name)
            .ok_or_else(|| Error::PluginNotFound(name.to_string()))?;

        if let Some(dependent) = self
            .plugins
            .iter()
            .find(|installed| installed.dependencies.iter().any(|d| d == name))
        {
            return Err(Error::DependencyInUse {
                plugin: name.to_string(),
                dependent: dependent.name().to_string(),
            });
        }

        let ctx = ExecutionContext::new(self, &self.address, CallPath::UserOperation, self.now());
        self.plugins[index].plugin.on_uninstall(&ctx, config)?;
        self.store.atomically(|| {
            self.store.clear_installed(&self.address, name)?;
            self.record(EventKind::PluginUninstalled {
                name: name.to_string(),
            })
        })?;

        tracing::info!(account = %self.address, plugin = %name, "plugin uninstalled");
        self.plugins.remove(index);
        Ok(())
    }

    /// Authorize and run one call.
    ///
    /// The decision is made fresh from the current install state and ledger
    /// on every call; a denied call never reaches the plugin.
    pub fn dispatch(&self, request: &Request) -> Result<Outcome> {
        let selector = request.call.selector();

        let Some(installed) = self.owner_of(selector) else {
            self.deny(request, DenyReason::NoSuchOperation)?;
            return Err(Error::Denied(DenyReason::NoSuchOperation));
        };

        let ctx = ExecutionContext::new(self, &request.caller, request.path, self.now());
        let dependencies = self.dependency_table(installed, ctx);
        let decision = policy::authorize(
            &installed.manifest,
            &installed.bind(ctx),
            AuthorizationRequest {
                selector,
                caller: &request.caller,
                path: request.path,
            },
            &as_providers(&dependencies),
        )?;

        if let Decision::Deny(reason) = decision {
            self.deny(request, reason)?;
            return Err(Error::Denied(reason));
        }
        self.record(EventKind::Authorized {
            module: installed.name().to_string(),
            selector,
            caller: request.caller.clone(),
            path: request.path,
        })?;

        installed.plugin.execute(&ctx, &request.call)
    }

    /// The subscription record at (payee, payer); absent records read as disabled.
    pub fn subscription(&self, payee: &Address, payer: &Address) -> Result<Subscription> {
        Ok(self
            .store
            .subscription(payee, payer)?
            .unwrap_or_else(|| Subscription::absent(payee.clone(), payer.clone())))
    }

    pub fn count(&self, owner: &Address) -> Result<u64> {
        Ok(self.store.counter(owner)?)
    }

    pub fn owner(&self) -> Result<Option<Address>> {
        Ok(self.store.owner(&self.address)?)
    }

    /// Audit log, optionally filtered by event kind name.
    pub fn events(&self, kind: Option<&str>) -> Result<Vec<Event>> {
        Ok(self.store.load_events(kind)?)
    }

    /// Append to the audit log, stamped with the account clock.
    pub(crate) fn record(&self, kind: EventKind) -> Result<()> {
        let timestamp = DateTime::<Utc>::from_timestamp(self.now(), 0).unwrap_or_default();
        self.store.append(&Event::new(kind, timestamp))?;
        Ok(())
    }

    pub(crate) fn execute_transfer(&self, transfer: &Transfer) -> std::result::Result<(), SinkError> {
        self.sink.execute(self, transfer)
    }

    fn deny(&self, request: &Request, reason: DenyReason) -> Result<()> {
        tracing::warn!(
            account = %self.address,
            caller = %request.caller,
            call = request.call.signature(),
            %reason,
            "call denied"
        );
        self.record(EventKind::Denied {
            selector: request.call.selector(),
            caller: request.caller.clone(),
            path: request.path,
            reason,
        })
    }

    fn find(&self, name: &str) -> Option<&Installed> {
        self.plugins.iter().find(|installed| installed.name() == name)
    }

    fn owner_of(&self, selector: policy::Selector) -> Option<&Installed> {
        self.plugins
            .iter()
            .find(|installed| installed.manifest.wiring_for(selector).is_some())
    }

    /// Providers currently bound to `installed`'s dependency ordinals.
    ///
    /// Stops at the first missing plugin so later ordinals stay unbound
    /// rather than shifting.
    fn dependency_table<'a>(
        &'a self,
        installed: &Installed,
        ctx: ExecutionContext<'a>,
    ) -> Vec<BoundProvider<'a>> {
        installed
            .dependencies
            .iter()
            .map_while(|name| self.find(name).map(|dep| dep.bind(ctx)))
            .collect()
    }
}

fn as_providers<'a>(bound: &'a [BoundProvider<'a>]) -> Vec<&'a dyn CapabilityProvider> {
    bound
        .iter()
        .map(|provider| provider as &dyn CapabilityProvider)
        .collect()
}
