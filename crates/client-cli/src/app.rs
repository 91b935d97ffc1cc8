//! Wires the remote adapters into the auth router for one CLI invocation.
//!
//! The session saved by the previous command is restored first, the router
//! driver routes it, and commands then act on the settled screen.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use hub_core::{AuthRouter, FreemiumGate, IdentityError, IdentityProvider, RouteUpdate, RouterDriver};
use shared::{FederatedProvider, PendingIdentity, Role, RoutingDecision, Session};

use crate::api::ApiClient;
use crate::auth::DeviceLogin;
use crate::config::Config;
use crate::remote::{RemoteCollections, RemoteIdentity, RemoteProfileStore, RemoteUsageStore};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct App {
    config: Config,
    config_path: PathBuf,
    pub identity: Arc<RemoteIdentity>,
    pub profiles: Arc<RemoteProfileStore>,
    pub usage: Arc<RemoteUsageStore>,
    pub collections: RemoteCollections,
    router: Arc<AuthRouter>,
    driver: RouterDriver,
    screen: RouteUpdate,
}

impl App {
    pub async fn start(config: Config, config_path: PathBuf, server: &str) -> Result<Self> {
        let api = ApiClient::new(server);
        let identity = Arc::new(RemoteIdentity::new(api.clone()).with_device_login(DeviceLogin::default()));
        let profiles = Arc::new(RemoteProfileStore::new(api.clone()));
        let usage = Arc::new(RemoteUsageStore::new(api.clone()));
        let collections = RemoteCollections::new(api);

        if let (Some(token), Some(session)) = (config.remote.token.clone(), config.session.clone()) {
            tracing::debug!("Restoring session for {:?}", session.principal_id());
            identity.restore(token, session);
        }

        let router = Arc::new(AuthRouter::new(identity.clone(), profiles.clone()));
        let mut driver = RouterDriver::spawn(router.clone());
        let screen = settle(&mut driver, 0).await?;

        Ok(Self {
            config,
            config_path,
            identity,
            profiles,
            usage,
            collections,
            router,
            driver,
            screen,
        })
    }

    /// Current settled screen
    pub fn screen(&self) -> &RouteUpdate {
        &self.screen
    }

    pub fn decision(&self) -> &RoutingDecision {
        &self.screen.decision
    }

    pub async fn sign_up(&mut self, email: String, password: String) -> Result<&RouteUpdate> {
        let identity = self.identity.clone();
        self.transition(async move { identity.sign_up_with_password(&email, &password).await })
            .await
    }

    pub async fn sign_in(&mut self, email: String, password: String) -> Result<&RouteUpdate> {
        let identity = self.identity.clone();
        self.transition(async move { identity.sign_in_with_password(&email, &password).await })
            .await
    }

    pub async fn sign_in_federated(&mut self, provider: FederatedProvider) -> Result<&RouteUpdate> {
        let identity = self.identity.clone();
        self.transition(async move { identity.sign_in_federated(provider).await })
            .await
    }

    /// Run an identity operation that publishes a new session and wait for
    /// the router to settle on it.
    async fn transition<F>(&mut self, op: F) -> Result<&RouteUpdate>
    where
        F: std::future::Future<Output = Result<Session, IdentityError>>,
    {
        let start = self.screen.generation;
        op.await?;
        self.screen = settle(&mut self.driver, start).await?;
        self.persist()?;
        Ok(&self.screen)
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        let start = self.screen.generation;
        self.identity.sign_out().await?;
        self.screen = settle(&mut self.driver, start).await?;
        self.config.clear_login();
        self.config.save_to(&self.config_path)?;
        Ok(())
    }

    /// Commit the role picked on the role-selection screen
    pub async fn choose_role(&mut self, role: Role) -> Result<RoutingDecision> {
        let pending = self.pending_identity()?.clone();
        let decision = self.router.commit_role(&pending, role).await?;
        self.persist()?;
        Ok(decision)
    }

    fn pending_identity(&self) -> Result<&PendingIdentity> {
        self.screen.decision.pending_identity().ok_or_else(|| {
            anyhow!(
                "Role selection is not open (current screen: {})",
                self.screen.decision
            )
        })
    }

    /// Principal id, provided the router put the user on `role`'s dashboard
    pub fn require_dashboard(&self, role: Role) -> Result<String> {
        if self.screen.decision != RoutingDecision::dashboard(role) {
            bail!(
                "This command needs the {} dashboard (current screen: {})",
                role,
                self.screen.decision
            );
        }
        self.identity
            .current_session()
            .principal_id()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Not signed in"))
    }

    /// Principal id and role for whichever dashboard is showing
    pub fn require_any_dashboard(&self) -> Result<(String, Role)> {
        let role = match self.screen.decision {
            RoutingDecision::ShowFreelancerDashboard => Role::Freelancer,
            RoutingDecision::ShowClientDashboard => Role::Client,
            ref other => bail!("No dashboard is open (current screen: {})", other),
        };
        Ok((self.require_dashboard(role)?, role))
    }

    pub async fn gate(&self, principal_id: &str) -> Result<FreemiumGate> {
        Ok(FreemiumGate::load(principal_id, self.profiles.clone(), self.usage.clone()).await?)
    }

    /// Save the token and session so the next command starts from them
    pub fn persist(&mut self) -> Result<()> {
        let session = self.identity.current_session();
        if session.is_authenticated() {
            self.config.remote.token = self.identity.token();
            self.config.session = Some(session);
        } else {
            self.config.clear_login();
        }
        self.config.save_to(&self.config_path)
    }

    pub async fn shutdown(self) {
        self.driver.shutdown().await;
    }
}

async fn settle(driver: &mut RouterDriver, after: u64) -> Result<RouteUpdate> {
    let update = tokio::time::timeout(SETTLE_TIMEOUT, driver.settled_after(after))
        .await
        .map_err(|_| anyhow!("Timed out waiting for the account to load"))?
        .ok_or_else(|| anyhow!("Router stopped unexpectedly"))?;

    if let Some(err) = &update.error {
        tracing::warn!("{}", err);
    }
    Ok(update)
}
