//! PIN session state machine.
//!
//! ```text
//!              set PIN                     wrong PIN x N
//!  Disabled ───────────▶ Unlocked ◀──┐   ┌──────────────▶ LockedOut
//!                          │  ttl     │   │                  │ lockout elapsed
//!                          ▼          │   │                  ▼
//!                   NeedsVerification ┴───┴───────────── NeedsVerification
//!                               correct PIN / emergency code
//! ```
//!
//! The session record lives in the secret vault so a restarted process
//! picks up the same lockout and the same expiry. A background sweep
//! notices expiry while the process is idle and asks the person to
//! re-authenticate.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::error::{Result, SnipError};

use super::interaction::{Interaction, NoticeLevel, SecretKind, SecretPrompt};
use super::pin::{
    check_emergency_code, check_pin, generate_emergency_code, hash_secret,
    normalize_emergency_code, validate_emergency_code_format, validate_pin_format, verify_secret,
    HashCost,
};
use super::vault::{keys, SecretVault};

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const TRY_AGAIN: &str = "Try again";
const USE_EMERGENCY_CODE: &str = "Use emergency code";
const CANCEL: &str = "Cancel";
const REAUTHENTICATE: &str = "Re-authenticate";
const DISMISS: &str = "Dismiss";

/// Gate settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// How long a verified session lasts
    pub session_ttl: Duration,

    /// Wrong PINs allowed before lockout
    pub max_failed_attempts: u32,

    /// How long PIN entry stays locked
    pub lockout: Duration,

    /// How often the background sweep looks for expiry
    pub sweep_interval: Duration,

    pub hash_cost: HashCost,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout: DEFAULT_LOCKOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            hash_cost: HashCost::default(),
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_failed_attempts == 0 {
            return Err(SnipError::Config(
                "max_failed_attempts must be at least 1".to_string(),
            ));
        }
        if self.session_ttl.is_zero() || self.lockout.is_zero() || self.sweep_interval.is_zero() {
            return Err(SnipError::Config(
                "session, lockout and sweep durations must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Persisted session record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessSession {
    pub enabled: bool,
    pub verified: bool,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_attempts: u32,
    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,
}

impl AccessSession {
    /// Derive the gate state at `now`.
    pub fn state(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> GateState {
        if !self.enabled {
            return GateState::Disabled;
        }
        if let Some(until) = self.locked_until.filter(|until| now < *until) {
            return GateState::LockedOut { until };
        }
        match self.verified_at {
            Some(at) if self.verified && now < at + ttl => GateState::Unlocked {
                expires_at: at + ttl,
            },
            _ => GateState::NeedsVerification,
        }
    }

    fn unlock(&mut self, now: DateTime<Utc>) {
        self.enabled = true;
        self.verified = true;
        self.verified_at = Some(now);
        self.failed_attempts = 0;
        self.locked_until = None;
    }

    fn clear_verification(&mut self) {
        self.verified = false;
        self.verified_at = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Disabled,
    Unlocked { expires_at: DateTime<Utc> },
    LockedOut { until: DateTime<Utc> },
    NeedsVerification,
}

impl GateState {
    pub fn label(&self) -> &'static str {
        match self {
            GateState::Disabled => "disabled",
            GateState::Unlocked { .. } => "unlocked",
            GateState::LockedOut { .. } => "locked-out",
            GateState::NeedsVerification => "needs-verification",
        }
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    Denied,
    LockedOut { remaining_minutes: i64 },
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }

    /// Map a refusal onto the matching error.
    pub fn into_result(self) -> Result<()> {
        match self {
            AccessDecision::Granted => Ok(()),
            AccessDecision::Denied => Err(SnipError::AccessDenied(
                "PIN verification required".to_string(),
            )),
            AccessDecision::LockedOut { remaining_minutes } => {
                Err(SnipError::LockedOut { remaining_minutes })
            }
        }
    }
}

/// PIN gate guarding every store operation.
pub struct AccessGate {
    inner: Arc<GateInner>,
    sweep: StdMutex<Option<SweepHandle>>,
}

struct SweepHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct GateInner {
    config: GateConfig,
    vault: Arc<dyn SecretVault>,
    ui: Arc<dyn Interaction>,
    clock: Arc<dyn Clock>,
    session: Mutex<AccessSession>,
}

impl AccessGate {
    pub fn new(
        config: GateConfig,
        vault: Arc<dyn SecretVault>,
        ui: Arc<dyn Interaction>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(GateInner {
                config,
                vault,
                ui,
                clock,
                session: Mutex::new(AccessSession::default()),
            }),
            sweep: StdMutex::new(None),
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.inner.config
    }

    /// Read the persisted session from the vault.
    pub async fn load(&self) -> Result<()> {
        self.inner.load().await
    }

    pub async fn state(&self) -> GateState {
        let session = self.inner.session.lock().await;
        session.state(self.inner.clock.now(), self.inner.ttl())
    }

    /// Copy of the current session record.
    pub async fn session(&self) -> AccessSession {
        self.inner.session.lock().await.clone()
    }

    pub async fn check_access(&self) -> Result<AccessDecision> {
        self.inner.check_access().await
    }

    /// Install `pin`, issue a fresh emergency code and unlock.
    ///
    /// Replaces any existing PIN; callers decide whether the current
    /// session is allowed to do that.
    pub async fn configure_pin(&self, pin: &SecretString) -> Result<()> {
        check_pin(pin.expose_secret())?;
        let mut session = self.inner.session.lock().await;
        self.inner.install_pin(&mut session, pin).await?;
        drop(session);
        self.restart_sweep();
        info!("PIN configured");
        Ok(())
    }

    /// Replace the PIN after checking the current one.
    ///
    /// A wrong current PIN counts toward lockout.
    pub async fn change_pin(&self, current: &SecretString, new_pin: &SecretString) -> Result<()> {
        check_pin(new_pin.expose_secret())?;
        let mut session = self.inner.session.lock().await;
        self.inner.confirm_current(&mut session, current).await?;
        self.inner.install_pin(&mut session, new_pin).await?;
        drop(session);
        self.restart_sweep();
        info!("PIN changed");
        Ok(())
    }

    /// Remove the PIN after checking it. Access is open afterwards.
    pub async fn disable_pin(&self, current: &SecretString) -> Result<()> {
        let mut session = self.inner.session.lock().await;
        self.inner.confirm_current(&mut session, current).await?;

        self.inner.vault.delete(keys::PIN_HASH).await?;
        self.inner.vault.delete(keys::EMERGENCY_CODE_HASH).await?;
        self.inner.vault.set(keys::PIN_ENABLED, "false").await?;
        *session = AccessSession::default();
        self.inner.persist(&session).await?;
        drop(session);

        self.stop_sweep();
        info!("PIN disabled");
        Ok(())
    }

    /// Forget the current verification and restart the sweep.
    pub async fn reset_session(&self) -> Result<()> {
        let mut session = self.inner.session.lock().await;
        session.clear_verification();
        self.inner.persist(&session).await?;
        drop(session);
        self.restart_sweep();
        debug!("session reset");
        Ok(())
    }

    /// Run the emergency-code flow directly. Allowed while locked out.
    pub async fn recover(&self) -> Result<AccessDecision> {
        let mut session = self.inner.session.lock().await;
        if !session.enabled {
            return Err(SnipError::AccessDenied("No PIN is configured".to_string()));
        }
        let decision = self.inner.recover(&mut session).await?;
        drop(session);
        if decision.is_granted() {
            self.restart_sweep();
        }
        Ok(decision)
    }

    /// Start the background expiry sweep if it is not running.
    ///
    /// Does nothing outside a tokio runtime.
    pub fn start_sweep(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; session sweep not started");
            return;
        };
        let Ok(mut slot) = self.sweep.lock() else {
            return;
        };
        if slot.as_ref().is_some_and(|s| !s.task.is_finished()) {
            return;
        }
        let cancel = CancellationToken::new();
        let task = handle.spawn(run_sweep(Arc::clone(&self.inner), cancel.clone()));
        *slot = Some(SweepHandle { cancel, task });
        debug!(interval = ?self.inner.config.sweep_interval, "session sweep started");
    }

    pub fn stop_sweep(&self) {
        if let Ok(mut slot) = self.sweep.lock() {
            if let Some(sweep) = slot.take() {
                sweep.cancel.cancel();
                debug!("session sweep stopped");
            }
        }
    }

    pub fn sweep_running(&self) -> bool {
        self.sweep
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|s| !s.task.is_finished()))
            .unwrap_or(false)
    }

    fn restart_sweep(&self) {
        self.stop_sweep();
        self.start_sweep();
    }
}

impl Drop for AccessGate {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.sweep.lock() {
            if let Some(sweep) = slot.take() {
                sweep.cancel.cancel();
            }
        }
    }
}

impl GateInner {
    fn ttl(&self) -> chrono::Duration {
        to_chrono(self.config.session_ttl)
    }

    async fn load(&self) -> Result<()> {
        let enabled = self.vault.get(keys::PIN_ENABLED).await?.as_deref() == Some("true")
            && self.vault.get(keys::PIN_HASH).await?.is_some();

        let mut restored = match self.vault.get(keys::SESSION).await? {
            Some(raw) => serde_json::from_str::<AccessSession>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "stored session unreadable, verification required");
                AccessSession::default()
            }),
            None => AccessSession::default(),
        };
        restored.enabled = enabled;
        if !enabled {
            restored = AccessSession::default();
        }

        debug!(enabled, "access session loaded");
        *self.session.lock().await = restored;
        Ok(())
    }

    async fn persist(&self, session: &AccessSession) -> Result<()> {
        let raw = serde_json::to_string(session)
            .map_err(|e| SnipError::Vault(format!("Failed to encode session: {}", e)))?;
        self.vault.set(keys::SESSION, &raw).await
    }

    async fn check_access(&self) -> Result<AccessDecision> {
        let mut session = self.session.lock().await;
        let now = self.clock.now();

        if session.locked_until.is_some_and(|until| now >= until) {
            session.locked_until = None;
            self.persist(&session).await?;
            info!("lockout elapsed");
        }

        match session.state(now, self.ttl()) {
            GateState::Disabled | GateState::Unlocked { .. } => Ok(AccessDecision::Granted),
            GateState::LockedOut { until } => {
                let remaining_minutes = remaining_minutes(until, now);
                self.ui
                    .notify(
                        NoticeLevel::Warning,
                        &format!(
                            "Too many failed attempts. Try again in {} minute(s).",
                            remaining_minutes
                        ),
                    )
                    .await?;
                let choice = self
                    .ui
                    .choose("PIN entry is locked.", &[USE_EMERGENCY_CODE, CANCEL])
                    .await?;
                if choice == Some(0) && self.recover(&mut session).await?.is_granted() {
                    return Ok(AccessDecision::Granted);
                }
                Ok(AccessDecision::LockedOut { remaining_minutes })
            }
            GateState::NeedsVerification => {
                if session.verified {
                    session.clear_verification();
                    self.persist(&session).await?;
                    info!("session expired");
                }
                self.verify_interactively(&mut session).await
            }
        }
    }

    async fn verify_interactively(&self, session: &mut AccessSession) -> Result<AccessDecision> {
        loop {
            let prompt =
                SecretPrompt::new(SecretKind::Pin, "Enter PIN").validate_with(validate_pin_format);
            let Some(pin) = self.ui.prompt_secret(&prompt).await? else {
                return Ok(AccessDecision::Denied);
            };

            if self.verify(expose(&pin), keys::PIN_HASH).await? {
                session.unlock(self.clock.now());
                self.persist(session).await?;
                info!("PIN verified");
                return Ok(AccessDecision::Granted);
            }

            if let Some(decision) = self.register_failure(session).await? {
                return Ok(decision);
            }

            let remaining = self
                .config
                .max_failed_attempts
                .saturating_sub(session.failed_attempts);
            let message = format!("Incorrect PIN. {} attempt(s) remaining.", remaining);
            match self
                .ui
                .choose(&message, &[TRY_AGAIN, USE_EMERGENCY_CODE, CANCEL])
                .await?
            {
                Some(0) => continue,
                Some(1) => return self.recover(session).await,
                _ => return Ok(AccessDecision::Denied),
            }
        }
    }

    /// Count one wrong PIN. Returns the lockout decision once the threshold
    /// is reached.
    async fn register_failure(&self, session: &mut AccessSession) -> Result<Option<AccessDecision>> {
        let now = self.clock.now();
        session.failed_attempts += 1;
        warn!(attempts = session.failed_attempts, "incorrect PIN");

        if session.failed_attempts < self.config.max_failed_attempts {
            self.persist(session).await?;
            return Ok(None);
        }

        let until = now + to_chrono(self.config.lockout);
        session.locked_until = Some(until);
        session.failed_attempts = 0;
        session.clear_verification();
        self.persist(session).await?;

        let remaining_minutes = remaining_minutes(until, now);
        warn!(remaining_minutes, "PIN entry locked");
        self.ui
            .notify(
                NoticeLevel::Error,
                &format!(
                    "Too many failed attempts. PIN entry is locked for {} minute(s).",
                    remaining_minutes
                ),
            )
            .await?;
        Ok(Some(AccessDecision::LockedOut { remaining_minutes }))
    }

    /// Verify `current` for a PIN-management call.
    async fn confirm_current(&self, session: &mut AccessSession, current: &SecretString) -> Result<()> {
        if !session.enabled {
            return Err(SnipError::AccessDenied("No PIN is configured".to_string()));
        }
        let now = self.clock.now();
        if let GateState::LockedOut { until } = session.state(now, self.ttl()) {
            return Err(SnipError::LockedOut {
                remaining_minutes: remaining_minutes(until, now),
            });
        }
        if self.verify(expose(current), keys::PIN_HASH).await? {
            return Ok(());
        }
        match self.register_failure(session).await? {
            Some(decision) => decision.into_result(),
            None => Err(SnipError::AccessDenied("Incorrect PIN".to_string())),
        }
    }

    async fn recover(&self, session: &mut AccessSession) -> Result<AccessDecision> {
        let prompt = SecretPrompt::new(SecretKind::EmergencyCode, "Enter emergency code")
            .validate_with(validate_emergency_code_format);
        let Some(code) = self.ui.prompt_secret(&prompt).await? else {
            return Ok(AccessDecision::Denied);
        };
        let normalized = Zeroizing::new(normalize_emergency_code(code.expose_secret()));
        if check_emergency_code(&normalized).is_err()
            || !self.verify(normalized, keys::EMERGENCY_CODE_HASH).await?
        {
            warn!("emergency code rejected");
            self.ui
                .notify(NoticeLevel::Error, "Incorrect emergency code.")
                .await?;
            return Ok(AccessDecision::Denied);
        }

        let Some(new_pin) = self.prompt_new_pin().await? else {
            return Ok(AccessDecision::Denied);
        };
        self.install_pin(session, &new_pin).await?;
        info!("PIN reset with emergency code");
        Ok(AccessDecision::Granted)
    }

    async fn prompt_new_pin(&self) -> Result<Option<SecretString>> {
        let first = SecretPrompt::new(SecretKind::NewPin, "Choose a new PIN (4-8 digits)")
            .validate_with(validate_pin_format);
        let Some(pin) = self.ui.prompt_secret(&first).await? else {
            return Ok(None);
        };
        let confirm = SecretPrompt::new(SecretKind::ConfirmPin, "Confirm new PIN")
            .validate_with(validate_pin_format);
        let Some(again) = self.ui.prompt_secret(&confirm).await? else {
            return Ok(None);
        };
        if pin.expose_secret() != again.expose_secret() {
            self.ui
                .notify(NoticeLevel::Error, "PINs do not match.")
                .await?;
            return Ok(None);
        }
        Ok(Some(pin))
    }

    /// Store hashes for `pin` and a fresh emergency code, then unlock.
    async fn install_pin(&self, session: &mut AccessSession, pin: &SecretString) -> Result<()> {
        let code = generate_emergency_code()?;
        let pin_hash = self.hash(expose(pin)).await?;
        let code_hash = self
            .hash(Zeroizing::new(normalize_emergency_code(code.expose_secret())))
            .await?;

        self.vault.set(keys::PIN_HASH, &pin_hash).await?;
        self.vault.set(keys::EMERGENCY_CODE_HASH, &code_hash).await?;
        self.vault.set(keys::PIN_ENABLED, "true").await?;

        session.unlock(self.clock.now());
        self.persist(session).await?;
        self.ui.show_emergency_code(&code).await
    }

    async fn hash(&self, secret: Zeroizing<String>) -> Result<String> {
        let cost = self.config.hash_cost;
        tokio::task::spawn_blocking(move || hash_secret(&secret, cost))
            .await
            .map_err(|e| SnipError::Vault(format!("Hashing task failed: {}", e)))?
    }

    async fn verify(&self, secret: Zeroizing<String>, key: &str) -> Result<bool> {
        let Some(phc) = self.vault.get(key).await? else {
            return Err(SnipError::Vault(format!("Missing vault entry: {}", key)));
        };
        tokio::task::spawn_blocking(move || verify_secret(&secret, &phc))
            .await
            .map_err(|e| SnipError::Vault(format!("Verification task failed: {}", e)))?
    }

    /// Force re-verification if an unlocked session has run out.
    async fn expire_if_due(&self) -> Result<bool> {
        let mut session = self.session.lock().await;
        let now = self.clock.now();
        let expired = session.enabled
            && session.verified
            && session.locked_until.is_none()
            && session.verified_at.is_some_and(|at| now >= at + self.ttl());
        if !expired {
            return Ok(false);
        }
        session.clear_verification();
        self.persist(&session).await?;
        info!("session expired");
        Ok(true)
    }
}

async fn run_sweep(inner: Arc<GateInner>, cancel: CancellationToken) {
    let period = inner.config.sweep_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(err) = sweep_once(&inner).await {
                    warn!(error = %err, "session sweep failed");
                }
            }
        }
    }
}

async fn sweep_once(inner: &GateInner) -> Result<()> {
    if !inner.expire_if_due().await? {
        return Ok(());
    }
    let choice = inner
        .ui
        .choose("Your PIN session has expired.", &[REAUTHENTICATE, DISMISS])
        .await?;
    if choice == Some(0) {
        let decision = inner.check_access().await?;
        debug!(?decision, "re-authentication after expiry");
    }
    Ok(())
}

fn expose(secret: &SecretString) -> Zeroizing<String> {
    Zeroizing::new(secret.expose_secret().to_string())
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100))
}

fn remaining_minutes(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (until - now).num_seconds().max(0);
    ((seconds + 59) / 60).max(1)
}
