use std::{
    path::PathBuf,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use alloy::primitives::Address;
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use tokio::time;
use tracing::{
    error,
    info,
    warn,
};

use crate::{
    deployment::{
        self,
        ContestDeployment,
        DeploymentEnv,
        DeploymentStore,
    },
    gateway::{
        ContestResult,
        ContestSnapshot,
        group_winners,
    },
    media::{
        MediaClient,
        MediaConfig,
    },
    provider::{
        ChainDescriptor,
        NodeWalletProvider,
        WalletProvider,
    },
    session::Session,
    ui,
    wallets,
};

const CONTEST_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Screen {
    Wallet,
    Contest,
    Winners,
}

#[derive(Clone, Debug)]
pub enum WalletConfig {
    Keystore { name: String, dir: PathBuf },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub env: DeploymentEnv,
    pub rpc_url: Option<String>,
    pub wallet: Option<WalletConfig>,
    pub contract: Option<String>,
}

/// The open contest as loaded once per visit, plus the derived end time.
#[derive(Clone, Debug)]
pub struct ContestView {
    pub snapshot: ContestSnapshot,
    pub ends_at_ms: u64,
}

impl ContestView {
    pub fn new(snapshot: ContestSnapshot) -> Self {
        let ends_at_ms = snapshot.started_at.saturating_mul(1000) + CONTEST_DURATION_MS;
        Self {
            snapshot,
            ends_at_ms,
        }
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.ends_at_ms.saturating_sub(now_ms)
    }

    /// UX pre-check only; the contract is the actual vote-per-address
    /// enforcement.
    pub fn can_vote(&self, account: Option<&str>) -> bool {
        match account {
            Some(account) => !self.snapshot.has_voted(account),
            None => false,
        }
    }

    /// The running theme is set by the first submission; until then the
    /// contest is open to any theme.
    pub fn theme(&self) -> Option<&str> {
        self.snapshot
            .submissions
            .first()
            .map(|submission| submission.theme.as_str())
    }
}

/// Immutable view of everything the screens render.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub screen: Screen,
    pub wallet_available: bool,
    pub account: Option<String>,
    pub chain_id: Option<String>,
    pub target: ChainDescriptor,
    pub on_target_chain: bool,
    pub contest: Option<ContestView>,
    pub winners: Option<Vec<ContestResult>>,
    pub media_available: bool,
    pub status: String,
    pub errors: Vec<String>,
    pub now_ms: u64,
}

pub struct AppController {
    deployment: ContestDeployment,
    provider: Option<Arc<dyn WalletProvider>>,
    session: Session,
    media: Option<MediaClient>,
    screen: Screen,
    contest: Option<ContestView>,
    winners: Option<Vec<ContestResult>>,
    status: String,
    errors: Vec<String>,
}

impl AppController {
    pub fn new(config: AppConfig) -> Result<Self> {
        deployment::ensure_structure()?;
        let store = DeploymentStore::new(config.env)?;
        let mut record = store.latest_or_default()?;
        if let Some(rpc_url) = &config.rpc_url {
            record.chain.rpc_urls = vec![rpc_url.clone()];
        }
        if let Some(contract) = &config.contract {
            record.contract_address = contract.clone();
        }

        let provider = build_provider(&config, &record)?;
        if provider.is_none() {
            info!("no wallet configured; running with the connect card only");
        }
        let media = match MediaConfig::from_env() {
            Some(media_config) => Some(MediaClient::new(media_config)?),
            None => {
                info!("media services not configured; track generation disabled");
                None
            }
        };

        let session = build_session(provider.clone(), &record)?;
        Ok(Self {
            deployment: record,
            provider,
            session,
            media,
            screen: Screen::Wallet,
            contest: None,
            winners: None,
            status: String::from("Ready"),
            errors: Vec::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(%message, "screen error");
        self.errors.push(message);
    }

    /// The coarse recovery action: rebuild the session and drop every cached
    /// read, as a full page reload would. The wallet provider itself is the
    /// only thing that survives, mirroring a browser extension.
    pub fn full_reload(&mut self) -> Result<()> {
        self.session = build_session(self.provider.clone(), &self.deployment)?;
        self.contest = None;
        self.winners = None;
        self.errors.clear();
        self.screen = Screen::Wallet;
        self.status = String::from("Reloaded");
        info!("full reload; all in-memory state discarded");
        Ok(())
    }

    pub async fn connect(&mut self) {
        if !self.session.has_provider() {
            // No wallet in this process; the card stays on the connect
            // prompt with no message, per the silent-failure contract.
            warn!("connect requested but no wallet provider is available");
            return;
        }
        if self.session.connect().await {
            self.status = String::from("Wallet connected");
            self.show_contest().await;
        }
    }

    pub async fn disconnect(&mut self) {
        self.session.disconnect().await;
        self.contest = None;
        self.screen = Screen::Wallet;
        self.status = String::from("Wallet disconnected");
    }

    pub async fn show_contest(&mut self) {
        self.screen = Screen::Contest;
        if self.contest.is_none() {
            self.refresh_contest().await;
        }
    }

    pub async fn show_winners(&mut self) {
        self.screen = Screen::Winners;
        if self.winners.is_none() {
            self.refresh_winners().await;
        }
    }

    pub fn show_wallet(&mut self) {
        self.screen = Screen::Wallet;
    }

    pub async fn refresh_current_screen(&mut self) {
        match self.screen {
            Screen::Wallet => {}
            Screen::Contest => self.refresh_contest().await,
            Screen::Winners => self.refresh_winners().await,
        }
    }

    async fn refresh_contest(&mut self) {
        let Some(gateway) = self.session.gateway() else {
            return;
        };
        match gateway.contest_details().await {
            Ok(snapshot) => {
                self.contest = Some(ContestView::new(snapshot));
            }
            Err(err) => self.push_error(format!("Error loading contest data: {err}")),
        }
    }

    async fn refresh_winners(&mut self) {
        let Some(gateway) = self.session.gateway() else {
            return;
        };
        match gateway.winners().await {
            Ok(records) => self.winners = Some(group_winners(records)),
            Err(err) => self.push_error(format!("Failed to fetch contests: {err}")),
        }
    }

    pub async fn vote(&mut self, index: usize) {
        let account = self.session.account();
        let Some(contest) = &self.contest else {
            return;
        };
        if contest.snapshot.submissions.get(index).is_none() {
            return;
        }
        if !contest.can_vote(account.as_deref()) {
            self.status = String::from("You can only vote once per Mural contest.");
            return;
        }
        let Some(gateway) = self.session.gateway().cloned() else {
            return;
        };
        match gateway.vote_on_submission(index as u64).await {
            Ok(_) => {
                // Mirror the wallet-side vote immediately so the action
                // disables before the next poll.
                if let (Some(contest), Some(account)) = (self.contest.as_mut(), account) {
                    contest.snapshot.voters.push(account);
                }
                self.status = format!("Voted for submission {}", index + 1);
            }
            Err(err) => self.push_error(format!("Error voting: {err}")),
        }
    }

    /// Submission pipeline: theme (on-chain theme wins, otherwise generated
    /// from the prompt), generated audio, upload, then the payable
    /// `submitMusic` call.
    pub async fn submit_track(&mut self, prompt: String) -> Result<()> {
        let Some(gateway) = self.session.gateway().cloned() else {
            return Err(eyre!("no wallet connected"));
        };
        let Some(media) = self.media.clone() else {
            return Err(eyre!("media services are not configured"));
        };

        let theme = match gateway.current_theme().await {
            Ok(theme) if !theme.trim().is_empty() => theme,
            Ok(_) => media
                .generate_theme(&prompt)
                .await
                .wrap_err("theme generation failed")?,
            Err(err) => return Err(err).wrap_err("reading the current theme failed"),
        };

        let audio = media
            .generate_audio(&prompt)
            .await
            .wrap_err("audio generation failed")?;
        let music_url = media
            .upload_track(audio, "submission.mp3")
            .await
            .wrap_err("track upload failed")?;

        let hash = gateway
            .submit_music(&music_url, &theme, &prompt)
            .await
            .wrap_err("submitMusic transaction failed")?;
        info!(%hash, %theme, "track submitted");
        self.status = format!("Submitted track for theme '{theme}'");
        self.refresh_contest().await;
        Ok(())
    }

    pub fn build_snapshot(&self) -> AppSnapshot {
        let state = self.session.snapshot();
        let on_target_chain = self.session.on_target_chain();
        // Anything but a connected wallet on the target chain falls back to
        // the wallet card, whatever screen was selected.
        let screen = if on_target_chain {
            self.screen
        } else {
            Screen::Wallet
        };
        AppSnapshot {
            screen,
            wallet_available: self.session.has_provider(),
            account: state.account,
            chain_id: state.chain_id,
            target: self.deployment.chain.clone(),
            on_target_chain,
            contest: self.contest.clone(),
            winners: self.winners.clone(),
            media_available: self.media.is_some(),
            status: self.status.clone(),
            errors: self.errors.iter().rev().take(5).cloned().collect(),
            now_ms: now_ms(),
        }
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn build_provider(
    config: &AppConfig,
    record: &ContestDeployment,
) -> Result<Option<Arc<dyn WalletProvider>>> {
    let Some(WalletConfig::Keystore { name, dir }) = &config.wallet else {
        return Ok(None);
    };
    let descriptor = wallets::find_wallet(dir, name).wrap_err("Unable to locate wallet")?;
    let signer = wallets::unlock_wallet(&descriptor)?;
    let rpc_url = record
        .chain
        .rpc_urls
        .first()
        .ok_or_else(|| eyre!("deployment record has no RPC URL"))?;
    let provider = NodeWalletProvider::new(rpc_url, signer)
        .wrap_err_with(|| format!("Failed to set up wallet provider at {rpc_url}"))?;
    Ok(Some(Arc::new(provider)))
}

fn build_session(
    provider: Option<Arc<dyn WalletProvider>>,
    record: &ContestDeployment,
) -> Result<Session> {
    let contract_address = Address::from_str(&record.contract_address).map_err(|e| {
        eyre!(
            "Deployment record contains an invalid contract address {:?}: {e}",
            record.contract_address
        )
    })?;
    Ok(Session::new(
        provider,
        record.chain.clone(),
        contract_address,
    ))
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let controller = AppController::new(config)?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

fn show_processing_status(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    controller.set_status(message);
    ui::draw(ui_state, &controller.build_snapshot()).wrap_err(context)
}

async fn run_loop(
    mut controller: AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    tracing::info!("Running app loop");
    let mut session_rx = controller.session().subscribe();
    // One-second cadence for the countdown; ends with the loop, nothing
    // leaks past teardown.
    let mut ticker = time::interval(Duration::from_secs(1));

    ui::draw(ui_state, &controller.build_snapshot()).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw on countdown tick failed")?;
            }
            changed = session_rx.changed() => {
                if changed.is_err() {
                    // Session was rebuilt by a reload; pick up the new channel.
                    session_rx = controller.session().subscribe();
                }
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw after session change failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Connect => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Connecting wallet...",
                            "draw while connecting failed",
                        )?;
                        controller.connect().await;
                    }
                    ui::UserEvent::Disconnect => controller.disconnect().await,
                    ui::UserEvent::ShowWallet => controller.show_wallet(),
                    ui::UserEvent::ShowContest => controller.show_contest().await,
                    ui::UserEvent::ShowWinners => controller.show_winners().await,
                    ui::UserEvent::Refresh => controller.refresh_current_screen().await,
                    ui::UserEvent::Vote(index) => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            format!("Casting vote for submission {}...", index + 1),
                            "draw while voting failed",
                        )?;
                        controller.vote(index).await;
                    }
                    ui::UserEvent::ConfirmSubmit { prompt } => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Generating and submitting your track...",
                            "draw while submitting failed",
                        )?;
                        if let Err(err) = controller.submit_track(prompt).await {
                            controller.push_error(format!("Submission failed: {err}"));
                        }
                    }
                    ui::UserEvent::Reload => {
                        controller.full_reload().wrap_err("full reload failed")?;
                        session_rx = controller.session().subscribe();
                    }
                }
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw after user event failed")?;
            }
        }
    }
    Ok(())
}
