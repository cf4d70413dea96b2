use crate::ui;
use color_eyre::eyre::{
    Result,
    eyre,
};
use ethers::types::Address;
use futures::future::join_all;
use khanate_client::{
    batyrs::BatyrRoster,
    deployment::{
        DeploymentEnv,
        DeploymentStore,
        NetworkConfig,
    },
    facade::{
        KhanateContract,
        KhanateStatus,
        khanate_status,
    },
    gateway::ChainGateway,
    map::{
        Region,
        estimated_march_ms,
        region_at,
    },
    quotes::{
        Quote,
        QuoteContext,
        random_quote,
    },
    tracker::{
        BattleTracker,
        MovementId,
        TrackerEvent,
    },
    types::{
        Achievement,
        ActiveBattle,
        BattleId,
        BatyrStats,
        KhanateStats,
        Position,
    },
    wallets,
};
use std::{
    fmt::Display,
    path::PathBuf,
};
use tokio::{
    sync::mpsc::UnboundedReceiver,
    time::{
        self,
        Duration,
        Instant,
    },
};
use tracing::error;

const MAX_ERROR_LINES: usize = 50;

#[derive(Clone, Debug)]
pub enum WalletSource {
    /// Sign through an unlocked node account (local development chains).
    NodeAccount { index: usize },
    /// Decrypt a keystore file and sign locally.
    Keystore { name: String, dir: PathBuf },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub env: DeploymentEnv,
    pub rpc_url: Option<String>,
    pub contract_address: Option<String>,
    pub wallet: WalletSource,
}

/// Network parameters for the selected environment: built-in defaults,
/// overridden by the latest recorded deployment, overridden by flags.
fn resolve_network(config: &AppConfig) -> NetworkConfig {
    let mut network = config.env.default_network();
    if let Ok(store) = DeploymentStore::new(config.env) {
        if let Ok(Some(record)) = store.latest_for_chain(network.chain_id) {
            network.contract_address = record.contract_address;
        }
    }
    if let Some(url) = &config.rpc_url {
        network.rpc_url = url.clone();
    }
    if let Some(address) = &config.contract_address {
        network.contract_address = address.clone();
    }
    network
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let network = resolve_network(&config);
    let gateway = ChainGateway::connect(network).await?;
    let code_hash = gateway.verify_contract().await?;
    if let Ok(store) = DeploymentStore::new(config.env) {
        if let Ok(Some(record)) = store.latest_for_chain(gateway.network().chain_id) {
            if !record.is_compatible_with_hash(&code_hash) {
                tracing::warn!(
                    recorded = %record.code_hash,
                    observed = %code_hash,
                    "contract code differs from the recorded deployment"
                );
            }
        }
    }

    match &config.wallet {
        WalletSource::NodeAccount { index } => {
            let accounts = gateway.accounts().await?;
            let account = accounts.get(*index).copied().ok_or_else(|| {
                eyre!(
                    "node exposes {} account(s); index {} is out of range",
                    accounts.len(),
                    index
                )
            })?;
            let contract = gateway.node_account_facade(account);
            drive(gateway, contract).await
        }
        WalletSource::Keystore { name, dir } => {
            let descriptor = wallets::find_wallet(dir, name)?;
            let wallet = wallets::unlock_wallet(&descriptor)?;
            let contract = gateway.wallet_facade(wallet);
            drive(gateway, contract).await
        }
    }
}

async fn drive<C: KhanateContract + Clone>(
    gateway: ChainGateway,
    contract: C,
) -> Result<()> {
    let mut controller = AppController::new(gateway, contract);
    let mut ui_state = ui::UiState::default();

    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(&mut controller, &mut ui_state).await;
    ui::terminal_exit()?;
    res
}

#[derive(Clone, Debug)]
pub struct MovementView {
    pub movement_id: MovementId,
    pub battle_id: BattleId,
    pub origin: Position,
    pub destination: Position,
    pub remaining_secs: u64,
    pub progress: f64,
}

#[derive(Clone, Debug)]
pub struct OpponentView {
    pub address: Address,
    pub stats: KhanateStats,
    pub region_name: Option<&'static str>,
    pub estimated_march_ms: Option<u64>,
    pub is_self: bool,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub account: Address,
    pub balance: String,
    pub khanate: Option<KhanateStats>,
    pub achievements: Vec<(Achievement, bool)>,
    pub batyrs: Vec<(u8, BatyrStats)>,
    pub opponents: Vec<OpponentView>,
    pub movements: Vec<MovementView>,
    pub active_battles: Vec<ActiveBattle>,
    pub selected_opponent: usize,
    pub status: String,
    pub quote: String,
    pub errors: Vec<String>,
}

pub struct AppController<C: KhanateContract + Clone> {
    gateway: ChainGateway,
    contract: C,
    tracker: BattleTracker<C>,
    tracker_events: UnboundedReceiver<TrackerEvent>,
    batyrs: BatyrRoster<C>,
    account: Address,
    status: String,
    quote: Quote,
    errors: Vec<String>,
    selected_opponent: usize,
    opponent_addresses: Vec<Address>,
    founding_cursor: u64,
}

impl<C: KhanateContract + Clone> AppController<C> {
    pub fn new(gateway: ChainGateway, contract: C) -> Self {
        let account = contract.account();
        let (tracker, tracker_events) = BattleTracker::new(contract.clone());
        let batyrs = BatyrRoster::new(contract.clone());
        Self {
            gateway,
            contract,
            tracker,
            tracker_events,
            batyrs,
            account,
            status: String::from("Ready"),
            quote: random_quote(QuoteContext::Kazakh),
            errors: Vec::new(),
            selected_opponent: 0,
            opponent_addresses: Vec::new(),
            founding_cursor: 0,
        }
    }

    pub async fn snapshot(&mut self) -> Result<AppSnapshot> {
        let balance = self.gateway.balance_eth(self.account).await?;
        let khanate = match khanate_status(&self.contract).await? {
            KhanateStatus::Ready(stats) => Some(stats),
            KhanateStatus::NotCreated => None,
        };

        let batyrs = self.batyrs.owned_batyrs().await.unwrap_or_default();

        let opponents = self.fetch_directory(khanate.as_ref()).await?;
        self.opponent_addresses = opponents
            .iter()
            .filter(|o| !o.is_self)
            .map(|o| o.address)
            .collect();
        if self.selected_opponent >= self.opponent_addresses.len() {
            self.selected_opponent = self.opponent_addresses.len().saturating_sub(1);
        }

        self.announce_new_khanates().await?;

        let active_battles = self.tracker.list_active().await?;

        let now = Instant::now();
        let mut movements: Vec<MovementView> = self
            .tracker
            .movements()
            .map(|m| MovementView {
                movement_id: m.id,
                battle_id: m.battle_id,
                origin: m.origin,
                destination: m.destination,
                remaining_secs: m.remaining(now).as_secs(),
                progress: m.progress(now),
            })
            .collect();
        movements.sort_by_key(|m| m.movement_id);

        Ok(AppSnapshot {
            account: self.account,
            balance,
            khanate,
            achievements: self.batyrs.achievements().entries(),
            batyrs,
            opponents,
            movements,
            active_battles,
            selected_opponent: self.selected_opponent,
            status: self.status.clone(),
            quote: format!("\"{}\" — {}", self.quote.text, self.quote.author),
            errors: self.errors.iter().rev().take(5).cloned().collect(),
        })
    }

    /// All Khanates known to the contract, with march estimates from the
    /// player's own position. Per-address failures are skipped rather than
    /// failing the whole directory.
    async fn fetch_directory(
        &self,
        own: Option<&KhanateStats>,
    ) -> Result<Vec<OpponentView>> {
        let addresses = self.contract.active_khanates().await?;
        let stats = join_all(
            addresses
                .iter()
                .map(|address| self.contract.khanate_stats(*address)),
        )
        .await;
        let mut views = Vec::new();
        for (address, stats) in addresses.into_iter().zip(stats) {
            let Ok(stats) = stats else { continue };
            let estimated = own
                .filter(|_| address != self.account)
                .map(|me| estimated_march_ms(me.location, stats.location));
            views.push(OpponentView {
                address,
                region_name: region_at(stats.location).map(|r| r.name),
                estimated_march_ms: estimated,
                is_self: address == self.account,
                stats,
            });
        }
        Ok(views)
    }

    /// Surfaces Khanates founded since the last scan as a status line. The
    /// first scan only positions the cursor.
    async fn announce_new_khanates(&mut self) -> Result<()> {
        let (foundings, tip) = self
            .contract
            .khanates_created_since(self.founding_cursor)
            .await?;
        if self.founding_cursor > 0 {
            for founding in &foundings {
                if founding.owner != self.account {
                    self.status = format!("🏰 {} has founded a Khanate", founding.name);
                }
            }
        }
        self.founding_cursor = self.founding_cursor.max(tip.saturating_add(1));
        Ok(())
    }

    /// Periodic scheduling pass: advance countdowns, resolve due battles,
    /// fold tracker notifications into the status line.
    pub async fn on_tick(&mut self) {
        let _ = self.tracker.tick().await;
        let mut battle_concluded = false;
        while let Ok(event) = self.tracker_events.try_recv() {
            match event {
                TrackerEvent::MovementAdded { movement } => {
                    self.status = format!(
                        "⚔️ Troops are marching to battle! ETA: {} seconds",
                        movement.duration.as_secs()
                    );
                }
                TrackerEvent::MovementRemoved { .. } => {}
                TrackerEvent::BattleConcluded {
                    outcome,
                    victorious,
                } => {
                    battle_concluded = true;
                    self.status = if victorious {
                        format!(
                            "🎉 Victory! Gained {} experience!",
                            outcome.experience_gained
                        )
                    } else {
                        String::from("💔 Defeat!")
                    };
                }
            }
        }
        if battle_concluded {
            match self.batyrs.refresh_achievements().await {
                Ok(newly) => {
                    for achievement in newly {
                        self.status =
                            format!("🏆 Achievement unlocked: {}", achievement.title());
                    }
                }
                Err(err) => self.report_error("achievement refresh", err),
            }
        }
    }

    pub fn select_next_opponent(&mut self) {
        if !self.opponent_addresses.is_empty() {
            self.selected_opponent =
                (self.selected_opponent + 1) % self.opponent_addresses.len();
        }
    }

    pub fn select_prev_opponent(&mut self) {
        if !self.opponent_addresses.is_empty() {
            self.selected_opponent = (self.selected_opponent
                + self.opponent_addresses.len()
                - 1)
                % self.opponent_addresses.len();
        }
    }

    pub async fn create_khanate(&mut self, name: &str, region: Region) {
        if name.trim().is_empty() {
            self.status = String::from("❌ Please enter a Khanate name");
            return;
        }
        match self
            .contract
            .create_khanate(name.trim(), region.position())
            .await
        {
            Ok(()) => {
                self.status = String::from("✅ Khanate created successfully!");
                self.quote = random_quote(QuoteContext::Strategic);
                if let Err(err) = self.batyrs.refresh_achievements().await {
                    self.report_error("achievement refresh", err);
                }
            }
            Err(err) if err.is_khanate_exists() => {
                self.status = String::from("❌ You already have a Khanate!");
            }
            Err(err) => self.report_error("Khanate creation", err),
        }
    }

    pub async fn purchase_troops(&mut self, archers: u64, cavalry: u64) {
        if archers == 0 && cavalry == 0 {
            self.status = String::from("❌ Please enter troop amounts");
            return;
        }
        match self.contract.purchase_troops(archers, cavalry).await {
            Ok(()) => {
                self.status =
                    format!("✅ Recruited {archers} archer(s) and {cavalry} cavalry");
            }
            Err(err) => self.report_error("troop purchase", err),
        }
    }

    pub async fn open_lucky_box(&mut self) {
        match self.batyrs.open_lucky_box().await {
            Ok(Some(award)) => {
                self.status = format!("📦 {} joined your horde!", award.name);
                if let Err(err) = self.batyrs.refresh_achievements().await {
                    self.report_error("achievement refresh", err);
                }
            }
            Ok(None) => {
                self.status = String::from("📦 The box was empty this time...");
            }
            Err(err) => self.report_error("lucky box purchase", err),
        }
    }

    pub async fn battle(&mut self) {
        let Some(opponent) = self
            .opponent_addresses
            .get(self.selected_opponent)
            .copied()
        else {
            self.status = String::from("❌ No opponent selected");
            return;
        };
        match self.tracker.initiate(opponent).await {
            Ok(movement) => {
                self.status = format!(
                    "⚔️ Troops are marching to battle! ETA: {} seconds",
                    movement.duration.as_secs()
                );
                self.quote = random_quote(QuoteContext::Strategic);
            }
            Err(err) => self.report_error("battle", err),
        }
    }

    /// Speeds up the oldest live movement.
    pub async fn speed_up(&mut self) {
        let Some(movement_id) = self.tracker.movements().map(|m| m.id).min() else {
            self.status = String::from("❌ No troops are traveling");
            return;
        };
        match self.tracker.speed_up(movement_id).await {
            Ok(_) => {
                self.status = String::from("⚡ Battle speed up successful!");
            }
            Err(err) => self.report_error("speed up", err),
        }
    }

    fn report_error(&mut self, context: &str, err: impl Display) {
        let line = format!("{context}: {err}");
        error!("{}", line);
        self.status = format!("❌ {err}");
        self.errors.push(line);
        if self.errors.len() > MAX_ERROR_LINES {
            let drain = self.errors.len() - MAX_ERROR_LINES;
            self.errors.drain(0..drain);
        }
    }
}

async fn run_loop<C: KhanateContract + Clone>(
    controller: &mut AppController<C>,
    ui_state: &mut ui::UiState,
) -> Result<()> {
    let mut ticker = time::interval(Duration::from_millis(500));
    let mut last_snapshot = controller.snapshot().await?;
    ui::draw(ui_state, &last_snapshot)?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            _ = ticker.tick() => {
                controller.on_tick().await;
                last_snapshot = controller.snapshot().await?;
                ui::draw(ui_state, &last_snapshot)?;
            }
            ev = ui::next_event(ui_state) => {
                match ev? {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::NextOpponent => controller.select_next_opponent(),
                    ui::UserEvent::PrevOpponent => controller.select_prev_opponent(),
                    ui::UserEvent::Battle => controller.battle().await,
                    ui::UserEvent::SpeedUp => controller.speed_up().await,
                    ui::UserEvent::LuckyBox => controller.open_lucky_box().await,
                    ui::UserEvent::ConfirmCreate { name, region } => {
                        controller.create_khanate(&name, region).await;
                    }
                    ui::UserEvent::ConfirmTroops { archers, cavalry } => {
                        controller.purchase_troops(archers, cavalry).await;
                    }
                    ui::UserEvent::Redraw => {
                        // UI-only update; redraw without hitting the chain
                        ui::draw(ui_state, &last_snapshot)?;
                        continue;
                    }
                }
                last_snapshot = controller.snapshot().await?;
                ui::draw(ui_state, &last_snapshot)?;
            }
        }
    }
    Ok(())
}
