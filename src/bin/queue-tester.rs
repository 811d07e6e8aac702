//! Queue Tester CLI Tool
//!
//! Command-line tool for exercising the admission queue in-process with a
//! manual clock, so waiting list behaviour can be inspected without a game
//! server.
//!
//! Usage:
//!   cargo run --bin queue-tester -- --help
//!   cargo run --bin queue-tester timeouts --up-to 60
//!   cargo run --bin queue-tester simulate --max-players 2 --online 2 --normal 3 --premium 1
//!   cargo run --bin queue-tester run-scenario --scenario turn-reached
//!   cargo run --bin queue-tester run-all-scenarios

use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Result};
use clap::{Parser, Subcommand};
use login_queue::admission::{
    retry_interval, AdmissionQueue, ManualClock, OnlinePlayers, QueuePolicy, ServerCapacity,
};
use login_queue::login::{LoginGate, LoginResponse};
use login_queue::types::{AccountType, LoginClient};
use tracing::debug;

#[derive(Parser)]
#[command(name = "queue-tester")]
#[command(about = "In-process testing tool for the login admission queue")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Grace margin added to each retry interval, in seconds
    #[arg(long, default_value = "15")]
    grace_margin: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Print retry interval and timeout per waiting list place
    Timeouts {
        /// Last place to print
        #[arg(short, long, default_value = "60")]
        up_to: usize,
    },
    /// Log in a batch of clients against a full server and show the list
    Simulate {
        /// Player limit (0 = uncapped)
        #[arg(short, long, default_value = "1")]
        max_players: u32,
        /// Players already online
        #[arg(short, long, default_value = "1")]
        online: usize,
        /// Normal clients logging in
        #[arg(short, long, default_value = "3")]
        normal: u32,
        /// Premium clients logging in after the normal ones
        #[arg(short, long, default_value = "1")]
        premium: u32,
        /// Seconds to let pass before the list is inspected again
        #[arg(short, long, default_value = "0")]
        advance: u64,
    },
    /// Run a predefined scenario
    RunScenario {
        /// Scenario name (see run-all-scenarios for the list)
        #[arg(short, long)]
        scenario: String,
    },
    /// Run all predefined scenarios
    RunAllScenarios,
}

/// Admission queue wired to in-memory collaborators and a manual clock
struct Sandbox {
    clock: Arc<ManualClock>,
    online: Arc<OnlinePlayers>,
    capacity: Arc<ServerCapacity>,
    gate: LoginGate,
}

impl Sandbox {
    fn new(max_players: u32, online: usize, policy: QueuePolicy) -> Self {
        let clock = Arc::new(ManualClock::new());
        let online = Arc::new(OnlinePlayers::new(online));
        let capacity = Arc::new(ServerCapacity::new(max_players));
        let queue = AdmissionQueue::new(capacity.clone(), online.clone())
            .with_clock(clock.clone())
            .with_policy(policy);

        Self {
            clock,
            online,
            capacity,
            gate: LoginGate::new(Arc::new(queue)),
        }
    }

    fn queue(&self) -> &AdmissionQueue {
        self.gate.queue()
    }

    fn login(&self, client: &LoginClient) -> LoginResponse {
        let response = self.gate.handle_login(client);
        debug!("{} ({}) -> {:?}", client.name, client.id, response);
        response
    }

    fn print_list(&self) {
        let snapshot = self.queue().snapshot();
        println!(
            "📋 Waiting list: {} ({} priority, {} normal)",
            snapshot.total, snapshot.priority, snapshot.normal
        );
        for (index, client_id) in self.queue().waiting_clients().iter().enumerate() {
            let tier = if index < snapshot.priority {
                "priority"
            } else {
                "normal"
            };
            println!("  {:>3}. client {} ({})", index + 1, client_id, tier);
        }
    }
}

type Scenario = fn(QueuePolicy) -> Result<()>;

const SCENARIOS: &[(&str, Scenario)] = &[
    ("turn-reached", scenario_turn_reached),
    ("premium-first", scenario_premium_first),
    ("bypass", scenario_bypass),
    ("expiry", scenario_expiry),
    ("disconnect", scenario_disconnect),
];

/// Max 1 with 1 online: A and B wait, a slot frees, A gets in and B moves up
fn scenario_turn_reached(policy: QueuePolicy) -> Result<()> {
    let sandbox = Sandbox::new(1, 1, policy);
    let a = LoginClient::normal(1, "A");
    let b = LoginClient::normal(2, "B");

    let first = sandbox.queue().evaluate(&a);
    ensure!(first.slot() == Some(1), "A should wait at place 1");
    let second = sandbox.queue().evaluate(&b);
    ensure!(second.slot() == Some(2), "B should wait at place 2");

    sandbox.online.set(0);
    ensure!(sandbox.login(&a).is_admitted(), "A should be admitted");
    ensure!(
        sandbox.queue().position_of(b.id) == 1,
        "B should move up to place 1"
    );
    Ok(())
}

/// A premium client arriving after two normal clients goes to the front
fn scenario_premium_first(policy: QueuePolicy) -> Result<()> {
    let sandbox = Sandbox::new(1, 1, policy);
    sandbox.login(&LoginClient::normal(1, "First"));
    sandbox.login(&LoginClient::normal(2, "Second"));

    let response = sandbox.login(&LoginClient::premium(3, "Premium"));
    ensure!(
        matches!(response, LoginResponse::WaitingList { slot: 1, .. }),
        "premium client should be at place 1, got {:?}",
        response
    );
    ensure!(
        sandbox.queue().waiting_clients() == vec![3, 1, 2],
        "normal clients should keep their order behind the premium client"
    );
    Ok(())
}

/// Staff and bypass clients never wait, whatever the occupancy
fn scenario_bypass(policy: QueuePolicy) -> Result<()> {
    let sandbox = Sandbox::new(1, 50, policy);
    sandbox.login(&LoginClient::normal(1, "Waiting"));

    let game_master =
        LoginClient::normal(2, "GM").with_account_type(AccountType::GameMaster);
    let bypass = LoginClient::normal(3, "Bypass").with_bypass();
    let tutor = LoginClient::normal(4, "Tutor").with_account_type(AccountType::SeniorTutor);

    ensure!(sandbox.login(&game_master).is_admitted(), "GM should be admitted");
    ensure!(sandbox.login(&bypass).is_admitted(), "bypass should be admitted");
    ensure!(!sandbox.login(&tutor).is_admitted(), "senior tutor should wait");
    ensure!(sandbox.queue().len() == 2, "only normal accounts should wait");
    Ok(())
}

/// Clients that stop retrying are dropped once their timeout passes
fn scenario_expiry(policy: QueuePolicy) -> Result<()> {
    let sandbox = Sandbox::new(1, 1, policy.clone());
    let quitter = LoginClient::normal(1, "Quitter");
    let patient = LoginClient::normal(2, "Patient");

    sandbox.login(&quitter);
    sandbox.login(&patient);

    // Patient keeps retrying within its window, quitter does not
    let step = retry_interval(2);
    let mut elapsed = Duration::ZERO;
    while elapsed <= policy.timeout_for(1) {
        sandbox.clock.advance(step);
        elapsed += step;
        sandbox.login(&patient);
    }

    ensure!(
        sandbox.queue().position_of(quitter.id) == 0,
        "quitter should have expired"
    );
    ensure!(
        sandbox.queue().position_of(patient.id) == 1,
        "patient should be at the front"
    );
    Ok(())
}

/// A dropped connection frees its place immediately
fn scenario_disconnect(policy: QueuePolicy) -> Result<()> {
    let sandbox = Sandbox::new(1, 1, policy);
    sandbox.login(&LoginClient::premium(1, "Leaver"));
    sandbox.login(&LoginClient::normal(2, "Stayer"));

    ensure!(sandbox.gate.disconnect(1), "leaver should be removed");
    ensure!(
        sandbox.queue().snapshot().priority == 0,
        "priority tier should be empty"
    );

    sandbox.capacity.set_max_players(2);
    ensure!(
        sandbox.login(&LoginClient::normal(2, "Stayer")).is_admitted(),
        "stayer should be admitted after capacity grows"
    );
    Ok(())
}

fn run_scenario(name: &str, policy: QueuePolicy) -> Result<()> {
    match SCENARIOS.iter().find(|(scenario, _)| *scenario == name) {
        Some((_, scenario)) => scenario(policy),
        None => Err(anyhow::anyhow!(
            "Unknown scenario '{}'. Available: {}",
            name,
            SCENARIOS
                .iter()
                .map(|(scenario, _)| *scenario)
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let policy = QueuePolicy::new(cli.grace_margin)?;

    match cli.command {
        Commands::Timeouts { up_to } => {
            println!("{:>6} {:>8} {:>8}", "place", "retry", "timeout");
            for slot in 1..=up_to {
                println!(
                    "{:>6} {:>7}s {:>7}s",
                    slot,
                    retry_interval(slot).as_secs(),
                    policy.timeout_for(slot).as_secs()
                );
            }
        }

        Commands::Simulate {
            max_players,
            online,
            normal,
            premium,
            advance,
        } => {
            let sandbox = Sandbox::new(max_players, online, policy);
            let clients = (1..=normal)
                .map(|id| LoginClient::normal(id, format!("normal-{}", id)))
                .chain((1..=premium).map(|n| {
                    let id = normal + n;
                    LoginClient::premium(id, format!("premium-{}", id))
                }));

            for client in clients {
                match sandbox.login(&client) {
                    LoginResponse::Admitted => println!("✅ {} admitted", client.name),
                    LoginResponse::WaitingList {
                        slot, retry_after, ..
                    } => println!(
                        "⏳ {} waiting at place {} (retry in {}s)",
                        client.name,
                        slot,
                        retry_after.as_secs()
                    ),
                }
            }
            sandbox.print_list();

            if advance > 0 {
                sandbox.clock.advance(Duration::from_secs(advance));
                let expired = sandbox.queue().sweep_expired();
                println!("\n🕒 After {}s: {} entries expired", advance, expired);
                sandbox.print_list();
            }
        }

        Commands::RunScenario { scenario } => {
            println!("🧪 Running scenario: {}", scenario);
            match run_scenario(&scenario, policy) {
                Ok(()) => println!("✅ Scenario completed successfully!"),
                Err(e) => {
                    eprintln!("❌ Scenario failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::RunAllScenarios => {
            let mut passed = 0;
            let mut failed = 0;

            println!("🧪 Running all test scenarios...\n");

            for (name, scenario) in SCENARIOS {
                print!("Running '{}' scenario... ", name);
                match scenario(policy.clone()) {
                    Ok(()) => {
                        println!("✅ PASSED");
                        passed += 1;
                    }
                    Err(e) => {
                        println!("❌ FAILED ({})", e);
                        failed += 1;
                    }
                }
            }

            println!("\n📊 Results: {} passed, {} failed", passed, failed);
            if failed > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
