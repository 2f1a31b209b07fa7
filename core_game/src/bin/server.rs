use std::process;
use std::sync::Arc;
use std::thread;

use tracing::{error, info, warn};

use core_game::{
    load_game_config_from_env, register_sweeps, ChatServer, Collaborators, GameController,
    JsonFileStore, LedgerPaymentVerifier, LinkAdNetwork, PaymentVerifier, RejectAllPayments,
    ServerEvent, SystemClock, ThreadScheduler,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_game_config_from_env();
    let server_config = &config.server;

    let store = match JsonFileStore::open(
        &server_config.data_dir,
        &server_config.backup_dir,
        config.sweeps.max_backups,
    ) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(target: "tide_pet::server", error = %err, "store.open_failed");
            process::exit(1);
        }
    };

    let payments: Arc<dyn PaymentVerifier> = match &server_config.payment_ledger_path {
        Some(path) => match LedgerPaymentVerifier::open(path) {
            Ok(ledger) => Arc::new(ledger),
            Err(err) => {
                warn!(
                    target: "tide_pet::server",
                    path = %path.display(),
                    error = %err,
                    "payments.ledger_unavailable=reject_all"
                );
                Arc::new(RejectAllPayments)
            }
        },
        None => Arc::new(RejectAllPayments),
    };

    let (chat_server, events) = match ChatServer::start(server_config.command_bind) {
        Ok(started) => started,
        Err(err) => {
            error!(
                target: "tide_pet::server",
                bind = %server_config.command_bind,
                error = %err,
                "chat_server.bind_failed"
            );
            process::exit(1);
        }
    };
    let chat_server = Arc::new(chat_server);
    let ads = Arc::new(LinkAdNetwork::new(config.ads.link_base.clone()));
    let clock = Arc::new(SystemClock);

    let controller = Arc::new(GameController::new(
        Arc::clone(&config),
        Collaborators {
            store,
            transport: chat_server.clone(),
            ads: ads.clone(),
            payments,
            clock: clock.clone(),
        },
    ));

    let scheduler = ThreadScheduler::new(clock);
    register_sweeps(&scheduler, Arc::clone(&controller));

    info!(
        target: "tide_pet::server",
        command_bind = %chat_server.local_addr(),
        data_dir = %config.server.data_dir.display(),
        "Tide Pet server ready"
    );

    while let Ok(event) = events.recv() {
        match event {
            ServerEvent::Update(update) => {
                let controller = Arc::clone(&controller);
                // Ad flows block until confirmed. Player locks order the rest.
                thread::spawn(move || {
                    if let Err(err) = controller.dispatch(&update) {
                        warn!(
                            target: "tide_pet::server",
                            player = %update.user_id,
                            error = %err,
                            "reply.undelivered"
                        );
                    }
                });
            }
            ServerEvent::AdViewed(ad_id) => {
                if !ads.mark_viewed(&ad_id) {
                    warn!(target: "tide_pet::server", ad = %ad_id, "ad.unknown_or_expired");
                }
            }
        }
    }

    scheduler.shutdown();
    chat_server.shutdown();
}
