use std::sync::Arc;

use wordbomb::store::Stores;
use wordbomb::{server, telemetry, Config, ServerError, ServerState};
use wordbomb_guard::{Guard, GuardConfig};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    telemetry::init_tracing();
    let config = Config::from_env();

    let stores = Stores::open(
        &config.data_dir,
        &config.antiscraping_secret,
        &config.admin_password,
    )
    .await?;

    let guard = Guard::new(GuardConfig {
        endpoint_limit: config.rate_limit_max,
        ..GuardConfig::default()
    });

    let state = Arc::new(ServerState::new(config, guard, stores));

    // Persisted bans arm the guard before the first request.
    {
        let bans = state.stores.ban_listing().await;
        let mut guard = state.guard.lock().await;
        for ip in bans.keys() {
            match ip.parse() {
                Ok(ip) => guard.ban(ip),
                Err(_) => tracing::warn!(%ip, "unparsable ip in ban store"),
            }
        }
    }

    // First dictionary build. Failure is not fatal: queries answer
    // `ready: false` until an admin rebuild succeeds.
    match state
        .dict
        .rebuild(&state.config.dict_path, state.config.sample_cap)
        .await
    {
        Ok(report) => {
            tracing::info!(words = report.lines_processed, "dictionary index ready");
        }
        Err(e) => {
            tracing::error!(error = %e, "initial dictionary build failed");
        }
    }

    server::spawn_maintenance(Arc::clone(&state));
    server::run(state).await
}
